//! # 字段注册表
//!
//! 扫描记录中所有可能出现的 (section, entry) 及其显示格式、单位与说明。
//!
//! ## 功能
//! - `Section`: 扫描记录的分组（角度、指数、强度、计算结果……）
//! - `BeamType`: 非极化 / 自旋向上 / 自旋向下 三种中子束
//! - `FieldRegistry::standard()`: 启动时构造一次，之后只读共享
//!
//! ## 依赖关系
//! - 被 `models/scan.rs` 使用（写入字段时查询规格）
//! - 被 `export/` 使用（格式记号）

use crate::error::{ReduceError, Result};

use std::collections::BTreeMap;
use std::fmt;

/// 日期时间的输出格式
pub const DATE_TIME_FORMAT: &str = "yyyy-MM-dd hh:mm";

// ─────────────────────────────────────────────────────────────
// Section
// ─────────────────────────────────────────────────────────────

/// 扫描记录的分组
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Section {
    Angles,
    Calculations,
    Conditions,
    Cosines,
    File,
    Indices,
    Intensities,
    Misc,
    Number,
    Orientation,
    Polarisation,
    ScanData,
}

impl Section {
    /// 所有分组，按名称升序
    pub const ALL: [Section; 12] = [
        Section::Angles,
        Section::Calculations,
        Section::Conditions,
        Section::Cosines,
        Section::File,
        Section::Indices,
        Section::Intensities,
        Section::Misc,
        Section::Number,
        Section::Orientation,
        Section::Polarisation,
        Section::ScanData,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Section::Angles => "angles",
            Section::Calculations => "calculations",
            Section::Conditions => "conditions",
            Section::Cosines => "cosines",
            Section::File => "file",
            Section::Indices => "indices",
            Section::Intensities => "intensities",
            Section::Misc => "misc",
            Section::Number => "number",
            Section::Orientation => "orientation",
            Section::Polarisation => "polarisation",
            Section::ScanData => "scandata",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ─────────────────────────────────────────────────────────────
// BeamType
// ─────────────────────────────────────────────────────────────

/// 中子束类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BeamType {
    Unpolarised,
    Up,
    Down,
}

impl BeamType {
    pub const ALL: [BeamType; 3] = [BeamType::Unpolarised, BeamType::Up, BeamType::Down];

    /// 字段名后缀：`""`, `"(+)"`, `"(-)"`
    pub fn suffix(&self) -> &'static str {
        match self {
            BeamType::Unpolarised => "",
            BeamType::Up => "(+)",
            BeamType::Down => "(-)",
        }
    }

    /// 拼接带后缀的字段名，如 `Detector(+)`
    pub fn entry(&self, base: &str) -> String {
        format!("{}{}", base, self.suffix())
    }
}

// ─────────────────────────────────────────────────────────────
// FieldSpec / FieldRegistry
// ─────────────────────────────────────────────────────────────

/// 字段值的类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// 空格分隔的数值数组
    Numeric,
    /// 自由文本
    Text,
}

/// 单个字段的规格
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub kind: FieldKind,
    /// printf 风格格式记号，如 `0.2f`, `4i`, `s`
    pub format: String,
    pub units: String,
    pub tooltip: String,
}

/// 字段注册表
#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    fields: BTreeMap<Section, BTreeMap<String, FieldSpec>>,
}

impl FieldRegistry {
    /// 空注册表
    pub fn empty() -> Self {
        FieldRegistry::default()
    }

    /// 登记一个字段
    pub fn register(
        &mut self,
        section: Section,
        entry: &str,
        kind: FieldKind,
        format: &str,
        units: &str,
        tooltip: &str,
    ) {
        self.fields.entry(section).or_default().insert(
            entry.to_string(),
            FieldSpec {
                kind,
                format: format.to_string(),
                units: units.to_string(),
                tooltip: tooltip.to_string(),
            },
        );
    }

    /// 查询字段规格；未登记时返回 `FieldNotFound`
    pub fn spec(&self, section: Section, entry: &str) -> Result<&FieldSpec> {
        self.fields
            .get(&section)
            .and_then(|entries| entries.get(entry))
            .ok_or_else(|| ReduceError::field_not_found(section, entry))
    }

    pub fn contains(&self, section: Section, entry: &str) -> bool {
        self.spec(section, entry).is_ok()
    }

    /// 某分组下登记的全部字段名（升序）
    pub fn entries(&self, section: Section) -> Vec<&str> {
        self.fields
            .get(&section)
            .map(|entries| entries.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// 标准字段表
    pub fn standard() -> Self {
        use FieldKind::{Numeric as N, Text as T};
        let mut r = FieldRegistry::empty();

        // 扫描编号
        r.register(Section::Number, "Scan", N, "i", "", "Relative index number of the experimental scan");
        r.register(Section::Number, "Excluded", N, "i", "", "Is current scan excluded (1) or correctly measured (0)");
        r.register(Section::Number, "Batch", N, "i", "", "A batch number to distinguish between groups of reflections with separate scale factors");

        // 角度
        for (name, tip) in [
            ("2Theta", "two-theta detector angle"),
            ("Theta", "theta detector angle"),
            ("Gamma", "gamma detector angle"),
            ("Omega", "omega instrument angle"),
            ("Nu", "nu detector angle"),
            ("Chi", "chi instrument angle"),
            ("Chi1", "chi1 instrument angle"),
            ("Chi2", "chi2 instrument angle"),
            ("Phi", "phi instrument angle"),
            ("Psi", "psi instrument angle"),
        ] {
            r.register(Section::Angles, name, N, "0.2f", "\u{00B0}", tip);
        }

        // 入射束 (s0) 与衍射束 (s2) 的方向余弦
        for name in ["S0X", "S0Y", "S0Z", "S2X", "S2Y", "S2Z"] {
            r.register(Section::Cosines, name, N, "0.5f", "", "Direction cosine of the incident (S0) or diffracted (S2) beam");
        }

        // Miller 指数
        for (name, tip) in [("H", "h Miller index"), ("K", "k Miller index"), ("L", "l Miller index")] {
            r.register(Section::Indices, name, N, "0.3f", "", tip);
        }

        // 实验条件
        r.register(Section::Conditions, "Absolute index", N, "i", "", "Absolute index number of the experimental scan");
        r.register(Section::Conditions, "Points count", N, "i", "", "The number of data points in the scan");
        r.register(Section::Conditions, "Date & Time", T, DATE_TIME_FORMAT, "", "Date and time of the measurements");
        r.register(Section::Conditions, "Temperature", N, "0.3f", "K", "Temperature during the measurements");
        r.register(Section::Conditions, "Magnetic field", N, "0.2f", "T", "Magnetic field during the measurements");
        r.register(Section::Conditions, "Electric field", N, "0.2f", "kV", "Electric field during the measurements");
        r.register(Section::Conditions, "Wavelength", N, "0.3f", "\u{212B}", "Neutron wavelength");
        r.register(Section::Conditions, "Time/step", N, "0.2f", "s", "Time per step");
        r.register(Section::Conditions, "Time/step(+)", N, "0.2f", "s", "Time per step (Up)");
        r.register(Section::Conditions, "Time/step(-)", N, "0.2f", "s", "Time per step (Down)");
        r.register(Section::Conditions, "Polarisation (in/out)", T, "s", "", "Measured polarisation cross-section");

        // 极化参数
        r.register(Section::Polarisation, "Pin", T, "s", "", "Direction of the input polarization");
        r.register(Section::Polarisation, "Pout", T, "s", "", "Direction of the output polarization");
        r.register(Section::Polarisation, "Fin", T, "s", "", "Status of the input flipper");
        r.register(Section::Polarisation, "Fout", T, "s", "", "Status of the output flipper");

        // 强度：原始计数、ESD、按时间归一化
        for beam in BeamType::ALL {
            for (base, tip) in [
                ("Detector", "Intensity measured in the detector"),
                ("sDetector", "ESD Intensity measured in the detector"),
                ("Monitor", "Intensity measured in the monitor"),
                ("sMonitor", "ESD Intensity measured in the monitor"),
                ("Monitor1", "Intensity measured in the first monitor"),
                ("Monitor2", "Intensity measured in the second monitor"),
                ("DetectorNorm", "Intensity measured in the detector normalised by time"),
                ("sDetectorNorm", "ESD Intensity measured in the detector normalised by time"),
                ("MonitorNorm", "Intensity measured in the monitor normalised by time"),
                ("sMonitorNorm", "ESD Intensity measured in the monitor normalised by time"),
            ] {
                r.register(Section::Intensities, &beam.entry(base), N, "", "counts", tip);
            }
        }

        // 计算结果
        r.register(Section::Calculations, "BkgNorm", N, "0.4f", "arb.units", "Bkg");
        r.register(Section::Calculations, "BkgNormErr", N, "0.4f", "arb.units", "ESD Bkg");
        r.register(Section::Calculations, "Fwhm", N, "0.4f", "deg", "Full width at half max");
        r.register(Section::Calculations, "FwhmErr", N, "0.4f", "deg", "ESD Full width at half max");
        r.register(Section::Calculations, "FR", N, "0.4f", "arb.units", "Flipping ratio");
        r.register(Section::Calculations, "FRerr", N, "0.4f", "arb.units", "ESD Flipping ratio");
        r.register(Section::Calculations, "|FR-1|/FRerr", N, "0.2f", "arb.units", "Flipping ratio significance");
        r.register(Section::Calculations, "numBkgLeft", N, "0.2f", "counts", "Number of the left background points");
        r.register(Section::Calculations, "numBkgRight", N, "0.2f", "counts", "Number of the right background points");
        r.register(Section::Calculations, "numSkipLeft", N, "0.2f", "counts", "Number of the left skipped points");
        r.register(Section::Calculations, "numSkipRight", N, "0.2f", "counts", "Number of the right skipped points");
        for beam in BeamType::ALL {
            for (base, tip) in [
                ("IntMax", "Peak intensity in maximum"),
                ("IntMaxErr", "ESD Peak intensity in maximum"),
                ("IntSum", "Total peak intensity sum"),
                ("IntSumErr", "ESD Total peak intensity sum"),
                ("Area", "Raw integrated intensity"),
                ("AreaErr", "ESD Raw integrated intensity"),
                ("AreaNorm", "Normalised integrated intensity"),
                ("AreaNormErr", "ESD Normalised integrated intensity"),
                ("Sf2", "Corrected and normalised integrated intensity (structure factor)"),
                ("Sf2Err", "ESD Corrected and normalised integrated intensity"),
            ] {
                r.register(Section::Calculations, &beam.entry(base), N, "0.2f", "arb.units", tip);
            }
        }

        // 其他
        r.register(Section::Orientation, "matrix", N, "", "", "Orientation matrix UB");
        r.register(Section::ScanData, "data", T, "", "", "Whole set of the scan data");
        r.register(Section::ScanData, "headers", T, "", "", "Headers for the whole set of the scan data");
        r.register(Section::File, "File name", T, "", "", "Name of the file with the original data");
        r.register(Section::File, "File path", T, "", "", "Path to the file with the original data");
        r.register(Section::Misc, "lines", N, "", "", "Numbers of lines of the scan points in the file");

        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry_lookup() {
        let r = FieldRegistry::standard();
        let spec = r.spec(Section::Angles, "Omega").unwrap();
        assert_eq!(spec.format, "0.2f");
        assert_eq!(spec.kind, FieldKind::Numeric);

        assert!(r.contains(Section::Intensities, "sDetectorNorm(-)"));
        assert!(r.contains(Section::Calculations, "Sf2Err(+)"));
        assert_eq!(r.spec(Section::Polarisation, "Pin").unwrap().kind, FieldKind::Text);
    }

    #[test]
    fn test_unknown_field_is_error() {
        let r = FieldRegistry::standard();
        match r.spec(Section::Angles, "Kappa") {
            Err(ReduceError::FieldNotFound { section, entry }) => {
                assert_eq!(section, "angles");
                assert_eq!(entry, "Kappa");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_entries_sorted() {
        let r = FieldRegistry::standard();
        let cosines = r.entries(Section::Cosines);
        assert_eq!(cosines, vec!["S0X", "S0Y", "S0Z", "S2X", "S2Y", "S2Z"]);
        assert_eq!(BeamType::Down.entry("Detector"), "Detector(-)");
    }
}
