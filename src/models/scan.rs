//! # 单次扫描记录
//!
//! 一个反射的全部数据：按 (section, entry) 组织的原始数组与文本，
//! 以及积分过程中得到的窗口点数、背景、强度、结构因子等标量。
//!
//! ## 功能
//! - 写入字段（`set_numbers`, `set_text`, `append_text`），未登记字段返回 `FieldNotFound`
//! - 读取字段（`numbers`, `text`, `require_numbers`）
//! - 显示格式化（`print_data_single`, `print_data_range`）
//! - 扫描参数：扫描角、步长、文件路径、点数、绘图状态
//!
//! ## 依赖关系
//! - 使用 `models/registry.rs` 查询字段规格
//! - 使用 `export/format.rs` 格式化显示
//! - 被 `parsers/`, `reduction/`, `export/` 使用

use crate::error::{ReduceError, Result};
use crate::export::format::{format_range, format_string};
use crate::models::{BeamType, FieldKind, FieldRegistry, RealVector, Section};

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ─────────────────────────────────────────────────────────────
// 字段值
// ─────────────────────────────────────────────────────────────

/// 字段的值：数值数组或文本
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Numbers(RealVector),
    Text(String),
}

impl FieldValue {
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Numbers(v) => v.is_empty(),
            FieldValue::Text(s) => s.is_empty(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Numbers(v) => write!(f, "{}", v),
            FieldValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// 扫描的绘图/处理状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlotType {
    #[default]
    Raw,
    Integrated,
    Fitted,
    Excluded,
}

/// 跳过 / 背景 / 峰 三类点的划分
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointWindows {
    pub left_skip: usize,
    pub right_skip: usize,
    pub left_bkg: usize,
    pub right_bkg: usize,
    pub non_skip: usize,
    pub peak: usize,
}

impl Default for PointWindows {
    fn default() -> Self {
        PointWindows {
            left_skip: crate::reduction::MIN_SKIP_DATA_POINTS,
            right_skip: crate::reduction::MIN_SKIP_DATA_POINTS,
            left_bkg: crate::reduction::MIN_BKG_DATA_POINTS,
            right_bkg: crate::reduction::MIN_BKG_DATA_POINTS,
            non_skip: 0,
            peak: 0,
        }
    }
}

impl PointWindows {
    /// 五段点数之和
    pub fn total(&self) -> usize {
        self.left_skip + self.left_bkg + self.peak + self.right_bkg + self.right_skip
    }
}

/// 单一束类型的积分结果，未计算时为 NaN
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeamResults {
    pub max_inty: f64,
    pub max_inty_err: f64,
    pub sum_inty: f64,
    pub sum_inty_err: f64,
    pub area: f64,
    pub area_err: f64,
    pub norm_area: f64,
    pub norm_area_err: f64,
    pub sf2: f64,
    pub sf2_err: f64,
}

impl Default for BeamResults {
    fn default() -> Self {
        BeamResults {
            max_inty: f64::NAN,
            max_inty_err: f64::NAN,
            sum_inty: f64::NAN,
            sum_inty_err: f64::NAN,
            area: f64::NAN,
            area_err: f64::NAN,
            norm_area: f64::NAN,
            norm_area_err: f64::NAN,
            sf2: f64::NAN,
            sf2_err: f64::NAN,
        }
    }
}

// ─────────────────────────────────────────────────────────────
// ScanRecord
// ─────────────────────────────────────────────────────────────

/// 单次扫描记录
#[derive(Debug, Clone)]
pub struct ScanRecord {
    registry: Arc<FieldRegistry>,
    data: BTreeMap<Section, BTreeMap<String, FieldValue>>,
    scan_angle: Option<String>,
    scan_step: f64,
    absolute_file_path: PathBuf,
    file_index: usize,
    plot_type: PlotType,

    pub windows: PointWindows,
    pub mc_candlish_factor: f64,
    pub norm_mean_bkg: f64,
    pub fwhm: f64,
    pub fwhm_err: f64,
    pub flipping_ratio: f64,
    pub flipping_ratio_err: f64,
    beams: [BeamResults; 3],
}

impl ScanRecord {
    /// 创建空记录
    pub fn new(registry: Arc<FieldRegistry>) -> Self {
        ScanRecord {
            registry,
            data: BTreeMap::new(),
            scan_angle: None,
            scan_step: f64::NAN,
            absolute_file_path: PathBuf::new(),
            file_index: 0,
            plot_type: PlotType::Raw,
            windows: PointWindows::default(),
            mc_candlish_factor: 0.0,
            norm_mean_bkg: f64::NAN,
            fwhm: f64::NAN,
            fwhm_err: f64::NAN,
            flipping_ratio: f64::NAN,
            flipping_ratio_err: f64::NAN,
            beams: [BeamResults::default(); 3],
        }
    }

    pub fn registry(&self) -> &Arc<FieldRegistry> {
        &self.registry
    }

    // ─────────────────────────────────────────────────────────────
    // 写入
    // ─────────────────────────────────────────────────────────────

    /// 写入数值数组；空数组被忽略
    pub fn set_numbers(&mut self, section: Section, entry: &str, values: RealVector) -> Result<()> {
        self.registry.spec(section, entry)?;
        if values.is_empty() {
            return Ok(());
        }
        self.insert(section, entry, FieldValue::Numbers(values));
        Ok(())
    }

    /// 写入单个数值
    pub fn set_number(&mut self, section: Section, entry: &str, value: f64) -> Result<()> {
        self.set_numbers(section, entry, RealVector::from(vec![value]))
    }

    /// 写入文本；数值字段按空白切分解析，空文本被忽略
    pub fn set_text(&mut self, section: Section, entry: &str, text: &str) -> Result<()> {
        let spec = self.registry.spec(section, entry)?;
        if text.trim().is_empty() {
            return Ok(());
        }
        let value = match spec.kind {
            FieldKind::Numeric => FieldValue::Numbers(RealVector::from_text(text)),
            FieldKind::Text => FieldValue::Text(text.to_string()),
        };
        self.insert(section, entry, value);
        Ok(())
    }

    /// 在已有内容之后追加（文本以空格连接）
    pub fn append_text(&mut self, section: Section, entry: &str, text: &str) -> Result<()> {
        self.registry.spec(section, entry)?;
        if text.trim().is_empty() {
            return Ok(());
        }
        match self.data.get_mut(&section).and_then(|m| m.get_mut(entry)) {
            Some(FieldValue::Numbers(v)) => {
                for x in RealVector::from_text(text).iter() {
                    v.push(*x);
                }
            }
            Some(FieldValue::Text(s)) => {
                s.push(' ');
                s.push_str(text);
            }
            None => return self.set_text(section, entry, text),
        }
        Ok(())
    }

    /// 删除字段
    pub fn remove(&mut self, section: Section, entry: &str) -> Result<()> {
        self.data
            .get_mut(&section)
            .and_then(|m| m.remove(entry))
            .map(|_| ())
            .ok_or_else(|| ReduceError::field_not_found(section, entry))
    }

    fn insert(&mut self, section: Section, entry: &str, value: FieldValue) {
        self.data.entry(section).or_default().insert(entry.to_string(), value);
    }

    // ─────────────────────────────────────────────────────────────
    // 读取
    // ─────────────────────────────────────────────────────────────

    /// 原始字段值
    pub fn value(&self, section: Section, entry: &str) -> Option<&FieldValue> {
        self.data.get(&section).and_then(|m| m.get(entry))
    }

    /// 字段是否存在且非空
    pub fn has(&self, section: Section, entry: &str) -> bool {
        self.value(section, entry).is_some_and(|v| !v.is_empty())
    }

    /// 数值数组；缺失时返回空向量
    pub fn numbers(&self, section: Section, entry: &str) -> RealVector {
        match self.value(section, entry) {
            Some(FieldValue::Numbers(v)) => v.clone(),
            Some(FieldValue::Text(s)) => RealVector::from_text(s),
            None => RealVector::new(),
        }
    }

    /// 必需的数值数组；缺失时返回 `FieldNotFound`
    pub fn require_numbers(&self, section: Section, entry: &str) -> Result<&RealVector> {
        match self.value(section, entry) {
            Some(FieldValue::Numbers(v)) if !v.is_empty() => Ok(v),
            _ => Err(ReduceError::field_not_found(section, entry)),
        }
    }

    /// 文本形式的字段内容
    pub fn text(&self, section: Section, entry: &str) -> Option<String> {
        self.value(section, entry).map(|v| v.to_string())
    }

    /// 字段的格式记号
    pub fn format(&self, section: Section, entry: &str) -> Result<&str> {
        Ok(self.registry.spec(section, entry)?.format.as_str())
    }

    /// 记录中出现的分组（升序）
    pub fn keys(&self) -> Vec<Section> {
        self.data.keys().copied().collect()
    }

    /// 某分组下出现的字段名（升序）
    pub fn entries(&self, section: Section) -> Vec<String> {
        self.data
            .get(&section)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// 按字段格式输出单个值
    pub fn print_data_single(&self, section: Section, entry: &str) -> Result<String> {
        let value = self
            .value(section, entry)
            .ok_or_else(|| ReduceError::field_not_found(section, entry))?;
        Ok(format_string(&value.to_string(), self.format(section, entry)?))
    }

    /// 按字段格式输出取值范围 `min - max`
    pub fn print_data_range(&self, section: Section, entry: &str) -> Result<String> {
        let value = self
            .value(section, entry)
            .ok_or_else(|| ReduceError::field_not_found(section, entry))?;
        Ok(format_range(&value.to_string(), self.format(section, entry)?))
    }

    // ─────────────────────────────────────────────────────────────
    // 扫描参数
    // ─────────────────────────────────────────────────────────────

    /// 点数：三种束类型中 Detector 数组的最大长度
    pub fn num_points(&self) -> usize {
        BeamType::ALL
            .iter()
            .map(|beam| match self.value(Section::Intensities, &beam.entry("Detector")) {
                Some(FieldValue::Numbers(v)) => v.len(),
                _ => 0,
            })
            .max()
            .unwrap_or(0)
    }

    /// Miller 指数的平均值
    pub fn miller_index(&self, name: &str) -> f64 {
        self.numbers(Section::Indices, name).mean()
    }

    pub fn scan_angle(&self) -> Option<&str> {
        self.scan_angle.as_deref()
    }

    pub fn set_scan_angle(&mut self, name: &str) {
        self.scan_angle = Some(name.to_string());
    }

    /// 选取第一个取值不唯一且范围大于 0.1 的角度作为扫描角
    pub fn find_and_set_scan_angle(&mut self) {
        let found = self.data.get(&Section::Angles).and_then(|angles| {
            angles.iter().find_map(|(name, value)| match value {
                FieldValue::Numbers(v) if v.simplify().len() > 1 && v.range() > 0.1 => {
                    Some(name.clone())
                }
                _ => None,
            })
        });
        if let Some(name) = found {
            self.scan_angle = Some(name);
        }
    }

    pub fn scan_step(&self) -> f64 {
        self.scan_step
    }

    pub fn set_scan_step(&mut self, step: f64) {
        self.scan_step = step;
    }

    pub fn absolute_file_path(&self) -> &Path {
        &self.absolute_file_path
    }

    pub fn set_absolute_file_path(&mut self, path: &Path) {
        self.absolute_file_path = path.to_path_buf();
    }

    /// 文件名（不含扩展名）
    pub fn base_name(&self) -> String {
        self.absolute_file_path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(|s| s.split('.').next().unwrap_or(s).to_string())
            .unwrap_or_default()
    }

    /// 从 1 开始的文件序号
    pub fn file_index(&self) -> usize {
        self.file_index
    }

    pub fn set_file_index(&mut self, index: usize) {
        self.file_index = index;
    }

    pub fn plot_type(&self) -> PlotType {
        self.plot_type
    }

    pub fn set_plot_type(&mut self, plot_type: PlotType) {
        self.plot_type = plot_type;
    }

    /// 扫描在文件中的首行（从 1 开始）
    pub fn scan_line(&self) -> usize {
        self.numbers(Section::Misc, "lines")
            .get(0)
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|v| v as usize + 1)
            .unwrap_or(1)
    }

    pub fn beam(&self, beam: BeamType) -> &BeamResults {
        &self.beams[beam as usize]
    }

    pub fn beam_mut(&mut self, beam: BeamType) -> &mut BeamResults {
        &mut self.beams[beam as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ScanRecord {
        ScanRecord::new(Arc::new(FieldRegistry::standard()))
    }

    #[test]
    fn test_set_and_overwrite() {
        let mut scan = record();
        scan.set_text(Section::Angles, "Omega", "1 2 3").unwrap();
        scan.set_text(Section::Angles, "Omega", "").unwrap();
        assert_eq!(scan.numbers(Section::Angles, "Omega").len(), 3);

        scan.set_text(Section::Angles, "Omega", "5").unwrap();
        assert_eq!(scan.numbers(Section::Angles, "Omega").as_slice(), &[5.0]);

        assert!(scan.set_text(Section::Angles, "Kappa", "1").is_err());
        assert!(scan.numbers(Section::Angles, "Chi").is_empty());
    }

    #[test]
    fn test_append_joins_with_space() {
        let mut scan = record();
        scan.append_text(Section::Intensities, "Detector", "1.000").unwrap();
        scan.append_text(Section::Intensities, "Detector", "2.000").unwrap();
        assert_eq!(scan.numbers(Section::Intensities, "Detector").as_slice(), &[1.0, 2.0]);

        scan.append_text(Section::Polarisation, "Pin", "+z").unwrap();
        scan.append_text(Section::Polarisation, "Pin", "-z").unwrap();
        assert_eq!(scan.text(Section::Polarisation, "Pin").unwrap(), "+z -z");
    }

    #[test]
    fn test_num_points_uses_longest_beam() {
        let mut scan = record();
        assert_eq!(scan.num_points(), 0);
        scan.set_text(Section::Intensities, "Detector(+)", "1 2 3 4").unwrap();
        scan.set_text(Section::Intensities, "Detector(-)", "1 2").unwrap();
        assert_eq!(scan.num_points(), 4);
    }

    #[test]
    fn test_find_scan_angle() {
        let mut scan = record();
        scan.set_text(Section::Angles, "Chi", "10 10 10").unwrap();
        scan.set_text(Section::Angles, "Omega", "1.0 1.02 1.04").unwrap();
        scan.set_text(Section::Angles, "Phi", "0 1 2").unwrap();
        scan.find_and_set_scan_angle();
        // Omega 的范围小于 0.1
        assert_eq!(scan.scan_angle(), Some("Phi"));
    }

    #[test]
    fn test_print_data() {
        let mut scan = record();
        scan.set_text(Section::Angles, "Omega", "1.0 2.0 3.0").unwrap();
        assert_eq!(scan.print_data_single(Section::Angles, "Omega").unwrap(), "2.00");
        assert_eq!(scan.print_data_range(Section::Angles, "Omega").unwrap(), "1.00 - 3.00");
        assert!(scan.print_data_single(Section::Angles, "Chi").is_err());
    }

    #[test]
    fn test_base_name_and_scan_line() {
        let mut scan = record();
        scan.set_absolute_file_path(Path::new("/tmp/data/run.001.dat"));
        assert_eq!(scan.base_name(), "run");
        assert_eq!(scan.scan_line(), 1);
        scan.set_text(Section::Misc, "lines", "9 10 11").unwrap();
        assert_eq!(scan.scan_line(), 10);
    }
}
