//! # 解析器模块
//!
//! 识别仪器数据文件的格式，并把文件文本解析为扫描记录。
//!
//! ## 功能
//! - 按特征行识别六种格式标签（`detect_input_format`）
//! - 一组文件必须属于同一种格式（`detect_collection_format`）
//! - 每种格式一个 `ScanExtractor` 实现，由 `extractor_for` 选择
//! - 通用数据表按表头映射填入字段（`extract_data_from_table`）
//!
//! ## 依赖关系
//! - 被 `batch/runner.rs` 和 `commands/` 使用
//! - 使用 `models/` 数据模型
//! - 子模块: text, heidi_dat, heidi_log, nicos, poli_log, s6t2

pub mod heidi_dat;
pub mod heidi_log;
pub mod nicos;
pub mod poli_log;
pub mod s6t2;
pub mod text;

use crate::error::{ReduceError, Result};
use crate::models::{FieldRegistry, ScanRecord, Section};

use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ─────────────────────────────────────────────────────────────
// 输入文件
// ─────────────────────────────────────────────────────────────

/// 已读入内存的输入文件
#[derive(Debug, Clone)]
pub struct InputFile {
    pub path: PathBuf,
    pub text: String,
}

impl InputFile {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        InputFile {
            path: path.into(),
            text: text.into(),
        }
    }

    /// 读取文件（UTF-8，非法字节按替换字符处理）
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| ReduceError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        Ok(InputFile {
            path,
            text: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }

    /// 按 `\n` 切分的行，去掉行尾的 `\r`
    pub fn lines(&self) -> Vec<&str> {
        self.text
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────
// 格式标签
// ─────────────────────────────────────────────────────────────

/// 输入文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum InputFormat {
    #[default]
    Unknown,
    HeidiDat,
    HeidiLog,
    NicosDat,
    PoliLog,
    S6t2Dat,
}

impl InputFormat {
    pub fn facility(&self) -> &'static str {
        match self {
            InputFormat::Unknown => "Unknown",
            InputFormat::HeidiDat | InputFormat::HeidiLog => "MLZ/FRMII",
            InputFormat::NicosDat | InputFormat::PoliLog => "MLZ/FRMII",
            InputFormat::S6t2Dat => "LLB",
        }
    }

    pub fn instrument(&self) -> &'static str {
        match self {
            InputFormat::Unknown => "Unknown",
            InputFormat::HeidiDat | InputFormat::HeidiLog => "HEiDi",
            InputFormat::NicosDat | InputFormat::PoliLog => "POLI",
            InputFormat::S6t2Dat => "6T2",
        }
    }

    pub fn data_type(&self) -> &'static str {
        match self {
            InputFormat::Unknown => "Unknown",
            InputFormat::HeidiDat => "DIF4 dat",
            InputFormat::HeidiLog => "DIF4 log",
            InputFormat::NicosDat => "NICOS dat",
            InputFormat::PoliLog => "IgorPro log",
            InputFormat::S6t2Dat => "NEW xml",
        }
    }

    /// 不确定度中系统误差项的系数
    pub fn mc_candlish_factor(&self) -> f64 {
        match self {
            InputFormat::HeidiDat | InputFormat::HeidiLog => 0.025,
            _ => 0.0,
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InputFormat::Unknown => "UNKNOWN",
            InputFormat::HeidiDat => "HEIDI_DAT",
            InputFormat::HeidiLog => "HEIDI_LOG",
            InputFormat::NicosDat => "NICOS_DAT",
            InputFormat::PoliLog => "POLI_LOG",
            InputFormat::S6t2Dat => "S6T2_DAT",
        };
        write!(f, "{}", s)
    }
}

/// 按第一个匹配的特征行识别单个文件的格式
pub fn detect_input_format(file: &InputFile) -> InputFormat {
    for line in file.lines() {
        if line.starts_with("### NICOS data file") {
            return InputFormat::NicosDat;
        }
        if line.ends_with("4-CIRCLE DIFFRACTOMETER CONTROL PROGRAM") || line.ends_with("Protocol ON") {
            return InputFormat::HeidiLog;
        }
        if line.ends_with("Rev HEIDI/FRM2") {
            return InputFormat::HeidiDat;
        }
        if line.starts_with("  => Now executing the cmd GEO") {
            return InputFormat::PoliLog;
        }
        if line.contains("<manip>6T2</manip>") {
            return InputFormat::S6t2Dat;
        }
    }
    InputFormat::Unknown
}

/// 一组文件的共同格式；出现多种格式时返回 `MultipleInputTypes`
pub fn detect_collection_format(files: &[InputFile]) -> Result<InputFormat> {
    let detected: BTreeSet<InputFormat> = files.iter().map(detect_input_format).collect();
    match detected.len() {
        0 => Ok(InputFormat::Unknown),
        1 => Ok(detected.into_iter().next().unwrap_or_default()),
        _ => Err(ReduceError::MultipleInputTypes {
            types: detected
                .iter()
                .map(|t| t.data_type())
                .collect::<Vec<_>>()
                .join(", "),
        }),
    }
}

// ─────────────────────────────────────────────────────────────
// 解析策略
// ─────────────────────────────────────────────────────────────

/// 单个文件到扫描记录的解析策略
pub trait ScanExtractor: Send + Sync {
    /// 解析文件，`file_index` 从 0 开始
    fn extract(
        &self,
        file: &InputFile,
        file_index: usize,
        registry: &Arc<FieldRegistry>,
    ) -> Result<Vec<ScanRecord>>;
}

/// 按格式标签选择解析器；未知格式返回 `None`
pub fn extractor_for(format: InputFormat) -> Option<Box<dyn ScanExtractor>> {
    match format {
        InputFormat::Unknown => None,
        InputFormat::HeidiDat => Some(Box::new(heidi_dat::HeidiDatExtractor)),
        InputFormat::HeidiLog => Some(Box::new(heidi_log::HeidiLogExtractor)),
        InputFormat::NicosDat => Some(Box::new(nicos::NicosExtractor)),
        InputFormat::PoliLog => Some(Box::new(poli_log::PoliLogExtractor)),
        InputFormat::S6t2Dat => Some(Box::new(s6t2::S6t2Extractor)),
    }
}

/// 表头映射：(分组, 字段, 以 `|` 分隔的候选表头名)
pub type HeaderMap = [(Section, &'static str, &'static str)];

/// 按表头映射从 `scandata/data` 表中取列
///
/// 表头按整词匹配 `name(_.*)?`，例如 `sth` 可匹配 `sth_jvm2`。
pub fn extract_data_from_table(scan: &mut ScanRecord, header_map: &HeaderMap) -> Result<()> {
    let data = scan.text(Section::ScanData, "data").unwrap_or_default();
    let rows: Vec<Vec<&str>> = data
        .split('\n')
        .map(|line| line.split_whitespace().collect())
        .collect();

    if rows.len() == 1 && rows[0].len() <= 1 {
        return Ok(());
    }

    let headers_text = scan.text(Section::ScanData, "headers").unwrap_or_default();
    let headers: Vec<&str> = headers_text.split_whitespace().collect();

    for (section, entry, names) in header_map {
        for name in names.split('|') {
            let re = Regex::new(&format!("^(?:{})(_.*)?$", regex::escape(name)))
                .map_err(|e| ReduceError::Other(e.to_string()))?;
            let Some(column) = headers.iter().position(|h| re.is_match(h)) else {
                continue;
            };
            let values: Vec<&str> = rows
                .iter()
                .filter(|row| row.len() > column)
                .map(|row| row[column])
                .collect();
            scan.set_text(*section, entry, &values.join(" "))?;
        }
    }
    Ok(())
}

/// 记录公共的文件信息
pub(crate) fn new_scan(file: &InputFile, file_index: usize, registry: &Arc<FieldRegistry>) -> ScanRecord {
    let mut scan = ScanRecord::new(Arc::clone(registry));
    scan.set_file_index(file_index + 1);
    scan.set_absolute_file_path(&file.path);
    scan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RealVector;

    #[test]
    fn test_detect_input_format() {
        let nicos = InputFile::new("a.dat", "### NICOS data file, created at 2017-03-04 09:05:12\n");
        let heidi = InputFile::new("b.dat", "line 1\r\n  HEiDi Rev HEIDI/FRM2\r\n");
        let xml = InputFile::new("c.xml", "<data><manip>6T2</manip></data>");
        let other = InputFile::new("d.txt", "nothing to see\n");
        assert_eq!(detect_input_format(&nicos), InputFormat::NicosDat);
        assert_eq!(detect_input_format(&heidi), InputFormat::HeidiDat);
        assert_eq!(detect_input_format(&xml), InputFormat::S6t2Dat);
        assert_eq!(detect_input_format(&other), InputFormat::Unknown);
        assert_eq!(InputFormat::HeidiDat.mc_candlish_factor(), 0.025);
        assert_eq!(InputFormat::NicosDat.mc_candlish_factor(), 0.0);
    }

    #[test]
    fn test_collection_format() {
        let a = InputFile::new("a.dat", "### NICOS data file\n");
        let b = InputFile::new("b.dat", "### NICOS data file\n");
        let c = InputFile::new("c.log", "   HEIDI 4-CIRCLE DIFFRACTOMETER CONTROL PROGRAM\n");

        assert_eq!(detect_collection_format(&[]).unwrap(), InputFormat::Unknown);
        assert_eq!(
            detect_collection_format(&[a.clone(), b]).unwrap(),
            InputFormat::NicosDat
        );
        assert!(matches!(
            detect_collection_format(&[a, c]),
            Err(ReduceError::MultipleInputTypes { .. })
        ));
    }

    #[test]
    fn test_extract_data_from_table() {
        let registry = Arc::new(FieldRegistry::standard());
        let mut scan = ScanRecord::new(registry);
        scan.set_text(Section::ScanData, "headers", "sth_jvm2 ctr1 mon1 timer").unwrap();
        scan.set_text(Section::ScanData, "data", "1.0 10 100 1\n1.1 20 100 1\n1.2 30").unwrap();

        let map: &HeaderMap = &[
            (Section::Angles, "Omega", "omega|sth"),
            (Section::Intensities, "Detector", "ctr1"),
            (Section::Intensities, "Monitor1", "mon1"),
            (Section::Angles, "Chi", "chi"),
        ];
        extract_data_from_table(&mut scan, map).unwrap();

        assert_eq!(scan.numbers(Section::Angles, "Omega"), RealVector::from(vec![1.0, 1.1, 1.2]));
        assert_eq!(scan.numbers(Section::Intensities, "Detector"), RealVector::from(vec![10.0, 20.0, 30.0]));
        // 第三行列数不足
        assert_eq!(scan.numbers(Section::Intensities, "Monitor1").len(), 2);
        assert!(!scan.has(Section::Angles, "Chi"));
    }
}
