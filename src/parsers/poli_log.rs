//! # POLI IgorPro 日志
//!
//! 该格式可以被识别，但日志中没有可积分的扫描，解析结果为空。
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs` 使用

use super::{InputFile, ScanExtractor};
use crate::error::Result;
use crate::models::{FieldRegistry, ScanRecord};

use std::sync::Arc;

/// POLI 日志解析器
pub struct PoliLogExtractor;

impl ScanExtractor for PoliLogExtractor {
    fn extract(
        &self,
        file: &InputFile,
        _file_index: usize,
        _registry: &Arc<FieldRegistry>,
    ) -> Result<Vec<ScanRecord>> {
        log::debug!("{}: POLI log contains no scans", file.path.display());
        Ok(Vec::new())
    }
}
