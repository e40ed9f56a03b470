//! # 扫描集合
//!
//! 按顺序保存全部扫描记录，以及集合级状态：输入文件内容、识别出的格式、
//! 当前扫描/文件游标和汇总输出表。
//!
//! ## 功能
//! - 读入输入文件并识别格式（`set_input_files`）
//! - 按准入规则追加扫描（`append_scan`），编号为追加后的位置
//! - 随机访问（`at`, `at_mut`）与迭代
//! - 删除处理失败的扫描（`remove_indices`）
//! - 生成输出表（`create_full_output_table`）
//!
//! ## 依赖关系
//! - 使用 `models/scan.rs`, `parsers/`, `export/table.rs`
//! - 被 `batch/runner.rs`, `commands/` 使用

use crate::error::{ReduceError, Result};
use crate::export::table::OutputTable;
use crate::models::{FieldRegistry, ScanRecord, Section};
use crate::parsers::{self, InputFile, InputFormat};
use crate::reduction::MIN_DATA_POINTS;

use std::collections::BTreeSet;
use std::sync::Arc;

/// 扫描集合
#[derive(Debug)]
pub struct ScanCollection {
    registry: Arc<FieldRegistry>,
    scans: Vec<ScanRecord>,
    input_files: Vec<InputFile>,
    input_format: InputFormat,
    scan_index: usize,
    file_index: usize,
    output_table: OutputTable,
}

impl ScanCollection {
    pub fn new(registry: Arc<FieldRegistry>) -> Self {
        ScanCollection {
            registry,
            scans: Vec::new(),
            input_files: Vec::new(),
            input_format: InputFormat::Unknown,
            scan_index: 0,
            file_index: 0,
            output_table: OutputTable::default(),
        }
    }

    pub fn registry(&self) -> &Arc<FieldRegistry> {
        &self.registry
    }

    // ─────────────────────────────────────────────────────────────
    // 输入文件
    // ─────────────────────────────────────────────────────────────

    /// 替换输入文件并识别格式；已有扫描被清空
    ///
    /// 文件属于多种格式时返回 `MultipleInputTypes`，集合保持为空。
    pub fn set_input_files(&mut self, files: Vec<InputFile>) -> Result<InputFormat> {
        self.scans.clear();
        self.scan_index = 0;
        self.file_index = 0;
        self.output_table = OutputTable::default();

        match parsers::detect_collection_format(&files) {
            Ok(format) => {
                self.input_format = format;
                self.input_files = files;
                Ok(format)
            }
            Err(e) => {
                self.input_format = InputFormat::Unknown;
                self.input_files.clear();
                Err(e)
            }
        }
    }

    pub fn input_files(&self) -> &[InputFile] {
        &self.input_files
    }

    pub fn input_format(&self) -> InputFormat {
        self.input_format
    }

    // ─────────────────────────────────────────────────────────────
    // 扫描
    // ─────────────────────────────────────────────────────────────

    /// 追加扫描，返回是否被接受
    ///
    /// 点数不少于 `MIN_DATA_POINTS`、已确定扫描角，且至少有一个非空的角度或指数。
    pub fn append_scan(&mut self, mut scan: ScanRecord) -> Result<bool> {
        if scan.num_points() < MIN_DATA_POINTS || scan.scan_angle().is_none() {
            return Ok(false);
        }
        let has_geometry = [Section::Angles, Section::Indices].iter().any(|section| {
            scan.entries(*section)
                .iter()
                .any(|entry| scan.has(*section, entry))
        });
        if !has_geometry {
            return Ok(false);
        }

        scan.set_number(Section::Number, "Scan", (self.scans.len() + 1) as f64)?;
        self.scans.push(scan);
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.scans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scans.is_empty()
    }

    pub fn at(&self, index: usize) -> Option<&ScanRecord> {
        self.scans.get(index)
    }

    pub fn at_mut(&mut self, index: usize) -> Option<&mut ScanRecord> {
        self.scans.get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScanRecord> {
        self.scans.iter()
    }

    pub fn scans(&self) -> &[ScanRecord] {
        &self.scans
    }

    pub fn scans_mut(&mut self) -> &mut [ScanRecord] {
        &mut self.scans
    }

    /// 删除给定位置的扫描（其余扫描的编号保持不变）
    pub fn remove_indices(&mut self, indices: &[usize]) {
        if indices.is_empty() {
            return;
        }
        let remove: BTreeSet<usize> = indices.iter().copied().collect();
        let mut position = 0;
        self.scans.retain(|_| {
            let keep = !remove.contains(&position);
            position += 1;
            keep
        });
        if self.scan_index >= self.scans.len() {
            self.scan_index = self.scans.len().saturating_sub(1);
        }
    }

    // ─────────────────────────────────────────────────────────────
    // 游标
    // ─────────────────────────────────────────────────────────────

    pub fn scan_index(&self) -> usize {
        self.scan_index
    }

    /// 设置当前扫描，并同步当前文件
    pub fn set_scan_index(&mut self, index: usize) -> Result<()> {
        let scan = self.scans.get(index).ok_or_else(|| {
            ReduceError::InvalidArgument(format!(
                "scan index {} out of range (0..{})",
                index,
                self.scans.len()
            ))
        })?;
        self.file_index = scan.file_index().saturating_sub(1);
        self.scan_index = index;
        Ok(())
    }

    pub fn file_index(&self) -> usize {
        self.file_index
    }

    // ─────────────────────────────────────────────────────────────
    // 输出表
    // ─────────────────────────────────────────────────────────────

    /// 由全部扫描重建输出表
    pub fn create_full_output_table(&mut self) {
        self.output_table = OutputTable::from_scans(&self.scans);
    }

    pub fn output_table(&self) -> &OutputTable {
        &self.output_table
    }
}
