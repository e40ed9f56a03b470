//! # 输出表
//!
//! 汇总所有扫描的结果：列来自第一个扫描在 number, indices, calculations,
//! angles, cosines, conditions 六个分组中的字段（组内按名称排序），
//! 单元格为按字段格式渲染的值。导出时再按目标格式的列记号重新渲染。
//!
//! ## 依赖关系
//! - 使用 `export/format.rs`, `export/headers.rs`
//! - 被 `models/collection.rs`, `commands/reduce.rs` 使用

use crate::error::{ReduceError, Result};
use crate::export::format::{format_string, format_string_to_text};
use crate::export::headers::OutputFormat;
use crate::models::{ScanRecord, Section};

use std::fs;
use std::path::{Path, PathBuf};

/// 输出表包含的分组，顺序即列顺序
pub const OUTPUT_SECTIONS: [Section; 6] = [
    Section::Number,
    Section::Indices,
    Section::Calculations,
    Section::Angles,
    Section::Cosines,
    Section::Conditions,
];

/// 导出选项
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportOptions {
    /// 写表头（`general` 格式总是写）
    pub header: bool,
    /// 包含被排除的扫描
    pub include_excluded: bool,
}

/// 表头与按行存放的格式化单元格
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl OutputTable {
    /// 由扫描列表生成；列以第一个扫描为准，缺失的单元格为空
    pub fn from_scans(scans: &[ScanRecord]) -> Self {
        let Some(first) = scans.first() else {
            return OutputTable::default();
        };

        let columns: Vec<(Section, String)> = OUTPUT_SECTIONS
            .iter()
            .flat_map(|section| {
                first
                    .entries(*section)
                    .into_iter()
                    .map(move |entry| (*section, entry))
            })
            .collect();

        let rows = scans
            .iter()
            .map(|scan| {
                columns
                    .iter()
                    .map(|(section, entry)| {
                        scan.print_data_single(*section, entry).unwrap_or_default()
                    })
                    .collect()
            })
            .collect();

        OutputTable {
            headers: columns.into_iter().map(|(_, entry)| entry).collect(),
            rows,
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn column(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }

    fn is_excluded(&self, row: &[String]) -> bool {
        self.column("Excluded")
            .and_then(|i| row.get(i))
            .and_then(|cell| cell.trim().parse::<i64>().ok())
            .is_some_and(|v| v != 0)
    }

    /// 按目标格式渲染为文本；缺失的列写 `"0"`
    pub fn render(&self, format: OutputFormat, options: ExportOptions) -> String {
        let columns = format.columns(&self.headers);
        let mut text = String::new();

        if options.header || format.always_header() {
            for (name, token) in &columns {
                text.push_str(&format_string_to_text(name, token));
            }
            text.push('\n');
        }

        for row in &self.rows {
            if !options.include_excluded && self.is_excluded(row) {
                continue;
            }
            for (name, token) in &columns {
                let cell = self
                    .column(name)
                    .and_then(|i| row.get(i))
                    .map(String::as_str)
                    .unwrap_or("0");
                text.push_str(&format_string(cell, token));
            }
            text.push('\n');
        }
        text
    }

    /// 渲染并写入文件
    pub fn save(&self, path: &Path, format: OutputFormat, options: ExportOptions) -> Result<()> {
        fs::write(path, self.render(format, options)).map_err(|e| ReduceError::FileWriteError {
            path: path.display().to_string(),
            source: e,
        })
    }
}

/// 默认输出路径：`<最后一个文件所在目录>/<第一个文件名>-<最后一个文件名>.<扩展名>`
pub fn default_output_path(scans: &[ScanRecord], format: OutputFormat) -> Option<PathBuf> {
    let first = scans.first()?;
    let last = scans.last()?;
    let first_name = first.base_name();
    let last_name = last.base_name();
    let dir = last
        .absolute_file_path()
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let stem = if first_name == last_name {
        last_name
    } else {
        format!("{}-{}", first_name, last_name)
    };
    Some(dir.join(format!("{}.{}", stem, format.extension())))
}
