//! # 导出模块
//!
//! 字段格式化、输出表和各种输出文件格式。
//!
//! ## 依赖关系
//! - 被 `models/`, `commands/` 使用
//! - 子模块: format, headers, table, points

pub mod format;
pub mod headers;
pub mod points;
pub mod table;

pub use headers::OutputFormat;
pub use table::{default_output_path, ExportOptions, OutputTable};
