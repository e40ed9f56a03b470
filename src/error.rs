//! # 统一错误处理模块
//!
//! 定义 scanreduce 的所有错误类型，使用 `thiserror` 派生。
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use thiserror::Error;

/// scanreduce 统一错误类型
#[derive(Error, Debug)]
pub enum ReduceError {
    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File or directory not found: {path}")]
    FileNotFound { path: String },

    // ─────────────────────────────────────────────────────────────
    // 解析错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to parse {format} file: {path}\nReason: {reason}")]
    ParseError {
        format: String,
        path: String,
        reason: String,
    },

    #[error("Files of multiple types were selected: {types}. Please open files of the same type only")]
    MultipleInputTypes { types: String },

    // ─────────────────────────────────────────────────────────────
    // 字段访问错误
    // ─────────────────────────────────────────────────────────────
    #[error("No such section '{section}' or entry '{entry}'")]
    FieldNotFound { section: String, entry: String },

    // ─────────────────────────────────────────────────────────────
    // 数值错误
    // ─────────────────────────────────────────────────────────────
    #[error("Length mismatch in {what}: {left} vs {right}")]
    LengthMismatch {
        what: String,
        left: usize,
        right: usize,
    },

    #[error("Orientation matrix is singular (determinant = 0)")]
    SingularMatrix,

    #[error("Empty {what} window")]
    EmptyWindow { what: String },

    // ─────────────────────────────────────────────────────────────
    // 参数错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ─────────────────────────────────────────────────────────────
    // CSV 错误
    // ─────────────────────────────────────────────────────────────
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    // ─────────────────────────────────────────────────────────────
    // 其他
    // ─────────────────────────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

impl ReduceError {
    /// 构造字段缺失错误
    pub fn field_not_found(section: impl ToString, entry: impl ToString) -> Self {
        ReduceError::FieldNotFound {
            section: section.to_string(),
            entry: entry.to_string(),
        }
    }
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, ReduceError>;
