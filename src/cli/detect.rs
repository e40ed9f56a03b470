//! # detect 子命令 CLI 定义
//!
//! 识别数据文件的格式，不做约化。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/detect.rs`

use clap::Args;
use std::path::PathBuf;

/// detect 子命令参数
#[derive(Args, Debug)]
pub struct DetectArgs {
    /// Input data file or directory
    pub input: PathBuf,

    /// Glob pattern for input files (comma separated)
    #[arg(short, long, default_value = "*")]
    pub pattern: String,

    /// Recurse into subdirectories
    #[arg(short, long, default_value_t = false)]
    pub recursive: bool,
}
