//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `batch/`, `parsers/`, `models/`, `export/`, `utils/`
//! - 子模块: reduce, detect

pub mod detect;
pub mod reduce;

use crate::batch::FileCollector;
use crate::cli::Commands;
use crate::error::Result;
use crate::parsers::InputFile;

use std::path::Path;

/// 执行命令
pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Reduce(args) => reduce::execute(args),
        Commands::Detect(args) => detect::execute(args),
    }
}

/// 收集并读入输入文件
pub(crate) fn read_input_files(input: &Path, pattern: &str, recursive: bool) -> Result<Vec<InputFile>> {
    let paths = FileCollector::new(input.to_path_buf())
        .with_pattern(pattern)
        .recursive(recursive)
        .collect()?;
    paths.iter().map(|path| InputFile::read(path)).collect()
}
