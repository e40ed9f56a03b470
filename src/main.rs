//! # Scanreduce - 单晶中子衍射扫描约化工具
//!
//! 把四圆/抬升计数器衍射仪的原始扫描约化为结构因子，并导出为常用精修程序的格式。
//!
//! ## 子命令
//! - `reduce` - 约化扫描并导出 (general, ShelX, TBAR, UMWEG, CCSL)
//! - `detect` - 识别数据文件格式
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   │     ├── batch/     (文件收集与阶段执行)
//!   │     ├── parsers/   (仪器格式解析器)
//!   │     ├── reduction/ (约化算法)
//!   │     ├── export/    (输出表与导出格式)
//!   │     └── models/    (数据模型)
//!   ├── utils/      (工具函数)
//!   └── error.rs    (错误处理)
//! ```

mod batch;
mod cli;
mod commands;
mod error;
mod export;
mod models;
mod parsers;
mod reduction;
mod utils;

use clap::Parser;
use cli::Cli;

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    env_logger::init();

    let cli = Cli::parse();

    if let Err(e) = commands::run(cli.command) {
        utils::output::print_error(&format!("{}", e));
        std::process::exit(1);
    }
}
