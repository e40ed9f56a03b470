//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `reduce`: 约化扫描并导出结构因子
//! - `detect`: 识别数据文件格式
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: reduce, detect

pub mod detect;
pub mod reduce;

use clap::{Parser, Subcommand};

/// Scanreduce - 单晶中子衍射扫描约化工具
#[derive(Parser)]
#[command(name = "scanreduce")]
#[command(author = "Changjiang Wu")]
#[command(version)]
#[command(about = "Single-crystal neutron diffraction scan reduction toolkit", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Reduce instrument scans to integrated intensities and export them
    Reduce(reduce::ReduceArgs),

    /// Detect the instrument format of data files
    Detect(detect::DetectArgs),
}
