//! # 批量处理模块
//!
//! 收集输入文件，并按阶段驱动全部扫描完成约化。
//!
//! ## 功能
//! - 自动检测输入类型（文件/目录）
//! - 收集匹配文件列表
//! - 按阶段并行处理扫描
//! - 进度回调与失败统计
//!
//! ## 依赖关系
//! - 被 `commands/` 模块使用
//! - 使用 `rayon` 进行并行处理

pub mod collector;
pub mod runner;

pub use collector::FileCollector;
pub use runner::{ProgressCallback, Stage, StageHandle, StageReport, StageRunner};
