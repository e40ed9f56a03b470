//! # 进度条工具
//!
//! 封装 `indicatif` 提供统一的进度条样式。
//!
//! ## 依赖关系
//! - 被 `commands/` 模块使用
//! - 使用 `indicatif` crate

use crate::batch::{ProgressCallback, Stage};

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;

/// 创建标准进度条
pub fn create_progress_bar(len: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-"),
    );
    pb.set_message(message.to_string());
    pb
}

/// 把阶段进度接到进度条上
///
/// 每个阶段开始时重置长度与消息，条目全部完成后保持在 100%。
pub fn stage_progress(pb: &ProgressBar) -> ProgressCallback {
    let pb = pb.clone();
    Arc::new(move |stage: Stage, done: usize, total: usize| {
        if done == 1 {
            pb.reset();
            pb.set_length(total as u64);
            pb.set_message(stage.to_string());
        }
        pb.set_position(done as u64);
    })
}
