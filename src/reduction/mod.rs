//! # 约化模块
//!
//! 从原始扫描到结构因子的各个处理阶段。
//!
//! ## 功能
//! - fill: 合并极化计数、补齐缺失角度、单值广播
//! - indexer: 角度 ↔ Miller 指数换算、方向余弦
//! - pretreat: 极化截面、计数 ESD、按时间归一化
//! - window: 跳过 / 背景 / 峰 点数的搜索
//! - integrate: 背景、积分强度、面积、Lorentz 修正、FWHM、翻转比
//!
//! ## 依赖关系
//! - 使用 `models/` 中的数值类型与扫描记录
//! - 被 `batch/runner.rs` 按阶段调用

pub mod fill;
pub mod indexer;
pub mod integrate;
pub mod pretreat;
pub mod window;

pub use fill::fill_scan;
pub use indexer::index_scan;
pub use integrate::treat_scan;
pub use pretreat::pretreat_scan;

use std::fmt;

// ─────────────────────────────────────────────────────────────
// 常量
// ─────────────────────────────────────────────────────────────

/// 扫描的最少点数
pub const MIN_DATA_POINTS: usize = 3;
/// 每侧最少跳过点数
pub const MIN_SKIP_DATA_POINTS: usize = 0;
/// 每侧最少背景点数
pub const MIN_BKG_DATA_POINTS: usize = 1;
/// 自动背景模式下每侧移入峰区的点数
pub const EXTRA_PEAK_DATA_POINTS: usize = 1;
/// 归一化面积所用的参考监视器计数
pub const DEFAULT_MONITOR: f64 = 10000.0;
/// 仪器角度定位误差（度），用于 FWHM
pub const FWHM_ANGLE_ESD: f64 = 0.01;

// ─────────────────────────────────────────────────────────────
// 配置
// ─────────────────────────────────────────────────────────────

/// 背景点的确定方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackgroundMode {
    #[default]
    Auto,
    Manual,
}

/// 跳过点的确定方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkipMode {
    #[default]
    Auto,
    Manual,
}

impl fmt::Display for BackgroundMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackgroundMode::Auto => write!(f, "auto"),
            BackgroundMode::Manual => write!(f, "manual"),
        }
    }
}

impl fmt::Display for SkipMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipMode::Auto => write!(f, "auto"),
            SkipMode::Manual => write!(f, "manual"),
        }
    }
}

/// 约化配置，由命令行构建一次后通过 `Arc` 共享
#[derive(Debug, Clone)]
pub struct ReductionSettings {
    pub background: BackgroundMode,
    pub skip: SkipMode,
    /// 手动模式下的左/右背景点数
    pub left_bkg: usize,
    pub right_bkg: usize,
    /// 手动模式下的左/右跳过点数
    pub left_skip: usize,
    pub right_skip: usize,
    /// 并行作业数，0 表示全部逻辑 CPU
    pub jobs: usize,
    /// 需要排除的扫描编号（从 1 开始）
    pub exclude: Vec<usize>,
}

impl Default for ReductionSettings {
    fn default() -> Self {
        ReductionSettings {
            background: BackgroundMode::Auto,
            skip: SkipMode::Auto,
            left_bkg: MIN_BKG_DATA_POINTS,
            right_bkg: MIN_BKG_DATA_POINTS,
            left_skip: MIN_SKIP_DATA_POINTS,
            right_skip: MIN_SKIP_DATA_POINTS,
            jobs: 0,
            exclude: Vec::new(),
        }
    }
}

impl ReductionSettings {
    /// 实际使用的作业数
    pub fn effective_jobs(&self) -> usize {
        if self.jobs == 0 {
            num_cpus::get()
        } else {
            self.jobs
        }
    }

    pub fn is_excluded(&self, scan_number: usize) -> bool {
        self.exclude.contains(&scan_number)
    }
}

// ─────────────────────────────────────────────────────────────
// 角度工具
// ─────────────────────────────────────────────────────────────

/// 把角度（度）折算到 (-180, 180]
pub fn to_main_angular_range(angle: f64) -> f64 {
    if angle == 180.0 || angle == -180.0 {
        return angle;
    }
    if angle > 0.0 {
        (angle + 180.0) % 360.0 - 180.0
    } else if angle < 0.0 {
        (angle - 180.0) % 360.0 + 180.0
    } else {
        0.0
    }
}

/// 符号函数：1, -1 或 0
pub(crate) fn sign(value: f64) -> f64 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}
