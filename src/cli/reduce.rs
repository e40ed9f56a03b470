//! # reduce 子命令 CLI 定义
//!
//! 读入一组仪器数据文件，完成全部约化阶段并导出结果。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/reduce.rs`

use crate::export::OutputFormat;
use crate::reduction::{BackgroundMode, ReductionSettings, SkipMode, MIN_BKG_DATA_POINTS, MIN_SKIP_DATA_POINTS};

use clap::{Args, ValueEnum};
use std::path::PathBuf;

/// 支持的导出格式
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ExportFormat {
    /// Semicolon separated table with every output column
    General,
    /// ShelX HKL file with integer indices
    ShelxInteger,
    /// ShelX HKL file with real indices
    ShelxReal,
    /// TBAR/D9 file
    Tbar,
    /// UMWEG file
    Umweg,
    /// CCSL flipping ratio file
    Ccsl,
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportFormat::General => write!(f, "general"),
            ExportFormat::ShelxInteger => write!(f, "shelx-integer"),
            ExportFormat::ShelxReal => write!(f, "shelx-real"),
            ExportFormat::Tbar => write!(f, "tbar"),
            ExportFormat::Umweg => write!(f, "umweg"),
            ExportFormat::Ccsl => write!(f, "ccsl"),
        }
    }
}

impl From<ExportFormat> for OutputFormat {
    fn from(format: ExportFormat) -> Self {
        match format {
            ExportFormat::General => OutputFormat::General,
            ExportFormat::ShelxInteger => OutputFormat::ShelxInteger,
            ExportFormat::ShelxReal => OutputFormat::ShelxReal,
            ExportFormat::Tbar => OutputFormat::Tbar,
            ExportFormat::Umweg => OutputFormat::Umweg,
            ExportFormat::Ccsl => OutputFormat::Ccsl,
        }
    }
}

/// 窗口点数的确定方式
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum WindowMode {
    /// Search the point counts that minimise sigma(I)/I
    Auto,
    /// Use the counts given on the command line
    Manual,
}

impl std::fmt::Display for WindowMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WindowMode::Auto => write!(f, "auto"),
            WindowMode::Manual => write!(f, "manual"),
        }
    }
}

/// reduce 子命令参数
#[derive(Args, Debug)]
pub struct ReduceArgs {
    /// Input data file or directory
    pub input: PathBuf,

    /// Glob pattern for input files (comma separated)
    #[arg(short, long, default_value = "*")]
    pub pattern: String,

    /// Recurse into subdirectories
    #[arg(short, long, default_value_t = false)]
    pub recursive: bool,

    /// Export format
    #[arg(short, long, value_enum, default_value_t = ExportFormat::General)]
    pub format: ExportFormat,

    /// Output file (default: <first>-<last>.<ext> next to the last input file)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Write a header row (always on for the general format)
    #[arg(long, default_value_t = false)]
    pub header: bool,

    /// Keep excluded scans in the exported file
    #[arg(long, default_value_t = false)]
    pub include_excluded: bool,

    /// Write the per-point data of every scan to this CSV file
    #[arg(long)]
    pub points: Option<PathBuf>,

    /// How the background points are chosen
    #[arg(long, value_enum, default_value_t = WindowMode::Auto)]
    pub bkg: WindowMode,

    /// Left background points (manual background)
    #[arg(long, default_value_t = MIN_BKG_DATA_POINTS)]
    pub bkg_left: usize,

    /// Right background points (manual background)
    #[arg(long, default_value_t = MIN_BKG_DATA_POINTS)]
    pub bkg_right: usize,

    /// How the skipped points are chosen
    #[arg(long, value_enum, default_value_t = WindowMode::Auto)]
    pub skip: WindowMode,

    /// Left skipped points (manual skip)
    #[arg(long, default_value_t = MIN_SKIP_DATA_POINTS)]
    pub skip_left: usize,

    /// Right skipped points (manual skip)
    #[arg(long, default_value_t = MIN_SKIP_DATA_POINTS)]
    pub skip_right: usize,

    /// Scan numbers to exclude, e.g. 3,7,12
    #[arg(short = 'x', long, value_delimiter = ',')]
    pub exclude: Vec<usize>,

    /// Number of parallel jobs (0 = auto)
    #[arg(short, long, default_value_t = 0, env = "SCANREDUCE_JOBS")]
    pub jobs: usize,
}

impl ReduceArgs {
    /// 构建约化配置
    pub fn settings(&self) -> ReductionSettings {
        ReductionSettings {
            background: match self.bkg {
                WindowMode::Auto => BackgroundMode::Auto,
                WindowMode::Manual => BackgroundMode::Manual,
            },
            skip: match self.skip {
                WindowMode::Auto => SkipMode::Auto,
                WindowMode::Manual => SkipMode::Manual,
            },
            left_bkg: self.bkg_left,
            right_bkg: self.bkg_right,
            left_skip: self.skip_left,
            right_skip: self.skip_right,
            jobs: self.jobs,
            exclude: self.exclude.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;

    #[test]
    fn test_parse_reduce_arguments() {
        let cli = Cli::parse_from([
            "scanreduce", "reduce", "data", "--format", "shelx-integer", "--bkg", "manual",
            "--bkg-left", "2", "--exclude", "3,7", "--jobs", "2",
        ]);
        let Commands::Reduce(args) = cli.command else {
            panic!("expected reduce");
        };
        assert_eq!(args.format, ExportFormat::ShelxInteger);
        assert_eq!(OutputFormat::from(args.format), OutputFormat::ShelxInteger);

        let settings = args.settings();
        assert_eq!(settings.background, BackgroundMode::Manual);
        assert_eq!(settings.skip, SkipMode::Auto);
        assert_eq!(settings.left_bkg, 2);
        assert_eq!(settings.right_bkg, 1);
        assert_eq!(settings.exclude, vec![3, 7]);
        assert_eq!(settings.jobs, 2);
    }
}
