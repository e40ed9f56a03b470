//! # 阶段执行器
//!
//! 按阶段把扫描集合交给 rayon 线程池处理，收集每个扫描的结果。
//!
//! ## 功能
//! - 四个阶段：extract → fill → index+pretreat → treat
//! - extract 固定单线程，逐个文件按顺序追加扫描
//! - 其余阶段每个扫描只读写自己的记录，线程数为 min(作业数, 扫描数)
//! - 单个扫描失败时记录错误并从集合中删除，其余扫描继续
//! - 可选的进度回调，`submit` 在后台线程执行并返回句柄
//!
//! ## 依赖关系
//! - 使用 `rayon` 构建线程池
//! - 调用 `parsers/` 与 `reduction/` 中的各阶段函数

use crate::error::{ReduceError, Result};
use crate::models::{ScanCollection, ScanRecord, Section};
use crate::parsers;
use crate::reduction::{self, ReductionSettings};

use rayon::prelude::*;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// 处理阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extract,
    Fill,
    IndexPretreat,
    Treat,
}

impl Stage {
    /// 流水线顺序
    pub const PIPELINE: [Stage; 4] = [Stage::Extract, Stage::Fill, Stage::IndexPretreat, Stage::Treat];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Extract => "extract",
            Stage::Fill => "fill",
            Stage::IndexPretreat => "index+pretreat",
            Stage::Treat => "treat",
        };
        write!(f, "{}", s)
    }
}

/// 单个阶段的统计
#[derive(Debug, Clone)]
pub struct StageReport {
    pub stage: Stage,
    /// 处理的条目数（extract 为文件数，其余为扫描数）
    pub processed: usize,
    /// (条目描述, 错误信息)
    pub failures: Vec<(String, String)>,
}

impl StageReport {
    fn new(stage: Stage) -> Self {
        StageReport {
            stage,
            processed: 0,
            failures: Vec::new(),
        }
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// 进度回调：(阶段, 已完成, 总数)
pub type ProgressCallback = Arc<dyn Fn(Stage, usize, usize) + Send + Sync>;

/// 阶段执行器
#[derive(Clone)]
pub struct StageRunner {
    settings: Arc<ReductionSettings>,
    progress: Option<ProgressCallback>,
}

impl StageRunner {
    pub fn new(settings: Arc<ReductionSettings>) -> Self {
        StageRunner {
            settings,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    fn report_progress(&self, stage: Stage, done: usize, total: usize) {
        if let Some(ref progress) = self.progress {
            progress(stage, done, total);
        }
    }

    /// 阻塞执行单个阶段
    pub fn run(&self, stage: Stage, collection: &mut ScanCollection) -> Result<StageReport> {
        log::debug!("stage {} started", stage);
        let report = match stage {
            Stage::Extract => self.extract(collection)?,
            _ => self.process_scans(stage, collection)?,
        };
        log::info!(
            "stage {}: {} processed, {} failed",
            stage,
            report.processed,
            report.failed()
        );
        Ok(report)
    }

    /// 在后台线程执行单个阶段，集合随句柄返回
    pub fn submit(&self, stage: Stage, mut collection: ScanCollection) -> StageHandle {
        let runner = self.clone();
        let handle = thread::spawn(move || {
            let report = runner.run(stage, &mut collection)?;
            Ok((collection, report))
        });
        StageHandle { stage, handle }
    }

    /// 依次执行全部阶段并生成输出表
    pub fn run_pipeline(&self, collection: &mut ScanCollection) -> Result<Vec<StageReport>> {
        let mut reports = Vec::with_capacity(Stage::PIPELINE.len());
        for stage in Stage::PIPELINE {
            reports.push(self.run(stage, collection)?);
        }
        collection.create_full_output_table();
        Ok(reports)
    }

    // ─────────────────────────────────────────────────────────────
    // extract
    // ─────────────────────────────────────────────────────────────

    fn extract(&self, collection: &mut ScanCollection) -> Result<StageReport> {
        let format = collection.input_format();
        let extractor = parsers::extractor_for(format).ok_or_else(|| {
            ReduceError::InvalidArgument(format!("no extractor for input format {}", format))
        })?;

        // 追加顺序即扫描编号，只用一个线程
        let pool = build_pool(1)?;
        let files = collection.input_files().to_vec();
        let registry = Arc::clone(collection.registry());
        let total = files.len();
        let mut report = StageReport::new(Stage::Extract);

        pool.install(|| -> Result<()> {
            for (index, file) in files.iter().enumerate() {
                match extractor.extract(file, index, &registry) {
                    Ok(scans) => {
                        let found = scans.len();
                        let mut accepted = 0;
                        for scan in scans {
                            if collection.append_scan(scan)? {
                                accepted += 1;
                            }
                        }
                        log::debug!(
                            "{}: {} scans found, {} accepted",
                            file.path.display(),
                            found,
                            accepted
                        );
                    }
                    Err(e) => report
                        .failures
                        .push((file.path.display().to_string(), e.to_string())),
                }
                report.processed += 1;
                self.report_progress(Stage::Extract, index + 1, total);
            }
            Ok(())
        })?;

        Ok(report)
    }

    // ─────────────────────────────────────────────────────────────
    // fill / index+pretreat / treat
    // ─────────────────────────────────────────────────────────────

    fn process_scans(&self, stage: Stage, collection: &mut ScanCollection) -> Result<StageReport> {
        let total = collection.len();
        let mut report = StageReport::new(stage);
        if total == 0 {
            return Ok(report);
        }

        let jobs = self.settings.effective_jobs().min(total).max(1);
        let pool = build_pool(jobs)?;
        let format = collection.input_format();
        let settings = Arc::clone(&self.settings);
        let done = AtomicUsize::new(0);

        let errors: Vec<Option<String>> = pool.install(|| {
            collection
                .scans_mut()
                .par_iter_mut()
                .map(|scan| {
                    let result = match stage {
                        Stage::Extract => Ok(()),
                        Stage::Fill => reduction::fill_scan(scan, format),
                        Stage::IndexPretreat => {
                            reduction::index_scan(scan).and_then(|_| reduction::pretreat_scan(scan))
                        }
                        Stage::Treat => reduction::treat_scan(scan, &settings),
                    };
                    let current = done.fetch_add(1, Ordering::SeqCst) + 1;
                    self.report_progress(stage, current, total);
                    result.err().map(|e| e.to_string())
                })
                .collect()
        });

        let mut failed = Vec::new();
        for (index, error) in errors.into_iter().enumerate() {
            if let Some(error) = error {
                let label = collection.at(index).map(scan_label).unwrap_or_default();
                log::warn!("{} failed in {}: {}", label, stage, error);
                report.failures.push((label, error));
                failed.push(index);
            }
        }
        collection.remove_indices(&failed);
        report.processed = total;

        Ok(report)
    }
}

fn build_pool(threads: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| ReduceError::Other(format!("failed to build thread pool: {}", e)))
}

/// 失败报告中的扫描描述，如 `scan 3 (heidi.dat:13)`
fn scan_label(scan: &ScanRecord) -> String {
    let number = scan
        .numbers(Section::Number, "Scan")
        .get(0)
        .unwrap_or(f64::NAN);
    format!("scan {} ({}:{})", number, scan.base_name(), scan.scan_line())
}

// ─────────────────────────────────────────────────────────────
// 后台句柄
// ─────────────────────────────────────────────────────────────

/// `submit` 返回的句柄
pub struct StageHandle {
    stage: Stage,
    handle: JoinHandle<Result<(ScanCollection, StageReport)>>,
}

impl StageHandle {
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// 等待阶段结束，取回集合与统计
    pub fn wait(self) -> Result<(ScanCollection, StageReport)> {
        self.handle
            .join()
            .map_err(|_| ReduceError::Other(format!("stage {} worker panicked", self.stage)))?
    }
}
