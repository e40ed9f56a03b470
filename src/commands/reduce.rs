//! # reduce 命令实现
//!
//! 从原始数据文件到导出文件的完整约化流程。
//!
//! ## 功能
//! - 收集并读入输入文件，识别格式
//! - 依次执行 extract → fill → index+pretreat → treat
//! - 打印各阶段统计与约化结果汇总表
//! - 按所选格式导出，可选写出逐点 CSV
//!
//! ## 依赖关系
//! - 使用 `cli/reduce.rs` 定义的参数
//! - 使用 `batch/`, `models/`, `export/`
//! - 使用 `utils/output.rs`, `utils/progress.rs`

use crate::batch::{StageReport, StageRunner};
use crate::cli::reduce::ReduceArgs;
use crate::error::{ReduceError, Result};
use crate::export::{self, points, ExportOptions, OutputFormat};
use crate::models::{BeamType, FieldRegistry, PlotType, ScanCollection, ScanRecord, Section};
use crate::parsers::InputFormat;
use crate::utils::{output, progress};

use colored::Colorize;
use std::sync::Arc;
use tabled::{Table, Tabled};

/// 报告中最多列出的失败条目数
const MAX_LISTED_FAILURES: usize = 10;

/// 约化结果行
#[derive(Debug, Clone, Tabled)]
struct SummaryRow {
    #[tabled(rename = "Scan")]
    scan: String,
    #[tabled(rename = "HKL")]
    hkl: String,
    #[tabled(rename = "Angle")]
    angle: String,
    #[tabled(rename = "Points")]
    points: usize,
    #[tabled(rename = "Bkg/Skip")]
    windows: String,
    #[tabled(rename = "Sf2")]
    sf2: String,
    #[tabled(rename = "FWHM")]
    fwhm: String,
    #[tabled(rename = "FR")]
    flipping_ratio: String,
}

/// 执行 reduce 命令
pub fn execute(args: ReduceArgs) -> Result<()> {
    output::print_header("Reducing Diffraction Scans");

    let files = super::read_input_files(&args.input, &args.pattern, args.recursive)?;
    if files.is_empty() {
        output::print_warning(&format!(
            "No files matched '{}' under {}",
            args.pattern,
            args.input.display()
        ));
        return Ok(());
    }

    let mut collection = ScanCollection::new(Arc::new(FieldRegistry::standard()));
    let format = collection.set_input_files(files)?;
    if format == InputFormat::Unknown {
        return Err(ReduceError::InvalidArgument(format!(
            "no known instrument format under {}",
            args.input.display()
        )));
    }
    output::print_info(&format!(
        "Found {} files: {} {} ({})",
        collection.input_files().len(),
        format.instrument(),
        format.data_type(),
        format.facility()
    ));

    let settings = Arc::new(args.settings());
    output::print_info(&format!(
        "Background: {}, skip: {}, jobs: {}",
        settings.background,
        settings.skip,
        settings.effective_jobs()
    ));

    // 约化
    let pb = progress::create_progress_bar(0, "extract");
    let runner = StageRunner::new(Arc::clone(&settings)).with_progress(progress::stage_progress(&pb));
    let reports = runner.run_pipeline(&mut collection);
    pb.finish_and_clear();
    let reports = reports?;

    print_reports(&reports);

    if collection.is_empty() {
        output::print_warning("No scans survived the reduction");
        return Ok(());
    }

    print_summary(collection.scans());

    // 导出
    let output_format = OutputFormat::from(args.format);
    let output_path = match args.output {
        Some(path) => path,
        None => export::default_output_path(collection.scans(), output_format).ok_or_else(|| {
            ReduceError::InvalidArgument("cannot derive an output file name, use --output".to_string())
        })?,
    };
    let options = ExportOptions {
        header: args.header,
        include_excluded: args.include_excluded,
    };
    collection.output_table().save(&output_path, output_format, options)?;
    output::print_success(&format!(
        "{} output saved to '{}'",
        args.format,
        output_path.display()
    ));

    if let Some(points_path) = args.points {
        let rows = points::write_points_csv(collection.scans(), &points_path)?;
        output::print_success(&format!(
            "{} points saved to '{}'",
            rows,
            points_path.display()
        ));
    }

    let excluded = collection
        .iter()
        .filter(|scan| scan.plot_type() == PlotType::Excluded)
        .count();
    output::print_done(&format!(
        "{} scans reduced, {} excluded",
        collection.len() - excluded,
        excluded
    ));

    Ok(())
}

fn print_reports(reports: &[StageReport]) {
    for report in reports {
        let line = format!(
            "{:<16} {} processed, {} failed",
            report.stage.to_string(),
            report.processed,
            report.failed()
        );
        if report.failed() == 0 {
            output::print_success(&line);
            continue;
        }
        output::print_warning(&line);
        for (item, error) in report.failures.iter().take(MAX_LISTED_FAILURES) {
            println!("    {} {}", item.dimmed(), error);
        }
        if report.failed() > MAX_LISTED_FAILURES {
            println!("    ... and {} more", report.failed() - MAX_LISTED_FAILURES);
        }
    }
    println!();
}

fn print_summary(scans: &[ScanRecord]) {
    let rows: Vec<SummaryRow> = scans.iter().map(summary_row).collect();
    println!("{}", Table::new(&rows));
    println!();
}

fn value_with_err(value: f64, err: f64, precision: usize) -> String {
    if value.is_nan() {
        "-".to_string()
    } else {
        format!("{:.*} ± {:.*}", precision, value, precision, err)
    }
}

fn summary_row(scan: &ScanRecord) -> SummaryRow {
    let number = scan.numbers(Section::Number, "Scan").get(0).unwrap_or(f64::NAN);
    let excluded = scan.plot_type() == PlotType::Excluded;
    let w = scan.windows;
    let unpolarised = scan.beam(BeamType::Unpolarised);

    SummaryRow {
        scan: if excluded {
            format!("{} (x)", number)
        } else {
            number.to_string()
        },
        hkl: format!(
            "{:.2} {:.2} {:.2}",
            scan.miller_index("H"),
            scan.miller_index("K"),
            scan.miller_index("L")
        ),
        angle: scan.scan_angle().unwrap_or("-").to_string(),
        points: scan.num_points(),
        windows: format!(
            "{}/{} {}/{}",
            w.left_bkg, w.right_bkg, w.left_skip, w.right_skip
        ),
        sf2: value_with_err(unpolarised.sf2, unpolarised.sf2_err, 2),
        fwhm: value_with_err(scan.fwhm, scan.fwhm_err, 4),
        flipping_ratio: value_with_err(scan.flipping_ratio, scan.flipping_ratio_err, 4),
    }
}
