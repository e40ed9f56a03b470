//! # 逐点数据导出
//!
//! 每个扫描点一行：扫描编号、点序号、扫描角、归一化计数及其 ESD、背景。
//!
//! ## 依赖关系
//! - 被 `commands/reduce.rs` 调用
//! - 使用 `csv` + `serde` 写入 CSV 文件

use crate::error::{ReduceError, Result};
use crate::models::{ScanRecord, Section};

use serde::Serialize;
use std::path::Path;

/// CSV 中的一行
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PointRow {
    #[serde(rename = "Scan")]
    pub scan: usize,
    #[serde(rename = "Point")]
    pub point: usize,
    #[serde(rename = "Angle")]
    pub angle: f64,
    #[serde(rename = "DetectorNorm")]
    pub detector_norm: f64,
    #[serde(rename = "sDetectorNorm")]
    pub s_detector_norm: f64,
    #[serde(rename = "BkgNorm")]
    pub bkg_norm: f64,
}

/// 单个扫描的逐点行；缺失的值为 NaN
pub fn point_rows(scan: &ScanRecord) -> Vec<PointRow> {
    let number = scan
        .numbers(Section::Number, "Scan")
        .get(0)
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v as usize)
        .unwrap_or(0);
    let angle = scan
        .scan_angle()
        .map(|name| scan.numbers(Section::Angles, name))
        .unwrap_or_default();
    let detector = scan.numbers(Section::Intensities, "DetectorNorm");
    let s_detector = scan.numbers(Section::Intensities, "sDetectorNorm");
    let bkg = scan.numbers(Section::Calculations, "BkgNorm");

    (0..scan.num_points())
        .map(|i| PointRow {
            scan: number,
            point: i + 1,
            angle: angle.get(i).unwrap_or(f64::NAN),
            detector_norm: detector.get(i).unwrap_or(f64::NAN),
            s_detector_norm: s_detector.get(i).unwrap_or(f64::NAN),
            bkg_norm: bkg.get(i).unwrap_or(f64::NAN),
        })
        .collect()
}

/// 把全部扫描的逐点数据写入 CSV
pub fn write_points_csv(scans: &[ScanRecord], output_path: &Path) -> Result<usize> {
    let mut wtr = csv::Writer::from_path(output_path).map_err(ReduceError::CsvError)?;

    let mut count = 0;
    for scan in scans {
        for row in point_rows(scan) {
            wtr.serialize(&row).map_err(ReduceError::CsvError)?;
            count += 1;
        }
    }

    wtr.flush().map_err(|e| ReduceError::FileWriteError {
        path: output_path.display().to_string(),
        source: e,
    })?;

    Ok(count)
}
