//! # 数据补齐阶段
//!
//! 在索引和积分之前把扫描整理成统一形状。
//!
//! ## 功能
//! - 由 (+)/(-) 两个极化分量求和得到非极化的 Detector, Monitor, Time/step
//! - 写入点数与 McCandlish 因子
//! - 按衍射几何为缺失的角度补 0
//! - 单值字段广播为 `num_points` 个元素
//!
//! ## 依赖关系
//! - 被 `batch/runner.rs` 的 fill 阶段调用

use crate::error::Result;
use crate::models::{BeamType, FieldValue, RealVector, ScanRecord, Section};
use crate::parsers::InputFormat;

/// 需要广播单值的分组
const BROADCAST_SECTIONS: [Section; 4] = [
    Section::Angles,
    Section::Conditions,
    Section::Indices,
    Section::Intensities,
];

/// 补齐单个扫描
pub fn fill_scan(scan: &mut ScanRecord, format: InputFormat) -> Result<()> {
    calc_unpol_data(scan, Section::Intensities, "Detector")?;
    calc_unpol_data(scan, Section::Intensities, "Monitor")?;
    calc_unpol_data(scan, Section::Conditions, "Time/step")?;

    let num_points = scan.num_points();
    scan.set_number(Section::Conditions, "Points count", num_points as f64)?;
    scan.mc_candlish_factor = format.mc_candlish_factor();

    fill_missing_angles(scan)?;
    broadcast_single_values(scan, num_points)?;

    // 所有反射归入同一组
    scan.set_number(Section::Number, "Batch", 1.0)?;

    log::debug!("filled scan from {} with {} points", scan.base_name(), num_points);
    Ok(())
}

/// `entry = entry(+) + entry(-)`，两者等长且非空时才写入
fn calc_unpol_data(scan: &mut ScanRecord, section: Section, entry: &str) -> Result<()> {
    let up = scan.numbers(section, &BeamType::Up.entry(entry));
    let down = scan.numbers(section, &BeamType::Down.entry(entry));

    if up.is_empty() || up.len() != down.len() {
        return Ok(());
    }

    let sum: RealVector = up.iter().zip(down.iter()).map(|(u, d)| u + d).collect();
    scan.set_numbers(section, entry, sum)
}

/// 四圆几何补 Omega, Chi, Phi；抬升计数器几何补 Nu, Omega
fn fill_missing_angles(scan: &mut ScanRecord) -> Result<()> {
    let mut elements: &[&str] = &[];
    if scan.has(Section::Angles, "2Theta") {
        elements = &["Omega", "Chi", "Phi"];
    }
    if scan.has(Section::Angles, "Gamma") {
        elements = &["Nu", "Omega"];
    }

    for element in elements {
        if !scan.has(Section::Angles, element) {
            scan.set_number(Section::Angles, element, 0.0)?;
        }
    }
    Ok(())
}

fn broadcast_single_values(scan: &mut ScanRecord, num_points: usize) -> Result<()> {
    for section in BROADCAST_SECTIONS {
        for entry in scan.entries(section) {
            let single = match scan.value(section, &entry) {
                Some(FieldValue::Numbers(v)) if v.len() == 1 => v.get(0),
                _ => None,
            };
            if let Some(value) = single {
                scan.set_numbers(section, &entry, RealVector::filled(num_points, value))?;
            }
        }
    }
    Ok(())
}
