//! # 预处理阶段
//!
//! 紧接在索引之后运行，为积分准备归一化计数。
//!
//! ## 功能
//! - 重置排除标记
//! - 由翻转器与极化器状态确定极化截面
//! - 计数的 ESD（泊松统计，√N）
//! - 计数与 ESD 按每点计数时间归一化
//!
//! ## 依赖关系
//! - 被 `batch/runner.rs` 的 index+pretreat 阶段调用

use crate::error::Result;
use crate::models::{BeamType, ScanRecord, Section};

/// 预处理单个扫描
pub fn pretreat_scan(scan: &mut ScanRecord) -> Result<()> {
    scan.set_number(Section::Number, "Excluded", 0.0)?;
    define_polarisation_cross_section(scan)?;
    calc_esd(scan)?;
    normalize_by_time(scan)
}

fn first_word(scan: &ScanRecord, entry: &str) -> String {
    scan.text(Section::Polarisation, entry)
        .and_then(|s| s.split(' ').next().map(str::to_string))
        .unwrap_or_default()
}

/// 翻转器开启时极化器方向取反
fn flip(polariser: &str) -> String {
    if polariser.starts_with('+') {
        polariser.replace('+', "-")
    } else {
        polariser.replace('-', "+")
    }
}

/// 写入 `Polarisation (in/out)`，如 `+-`
pub fn define_polarisation_cross_section(scan: &mut ScanRecord) -> Result<()> {
    let fin = first_word(scan, "Fin");
    let fout = first_word(scan, "Fout");
    let mut pin = first_word(scan, "Pin");
    let mut pout = first_word(scan, "Pout");

    if fin == "on" {
        pin = flip(&pin);
    }
    if fout == "on" {
        pout = flip(&pout);
    }

    scan.set_text(Section::Conditions, "Polarisation (in/out)", &format!("{}{}", pin, pout))
}

fn calc_esd(scan: &mut ScanRecord) -> Result<()> {
    for beam in BeamType::ALL {
        for base in ["Detector", "Monitor"] {
            let counts = scan.numbers(Section::Intensities, &beam.entry(base));
            if !counts.is_empty() {
                scan.set_numbers(Section::Intensities, &beam.entry(&format!("s{}", base)), counts.sqrt())?;
            }
        }
    }
    Ok(())
}

fn normalize_by_time(scan: &mut ScanRecord) -> Result<()> {
    for beam in BeamType::ALL {
        let time = scan.numbers(Section::Conditions, &beam.entry("Time/step"));
        for base in ["Detector", "sDetector", "Monitor", "sMonitor"] {
            let values = scan.numbers(Section::Intensities, &beam.entry(base));
            if values.is_empty() {
                continue;
            }
            let normalized = values.normalize_by(&time)?;
            scan.set_numbers(Section::Intensities, &beam.entry(&format!("{}Norm", base)), normalized)?;
        }
    }
    Ok(())
}
