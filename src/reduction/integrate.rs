//! # 积分阶段
//!
//! 对预处理后的扫描依次执行：
//! 窗口搜索 → 背景调整 → 平均背景 → 峰最大值 → 峰强度和 → 面积 →
//! 归一化面积 → 结构因子 → FWHM → 翻转比。
//!
//! ## 公式
//! - 面积 = I · 扫描角平均步长
//! - 归一化面积 = 面积 · DEFAULT_MONITOR / 平均监视器计数
//! - Lorentz 因子: sin(2θ)，抬升计数器几何为 sin(γ)·cos(ν)
//! - 结构因子 Sf2 = 归一化面积 · Lorentz 因子
//! - 翻转比 FR = Sf2(+) / Sf2(-)
//!
//! ## 依赖关系
//! - 使用 `reduction/window.rs` 搜索窗口
//! - 使用 `models/line.rs` 在半高处插值
//! - 被 `batch/runner.rs` 的 treat 阶段调用

use crate::error::{ReduceError, Result};
use crate::models::{BeamType, CalibrationLine, PlotType, RealVector, ScanRecord, Section};
use crate::reduction::window::{adjust_bkg_points, find_non_peak_points, intensity_with_sigma};
use crate::reduction::{
    BackgroundMode, ReductionSettings, SkipMode, DEFAULT_MONITOR, FWHM_ANGLE_ESD,
};

/// 积分单个扫描
pub fn treat_scan(scan: &mut ScanRecord, settings: &ReductionSettings) -> Result<()> {
    apply_exclusion(scan, settings)?;

    find_windows(scan, settings)?;
    calc_bkg(scan)?;
    calc_max_peak_inty(scan)?;
    calc_sum_peak_inty(scan)?;
    calc_peak_area(scan)?;
    calc_norm_peak_area(scan)?;
    calc_struct_factor(scan)?;
    calc_full_width_half_max(scan)?;
    calc_flipping_ratio(scan)?;

    if scan.plot_type() != PlotType::Excluded {
        scan.set_plot_type(PlotType::Integrated);
    }
    Ok(())
}

/// 扫描编号在排除列表中时标记为排除
fn apply_exclusion(scan: &mut ScanRecord, settings: &ReductionSettings) -> Result<()> {
    let number = scan.numbers(Section::Number, "Scan").get(0).unwrap_or(f64::NAN);
    if number.is_finite() && number >= 1.0 && settings.is_excluded(number as usize) {
        scan.set_number(Section::Number, "Excluded", 1.0)?;
        scan.set_plot_type(PlotType::Excluded);
        log::info!("scan {} excluded", number);
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────
// 窗口
// ─────────────────────────────────────────────────────────────

/// 窗口搜索与背景调整，结果写回 `scan.windows` 与 calculations 分组
pub fn find_windows(scan: &mut ScanRecord, settings: &ReductionSettings) -> Result<()> {
    let detector = scan.require_numbers(Section::Intensities, "DetectorNorm")?.clone();
    let sdetector = scan.numbers(Section::Intensities, "sDetectorNorm");

    let mut current = scan.windows;
    if settings.background == BackgroundMode::Manual {
        current.left_bkg = settings.left_bkg;
        current.right_bkg = settings.right_bkg;
    }
    if settings.skip == SkipMode::Manual {
        current.left_skip = settings.left_skip;
        current.right_skip = settings.right_skip;
    }

    let found = find_non_peak_points(
        &detector,
        &sdetector,
        current,
        settings.background,
        settings.skip,
        scan.mc_candlish_factor,
    )?;
    scan.windows = adjust_bkg_points(found, settings.background);

    let w = scan.windows;
    scan.set_number(Section::Calculations, "numBkgLeft", w.left_bkg as f64)?;
    scan.set_number(Section::Calculations, "numBkgRight", w.right_bkg as f64)?;
    scan.set_number(Section::Calculations, "numSkipLeft", w.left_skip as f64)?;
    scan.set_number(Section::Calculations, "numSkipRight", w.right_skip as f64)?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────
// 背景与强度
// ─────────────────────────────────────────────────────────────

/// 背景窗口内归一化计数的平均值，按每点时间展开为 BkgNorm / BkgNormErr
pub fn calc_bkg(scan: &mut ScanRecord) -> Result<()> {
    let detector = scan.numbers(Section::Intensities, "DetectorNorm");
    if detector.is_empty() {
        return Ok(());
    }
    let time = scan.numbers(Section::Conditions, "Time/step");
    let w = scan.windows;
    let n = detector.len();

    let count = w.left_bkg + w.right_bkg;
    if count == 0 {
        return Err(ReduceError::EmptyWindow {
            what: "background".to_string(),
        });
    }

    let bkg = detector.mid(w.left_skip, w.left_bkg)
        + detector.mid(n.saturating_sub(w.right_skip + w.right_bkg), w.right_bkg);
    scan.norm_mean_bkg = bkg.sum() / count as f64;

    let counts: RealVector = time.iter().map(|t| scan.norm_mean_bkg * t).collect();
    let bkg_norm = counts.normalize_by(&time)?;
    let bkg_norm_err = counts.sqrt().normalize_by(&time)?;

    scan.set_numbers(Section::Calculations, "BkgNorm", bkg_norm)?;
    scan.set_numbers(Section::Calculations, "BkgNormErr", bkg_norm_err)?;
    Ok(())
}

/// 各束类型归一化计数的最大值
pub fn calc_max_peak_inty(scan: &mut ScanRecord) -> Result<()> {
    for beam in BeamType::ALL {
        let detector = scan.numbers(Section::Intensities, &beam.entry("DetectorNorm"));
        if detector.is_empty() {
            continue;
        }
        let sdetector = scan.numbers(Section::Intensities, &beam.entry("sDetectorNorm"));

        let results = scan.beam_mut(beam);
        results.max_inty = detector.max();
        results.max_inty_err = sdetector.max();
        let (value, err) = (results.max_inty, results.max_inty_err);

        scan.set_number(Section::Calculations, &beam.entry("IntMax"), value)?;
        scan.set_number(Section::Calculations, &beam.entry("IntMaxErr"), err)?;
    }
    Ok(())
}

/// 各束类型的峰强度和（扣除背景）
pub fn calc_sum_peak_inty(scan: &mut ScanRecord) -> Result<()> {
    for beam in BeamType::ALL {
        let detector = scan.numbers(Section::Intensities, &beam.entry("DetectorNorm"));
        if detector.is_empty() {
            continue;
        }
        let sdetector = scan.numbers(Section::Intensities, &beam.entry("sDetectorNorm"));

        let (value, err) = intensity_with_sigma(&detector, &sdetector, &scan.windows, scan.mc_candlish_factor);
        let results = scan.beam_mut(beam);
        results.sum_inty = value;
        results.sum_inty_err = err;

        scan.set_number(Section::Calculations, &beam.entry("IntSum"), value)?;
        scan.set_number(Section::Calculations, &beam.entry("IntSumErr"), err)?;
    }
    Ok(())
}

/// 面积 = 强度和 · 扫描角步长
pub fn calc_peak_area(scan: &mut ScanRecord) -> Result<()> {
    let name = scan
        .scan_angle()
        .map(str::to_string)
        .ok_or_else(|| ReduceError::field_not_found(Section::Angles, "scan angle"))?;
    let step = scan.numbers(Section::Angles, &name).step();

    for beam in BeamType::ALL {
        let results = scan.beam_mut(beam);
        if results.sum_inty.is_nan() {
            continue;
        }
        results.area = results.sum_inty * step;
        results.area_err = results.sum_inty_err * step;
        let (value, err) = (results.area, results.area_err);

        scan.set_number(Section::Calculations, &beam.entry("Area"), value)?;
        scan.set_number(Section::Calculations, &beam.entry("AreaErr"), err)?;
    }
    Ok(())
}

/// 按平均监视器计数归一化到 DEFAULT_MONITOR；无监视器数据时因子为 1
pub fn calc_norm_peak_area(scan: &mut ScanRecord) -> Result<()> {
    let mut monitor = scan.numbers(Section::Intensities, "MonitorNorm").mean();
    if monitor == 0.0 || monitor.is_nan() {
        monitor = DEFAULT_MONITOR;
    }
    let normalizer = DEFAULT_MONITOR / monitor;

    for beam in BeamType::ALL {
        let results = scan.beam_mut(beam);
        if results.area.is_nan() {
            continue;
        }
        results.norm_area = results.area * normalizer;
        results.norm_area_err = results.area_err * normalizer;
        let (value, err) = (results.norm_area, results.norm_area_err);

        scan.set_number(Section::Calculations, &beam.entry("AreaNorm"), value)?;
        scan.set_number(Section::Calculations, &beam.entry("AreaNormErr"), err)?;
    }
    Ok(())
}

/// Lorentz 修正因子；既无 2Theta 也无 Gamma 时为 NaN
pub fn lorentz_factor(scan: &ScanRecord) -> f64 {
    let two_theta = scan.numbers(Section::Angles, "2Theta");
    let gamma = scan.numbers(Section::Angles, "Gamma");
    let nu = scan.numbers(Section::Angles, "Nu");

    if !two_theta.is_empty() {
        two_theta.mean().to_radians().sin()
    } else if !gamma.is_empty() && nu.is_empty() {
        gamma.mean().to_radians().sin()
    } else if !gamma.is_empty() {
        gamma.mean().to_radians().sin() * nu.mean().to_radians().cos()
    } else {
        log::warn!("no detector angle in {}, Lorentz factor undefined", scan.base_name());
        f64::NAN
    }
}

/// 结构因子 = 归一化面积 · Lorentz 因子
pub fn calc_struct_factor(scan: &mut ScanRecord) -> Result<()> {
    let correction = lorentz_factor(scan);

    for beam in BeamType::ALL {
        let results = scan.beam_mut(beam);
        if results.norm_area.is_nan() {
            continue;
        }
        results.sf2 = results.norm_area * correction;
        results.sf2_err = results.norm_area_err * correction;
        let (value, err) = (results.sf2, results.sf2_err);

        scan.set_number(Section::Calculations, &beam.entry("Sf2"), value)?;
        scan.set_number(Section::Calculations, &beam.entry("Sf2Err"), err)?;
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────
// FWHM 与翻转比
// ─────────────────────────────────────────────────────────────

fn check_len(what: &str, values: &RealVector, n: usize) -> Result<()> {
    if values.len() != n {
        return Err(ReduceError::LengthMismatch {
            what: what.to_string(),
            left: values.len(),
            right: n,
        });
    }
    Ok(())
}

/// 半高全宽：在峰区内找最大值，两侧各取跨越半高的两个点连线求 x
pub fn calc_full_width_half_max(scan: &mut ScanRecord) -> Result<()> {
    let inty = scan.numbers(Section::Intensities, "DetectorNorm");
    if inty.is_empty() {
        return Ok(());
    }
    let n = inty.len();
    let x = scan
        .scan_angle()
        .map(|name| scan.numbers(Section::Angles, name))
        .unwrap_or_default();
    let s_inty = scan.numbers(Section::Intensities, "sDetectorNorm");
    let bkg = scan.numbers(Section::Calculations, "BkgNorm");
    let s_bkg = scan.numbers(Section::Calculations, "BkgNormErr");
    check_len("scan angle", &x, n)?;
    check_len("sDetectorNorm", &s_inty, n)?;
    check_len("BkgNorm", &bkg, n)?;
    check_len("BkgNormErr", &s_bkg, n)?;

    // 扣除背景后的强度及其 σ
    let y: Vec<f64> = (0..n).map(|i| inty[i] - bkg[i]).collect();
    let sy: Vec<f64> = (0..n).map(|i| (s_inty[i].powi(2) + s_bkg[i].powi(2)).sqrt()).collect();

    let y_hm = 0.5 * RealVector::from(y.clone()).max();
    let i_last = n - 1;
    let w = scan.windows;
    let left_border = w.left_skip + w.left_bkg;
    let right_border = n - w.right_skip - w.right_bkg - 1;
    if right_border < left_border {
        return Err(ReduceError::EmptyWindow {
            what: "peak".to_string(),
        });
    }

    let i_max = left_border
        + RealVector::from(y[left_border..=right_border].to_vec())
            .index_of_max()
            .unwrap_or(0);

    let i_after_left = (left_border..i_max).find(|&i| y[i] > y_hm).unwrap_or(i_max);
    let i_before_left = i_after_left.saturating_sub(1);

    let i_before_right = ((i_max + 1)..=right_border)
        .rev()
        .find(|&i| y[i] > y_hm)
        .unwrap_or(i_max);
    let i_after_right = if i_before_right == i_last { i_last } else { i_before_right + 1 };

    let sx = FWHM_ANGLE_ESD;
    let point = |i: usize| (x[i], y[i], sx, sy[i]);
    let left = CalibrationLine::new(point(i_before_left), point(i_after_left));
    let right = CalibrationLine::new(point(i_before_right), point(i_after_right));

    scan.fwhm = (right.x_for_y(y_hm) - left.x_for_y(y_hm)).abs();
    scan.fwhm_err = (left.esd_x_for_y(y_hm, left.esd_y_for_y(y_hm)).powi(2)
        + right.esd_x_for_y(y_hm, right.esd_y_for_y(y_hm)).powi(2))
    .sqrt();

    scan.set_number(Section::Calculations, "Fwhm", scan.fwhm)?;
    scan.set_number(Section::Calculations, "FwhmErr", scan.fwhm_err)?;
    Ok(())
}

/// 三种束类型的结构因子都存在时计算翻转比及其显著性
pub fn calc_flipping_ratio(scan: &mut ScanRecord) -> Result<()> {
    if BeamType::ALL.iter().any(|beam| scan.beam(*beam).sf2.is_nan()) {
        return Ok(());
    }

    let up = *scan.beam(BeamType::Up);
    let down = *scan.beam(BeamType::Down);
    let (plus, minus) = (up.sf2, down.sf2);

    scan.flipping_ratio = plus / minus;
    scan.flipping_ratio_err =
        ((up.sf2_err / minus).powi(2) + (-plus / minus.powi(2) * down.sf2_err).powi(2)).sqrt();

    let mut significance = (scan.flipping_ratio - 1.0).abs() / scan.flipping_ratio_err;
    if scan.flipping_ratio < 0.0 {
        significance = -significance;
    }

    scan.set_number(Section::Calculations, "FR", scan.flipping_ratio)?;
    scan.set_number(Section::Calculations, "FRerr", scan.flipping_ratio_err)?;
    scan.set_number(Section::Calculations, "|FR-1|/FRerr", significance)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldRegistry;
    use crate::reduction::pretreat_scan;
    use std::sync::Arc;

    fn manual_settings() -> ReductionSettings {
        ReductionSettings {
            background: BackgroundMode::Manual,
            skip: SkipMode::Manual,
            left_bkg: 2,
            right_bkg: 2,
            left_skip: 0,
            right_skip: 0,
            ..ReductionSettings::default()
        }
    }

    /// 7 点 omega 扫描，时间 1 s，监视器 5000
    fn scan(detector: &str, two_theta: f64) -> ScanRecord {
        let mut scan = ScanRecord::new(Arc::new(FieldRegistry::standard()));
        scan.set_number(Section::Number, "Scan", 1.0).unwrap();
        scan.set_text(Section::Intensities, "Detector", detector).unwrap();
        scan.set_text(Section::Intensities, "Monitor", "5000 5000 5000 5000 5000 5000 5000").unwrap();
        scan.set_text(Section::Conditions, "Time/step", "1 1 1 1 1 1 1").unwrap();
        scan.set_numbers(Section::Angles, "2Theta", RealVector::filled(7, two_theta)).unwrap();
        scan.set_text(Section::Angles, "Omega", "9.7 9.8 9.9 10.0 10.1 10.2 10.3").unwrap();
        scan.set_scan_angle("Omega");
        pretreat_scan(&mut scan).unwrap();
        scan
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_structure_factor_end_to_end() {
        let settings = manual_settings();

        // I = 230 - 40·3/4 = 200, 面积 = 20, 归一化 ×2, sin 30° = 0.5
        let mut a = scan("10 10 60 110 60 10 10", 30.0);
        treat_scan(&mut a, &settings).unwrap();
        assert!(close(a.norm_mean_bkg, 10.0));
        assert!(close(a.beam(BeamType::Unpolarised).sum_inty, 200.0));
        assert!(close(a.beam(BeamType::Unpolarised).sf2, 20.0));
        assert!(close(a.numbers(Section::Calculations, "Sf2").as_slice()[0], 20.0));

        // I = 430 - 30 = 400, sin 60°
        let mut b = scan("10 10 110 210 110 10 10", 60.0);
        treat_scan(&mut b, &settings).unwrap();
        let expected = 400.0 * 0.1 * 2.0 * 60f64.to_radians().sin();
        assert!(close(b.beam(BeamType::Unpolarised).sf2, expected));
        assert_eq!(b.plot_type(), PlotType::Integrated);
        assert_eq!(b.windows.total(), 7);
    }

    #[test]
    fn test_background_arrays() {
        let mut a = scan("10 10 60 110 60 10 10", 30.0);
        treat_scan(&mut a, &manual_settings()).unwrap();
        assert_eq!(a.numbers(Section::Calculations, "BkgNorm").len(), 7);
        assert!(close(a.numbers(Section::Calculations, "BkgNormErr").mean(), 10f64.sqrt()));
        assert_eq!(a.numbers(Section::Calculations, "numBkgLeft").as_slice(), &[2.0]);
        assert!(close(a.beam(BeamType::Unpolarised).max_inty, 110.0));
    }

    #[test]
    fn test_full_width_half_max() {
        let mut a = scan("10 10 60 110 60 10 10", 30.0);
        treat_scan(&mut a, &manual_settings()).unwrap();
        // 半高 50 恰好落在 9.9 与 10.1
        assert!(close(a.fwhm, 0.2));
        assert!(a.fwhm_err > 0.0);
    }

    #[test]
    fn test_flipping_ratio() {
        let mut s = scan("15 15 90 165 90 15 15", 30.0);
        s.set_text(Section::Intensities, "DetectorNorm(+)", "10 10 60 110 60 10 10").unwrap();
        s.set_text(Section::Intensities, "sDetectorNorm(+)", "3 3 8 10 8 3 3").unwrap();
        s.set_text(Section::Intensities, "DetectorNorm(-)", "5 5 30 55 30 5 5").unwrap();
        s.set_text(Section::Intensities, "sDetectorNorm(-)", "2 2 5 7 5 2 2").unwrap();
        treat_scan(&mut s, &manual_settings()).unwrap();

        assert!(close(s.flipping_ratio, 2.0));
        assert!(s.flipping_ratio_err > 0.0);
        let significance = s.numbers(Section::Calculations, "|FR-1|/FRerr").as_slice()[0];
        assert!(close(significance, 1.0 / s.flipping_ratio_err));
    }

    #[test]
    fn test_no_flipping_ratio_without_polarised_data() {
        let mut a = scan("10 10 60 110 60 10 10", 30.0);
        treat_scan(&mut a, &manual_settings()).unwrap();
        assert!(a.flipping_ratio.is_nan());
        assert!(!a.has(Section::Calculations, "FR"));
    }

    #[test]
    fn test_excluded_scan_keeps_state() {
        let settings = ReductionSettings {
            exclude: vec![1],
            ..manual_settings()
        };
        let mut a = scan("10 10 60 110 60 10 10", 30.0);
        treat_scan(&mut a, &settings).unwrap();
        assert_eq!(a.plot_type(), PlotType::Excluded);
        assert_eq!(a.numbers(Section::Number, "Excluded").as_slice(), &[1.0]);
    }

    #[test]
    fn test_lorentz_factor_branches() {
        let registry = Arc::new(FieldRegistry::standard());
        let mut s = ScanRecord::new(Arc::clone(&registry));
        assert!(lorentz_factor(&s).is_nan());

        s.set_text(Section::Angles, "Gamma", "90").unwrap();
        assert!(close(lorentz_factor(&s), 1.0));
        s.set_text(Section::Angles, "Nu", "60").unwrap();
        assert!(close(lorentz_factor(&s), 0.5));
        s.set_text(Section::Angles, "2Theta", "30").unwrap();
        assert!(close(lorentz_factor(&s), 0.5));
    }

    #[test]
    fn test_missing_normalised_counts() {
        let mut s = ScanRecord::new(Arc::new(FieldRegistry::standard()));
        s.set_text(Section::Intensities, "Detector", "1 2 3").unwrap();
        assert!(matches!(
            treat_scan(&mut s, &ReductionSettings::default()),
            Err(ReduceError::FieldNotFound { .. })
        ));
    }
}
