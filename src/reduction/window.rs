//! # 峰窗口搜索
//!
//! 把扫描的点依次划分为：左跳过 | 左背景 | 峰 | 右背景 | 右跳过。
//! 自动模式下穷举边界，选取 σ(I)/I 最小且为正的划分。
//!
//! ## 功能
//! - `intensity_with_sigma`: 给定划分下的积分强度及其 σ
//! - `find_non_peak_points`: 四种模式（背景/跳过 × 自动/手动）的窗口搜索
//! - `adjust_bkg_points`: 自动背景模式下把每侧 1 个背景点划入峰区
//!
//! 遍历顺序为左边界在外层、右边界在内层，比较使用严格小于，
//! 因此并列时保留最先遇到的划分。
//!
//! ## 依赖关系
//! - 被 `reduction/integrate.rs` 调用

use crate::error::{ReduceError, Result};
use crate::models::{PointWindows, RealVector};
use crate::reduction::{
    BackgroundMode, SkipMode, EXTRA_PEAK_DATA_POINTS, MIN_BKG_DATA_POINTS, MIN_SKIP_DATA_POINTS,
};

/// 积分强度与 σ
///
/// - I = Σ峰 − Σ背景 · (峰点数 / 背景点数)
/// - σ = √(Σσ²峰 + Σσ²背景 · 比值² + (McCandlish · I)²)
pub fn intensity_with_sigma(
    intensities: &RealVector,
    sigmas: &RealVector,
    windows: &PointWindows,
    mc_candlish_factor: f64,
) -> (f64, f64) {
    let n = intensities.len();

    let left_pos = windows.left_skip;
    let right_pos = n.saturating_sub(windows.right_bkg + windows.right_skip);
    let bkg = intensities.mid(left_pos, windows.left_bkg) + intensities.mid(right_pos, windows.right_bkg);
    let sig_bkg = sigmas.mid(left_pos, windows.left_bkg) + sigmas.mid(right_pos, windows.right_bkg);

    let peak_pos = windows.left_skip + windows.left_bkg;
    let peak_len = n.saturating_sub(peak_pos + windows.right_bkg + windows.right_skip);
    let peak = intensities.mid(peak_pos, peak_len);
    let sig_peak = sigmas.mid(peak_pos, peak_len);

    let ratio = peak.len() as f64 / bkg.len() as f64;
    let intensity = peak.sum() - bkg.sum() * ratio;
    let sigma = (sig_peak.sum_sqr()
        + sig_bkg.sum_sqr() * ratio.powi(2)
        + (mc_candlish_factor * intensity).powi(2))
    .sqrt();

    (intensity, sigma)
}

/// 候选划分的 σ/I 比值
fn sigma_ratio(intensities: &RealVector, sigmas: &RealVector, windows: &PointWindows, mc: f64) -> f64 {
    let (intensity, sigma) = intensity_with_sigma(intensities, sigmas, windows, mc);
    sigma / intensity
}

fn candidate(left_bkg: usize, right_bkg: usize, left_skip: usize, right_skip: usize) -> PointWindows {
    PointWindows {
        left_bkg,
        right_bkg,
        left_skip,
        right_skip,
        ..PointWindows::default()
    }
}

/// 按模式搜索跳过点与背景点，返回补全了 `non_skip` 与 `peak` 的划分。
///
/// 手动模式的计数取自 `current`；没有找到 σ/I 为正的划分时沿用 `current` 中的值。
pub fn find_non_peak_points(
    intensities: &RealVector,
    sigmas: &RealVector,
    current: PointWindows,
    background: BackgroundMode,
    skip: SkipMode,
    mc: f64,
) -> Result<PointWindows> {
    let n = intensities.len();
    let mut found = current;
    let mut min_ratio = f64::INFINITY;

    match (background, skip) {
        (BackgroundMode::Auto, SkipMode::Auto) => {
            // 先在不跳过任何点的情况下找背景
            for lb in MIN_BKG_DATA_POINTS..n.saturating_sub(MIN_BKG_DATA_POINTS) {
                for rb in MIN_BKG_DATA_POINTS..n - lb {
                    let ratio = sigma_ratio(intensities, sigmas, &candidate(lb, rb, 0, 0), mc);
                    if ratio > 0.0 && ratio < min_ratio {
                        min_ratio = ratio;
                        found.left_bkg = lb;
                        found.right_bkg = rb;
                    }
                }
            }

            // 再在背景范围内找跳过点，min_ratio 沿用
            let (total_left, total_right) = (found.left_bkg, found.right_bkg);
            for ls in MIN_SKIP_DATA_POINTS..total_left.saturating_sub(MIN_BKG_DATA_POINTS) {
                for rs in MIN_SKIP_DATA_POINTS..total_right.saturating_sub(MIN_BKG_DATA_POINTS) {
                    let windows = candidate(total_left - ls, total_right - rs, ls, rs);
                    let ratio = sigma_ratio(intensities, sigmas, &windows, mc);
                    if ratio > 0.0 && ratio < min_ratio {
                        min_ratio = ratio;
                        found.left_skip = ls;
                        found.right_skip = rs;
                    }
                }
            }

            found.left_bkg = found.left_bkg.saturating_sub(found.left_skip);
            found.right_bkg = found.right_bkg.saturating_sub(found.right_skip);
        }

        (BackgroundMode::Auto, SkipMode::Manual) => {
            let non_skip = n.saturating_sub(current.left_skip + current.right_skip);
            for lb in MIN_BKG_DATA_POINTS..non_skip.saturating_sub(MIN_BKG_DATA_POINTS) {
                for rb in MIN_BKG_DATA_POINTS..non_skip - lb {
                    let windows = candidate(lb, rb, current.left_skip, current.right_skip);
                    let ratio = sigma_ratio(intensities, sigmas, &windows, mc);
                    if ratio > 0.0 && ratio < min_ratio {
                        min_ratio = ratio;
                        found.left_bkg = lb;
                        found.right_bkg = rb;
                    }
                }
            }
        }

        (BackgroundMode::Manual, SkipMode::Auto) => {
            let non_bkg = n.saturating_sub(current.left_bkg + current.right_bkg);
            for ls in MIN_SKIP_DATA_POINTS..non_bkg.saturating_sub(MIN_SKIP_DATA_POINTS) {
                for rs in MIN_SKIP_DATA_POINTS..(non_bkg - ls).saturating_sub(MIN_SKIP_DATA_POINTS) {
                    let windows = candidate(current.left_bkg, current.right_bkg, ls, rs);
                    let ratio = sigma_ratio(intensities, sigmas, &windows, mc);
                    if ratio > 0.0 && ratio < min_ratio {
                        min_ratio = ratio;
                        found.left_skip = ls;
                        found.right_skip = rs;
                    }
                }
            }
        }

        (BackgroundMode::Manual, SkipMode::Manual) => {}
    }

    finalize(found, n)
}

/// 计算 `non_skip` 与 `peak`，并检查划分是否可用
fn finalize(mut windows: PointWindows, num_points: usize) -> Result<PointWindows> {
    if windows.left_bkg + windows.right_bkg == 0 {
        return Err(ReduceError::EmptyWindow {
            what: "background".to_string(),
        });
    }
    let outer = windows.left_skip + windows.left_bkg + windows.right_bkg + windows.right_skip;
    if outer >= num_points {
        return Err(ReduceError::EmptyWindow {
            what: "peak".to_string(),
        });
    }
    windows.non_skip = num_points - windows.left_skip - windows.right_skip;
    windows.peak = windows.non_skip - windows.left_bkg - windows.right_bkg;
    Ok(windows)
}

/// 自动背景模式下每侧多于 1 个背景点时移 1 个点到峰区
pub fn adjust_bkg_points(mut windows: PointWindows, background: BackgroundMode) -> PointWindows {
    if background != BackgroundMode::Auto {
        return windows;
    }
    for _ in 0..EXTRA_PEAK_DATA_POINTS {
        if windows.left_bkg > 1 {
            windows.left_bkg -= 1;
            windows.peak += 1;
        }
        if windows.right_bkg > 1 {
            windows.right_bkg -= 1;
            windows.peak += 1;
        }
    }
    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 平坦背景 10 上的高斯峰
    fn peak_profile() -> (RealVector, RealVector) {
        let intensities: RealVector = (0..21)
            .map(|i| {
                let x = (i as f64 - 10.0) / 2.0;
                10.0 + 500.0 * (-0.5 * x * x).exp()
            })
            .collect();
        let sigmas = intensities.sqrt();
        (intensities, sigmas)
    }

    #[test]
    fn test_intensity_with_sigma() {
        let intensities = RealVector::from(vec![10.0, 10.0, 50.0, 90.0, 50.0, 12.0, 8.0]);
        let sigmas = RealVector::from(vec![1.0; 7]);
        let windows = candidate(2, 2, 0, 0);

        let (intensity, sigma) = intensity_with_sigma(&intensities, &sigmas, &windows, 0.0);
        // 峰 190，背景 40 · 3/4 = 30
        assert!((intensity - 160.0).abs() < 1e-9);
        assert!((sigma - (3.0 + 4.0 * 0.5625_f64).sqrt()).abs() < 1e-9);

        let (_, sigma_mc) = intensity_with_sigma(&intensities, &sigmas, &windows, 0.1);
        assert!((sigma_mc - (3.0 + 2.25 + 256.0_f64).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_auto_windows_cover_all_points() {
        let (intensities, sigmas) = peak_profile();
        for (bkg, skip) in [
            (BackgroundMode::Auto, SkipMode::Auto),
            (BackgroundMode::Auto, SkipMode::Manual),
            (BackgroundMode::Manual, SkipMode::Auto),
        ] {
            let current = candidate(3, 3, 1, 1);
            let w = find_non_peak_points(&intensities, &sigmas, current, bkg, skip, 0.0).unwrap();
            let w = adjust_bkg_points(w, bkg);
            assert_eq!(w.total(), 21, "{:?}/{:?}: {:?}", bkg, skip, w);
            assert!(w.left_bkg >= 1 && w.right_bkg >= 1);
            assert!(w.peak >= 1);
        }
    }

    #[test]
    fn test_auto_windows_contain_peak_top() {
        let (intensities, sigmas) = peak_profile();
        let w = find_non_peak_points(
            &intensities,
            &sigmas,
            PointWindows::default(),
            BackgroundMode::Auto,
            SkipMode::Auto,
            0.0,
        )
        .unwrap();
        // 峰顶（第 11 个点）落在峰区内
        assert!(w.left_skip + w.left_bkg <= 10);
        assert!(21 - w.right_skip - w.right_bkg > 10);
        assert!(w.peak >= 3);
    }

    #[test]
    fn test_manual_is_idempotent() {
        let (intensities, sigmas) = peak_profile();
        let current = candidate(4, 5, 2, 1);
        let first = find_non_peak_points(
            &intensities,
            &sigmas,
            current,
            BackgroundMode::Manual,
            SkipMode::Manual,
            0.025,
        )
        .unwrap();
        let second = find_non_peak_points(
            &intensities,
            &sigmas,
            first,
            BackgroundMode::Manual,
            SkipMode::Manual,
            0.025,
        )
        .unwrap();
        assert_eq!(first, second);
        assert_eq!((first.left_bkg, first.right_bkg, first.left_skip, first.right_skip), (4, 5, 2, 1));
        assert_eq!(first.peak, 21 - 12);
        // 手动背景不调整
        assert_eq!(adjust_bkg_points(first, BackgroundMode::Manual), first);
    }

    #[test]
    fn test_no_positive_ratio_keeps_previous() {
        let zeros = RealVector::filled(7, 0.0);
        let current = candidate(2, 2, 0, 0);
        let w = find_non_peak_points(&zeros, &zeros, current, BackgroundMode::Auto, SkipMode::Auto, 0.0)
            .unwrap();
        assert_eq!((w.left_bkg, w.right_bkg, w.left_skip, w.right_skip), (2, 2, 0, 0));
        assert_eq!(w.peak, 3);
    }

    #[test]
    fn test_empty_windows_are_errors() {
        let (intensities, sigmas) = peak_profile();
        let no_peak = candidate(10, 10, 1, 0);
        assert!(matches!(
            find_non_peak_points(&intensities, &sigmas, no_peak, BackgroundMode::Manual, SkipMode::Manual, 0.0),
            Err(ReduceError::EmptyWindow { .. })
        ));
        let no_bkg = candidate(0, 0, 0, 0);
        assert!(matches!(
            find_non_peak_points(&intensities, &sigmas, no_bkg, BackgroundMode::Manual, SkipMode::Manual, 0.0),
            Err(ReduceError::EmptyWindow { .. })
        ));
    }

    #[test]
    fn test_adjust_bkg_points() {
        let w = finalize(candidate(3, 1, 0, 0), 10).unwrap();
        let adjusted = adjust_bkg_points(w, BackgroundMode::Auto);
        assert_eq!(adjusted.left_bkg, 2);
        assert_eq!(adjusted.right_bkg, 1);
        assert_eq!(adjusted.peak, w.peak + 1);
        assert_eq!(adjusted.total(), 10);
    }
}
