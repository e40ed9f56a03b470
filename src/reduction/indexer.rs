//! # 倒易空间索引
//!
//! Miller 指数与衍射仪角度之间的换算，支持四圆与抬升计数器两种几何。
//!
//! ## 公式
//! - 倒易矢量: xyz = UBᵀ · hkl，反之 hkl = (UBᵀ)⁻¹ · xyz
//! - 四圆: d = 2 sin(2θ/2) / λ, x = d cosφ cosχ, y = -d sinφ cosχ, z = d sinχ
//! - 抬升计数器: z = sinν / λ, θ = ½ acos(cosγ cosν), 面内分量由 ω 旋转得到
//!
//! 所有角度以度为单位输入输出，输出折算到 (-180, 180]。
//! 反三角函数的参数不做截断，越界时得到 NaN。
//!
//! ## 依赖关系
//! - 使用 `models/matrix.rs`
//! - 被 `batch/runner.rs` 的 index+pretreat 阶段调用

use crate::error::{ReduceError, Result};
use crate::models::{OrientationMatrix, RealVector, ScanRecord, Section};
use crate::reduction::{sign, to_main_angular_range};

use std::f64::consts::FRAC_PI_2;

/// 四圆几何角度（度）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FourCircleAngles {
    pub two_theta: f64,
    pub omega: f64,
    pub chi: f64,
    pub phi: f64,
}

/// 抬升计数器几何角度（度）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiftingAngles {
    pub two_theta: f64,
    pub gamma: f64,
    pub nu: f64,
    pub omega: f64,
}

/// 同一倒易矢量在两种几何下的角度
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffractionAngles {
    pub four_circle: FourCircleAngles,
    pub lifting: LiftingAngles,
}

// ─────────────────────────────────────────────────────────────
// 纯函数
// ─────────────────────────────────────────────────────────────

/// hkl → 倒易矢量 xyz
pub fn hkl_to_xyz(ub: &OrientationMatrix, hkl: [f64; 3]) -> [f64; 3] {
    ub.transpose().apply(hkl)
}

/// 倒易矢量 xyz → hkl；UB 奇异时返回 `SingularMatrix`
pub fn xyz_to_hkl(ub: &OrientationMatrix, xyz: [f64; 3]) -> Result<[f64; 3]> {
    Ok(ub.transpose().inverse()?.apply(xyz))
}

/// 四圆几何角度 → xyz（ω 不参与计算）
pub fn angles_to_xyz_four_circle(wavelength: f64, two_theta: f64, chi: f64, phi: f64) -> [f64; 3] {
    let two_theta = two_theta.to_radians();
    let chi = chi.to_radians();
    let phi = phi.to_radians();

    let d = 2.0 * (0.5 * two_theta).sin() / wavelength;
    [
        d * phi.cos() * chi.cos(),
        d * -phi.sin() * chi.cos(),
        d * chi.sin(),
    ]
}

/// 抬升计数器几何角度 → xyz
pub fn angles_to_xyz_lifting(wavelength: f64, gamma: f64, nu: f64, omega: f64) -> [f64; 3] {
    let gamma = gamma.to_radians();
    let nu = nu.to_radians();
    let omega = omega.to_radians();

    let z = nu.sin() / wavelength;
    let theta = 0.5 * (gamma.cos() * nu.cos()).acos();
    let q2 = (2.0 / wavelength * theta.sin()).powi(2);
    let xy2 = q2 - z * z;
    let delta = (0.5 * wavelength * q2 / xy2.sqrt()).asin();
    let phi = -FRAC_PI_2 + delta - omega;

    [phi.cos() * xy2.sqrt(), phi.sin() * xy2.sqrt(), z]
}

/// xyz → 两种几何下的角度；`psi` 为方位角（度），NaN 或 0 时不修正
pub fn xyz_to_angles(wavelength: f64, xyz: [f64; 3], psi: f64) -> DiffractionAngles {
    let [x, y, z] = xyz;
    let q2xyz = x * x + y * y + z * z;
    let q2xy = x * x + y * y;

    // 四圆，θ = ω
    let theta1 = (0.5 * wavelength * q2xyz.sqrt()).asin();
    let two_theta1 = 2.0 * theta1;
    let mut omega1 = theta1;
    let mut chi1 = (z / q2xy.sqrt()).atan();
    let mut phi1 = (-y).atan2(x);
    correct_for_psi(&mut omega1, &mut chi1, &mut phi1, psi, q2xyz, z);

    // 抬升计数器
    let omega2 = -y.atan2(x) + (0.5 * wavelength * q2xyz / q2xy.sqrt()).asin() - FRAC_PI_2;
    let nu2 = (wavelength * z).asin();
    let two_theta2 = 2.0 * (0.5 * wavelength * q2xyz.sqrt()).asin();
    let gamma2 = (two_theta2.cos() / nu2.cos()).acos();

    let deg = |rad: f64| to_main_angular_range(rad.to_degrees());
    DiffractionAngles {
        four_circle: FourCircleAngles {
            two_theta: deg(two_theta1),
            omega: deg(omega1),
            chi: deg(chi1),
            phi: deg(phi1),
        },
        lifting: LiftingAngles {
            two_theta: deg(two_theta2),
            gamma: deg(gamma2),
            nu: deg(nu2),
            omega: deg(omega2),
        },
    }
}

/// 按方位角 ψ 修正 ω, χ, φ（弧度）
fn correct_for_psi(omega: &mut f64, chi: &mut f64, phi: &mut f64, psi: f64, q2xyz: f64, z: f64) {
    if psi.is_nan() || psi == 0.0 {
        return;
    }
    let psi = psi.to_radians();

    if chi.abs() < 3.5e-4 {
        // |χ| < 0.02°
        *omega -= FRAC_PI_2;
        *chi += psi;
        *phi -= FRAC_PI_2 * sign(-chi.cos());
    } else if chi.cos().abs() < 1.0e-5 {
        // χ ≈ ±90°
        *phi -= psi * sign(-*chi);
    } else {
        let o = (psi.sin() * chi.cos() * q2xyz.sqrt() / z).atan();
        *omega -= o;
        *chi = (z / (q2xyz.sqrt() * o.cos())).atan2(chi.cos() * psi.cos());
        // 使用更新后的 χ
        *phi -= (-o.sin() / chi.cos()).atan2(o.cos());
    }
}

/// 入射束 (s0) 与衍射束 (s2) 的方向余弦，顺序为 s0x, s2x, s0y, s2y, s0z, s2z
pub fn direction_cosines(
    ub: &OrientationMatrix,
    two_theta: f64,
    omega: f64,
    chi: f64,
    phi: f64,
) -> Result<[f64; 6]> {
    let two_theta = two_theta.to_radians();
    let (so, co) = omega.to_radians().sin_cos();
    let (sc, cc) = chi.to_radians().sin_cos();
    let (sp, cp) = phi.to_radians().sin_cos();

    let o = co * cc * cp - so * sp;
    let p = -co * cc * sp - so * cp;
    let q = co * sc;

    let x = so * cc * cp + co * sp;
    let y = -so * cc * sp + co * cp;
    let z = so * sc;

    let ubn = ub.norm_rows()?;
    let incident = ubn.apply([x, y, z]);
    let opq = ubn.apply([o, p, q]);
    let diffracted: Vec<f64> = (0..3)
        .map(|i| two_theta.sin() * opq[i] - two_theta.cos() * incident[i])
        .collect();

    Ok([
        incident[0],
        diffracted[0],
        incident[1],
        diffracted[1],
        incident[2],
        diffracted[2],
    ])
}

// ─────────────────────────────────────────────────────────────
// 扫描级操作
// ─────────────────────────────────────────────────────────────

fn point(values: &RealVector, i: usize, what: &str) -> Result<f64> {
    values.get(i).ok_or_else(|| ReduceError::LengthMismatch {
        what: what.to_string(),
        left: values.len(),
        right: i + 1,
    })
}

/// 补全扫描中缺失的一半：已知 hkl 时计算角度，否则逐点由角度计算 hkl；
/// 随后计算方向余弦。没有取向矩阵的扫描不做处理。
pub fn index_scan(scan: &mut ScanRecord) -> Result<()> {
    let matrix = scan.numbers(Section::Orientation, "matrix");
    if matrix.is_empty() {
        log::debug!("no orientation matrix in {}, indexing skipped", scan.base_name());
        return Ok(());
    }
    let ub = OrientationMatrix::from_vector(&matrix);

    let wavelength = scan.numbers(Section::Conditions, "Wavelength");
    let has_hkl = ["H", "K", "L"].iter().all(|name| scan.has(Section::Indices, name));
    let lifting = scan.has(Section::Angles, "Gamma");

    if has_hkl && !lifting {
        set_angles_from_indices(scan, &ub, wavelength.mean())?;
    } else {
        set_indices_from_angles(scan, &ub, &wavelength, lifting)?;
    }

    calc_direction_cosines(scan)
}

fn set_angles_from_indices(scan: &mut ScanRecord, ub: &OrientationMatrix, wavelength: f64) -> Result<()> {
    let n = scan.num_points();
    let hkl = [scan.miller_index("H"), scan.miller_index("K"), scan.miller_index("L")];
    let psi = scan.numbers(Section::Angles, "Psi").mean();
    let centre = xyz_to_angles(wavelength, hkl_to_xyz(ub, hkl), psi).four_circle;

    let step = if scan.scan_step().is_finite() {
        scan.scan_step()
    } else {
        scan.scan_angle()
            .map(|name| scan.numbers(Section::Angles, name).step())
            .unwrap_or(f64::NAN)
    };

    // 第 ceil(n/2) 个点位于扫描中心
    let half = n.div_ceil(2) as f64;
    let omega: RealVector = (0..n)
        .map(|i| centre.omega + (i as f64 + 1.0 - half) * step)
        .collect();

    scan.set_numbers(Section::Angles, "2Theta", RealVector::filled(n, centre.two_theta))?;
    scan.set_numbers(Section::Angles, "Theta", RealVector::filled(n, centre.two_theta / 2.0))?;
    scan.set_numbers(Section::Angles, "Omega", omega)?;
    scan.set_numbers(Section::Angles, "Chi", RealVector::filled(n, centre.chi))?;
    scan.set_numbers(Section::Angles, "Phi", RealVector::filled(n, centre.phi))?;
    Ok(())
}

fn set_indices_from_angles(
    scan: &mut ScanRecord,
    ub: &OrientationMatrix,
    wavelength: &RealVector,
    lifting: bool,
) -> Result<()> {
    let n = scan.num_points();
    let two_theta = scan.numbers(Section::Angles, "2Theta");
    let omega = scan.numbers(Section::Angles, "Omega");
    let chi = scan.numbers(Section::Angles, "Chi");
    let phi = scan.numbers(Section::Angles, "Phi");
    let gamma = scan.numbers(Section::Angles, "Gamma");
    let nu = scan.numbers(Section::Angles, "Nu");

    let (mut h, mut k, mut l) = (RealVector::new(), RealVector::new(), RealVector::new());
    for i in 0..n {
        let lambda = point(wavelength, i, "Wavelength")?;
        let xyz = if lifting {
            angles_to_xyz_lifting(
                lambda,
                point(&gamma, i, "Gamma")?,
                point(&nu, i, "Nu")?,
                point(&omega, i, "Omega")?,
            )
        } else {
            angles_to_xyz_four_circle(
                lambda,
                point(&two_theta, i, "2Theta")?,
                point(&chi, i, "Chi")?,
                point(&phi, i, "Phi")?,
            )
        };
        let hkl = xyz_to_hkl(ub, xyz)?;
        h.push(hkl[0]);
        k.push(hkl[1]);
        l.push(hkl[2]);
    }

    scan.set_numbers(Section::Indices, "H", h)?;
    scan.set_numbers(Section::Indices, "K", k)?;
    scan.set_numbers(Section::Indices, "L", l)?;
    Ok(())
}

/// 由平均角度（任一缺失时由平均 hkl 反算）计算方向余弦并写入 cosines 分组
pub fn calc_direction_cosines(scan: &mut ScanRecord) -> Result<()> {
    let matrix = scan.numbers(Section::Orientation, "matrix");
    if matrix.is_empty() {
        return Ok(());
    }
    let ub = OrientationMatrix::from_vector(&matrix);

    let names = ["2Theta", "Omega", "Chi", "Phi"];
    let angles = if names.iter().all(|name| scan.has(Section::Angles, name)) {
        names.map(|name| scan.numbers(Section::Angles, name).mean())
    } else {
        let wavelength = scan.numbers(Section::Conditions, "Wavelength").mean();
        let psi = scan.numbers(Section::Angles, "Psi").mean();
        let hkl = [scan.miller_index("H"), scan.miller_index("K"), scan.miller_index("L")];
        let a = xyz_to_angles(wavelength, hkl_to_xyz(&ub, hkl), psi).four_circle;
        [a.two_theta, a.omega, a.chi, a.phi]
    };

    let dc = direction_cosines(&ub, angles[0], angles[1], angles[2], angles[3])?;
    for (name, value) in ["S0X", "S2X", "S0Y", "S2Y", "S0Z", "S2Z"].iter().zip(dc) {
        scan.set_number(Section::Cosines, name, value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldRegistry;
    use std::sync::Arc;

    fn ub() -> OrientationMatrix {
        OrientationMatrix::from_row_major([
            0.12, 0.03, -0.01, //
            -0.02, 0.11, 0.04, //
            0.01, -0.05, 0.09,
        ])
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_hkl_round_trip() {
        let ub = ub();
        for hkl in [[1.0, 0.0, 0.0], [2.0, -1.0, 3.0], [-4.0, 5.0, 1.0]] {
            let back = xyz_to_hkl(&ub, hkl_to_xyz(&ub, hkl)).unwrap();
            for i in 0..3 {
                assert!(close(back[i], hkl[i]), "{:?} -> {:?}", hkl, back);
            }
        }
    }

    #[test]
    fn test_singular_matrix() {
        let ub = OrientationMatrix::from_row_major([1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 0.0, 0.0, 1.0]);
        assert!(matches!(xyz_to_hkl(&ub, [0.1, 0.2, 0.3]), Err(ReduceError::SingularMatrix)));
    }

    #[test]
    fn test_four_circle_angles_round_trip() {
        let xyz = [0.3, 0.2, 0.1];
        let a = xyz_to_angles(1.0, xyz, f64::NAN).four_circle;
        // 对称位置 θ = ω
        assert!(close(a.omega, a.two_theta / 2.0));
        let back = angles_to_xyz_four_circle(1.0, a.two_theta, a.chi, a.phi);
        for i in 0..3 {
            assert!(close(back[i], xyz[i]));
        }
    }

    #[test]
    fn test_lifting_angles_round_trip() {
        let xyz = [0.3, 0.2, 0.1];
        let a = xyz_to_angles(1.0, xyz, 0.0).lifting;
        let back = angles_to_xyz_lifting(1.0, a.gamma, a.nu, a.omega);
        for i in 0..3 {
            assert!(close(back[i], xyz[i]), "{:?}", back);
        }
    }

    #[test]
    fn test_psi_correction_changes_setting() {
        let xyz = [0.3, 0.2, 0.1];
        let plain = xyz_to_angles(1.0, xyz, 0.0).four_circle;
        let rotated = xyz_to_angles(1.0, xyz, 30.0).four_circle;
        assert!(close(plain.two_theta, rotated.two_theta));
        assert!(!close(plain.omega, rotated.omega));
    }

    #[test]
    fn test_direction_cosines_are_unit_vectors() {
        let ub = ub();
        let dc = direction_cosines(&ub, 40.0, 20.0, 15.0, -30.0).unwrap();
        let s0 = dc[0] * dc[0] + dc[2] * dc[2] + dc[4] * dc[4];
        assert!(s0 > 0.0);
        assert!(dc.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_index_scan_from_indices() {
        let mut scan = ScanRecord::new(Arc::new(FieldRegistry::standard()));
        scan.set_text(Section::Intensities, "Detector", "1 2 3 2 1").unwrap();
        scan.set_text(Section::Indices, "H", "1 1 1 1 1").unwrap();
        scan.set_text(Section::Indices, "K", "0 0 0 0 0").unwrap();
        scan.set_text(Section::Indices, "L", "1 1 1 1 1").unwrap();
        scan.set_text(Section::Conditions, "Wavelength", "0.87 0.87 0.87 0.87 0.87").unwrap();
        scan.set_numbers(Section::Orientation, "matrix", RealVector::from(ub().to_row_major().to_vec()))
            .unwrap();
        scan.set_scan_step(0.1);

        index_scan(&mut scan).unwrap();

        let omega = scan.numbers(Section::Angles, "Omega");
        assert_eq!(omega.len(), 5);
        // 第 3 个点为中心
        assert!(close(omega.as_slice()[1] - omega.as_slice()[0], 0.1));
        let two_theta = scan.numbers(Section::Angles, "2Theta");
        assert!(close(omega.as_slice()[2], two_theta.mean() / 2.0));
        assert!(close(scan.numbers(Section::Angles, "Theta").mean(), two_theta.mean() / 2.0));
        assert!(scan.has(Section::Cosines, "S2Z"));
    }

    #[test]
    fn test_index_scan_from_angles() {
        let ub = ub();
        let hkl = [2.0, 1.0, -1.0];
        let a = xyz_to_angles(1.2, hkl_to_xyz(&ub, hkl), f64::NAN).four_circle;

        let mut scan = ScanRecord::new(Arc::new(FieldRegistry::standard()));
        scan.set_text(Section::Intensities, "Detector", "1 2 1").unwrap();
        scan.set_numbers(Section::Angles, "2Theta", RealVector::filled(3, a.two_theta)).unwrap();
        scan.set_numbers(Section::Angles, "Omega", RealVector::filled(3, a.omega)).unwrap();
        scan.set_numbers(Section::Angles, "Chi", RealVector::filled(3, a.chi)).unwrap();
        scan.set_numbers(Section::Angles, "Phi", RealVector::filled(3, a.phi)).unwrap();
        scan.set_numbers(Section::Conditions, "Wavelength", RealVector::filled(3, 1.2)).unwrap();
        scan.set_numbers(Section::Orientation, "matrix", RealVector::from(ub.to_row_major().to_vec()))
            .unwrap();

        index_scan(&mut scan).unwrap();

        assert!(close(scan.miller_index("H"), 2.0));
        assert!(close(scan.miller_index("K"), 1.0));
        assert!(close(scan.miller_index("L"), -1.0));
    }

    #[test]
    fn test_index_scan_without_matrix() {
        let mut scan = ScanRecord::new(Arc::new(FieldRegistry::standard()));
        scan.set_text(Section::Intensities, "Detector", "1 2 1").unwrap();
        scan.set_text(Section::Angles, "Omega", "1 2 3").unwrap();
        index_scan(&mut scan).unwrap();
        assert!(!scan.has(Section::Indices, "H"));
        assert!(!scan.has(Section::Cosines, "S0X"));
    }

    #[test]
    fn test_missing_wavelength_is_error() {
        let mut scan = ScanRecord::new(Arc::new(FieldRegistry::standard()));
        scan.set_text(Section::Intensities, "Detector", "1 2 1").unwrap();
        scan.set_text(Section::Angles, "2Theta", "20 20 20").unwrap();
        scan.set_text(Section::Angles, "Chi", "0 0 0").unwrap();
        scan.set_text(Section::Angles, "Phi", "0 0 0").unwrap();
        scan.set_numbers(Section::Orientation, "matrix", RealVector::from(ub().to_row_major().to_vec()))
            .unwrap();
        assert!(matches!(index_scan(&mut scan), Err(ReduceError::LengthMismatch { .. })));
    }
}
