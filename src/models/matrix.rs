//! # 取向矩阵 (UB)
//!
//! 固定 3×3 实矩阵，按行存储，提供行列式、逆、转置与按行/列归一化。
//!
//! ## 依赖关系
//! - 被 `models/scan.rs`, `reduction/indexer.rs` 使用

use crate::error::{ReduceError, Result};
use crate::models::RealVector;

use std::ops::Mul;

/// 3×3 取向矩阵，`m[行][列]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationMatrix {
    pub m: [[f64; 3]; 3],
}

impl Default for OrientationMatrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl OrientationMatrix {
    pub fn identity() -> Self {
        OrientationMatrix {
            m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    /// 由按行排列的 9 个数构造
    pub fn from_row_major(values: [f64; 9]) -> Self {
        let mut m = [[0.0; 3]; 3];
        for (k, v) in values.iter().enumerate() {
            m[k / 3][k % 3] = *v;
        }
        OrientationMatrix { m }
    }

    /// 由向量的前 9 个元素构造，不足 9 个时补 0
    pub fn from_vector(v: &RealVector) -> Self {
        let mut values = [0.0; 9];
        for (slot, x) in values.iter_mut().zip(v.iter()) {
            *slot = *x;
        }
        Self::from_row_major(values)
    }

    /// 按行展开为 9 元数组
    pub fn to_row_major(&self) -> [f64; 9] {
        let mut out = [0.0; 9];
        for (k, slot) in out.iter_mut().enumerate() {
            *slot = self.m[k / 3][k % 3];
        }
        out
    }

    /// 行列式
    pub fn det(&self) -> f64 {
        let m = &self.m;
        m[0][0] * (m[1][1] * m[2][2] - m[2][1] * m[1][2])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    }

    /// 转置
    pub fn transpose(&self) -> Self {
        let m = &self.m;
        OrientationMatrix {
            m: [
                [m[0][0], m[1][0], m[2][0]],
                [m[0][1], m[1][1], m[2][1]],
                [m[0][2], m[1][2], m[2][2]],
            ],
        }
    }

    /// 逆矩阵，仅在行列式非零时定义
    pub fn inverse(&self) -> Result<Self> {
        let d = self.det();
        if d == 0.0 {
            return Err(ReduceError::SingularMatrix);
        }
        let m = &self.m;
        Ok(OrientationMatrix {
            m: [
                [
                    (m[1][1] * m[2][2] - m[2][1] * m[1][2]) / d,
                    (m[0][2] * m[2][1] - m[0][1] * m[2][2]) / d,
                    (m[0][1] * m[1][2] - m[0][2] * m[1][1]) / d,
                ],
                [
                    (m[1][2] * m[2][0] - m[1][0] * m[2][2]) / d,
                    (m[0][0] * m[2][2] - m[0][2] * m[2][0]) / d,
                    (m[1][0] * m[0][2] - m[0][0] * m[1][2]) / d,
                ],
                [
                    (m[1][0] * m[2][1] - m[2][0] * m[1][1]) / d,
                    (m[2][0] * m[0][1] - m[0][0] * m[2][1]) / d,
                    (m[0][0] * m[1][1] - m[1][0] * m[0][1]) / d,
                ],
            ],
        })
    }

    /// 每一行除以该行的模
    pub fn norm_rows(&self) -> Result<Self> {
        let mut out = self.m;
        for row in out.iter_mut() {
            let norm = (row[0] * row[0] + row[1] * row[1] + row[2] * row[2]).sqrt();
            if norm == 0.0 {
                return Err(ReduceError::SingularMatrix);
            }
            for x in row.iter_mut() {
                *x /= norm;
            }
        }
        Ok(OrientationMatrix { m: out })
    }


    /// 矩阵乘以列向量
    pub fn apply(&self, v: [f64; 3]) -> [f64; 3] {
        let m = &self.m;
        [
            m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
            m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
            m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
        ]
    }
}

impl Mul for OrientationMatrix {
    type Output = OrientationMatrix;

    fn mul(self, rhs: OrientationMatrix) -> OrientationMatrix {
        let mut m = [[0.0; 3]; 3];
        for (i, row) in m.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = (0..3).map(|k| self.m[i][k] * rhs.m[k][j]).sum();
            }
        }
        OrientationMatrix { m }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> OrientationMatrix {
        OrientationMatrix::from_row_major([2.0, 1.0, -2.0, 3.0, 2.0, 4.0, 2.0, 1.0, -1.0])
    }

    #[test]
    fn test_det_and_inverse() {
        let m = sample();
        assert!((m.det() - 1.0).abs() < 1e-12);

        let inv = m.inverse().unwrap();
        let expected = [-6.0, -1.0, 8.0, 11.0, 2.0, -14.0, -1.0, 0.0, 1.0];
        for (a, b) in inv.to_row_major().iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-9);
        }

        let product = m * inv;
        let identity = OrientationMatrix::identity();
        for (a, b) in product.to_row_major().iter().zip(identity.to_row_major().iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_singular_matrix() {
        let m = OrientationMatrix::from_row_major([1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 0.0, 0.0, 1.0]);
        assert!(matches!(m.inverse(), Err(ReduceError::SingularMatrix)));
    }

    #[test]
    fn test_transpose_and_norm_rows() {
        let m = sample();
        let t = m.transpose();
        assert_eq!(t.m[0], [2.0, 3.0, 2.0]);
        assert_eq!(t.transpose(), m);

        let n = OrientationMatrix::from_row_major([3.0, 4.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 5.0])
            .norm_rows()
            .unwrap();
        assert!((n.m[0][0] - 0.6).abs() < 1e-12);
        assert!((n.m[0][1] - 0.8).abs() < 1e-12);
        assert!((n.m[1][1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_from_short_vector_pads_zero() {
        let m = OrientationMatrix::from_vector(&RealVector::from(vec![1.0, 2.0]));
        assert_eq!(m.to_row_major(), [1.0, 2.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(OrientationMatrix::default(), OrientationMatrix::identity());
    }
}
