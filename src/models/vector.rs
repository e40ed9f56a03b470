//! # 实数向量
//!
//! 带统计函数的 `f64` 向量，是扫描数据数组的基础类型。
//!
//! ## 功能
//! - 统计量：min / max / sum / sumSqr / mean / range / step
//! - 逐元素运算：开方、按等长向量归一化
//! - 截取 (`mid`)、拼接 (`+`)、去重 (`simplify`)
//! - 与空格分隔文本之间的转换
//!
//! ## 依赖关系
//! - 被 `models/scan.rs`, `reduction/` 使用
//!
//! 空向量上的统计量返回 NaN，而不是中止程序。

use crate::error::{ReduceError, Result};

use std::fmt;
use std::ops::{Add, Index};

/// 实数向量
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RealVector(Vec<f64>);

impl RealVector {
    /// 创建空向量
    pub fn new() -> Self {
        RealVector(Vec::new())
    }

    /// 创建长度为 `len`、元素全为 `value` 的向量
    pub fn filled(len: usize, value: f64) -> Self {
        RealVector(vec![value; len])
    }

    /// 从空白分隔的文本解析，无法解析的记号记为 NaN
    pub fn from_text(text: &str) -> Self {
        RealVector(
            text.split_whitespace()
                .map(|token| token.parse::<f64>().unwrap_or(f64::NAN))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, f64> {
        self.0.iter()
    }

    pub fn push(&mut self, value: f64) {
        self.0.push(value);
    }

    pub fn get(&self, i: usize) -> Option<f64> {
        self.0.get(i).copied()
    }

    // ─────────────────────────────────────────────────────────────
    // 统计量
    // ─────────────────────────────────────────────────────────────

    /// 最小元素
    pub fn min(&self) -> f64 {
        if self.0.is_empty() {
            return f64::NAN;
        }
        self.0.iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// 最大元素
    pub fn max(&self) -> f64 {
        if self.0.is_empty() {
            return f64::NAN;
        }
        self.0.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// 元素之和
    pub fn sum(&self) -> f64 {
        if self.0.is_empty() {
            return f64::NAN;
        }
        self.0.iter().sum()
    }

    /// 元素平方和
    pub fn sum_sqr(&self) -> f64 {
        if self.0.is_empty() {
            return f64::NAN;
        }
        self.0.iter().map(|v| v * v).sum()
    }

    /// 平均值
    pub fn mean(&self) -> f64 {
        if self.0.is_empty() {
            return f64::NAN;
        }
        self.sum() / self.0.len() as f64
    }

    /// max - min
    pub fn range(&self) -> f64 {
        self.max() - self.min()
    }

    /// 相邻元素的平均步长，至少需要两个元素
    pub fn step(&self) -> f64 {
        if self.0.len() < 2 {
            return f64::NAN;
        }
        self.range() / (self.0.len() - 1) as f64
    }

    /// 最大元素第一次出现的位置
    pub fn index_of_max(&self) -> Option<usize> {
        let max = self.max();
        self.0.iter().position(|&v| v == max)
    }

    /// 全部元素为 0 时返回 true；空向量返回 false
    pub fn is_zero(&self) -> bool {
        !self.0.is_empty() && self.0.iter().all(|&v| v == 0.0)
    }

    // ─────────────────────────────────────────────────────────────
    // 逐元素运算
    // ─────────────────────────────────────────────────────────────

    /// 逐元素除以另一个等长向量
    pub fn normalize_by(&self, other: &RealVector) -> Result<Self> {
        if self.len() != other.len() {
            return Err(ReduceError::LengthMismatch {
                what: "element-wise normalization".to_string(),
                left: self.len(),
                right: other.len(),
            });
        }
        Ok(RealVector(
            self.0.iter().zip(other.0.iter()).map(|(a, b)| a / b).collect(),
        ))
    }

    /// 逐元素平方根（负数元素得到 NaN）
    pub fn sqrt(&self) -> Self {
        RealVector(self.0.iter().map(|v| v.sqrt()).collect())
    }

    /// 若所有元素相等则压缩为单元素向量
    pub fn simplify(&self) -> Self {
        match self.0.first() {
            Some(&first) if self.0.windows(2).all(|w| w[0] == w[1]) => RealVector(vec![first]),
            _ => self.clone(),
        }
    }

    /// 从 `pos` 开始截取最多 `len` 个元素，越界部分被裁掉
    pub fn mid(&self, pos: usize, len: usize) -> Self {
        if pos >= self.0.len() {
            return RealVector::new();
        }
        let end = pos.saturating_add(len).min(self.0.len());
        RealVector(self.0[pos..end].to_vec())
    }
}

impl From<Vec<f64>> for RealVector {
    fn from(values: Vec<f64>) -> Self {
        RealVector(values)
    }
}

impl FromIterator<f64> for RealVector {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        RealVector(iter.into_iter().collect())
    }
}

impl Index<usize> for RealVector {
    type Output = f64;

    fn index(&self, i: usize) -> &f64 {
        &self.0[i]
    }
}

impl Add for RealVector {
    type Output = RealVector;

    fn add(mut self, other: RealVector) -> RealVector {
        self.0.extend(other.0);
        self
    }
}

impl fmt::Display for RealVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", v)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statistics() {
        let v = RealVector::from(vec![2.0, 3.0, 1.0, 5.0, 4.0]);
        assert_eq!(v.min(), 1.0);
        assert_eq!(v.max(), 5.0);
        assert_eq!(v.sum(), 15.0);
        assert_eq!(v.mean(), 3.0);
        assert_eq!(v.range(), 4.0);
        assert_eq!(v.step(), 1.0);
        assert_eq!(v.sum_sqr(), 55.0);
        assert_eq!(v.index_of_max(), Some(3));
    }

    #[test]
    fn test_empty_vector_is_nan() {
        let v = RealVector::new();
        assert!(v.mean().is_nan());
        assert!(v.max().is_nan());
        assert!(v.step().is_nan());
        assert!(!v.is_zero());
        assert_eq!(v.index_of_max(), None);
    }

    #[test]
    fn test_from_text() {
        let v = RealVector::from_text("  1.5 -2 3e2\t4 ");
        assert_eq!(v.as_slice(), &[1.5, -2.0, 300.0, 4.0]);
        assert_eq!(v.to_string(), "1.5 -2 300 4");

        let bad = RealVector::from_text("1 abc");
        assert_eq!(bad.len(), 2);
        assert!(bad[1].is_nan());
    }

    #[test]
    fn test_mid_clips_like_slicing() {
        let v = RealVector::from(vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(v.mid(1, 2).as_slice(), &[1.0, 2.0]);
        assert_eq!(v.mid(3, 5).as_slice(), &[3.0]);
        assert!(v.mid(4, 1).is_empty());
        let joined = v.mid(0, 1) + v.mid(3, 1);
        assert_eq!(joined.as_slice(), &[0.0, 3.0]);
    }

    #[test]
    fn test_simplify_and_zero() {
        assert_eq!(RealVector::from(vec![2.0, 2.0, 2.0]).simplify().len(), 1);
        assert_eq!(RealVector::from(vec![2.0, 2.5]).simplify().len(), 2);
        assert!(RealVector::from(vec![0.0, 0.0]).is_zero());
        assert!(!RealVector::from(vec![0.0, 1.0]).is_zero());
    }

    #[test]
    fn test_normalize() {
        let v = RealVector::from(vec![10.0, 20.0]);
        let t = RealVector::from(vec![2.0, 4.0]);
        assert_eq!(v.normalize_by(&t).unwrap().as_slice(), &[5.0, 5.0]);
        assert!(v.normalize_by(&RealVector::from(vec![1.0])).is_err());
    }
}
