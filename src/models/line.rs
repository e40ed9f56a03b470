//! # 两点标定直线
//!
//! 通过两个带误差的点 (x1, y1), (x2, y2) 的直线。
//! 用于 FWHM 计算：在半高处反解 x，并传播 x、y 两个方向的不确定度。
//!
//! ## 依赖关系
//! - 被 `reduction/integrate.rs` 使用

/// 带不确定度的两点直线
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationLine {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub esd_x1: f64,
    pub esd_y1: f64,
    pub esd_x2: f64,
    pub esd_y2: f64,
}

impl CalibrationLine {
    /// 由两个端点 `(x, y, esd_x, esd_y)` 构造
    pub fn new(p1: (f64, f64, f64, f64), p2: (f64, f64, f64, f64)) -> Self {
        CalibrationLine {
            x1: p1.0,
            y1: p1.1,
            esd_x1: p1.2,
            esd_y1: p1.3,
            x2: p2.0,
            y2: p2.1,
            esd_x2: p2.2,
            esd_y2: p2.3,
        }
    }

    /// 给定 y 反解 x；水平线时返回 x1
    pub fn x_for_y(&self, y: f64) -> f64 {
        if self.y2 == self.y1 {
            return self.x1;
        }
        (y - self.y2) * (self.x2 - self.x1) / (self.y2 - self.y1) + self.x2
    }

    /// 在 y 处按两端点线性插值得到的 y 不确定度
    pub fn esd_y_for_y(&self, y: f64) -> f64 {
        if self.y2 == self.y1 {
            return self.esd_y1;
        }
        let dy = self.y2 - self.y1;
        (self.esd_y1.powi(2) * (self.y2 - y) / dy + self.esd_y2.powi(2) * (y - self.y1) / dy).sqrt()
    }

    /// 反解得到的 x 的不确定度（对五个输入量做一阶误差传播）
    pub fn esd_x_for_y(&self, y: f64, esd_y: f64) -> f64 {
        if self.y2 == self.y1 {
            return self.esd_x1;
        }
        let dy = self.y2 - self.y1;
        let dx = self.x2 - self.x1;

        let d_f_y = dx / dy;
        let d_f_x1 = -(y - self.y2) / dy;
        let d_f_x2 = (y - self.y1) / dy;
        let d_f_y1 = (y - self.y2) * dx / dy.powi(2);
        let d_f_y2 = -(y - self.y1) * dx / dy.powi(2);

        ((d_f_y * esd_y).powi(2)
            + (d_f_x1 * self.esd_x1).powi(2)
            + (d_f_x2 * self.esd_x2).powi(2)
            + (d_f_y1 * self.esd_y1).powi(2)
            + (d_f_y2 * self.esd_y2).powi(2))
        .sqrt()
    }
}
