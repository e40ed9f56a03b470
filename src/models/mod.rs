//! # 数据模型模块
//!
//! 定义数值基础类型、字段表、扫描记录与扫描集合。
//!
//! ## 依赖关系
//! - 被 `parsers/`, `reduction/`, `export/`, `commands/` 使用
//! - 子模块: vector, matrix, line, registry, scan, collection

pub mod collection;
pub mod line;
pub mod matrix;
pub mod registry;
pub mod scan;
pub mod vector;

pub use collection::ScanCollection;
pub use line::CalibrationLine;
pub use matrix::OrientationMatrix;
pub use registry::{BeamType, FieldKind, FieldRegistry, FieldSpec, Section};
pub use scan::{BeamResults, FieldValue, PlotType, PointWindows, ScanRecord};
pub use vector::RealVector;
