//! # HEiDi DIF4 日志解析器
//!
//! 日志按命令顺序记录：波长与每步时间在出现后一直沿用，
//! 取向矩阵有两种写法（`ro/rc/ol/pm` 后的 `Orienting matrix` 与 `mr` 后的
//! `Refined orienting matrix`），每个 `ss` 命令产生一个 `Scan centre =` 数据块。
//!
//! ## 格式说明
//! ```text
//!  Wavelength [0.79350] ?
//!  Time/step :   1.00 sec ?
//!  Scan centre =   20.000  10.000   0.000   0.000
//!  ...
//!  2Theta  Omega  Chi  Phi  Idet  Imon | ...
//!  ...
//!  20.00   9.90  0.00 0.00   12   1000 | *
//!  Centre at point ...
//! ```
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs` 使用

use super::text::simplify;
use super::{extract_data_from_table, new_scan, HeaderMap, InputFile, ScanExtractor};
use crate::error::Result;
use crate::models::{FieldRegistry, ScanRecord, Section};

use std::sync::Arc;

const HEADER_MAP: &HeaderMap = &[
    (Section::Angles, "2Theta", "2Theta"),
    (Section::Angles, "Omega", "Omega"),
    (Section::Angles, "Phi", "Phi"),
    (Section::Angles, "Chi", "Chi"),
    (Section::Intensities, "Detector", "Idet"),
    (Section::Intensities, "Monitor", "Imon"),
];

/// 按非数字字符切分后的数字记号
fn numeric_tokens(line: &str) -> Vec<&str> {
    line.split(|c: char| !(c.is_ascii_digit() || c == '-' || c == '.'))
        .filter(|s| !s.is_empty())
        .collect()
}

/// 非数字字符替换为空格
fn numeric_only(line: &str) -> String {
    line.chars()
        .map(|c| if c.is_ascii_digit() || c == '-' || c == '.' { c } else { ' ' })
        .collect()
}

/// HEiDi 日志解析器
pub struct HeidiLogExtractor;

impl ScanExtractor for HeidiLogExtractor {
    fn extract(
        &self,
        file: &InputFile,
        file_index: usize,
        registry: &Arc<FieldRegistry>,
    ) -> Result<Vec<ScanRecord>> {
        let lines = file.lines();
        let mut scans = Vec::new();

        let mut wavelength = String::from("1");
        let mut time_per_step = String::from("1");
        let mut matrix = String::new();

        let mut i = 0;
        while i < lines.len() {
            let line = simplify(lines[i]);

            if line.starts_with("Wavelength") {
                if let Some(last) = numeric_tokens(lines[i]).last() {
                    wavelength = last.to_string();
                }
            }

            if line.starts_with("Time/step :") {
                if let Some(last) = numeric_tokens(lines[i]).last() {
                    time_per_step = last.to_string();
                }
            }

            if line.starts_with("Orienting") {
                if i + 2 >= lines.len() {
                    break;
                }
                matrix = (i..i + 3)
                    .map(|k| numeric_only(lines[k]))
                    .collect::<Vec<_>>()
                    .join(" ");
                i += 3;
                continue;
            }

            if line.starts_with("Refined orienting matrix") {
                if i + 3 >= lines.len() {
                    break;
                }
                matrix = lines[i + 1..i + 4].join(" ");
                i += 4;
                continue;
            }

            if line.starts_with("Scan centre =") {
                let mut scan = new_scan(file, file_index, registry);
                scan.set_text(Section::Conditions, "Wavelength", &wavelength)?;
                scan.set_text(Section::Conditions, "Time/step", &time_per_step)?;
                scan.set_text(Section::Orientation, "matrix", &matrix)?;

                let centre = numeric_tokens(lines[i]);
                for (k, name) in ["2Theta", "Omega", "Chi", "Phi"].iter().enumerate() {
                    if let Some(value) = centre.get(k) {
                        scan.set_text(Section::Angles, name, value)?;
                    }
                }

                let Some(headers) = lines.get(i + 2) else {
                    break;
                };
                let headers = headers.split('|').next().unwrap_or("");
                scan.set_text(Section::ScanData, "headers", headers)?;

                // 数据表从 +4 行开始，到 `Centre at point` 或 `#` 结束
                let mut data = String::new();
                let mut line_numbers = Vec::new();
                let mut k = i + 4;
                while let Some(row) = lines.get(k) {
                    let simplified = simplify(row);
                    if simplified.starts_with("Centre at point") || simplified.starts_with('#') {
                        break;
                    }
                    if let Some(cut) = row.find(|c| c == '|' || c == '+') {
                        data.push_str(&row[..cut]);
                        data.push('\n');
                        line_numbers.push(k.to_string());
                    }
                    k += 1;
                }

                scan.set_text(Section::ScanData, "data", &data)?;
                scan.set_text(Section::Misc, "lines", &line_numbers.join(" "))?;
                extract_data_from_table(&mut scan, HEADER_MAP)?;
                scan.find_and_set_scan_angle();
                scans.push(scan);

                i = k;
                continue;
            }

            i += 1;
        }
        Ok(scans)
    }
}
