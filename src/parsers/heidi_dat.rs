//! # HEiDi DIF4 .dat 解析器
//!
//! 每个反射占一段：一行参数（H K L ... Psi 点数 时间 ... 温度），
//! 一行扫描参数（第 4 个字段为步长），随后是定宽的计数块。
//!
//! ## 格式说明
//! ```text
//!    1   0   0   ...  psi  npts  time  ...  temp
//!    ...  ...  ...  step
//!   1203 1187 ...          (探测器计数块，每值 5 字符，每行 16 个)
//!   5000 5000 ...          (监视器计数块)
//! ```
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs` 使用
//! - 使用 `parsers/text.rs`

use super::text::{lines_at, number_after_text, parse, parse_near, split_text, ParseRule};
use super::{extract_data_from_table, new_scan, HeaderMap, InputFile, ScanExtractor};
use crate::error::Result;
use crate::models::{FieldRegistry, ScanRecord, Section};

use std::sync::Arc;

const HEADER_LINES: usize = 7;
const VALUES_PER_LINE: usize = 16;
const CHARS_PER_VALUE: usize = 5;
const BLOCKS_PER_DATA: usize = 2;
const LINES_TO_SKIP: usize = 2;

const HEADER_MAP: &HeaderMap = &[
    (Section::Intensities, "Detector", "Detector"),
    (Section::Intensities, "Monitor", "Monitor"),
];

/// HEiDi .dat 文件解析器
pub struct HeidiDatExtractor;

impl ScanExtractor for HeidiDatExtractor {
    fn extract(
        &self,
        file: &InputFile,
        file_index: usize,
        registry: &Arc<FieldRegistry>,
    ) -> Result<Vec<ScanRecord>> {
        let lines = file.lines();
        let wavelength = number_after_text("Wave=", &lines);
        let matrix = parse_near("Omat=", ParseRule::Num, &lines, 0, 3);

        let mut scans = Vec::new();
        let mut i = HEADER_LINES;
        while i < lines.len() {
            if lines[i].is_empty() {
                i += 1;
                continue;
            }
            let fields: Vec<&str> = lines[i].split_whitespace().collect();
            if fields.len() <= 10 {
                log::debug!("{}:{}: short reflection line skipped", file.path.display(), i + 1);
                i += 1;
                continue;
            }

            let mut scan = new_scan(file, file_index, registry);
            scan.set_text(Section::Conditions, "Wavelength", &wavelength)?;
            scan.set_text(Section::Orientation, "matrix", &matrix)?;

            scan.set_text(Section::Indices, "H", fields[0])?;
            scan.set_text(Section::Indices, "K", fields[1])?;
            scan.set_text(Section::Indices, "L", fields[2])?;
            scan.set_text(Section::Angles, "Psi", fields[6])?;
            if let Ok(time) = fields[8].parse::<f64>() {
                scan.set_number(Section::Conditions, "Time/step", time / 10.0)?;
            }
            scan.set_text(Section::Conditions, "Temperature", fields[10])?;

            let values_per_block: usize = fields[7].parse().unwrap_or(0);

            if let Some(next) = lines.get(i + 1) {
                if let Some(step) = next.split_whitespace().nth(3) {
                    scan.set_scan_step(step.parse().unwrap_or(f64::NAN));
                }
            }

            scan.set_scan_angle("Omega");
            scan.set_text(Section::ScanData, "headers", "Detector Monitor")?;

            let data_lines = (values_per_block as f64 / VALUES_PER_LINE as f64
                * BLOCKS_PER_DATA as f64)
                .ceil() as usize;
            let end = i + LINES_TO_SKIP + data_lines - 1;

            if end < lines.len() {
                let raw = parse(&lines_at(i, &lines, LINES_TO_SKIP, data_lines), ParseRule::Raw, "");
                let table = split_text(&raw, CHARS_PER_VALUE, BLOCKS_PER_DATA);
                scan.set_text(Section::ScanData, "data", &table)?;
                extract_data_from_table(&mut scan, HEADER_MAP)?;

                let line_numbers: Vec<String> =
                    (i + LINES_TO_SKIP..=end).map(|k| k.to_string()).collect();
                scan.set_text(Section::Misc, "lines", &line_numbers.join(" "))?;

                scans.push(scan);
            }

            i = end + 1;
        }
        Ok(scans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RealVector;

    const HEADER: &str = "   HEiDi   Rev HEIDI/FRM2
Sample  Wave= 0.7930 A
Omat=  0.10000  0.00000  0.00000
       0.00000  0.10000  0.00000
       0.00000  0.00000  0.10000
header line 6
header line 7
";

    // 4 个点：探测器与监视器计数连续排列，每值 5 字符
    const REFLECTION_100: &str = "   1   0   0  0  0  0  12.5     4   20.0  0  295.0
   1.0  2.0  3.0  0.05
  100  300  500  200 1000 1000 1000 1000
";

    const REFLECTION_010: &str = "   0   1   0  0  0  0   3.0     3   10.0  0  295.0
   1.0  2.0  3.0  0.10
   10   20   30  500  500  500
";

    #[test]
    fn test_extract_heidi_dat() {
        let registry = Arc::new(FieldRegistry::standard());
        let file = InputFile::new("/data/heidi.dat", format!("{}{}{}", HEADER, REFLECTION_100, REFLECTION_010));
        let scans = HeidiDatExtractor.extract(&file, 0, &registry).unwrap();
        assert_eq!(scans.len(), 2);

        let scan = &scans[0];
        assert_eq!(scan.file_index(), 1);
        assert_eq!(scan.scan_angle(), Some("Omega"));
        assert!((scan.scan_step() - 0.05).abs() < 1e-12);
        assert_eq!(scan.miller_index("H"), 1.0);
        assert!((scan.numbers(Section::Conditions, "Wavelength")[0] - 0.793).abs() < 1e-12);
        assert_eq!(scan.numbers(Section::Conditions, "Time/step")[0], 2.0);
        assert_eq!(scan.numbers(Section::Angles, "Psi")[0], 12.5);
        assert_eq!(scan.numbers(Section::Orientation, "matrix").len(), 9);
        assert_eq!(
            scan.numbers(Section::Intensities, "Detector"),
            RealVector::from(vec![100.0, 300.0, 500.0, 200.0])
        );
        assert_eq!(scan.numbers(Section::Intensities, "Monitor").sum(), 4000.0);
        assert_eq!(scan.numbers(Section::Misc, "lines"), RealVector::from(vec![9.0]));
        assert_eq!(scan.num_points(), 4);

        let second = &scans[1];
        assert_eq!(second.miller_index("K"), 1.0);
        assert_eq!(
            second.numbers(Section::Intensities, "Detector"),
            RealVector::from(vec![10.0, 20.0, 30.0])
        );
        assert_eq!(second.scan_line(), 13);
    }

    #[test]
    fn test_truncated_block_is_dropped() {
        let registry = Arc::new(FieldRegistry::standard());
        // 数据行缺失
        let text = format!("{}{}", HEADER, "   1   0   0  0  0  0  12.5     4   20.0  0  295.0\n   1.0  2.0  3.0  0.05");
        let file = InputFile::new("heidi.dat", text);
        let scans = HeidiDatExtractor.extract(&file, 0, &registry).unwrap();
        assert!(scans.is_empty());
    }
}
