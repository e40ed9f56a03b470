//! # 6T2 (LLB) xml 解析器
//!
//! 每个文件一个扫描，每个扫描点由一组标签给出（`<h>`, `<Omega>`, `<counter>` ...）。
//! 逐个开始标签取其紧随的文本，按 3 位小数追加到对应字段；
//! 无法解析为数字的文本记为 NaN。
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs` 使用
//! - 使用 `regex` 扫描标签

use super::{new_scan, HeaderMap, InputFile, ScanExtractor};
use crate::error::Result;
use crate::models::{FieldRegistry, ScanRecord, Section};

use regex::Regex;
use std::sync::{Arc, LazyLock};

const HEADER_MAP: &HeaderMap = &[
    (Section::Indices, "H", "h"),
    (Section::Indices, "K", "k"),
    (Section::Indices, "L", "l"),
    (Section::Angles, "Gamma", "Gamma"),
    (Section::Angles, "2Theta", "theta2"),
    (Section::Angles, "Nu", "Nu"),
    (Section::Angles, "Omega", "Omega"),
    (Section::Angles, "Phi", "Phi"),
    (Section::Angles, "Chi", "Chi"),
    (Section::Conditions, "Wavelength", "wavelength"),
    (Section::Conditions, "Temperature", "Temperature"),
    (Section::Conditions, "Magnetic field", "magneticField"),
    (Section::Conditions, "Time/step", "totaltimecount"),
    (Section::Conditions, "Time/step(+)", "timeUp"),
    (Section::Conditions, "Time/step(-)", "timeDown"),
    (Section::Intensities, "Detector", "counter"),
    (Section::Intensities, "Detector(+)", "counterUp"),
    (Section::Intensities, "Detector(-)", "counterDown"),
    (Section::Intensities, "Monitor", "totalmonitorcount"),
    (Section::Intensities, "Monitor(+)", "MonitorUpCount"),
    (Section::Intensities, "Monitor(-)", "MonitorDownCount"),
];

/// 开始标签：名称、属性（可能以 `/` 结尾）、随后的文本
static START_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<([A-Za-z_][\w.\-]*)([^<>]*)>([^<]*)").expect("valid tag regex")
});

/// 6T2 xml 文件解析器
pub struct S6t2Extractor;

impl ScanExtractor for S6t2Extractor {
    fn extract(
        &self,
        file: &InputFile,
        file_index: usize,
        registry: &Arc<FieldRegistry>,
    ) -> Result<Vec<ScanRecord>> {
        let mut scan = new_scan(file, file_index, registry);

        for caps in START_TAG_RE.captures_iter(&file.text) {
            let name = &caps[1];
            let self_closing = caps[2].trim_end().ends_with('/');
            let text = if self_closing { "" } else { &caps[3] };

            for (section, entry, tag) in HEADER_MAP {
                if name != *tag {
                    continue;
                }
                let value = text.trim().parse::<f64>().unwrap_or(f64::NAN);
                scan.append_text(*section, entry, &format!("{:.3}", value))?;
            }
        }

        scan.find_and_set_scan_angle();
        Ok(vec![scan])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<data>
 <manip>6T2</manip>
 <point num="1"><h>1</h><k>0</k><l>0</l><Omega>9.9</Omega><Gamma>20.0</Gamma>
  <counter>10</counter><totalmonitorcount>1000</totalmonitorcount><totaltimecount>1.0</totaltimecount></point>
 <point num="2"><h>1</h><k>0</k><l>0</l><Omega>10.0</Omega><Gamma>20.0</Gamma>
  <counter>50</counter><totalmonitorcount>1000</totalmonitorcount><totaltimecount>1.0</totaltimecount></point>
 <point num="3"><h>1</h><k>0</k><l>0</l><Omega>10.1</Omega><Gamma>20.0</Gamma>
  <counter>bad</counter><totalmonitorcount>1000</totalmonitorcount><Temperature/></point>
</data>
"#;

    #[test]
    fn test_extract_6t2() {
        let registry = Arc::new(FieldRegistry::standard());
        let file = InputFile::new("/data/scan.xml", XML);
        let scans = S6t2Extractor.extract(&file, 0, &registry).unwrap();
        let scan = &scans[0];

        assert_eq!(scan.numbers(Section::Angles, "Omega").len(), 3);
        assert_eq!(scan.numbers(Section::Indices, "H").sum(), 3.0);
        assert_eq!(scan.scan_angle(), Some("Omega"));

        let detector = scan.numbers(Section::Intensities, "Detector");
        assert_eq!(detector.len(), 3);
        assert_eq!(detector[1], 50.0);
        assert!(detector[2].is_nan());

        // 空元素同样追加 NaN
        let temperature = scan.numbers(Section::Conditions, "Temperature");
        assert_eq!(temperature.len(), 1);
        assert!(temperature[0].is_nan());
    }
}
