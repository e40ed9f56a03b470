//! # NICOS .dat 解析器
//!
//! 每个文件一个扫描。单值参数写在头部的 `name_value : x` 行中，
//! 扫描表位于 `### Scan data` 与 `### End` 之间，列名在其后第一行。
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs` 使用
//! - 使用 `parsers/text.rs`

use super::text::{parse_between, parse_near, ParseRule};
use super::{extract_data_from_table, new_scan, HeaderMap, InputFile, ScanExtractor};
use crate::error::Result;
use crate::models::{FieldRegistry, ScanRecord, Section};

use std::sync::Arc;

const HEADER_MAP: &HeaderMap = &[
    (Section::Angles, "Chi1", "chi1"),
    (Section::Angles, "Chi2", "chi2"),
    (Section::Angles, "Gamma", "gamma"),
    (Section::Angles, "2Theta", "twotheta"),
    (Section::Angles, "Nu", "liftingctr"),
    (Section::Angles, "Omega", "omega|sth"),
    (Section::Angles, "Psi", "psi_virtual"),
    (Section::Indices, "H", "h"),
    (Section::Indices, "K", "k"),
    (Section::Indices, "L", "l"),
    (Section::Conditions, "Temperature", "Ts"),
    (Section::Conditions, "Magnetic field", "B"),
    (Section::Conditions, "Electric field", "fug"),
    (Section::Conditions, "Wavelength", "wavelength"),
    // 以下通常只出现在扫描表中
    (Section::Conditions, "Time/step", "timer"),
    (Section::Conditions, "Time/step(+)", "timer_up"),
    (Section::Conditions, "Time/step(-)", "timer_dn"),
    (Section::Intensities, "Detector", "ctr1"),
    (Section::Intensities, "Detector(+)", "ctr1_up"),
    (Section::Intensities, "Detector(-)", "ctr1_dn"),
    (Section::Intensities, "Monitor1", "mon1"),
    (Section::Intensities, "Monitor1(+)", "mon1_up"),
    (Section::Intensities, "Monitor1(-)", "mon1_dn"),
    (Section::Intensities, "Monitor2", "mon2"),
    (Section::Intensities, "Monitor2(+)", "mon2_up"),
    (Section::Intensities, "Monitor2(-)", "mon2_dn"),
    (Section::Polarisation, "Pin", "Pin"),
    (Section::Polarisation, "Pout", "Pout"),
    (Section::Polarisation, "Fin", "Fin"),
    (Section::Polarisation, "Fout", "Fout"),
];

/// NICOS .dat 文件解析器
pub struct NicosExtractor;

impl ScanExtractor for NicosExtractor {
    fn extract(
        &self,
        file: &InputFile,
        file_index: usize,
        registry: &Arc<FieldRegistry>,
    ) -> Result<Vec<ScanRecord>> {
        let lines = file.lines();
        let mut scan = new_scan(file, file_index, registry);

        // 头部单值
        for (section, entry, names) in HEADER_MAP {
            for name in names.split('|') {
                let marker = format!(" {}_value :", name);
                let parsed = parse_near(&marker, ParseRule::Txt, &lines, 0, 1);
                let value = parsed.split(' ').next().unwrap_or("");
                scan.set_text(*section, entry, value)?;
            }
        }

        scan.set_text(
            Section::Conditions,
            "Date & Time",
            &parse_near("### NICOS data file", ParseRule::Date, &lines, 0, 1),
        )?;
        scan.set_text(
            Section::Conditions,
            "Absolute index",
            &parse_near("number", ParseRule::Num, &lines, 0, 1),
        )?;
        scan.set_text(
            Section::Orientation,
            "matrix",
            &parse_near("Sample_rmat", ParseRule::Num, &lines, 0, 1),
        )?;
        scan.set_text(
            Section::Orientation,
            "matrix",
            &parse_near("Sample_ubmatrix", ParseRule::Num, &lines, 0, 1),
        )?;
        scan.set_text(
            Section::ScanData,
            "data",
            &parse_between("### Scan data", "### End", ParseRule::Mult, &lines, 3),
        )?;
        scan.set_text(
            Section::ScanData,
            "headers",
            &parse_near("### Scan data", ParseRule::Txt, &lines, 1, 1),
        )?;

        extract_data_from_table(&mut scan, HEADER_MAP)?;
        select_monitors(&mut scan)?;
        scan.find_and_set_scan_angle();

        Ok(vec![scan])
    }
}

/// 第一监视器全为 0 时改用第二监视器
fn select_monitors(scan: &mut ScanRecord) -> Result<()> {
    let monitor1 = scan.numbers(Section::Intensities, "Monitor1");
    let monitor2 = scan.numbers(Section::Intensities, "Monitor2");
    if monitor1.is_zero() {
        scan.set_numbers(Section::Intensities, "Monitor", monitor2)?;
    } else {
        scan.set_numbers(Section::Intensities, "Monitor", monitor1)?;
    }

    for (source, target) in [("Monitor1(+)", "Monitor(+)"), ("Monitor1(-)", "Monitor(-)")] {
        let monitor = scan.numbers(Section::Intensities, source);
        if !monitor.is_zero() {
            scan.set_numbers(Section::Intensities, target, monitor)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RealVector;

    const NICOS: &str = "### NICOS data file, created at 2017-03-04 09:05:12
### Header copy
#               Sample_ubmatrix : [[0.1, 0, 0], [0, 0.1, 0], [0, 0, 0.1]]
#                      Ts_value : 295.0 K
#              wavelength_value : 1.15 A
#                     Pin_value : +z
#                    Pout_value : +z
#                     Fin_value : on
#                    Fout_value : off
#                        number : 1234
### Scan data
# omega    ctr1   mon1   mon2   timer
# deg      cts    cts    cts    s
   9.9     10     0      900    1.0
   10.0    50     0      905    1.0
   10.1    12     0      910    1.0
### End of NICOS data file
";

    #[test]
    fn test_extract_nicos() {
        let registry = Arc::new(FieldRegistry::standard());
        let file = InputFile::new("/data/p0001.dat", NICOS);
        let scans = NicosExtractor.extract(&file, 0, &registry).unwrap();
        assert_eq!(scans.len(), 1);

        let scan = &scans[0];
        assert_eq!(scan.text(Section::Conditions, "Date & Time").unwrap(), "2017-03-04 09:05");
        assert_eq!(scan.numbers(Section::Conditions, "Absolute index")[0], 1234.0);
        assert_eq!(scan.numbers(Section::Conditions, "Temperature")[0], 295.0);
        assert_eq!(scan.numbers(Section::Conditions, "Wavelength")[0], 1.15);
        assert_eq!(scan.text(Section::Polarisation, "Pin").unwrap(), "+z");
        assert_eq!(scan.text(Section::Polarisation, "Fin").unwrap(), "on");
        assert_eq!(scan.numbers(Section::Orientation, "matrix").len(), 9);
        assert_eq!(
            scan.text(Section::ScanData, "headers").unwrap(),
            "omega ctr1 mon1 mon2 timer"
        );
        assert_eq!(
            scan.numbers(Section::Angles, "Omega"),
            RealVector::from(vec![9.9, 10.0, 10.1])
        );
        assert_eq!(scan.numbers(Section::Conditions, "Time/step").len(), 3);
        assert_eq!(scan.scan_angle(), Some("Omega"));
    }

    #[test]
    fn test_monitor_falls_back_to_second() {
        let registry = Arc::new(FieldRegistry::standard());
        let file = InputFile::new("p0001.dat", NICOS);
        let scans = NicosExtractor.extract(&file, 0, &registry).unwrap();
        assert_eq!(
            scans[0].numbers(Section::Intensities, "Monitor"),
            RealVector::from(vec![900.0, 905.0, 910.0])
        );

        let first_monitor = NICOS.replace("   0      9", "   800    9");
        let file = InputFile::new("p0002.dat", first_monitor);
        let scans = NicosExtractor.extract(&file, 0, &registry).unwrap();
        assert_eq!(scans[0].numbers(Section::Intensities, "Monitor").sum(), 2400.0);
    }
}
