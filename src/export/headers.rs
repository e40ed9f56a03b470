//! # 输出格式的列定义
//!
//! 每种输出格式给出列名与格式记号，以及文件扩展名。
//! `general` 输出输出表的全部列（`csv` 记号），其余格式为固定列。
//!
//! ## 依赖关系
//! - 被 `export/table.rs`, `commands/reduce.rs` 使用

use std::fmt;

/// 输出文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// 通用分号分隔表
    General,
    /// ShelX，指数为整数
    ShelxInteger,
    /// ShelX，指数为实数
    ShelxReal,
    /// TBAR/D9
    Tbar,
    /// UMWEG
    Umweg,
    /// CCSL 翻转比
    Ccsl,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::General => "csv",
            OutputFormat::ShelxInteger | OutputFormat::ShelxReal => "hkl",
            OutputFormat::Tbar => "tb",
            OutputFormat::Umweg => "obs",
            OutputFormat::Ccsl => "fli",
        }
    }

    /// 是否总是写表头
    pub fn always_header(&self) -> bool {
        matches!(self, OutputFormat::General)
    }

    /// (列名, 格式记号)；`general` 由输出表的表头决定
    pub fn columns(&self, table_headers: &[String]) -> Vec<(String, String)> {
        let fixed: &[(&str, &str)] = match self {
            OutputFormat::General => {
                return table_headers
                    .iter()
                    .map(|h| (h.clone(), "csv".to_string()))
                    .collect();
            }
            OutputFormat::ShelxReal => &[
                ("H", "8.3f"),
                ("K", "8.3f"),
                ("L", "8.3f"),
                ("Sf2", "8.2f"),
                ("Sf2Err", "8.2f"),
                ("Batch", "4i"),
                ("S0X", "8.5f"),
                ("S2X", "8.5f"),
                ("S0Y", "8.5f"),
                ("S2Y", "8.5f"),
                ("S0Z", "8.5f"),
                ("S2Z", "8.5f"),
            ],
            OutputFormat::ShelxInteger => &[
                ("H", "4i"),
                ("K", "4i"),
                ("L", "4i"),
                ("Sf2", "8.2f"),
                ("Sf2Err", "8.2f"),
                ("Batch", "4i"),
                ("S0X", "8.5f"),
                ("S2X", "8.5f"),
                ("S0Y", "8.5f"),
                ("S2Y", "8.5f"),
                ("S0Z", "8.5f"),
                ("S2Z", "8.5f"),
            ],
            OutputFormat::Tbar => &[
                ("Scan", "6i"),
                ("H", "4i"),
                ("K", "4i"),
                ("L", "4i"),
                ("Sf2", "10.2f"),
                ("Sf2Err", "10.2f"),
                ("Theta", "8.2f"),
                ("Omega", "8.2f"),
                ("Chi", "8.2f"),
                ("Phi", "8.2f"),
                ("Temperature", "10.2f"),
                ("Psi", "12.2f"),
                ("Fwhm", "13.4f"),
            ],
            OutputFormat::Umweg => &[
                ("H", "4i"),
                ("K", "4i"),
                ("L", "4i"),
                ("Theta", "8.2f"),
                ("Psi", "8.2f"),
                ("Sf2", "10.2f"),
            ],
            OutputFormat::Ccsl => &[
                ("Scan", "5i"),
                ("H", "5i"),
                ("K", "5i"),
                ("L", "5i"),
                ("Omega", "8.2f"),
                ("Gamma", "8.2f"),
                ("Nu", "8.2f"),
                ("FR", "10.6f"),
                ("FRerr", "10.6f"),
                ("|FR-1|/FRerr", "8.2f"),
                ("Temperature", "7.1f"),
                ("Magnetic field", "5.1f"),
            ],
        };
        fixed
            .iter()
            .map(|(name, token)| (name.to_string(), token.to_string()))
            .collect()
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutputFormat::General => "General comma-separated, real",
            OutputFormat::ShelxInteger => "ShelX with direction cosines, integer",
            OutputFormat::ShelxReal => "ShelX with direction cosines, real",
            OutputFormat::Tbar => "TBAR/D9, integer",
            OutputFormat::Umweg => "UMWEG, integer",
            OutputFormat::Ccsl => "CCSL flipping ratios, integer",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns() {
        let headers = vec!["Scan".to_string(), "H".to_string()];
        let general = OutputFormat::General.columns(&headers);
        assert_eq!(general, vec![("Scan".to_string(), "csv".to_string()), ("H".to_string(), "csv".to_string())]);

        let shelx = OutputFormat::ShelxInteger.columns(&headers);
        assert_eq!(shelx.len(), 12);
        assert_eq!(shelx[0].1, "4i");
        assert_eq!(OutputFormat::ShelxReal.columns(&headers)[0].1, "8.3f");
        assert_eq!(OutputFormat::Ccsl.columns(&headers)[9].0, "|FR-1|/FRerr");
        assert_eq!(OutputFormat::Umweg.extension(), "obs");
    }
}
