//! # printf 风格格式化
//!
//! 把字段内容（空格分隔的数值或文本）按格式记号渲染为定宽字符串。
//!
//! ## 格式记号
//! - `csv`: 原样输出并追加 `;`
//! - 含 `dd`: 日期时间，如 `yyyy-MM-dd hh:mm`
//! - 含 `s`: 第一个词，`%Ws`
//! - 含 `f`: 平均值，`%W.Pf`
//! - 含 `i`: 四舍五入后的平均值，`%Wd`
//!
//! ## 依赖关系
//! - 被 `models/scan.rs`, `export/table.rs`, `parsers/text.rs` 使用
//! - 使用 `chrono` 校验并格式化日期

use crate::models::registry::DATE_TIME_FORMAT;

use chrono::NaiveDate;

/// 解析后的 printf 记号：宽度与精度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PrintfSpec {
    width: usize,
    precision: Option<usize>,
}

impl PrintfSpec {
    fn parse(token: &str) -> Self {
        let digits: String = token
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        let mut parts = digits.splitn(2, '.');
        let width = parts.next().and_then(|w| w.parse().ok()).unwrap_or(0);
        let precision = parts.next().and_then(|p| p.parse().ok());
        PrintfSpec { width, precision }
    }
}

/// 平均值；无法解析的记号按 0 计
fn mean_of(text: &str) -> f64 {
    let values: Vec<f64> = text
        .split(' ')
        .map(|t| t.parse::<f64>().unwrap_or(0.0))
        .collect();
    values.iter().sum::<f64>() / values.len() as f64
}

/// 与 C printf 一致的非有限值写法
fn non_finite(value: f64) -> Option<&'static str> {
    if value.is_nan() {
        Some("nan")
    } else if value == f64::INFINITY {
        Some("inf")
    } else if value == f64::NEG_INFINITY {
        Some("-inf")
    } else {
        None
    }
}

/// `%W.Pf`
fn printf_float(value: f64, spec: PrintfSpec) -> String {
    let width = spec.width;
    if let Some(s) = non_finite(value) {
        return format!("{:>width$}", s);
    }
    let precision = spec.precision.unwrap_or(6);
    format!("{:>width$.precision$}", value)
}

/// `%Wd`，平均值按 qRound 的方式取整（x.5 向上）
fn printf_int(value: f64, spec: PrintfSpec) -> String {
    let width = spec.width;
    if let Some(s) = non_finite(value) {
        return format!("{:>width$}", s);
    }
    let rounded = (value + 0.5).floor() as i64;
    format!("{:>width$}", rounded)
}

/// Qt 风格的日期记号转换为 strftime 记号
fn strftime_pattern(token: &str) -> String {
    token
        .replace("yyyy", "%Y")
        .replace("MM", "%m")
        .replace("dd", "%d")
        .replace("hh", "%H")
        .replace("mm", "%M")
}

/// 由日期时间文本中的前五个整数（年 月 日 时 分）构造日期并按格式输出
///
/// 数字不足或日期无效时返回空字符串。
fn format_date(text: &str, token: &str) -> String {
    let numbers: Vec<u32> = text
        .split(|c: char| "-/_:. \t".contains(c))
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect();

    let date_time = match numbers.as_slice() {
        [year, month, day, hour, minute, ..] => i32::try_from(*year)
            .ok()
            .and_then(|year| NaiveDate::from_ymd_opt(year, *month, *day))
            .and_then(|date| date.and_hms_opt(*hour, *minute, 0)),
        _ => None,
    };

    match date_time {
        Some(date_time) => date_time.format(&strftime_pattern(token)).to_string(),
        None => {
            log::warn!("invalid date '{}'", text);
            String::new()
        }
    }
}

/// 按格式记号渲染字段内容
pub fn format_string(text: &str, token: &str) -> String {
    if text.is_empty() || token.is_empty() {
        return text.to_string();
    }
    if token.contains("csv") {
        return format!("{};", text);
    }
    if token.contains("dd") {
        return format_date(text, token);
    }
    let spec = PrintfSpec::parse(token);
    if token.contains('s') {
        let width = spec.width;
        let first = text.split(' ').next().unwrap_or("");
        format!("{:>width$}", first)
    } else if token.contains('f') {
        printf_float(mean_of(text), spec)
    } else if token.contains('i') {
        printf_int(mean_of(text), spec)
    } else {
        text.to_string()
    }
}

/// 表头文本：在记号宽度内右对齐，超长时截到 `width - 1` 个字符
pub fn format_string_to_text(header: &str, token: &str) -> String {
    if header.is_empty() || token.is_empty() {
        return header.to_string();
    }
    if token.contains("csv") {
        return format!("{};", header);
    }
    if token.contains("dd") {
        let width = token.chars().count();
        return format!("{:>width$}", header);
    }
    if token.contains('s') || token.contains('f') || token.contains('i') {
        let width = PrintfSpec::parse(token).width;
        let cut: String = if width == 0 {
            header.to_string()
        } else {
            header.chars().take(width - 1).collect()
        };
        return format!("{:>width$}", cut);
    }
    log::warn!("unknown format token '{}'", token);
    header.to_string()
}

/// 浮点字段的取值范围 `min - max`；变化很小时退化为单值
pub fn format_range(text: &str, token: &str) -> String {
    if !token.contains('f') || text.is_empty() {
        return format_string(text, token);
    }
    let values: Vec<f64> = text
        .split(' ')
        .map(|t| t.parse::<f64>().unwrap_or(0.0))
        .collect();
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if (max / min).abs() < 1.01 || (max - min) < 0.01 {
        return format_string(text, token);
    }
    let spec = PrintfSpec::parse(token);
    format!("{} - {}", printf_float(min, spec), printf_float(max, spec))
}

/// 默认日期格式下的日期渲染
pub fn format_date_time(text: &str) -> String {
    format_date(text, DATE_TIME_FORMAT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_rounding() {
        assert_eq!(format_string("3.456", "0.2f"), "3.46");
        assert_eq!(format_string("1 2 3 4", "8.3f"), "   2.500");
        assert_eq!(format_string("nan", "8.2f"), "     nan");
    }

    #[test]
    fn test_integer_and_string() {
        assert_eq!(format_string("2.5", "4i"), "   3");
        assert_eq!(format_string("-1.2 -0.8", "4i"), "  -1");
        assert_eq!(format_string("+z -z", "s"), "+z");
        assert_eq!(format_string("abc def", "5s"), "  abc");
    }

    #[test]
    fn test_csv_and_empty() {
        assert_eq!(format_string("1 2 3", "csv"), "1 2 3;");
        assert_eq!(format_string("1 2 3", ""), "1 2 3");
        assert_eq!(format_string("", "0.2f"), "");
    }

    #[test]
    fn test_date() {
        assert_eq!(format_date_time("2017 3 4 9 5 12"), "2017-03-04 09:05");
        assert_eq!(format_string("2017-03-04 09:05", DATE_TIME_FORMAT), "2017-03-04 09:05");
        assert_eq!(format_date_time("2017 3"), "");
    }

    #[test]
    fn test_invalid_date_is_empty() {
        assert_eq!(format_date_time("2017 13 45 27 99"), "");
        assert_eq!(format_date_time("2017 3 4 24 0"), "");
        assert_eq!(format_date_time("2016 2 29 23 59"), "2016-02-29 23:59");
        assert_eq!(format_date_time("2017 2 29 12 0"), "");
    }

    #[test]
    fn test_header_text() {
        assert_eq!(format_string_to_text("Sf2Err", "8.2f"), "  Sf2Err");
        assert_eq!(format_string_to_text("Temperature", "7.1f"), " Temper");
        assert_eq!(format_string_to_text("H", "4i"), "   H");
        assert_eq!(format_string_to_text("H", "csv"), "H;");
    }

    #[test]
    fn test_range() {
        assert_eq!(format_range("1 2 3", "0.2f"), "1.00 - 3.00");
        assert_eq!(format_range("10.0 10.04", "0.2f"), "10.02");
        assert_eq!(format_range("1 2 3", "i"), "2");
    }
}
