//! # 文本扫描工具
//!
//! 仪器文件解析的公共工具：按标记查找行、截取行段、
//! 按规则清洗文本、定宽列切分、查找标记后的数字。
//!
//! ## 依赖关系
//! - 被 `parsers/` 下各格式解析器使用
//! - 使用 `regex`

use crate::export::format::format_date_time;

use regex::Regex;
use std::sync::LazyLock;

/// 文本清洗规则
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseRule {
    /// 提取所有数字，空格连接
    Num,
    /// 去掉标记文本与 `#;,=><`，合并空白
    Txt,
    /// 去掉换行
    Raw,
    /// 数据表：只保留数字、负号、小数点与空白
    Mult,
    /// 日期时间
    Date,
}

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([-+]?\d+[\.]?\d*[eE]?[-+]?\d*)").expect("valid number regex")
});

static TXT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[#;,=><]").expect("valid txt regex"));

static MULT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^-.0-9\s]").expect("valid mult regex"));

static SPACES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" +").expect("valid spaces regex"));

/// 首尾去空白并把内部连续空白合并为一个空格
pub fn simplify(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 从 `from` 开始第一个包含 `text` 的行号
pub fn index_of_text(text: &str, lines: &[&str], from: usize) -> Option<usize> {
    lines
        .iter()
        .enumerate()
        .skip(from)
        .find(|(_, line)| line.contains(text))
        .map(|(i, _)| i)
}

/// 行 `[index + skip, index + skip + grab)`，以换行连接；越界时为空
pub fn lines_at(index: usize, lines: &[&str], skip: usize, grab: usize) -> String {
    let from = index + skip;
    let to = from + grab;
    if to > lines.len() {
        return String::new();
    }
    lines[from..to].join("\n")
}

/// 从第一个包含 `text` 的行开始截取
pub fn lines_near(text: &str, lines: &[&str], skip: usize, grab: usize) -> String {
    match index_of_text(text, lines, 0) {
        Some(index) => lines_at(index, lines, skip, grab),
        None => String::new(),
    }
}

/// 从包含 `text_from` 的行（加 `skip`）到包含 `text_to` 的行（不含）
pub fn lines_between(text_from: &str, text_to: &str, lines: &[&str], skip: usize) -> String {
    let from = index_of_text(text_from, lines, 0).map(|i| i + skip);
    let to = index_of_text(text_to, lines, 0);
    match (from, to) {
        (Some(from), Some(to)) if from <= to => lines[from..to].join("\n"),
        _ => String::new(),
    }
}

/// 按规则清洗文本，`delimiter` 为需要去掉的标记文本
pub fn parse(text: &str, rule: ParseRule, delimiter: &str) -> String {
    match rule {
        ParseRule::Num => NUMBER_RE
            .find_iter(text)
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(" "),
        ParseRule::Txt => {
            let removed = remove_delimiter(text, delimiter);
            simplify(&TXT_RE.replace_all(&removed, " "))
        }
        ParseRule::Raw => text.replace('\n', ""),
        ParseRule::Mult => {
            let tabs = text.replace('\t', " ");
            let cleaned = MULT_RE.replace_all(&tabs, "");
            SPACES_RE.replace_all(&cleaned, " ").into_owned()
        }
        ParseRule::Date => {
            let removed = remove_delimiter(text, delimiter);
            let digits: String = removed
                .chars()
                .map(|c| if c.is_ascii_digit() { c } else { ' ' })
                .collect();
            format_date_time(&simplify(&digits))
        }
    }
}

fn remove_delimiter(text: &str, delimiter: &str) -> String {
    if delimiter.is_empty() {
        text.to_string()
    } else {
        text.replace(delimiter, "")
    }
}

/// 查找标记行并按规则清洗，标记文本本身被去掉
pub fn parse_near(text: &str, rule: ParseRule, lines: &[&str], skip: usize, grab: usize) -> String {
    parse(&lines_near(text, lines, skip, grab), rule, text)
}

/// 截取两个标记之间的行并按规则清洗
pub fn parse_between(
    text_from: &str,
    text_to: &str,
    rule: ParseRule,
    lines: &[&str],
    skip: usize,
) -> String {
    parse(&lines_between(text_from, text_to, lines, skip), rule, "")
}

/// 把定宽字符块按列优先重新排成表格
///
/// 文本被视为 `n_columns` 个连续的块，每块由 `n_chars` 宽的值组成；
/// 输出每行包含各块的第 j 个值。
pub fn split_text(text: &str, n_chars: usize, n_columns: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if n_chars == 0 || n_columns == 0 {
        return String::new();
    }
    let n_chunks = chars.len() / (n_chars * n_columns);
    let chunk = |pos: usize| -> String {
        let end = (pos + n_chars).min(chars.len());
        chars.get(pos..end).map(|c| c.iter().collect()).unwrap_or_default()
    };
    (0..n_chunks)
        .map(|j| {
            let row: Vec<String> = (0..n_columns)
                .map(|i| chunk(n_chars * (i * n_chunks + j)))
                .collect();
            simplify(&row.join(" "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// 紧跟在标记文本之后的数字，如 `Wave= 0.793` 中的 `0.793`
pub fn number_after_text(text: &str, lines: &[&str]) -> String {
    let line = lines_near(text, lines, 0, 1);
    let pattern = format!(r"{}\D*\-?\+?\d+.?\d*", regex::escape(text));
    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(_) => return String::new(),
    };
    let Some(found) = re.find(&line) else {
        return String::new();
    };
    let rest = found.as_str().replacen(text, "", 1);
    let kept: String = rest
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '-' || *c == '.')
        .collect();
    simplify(&kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILE: &str = "header line\nWave= 0.7930 A, Omat= 0.1 0.2 0.3\n  0.4 0.5 0.6\n  0.7 0.8 0.9\nlast";

    fn lines() -> Vec<&'static str> {
        FILE.split('\n').collect()
    }

    #[test]
    fn test_line_ranges() {
        let lines = lines();
        assert_eq!(index_of_text("Omat", &lines, 0), Some(1));
        assert_eq!(index_of_text("Omat", &lines, 2), None);
        assert_eq!(lines_near("Omat", &lines, 1, 2), "  0.4 0.5 0.6\n  0.7 0.8 0.9");
        assert_eq!(lines_near("Omat", &lines, 3, 2), "");
        assert_eq!(lines_near("missing", &lines, 0, 1), "");
        assert_eq!(lines_between("Omat", "last", &lines, 1), "  0.4 0.5 0.6\n  0.7 0.8 0.9");
        assert_eq!(lines_between("last", "Omat", &lines, 0), "");
    }

    #[test]
    fn test_parse_rules() {
        let lines = lines();
        assert_eq!(
            parse_near("Omat=", ParseRule::Num, &lines, 0, 3),
            "0.7930 0.1 0.2 0.3 0.4 0.5 0.6 0.7 0.8 0.9"
        );
        assert_eq!(
            parse("#   omega_value :  12.5 ; deg", ParseRule::Txt, " omega_value :"),
            "12.5 deg"
        );
        assert_eq!(parse("a\nb", ParseRule::Raw, ""), "ab");
        assert_eq!(parse("1\t2 ctr  3\n4", ParseRule::Mult, ""), "1 2 3\n4");
        assert_eq!(
            parse("### NICOS data file, created at 2017-03-04 09:05:12", ParseRule::Date, "### NICOS data file"),
            "2017-03-04 09:05"
        );
        // 月份越界
        assert_eq!(
            parse("### NICOS data file, created at 2017-13-04 09:05:12", ParseRule::Date, "### NICOS data file"),
            ""
        );
    }

    #[test]
    fn test_split_text() {
        // 两个块，每块 3 个 5 字符宽的值
        let raw = "    1    2    3   10   20   30";
        assert_eq!(split_text(raw, 5, 2), "1 10\n2 20\n3 30");
    }

    #[test]
    fn test_number_after_text() {
        let lines = lines();
        assert_eq!(number_after_text("Wave=", &lines), "0.7930");
        assert_eq!(number_after_text("Temp=", &lines), "");
    }
}
