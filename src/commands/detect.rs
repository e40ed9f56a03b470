//! # detect 命令实现
//!
//! 逐个识别数据文件的格式并列表显示。
//!
//! ## 依赖关系
//! - 使用 `cli/detect.rs` 定义的参数
//! - 使用 `parsers/` 的格式识别

use crate::cli::detect::DetectArgs;
use crate::error::Result;
use crate::parsers::{self, InputFormat};
use crate::utils::output;

use tabled::{Table, Tabled};

/// 格式识别结果行
#[derive(Debug, Clone, Tabled)]
struct DetectRow {
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "Facility")]
    facility: String,
    #[tabled(rename = "Instrument")]
    instrument: String,
    #[tabled(rename = "Data type")]
    data_type: String,
}

/// 执行 detect 命令
pub fn execute(args: DetectArgs) -> Result<()> {
    output::print_header("Detecting Input Formats");

    let files = super::read_input_files(&args.input, &args.pattern, args.recursive)?;
    if files.is_empty() {
        output::print_warning(&format!(
            "No files matched '{}' under {}",
            args.pattern,
            args.input.display()
        ));
        return Ok(());
    }

    let mut unknown = 0;
    let rows: Vec<DetectRow> = files
        .iter()
        .map(|file| {
            let format = parsers::detect_input_format(file);
            if format == InputFormat::Unknown {
                unknown += 1;
            }
            DetectRow {
                file: file
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                facility: format.facility().to_string(),
                instrument: format.instrument().to_string(),
                data_type: format.data_type().to_string(),
            }
        })
        .collect();

    println!("{}", Table::new(&rows));
    println!();

    match parsers::detect_collection_format(&files) {
        Ok(format) if format != InputFormat::Unknown => {
            output::print_success(&format!("All files are {} {}", format.instrument(), format.data_type()))
        }
        Ok(_) => output::print_warning("No known instrument format detected"),
        Err(e) => output::print_warning(&e.to_string()),
    }
    if unknown > 0 {
        output::print_info(&format!("{} files not recognised", unknown));
    }

    Ok(())
}
