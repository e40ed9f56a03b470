//! # 文件收集器
//!
//! 根据输入路径和模式收集待处理的数据文件。
//!
//! ## 功能
//! - 支持单文件和目录输入
//! - glob 模式匹配（逗号分隔的多模式）
//! - 可选递归目录搜索
//! - 结果按路径排序，文件顺序即扫描编号顺序
//!
//! ## 依赖关系
//! - 被 `commands/reduce.rs`, `commands/detect.rs` 调用
//! - 使用 `walkdir` 遍历目录，`glob` 匹配文件名

use crate::error::{ReduceError, Result};

use glob::Pattern;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 文件收集器
pub struct FileCollector {
    /// 输入路径
    input: PathBuf,
    /// 匹配模式列表
    patterns: Vec<String>,
    /// 是否递归
    recursive: bool,
}

impl FileCollector {
    /// 创建新的文件收集器
    pub fn new(input: PathBuf) -> Self {
        Self {
            input,
            patterns: vec!["*".to_string()],
            recursive: false,
        }
    }

    /// 设置匹配模式（逗号分隔的多模式）
    pub fn with_pattern(mut self, pattern: &str) -> Self {
        self.patterns = pattern
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if self.patterns.is_empty() {
            self.patterns = vec!["*".to_string()];
        }
        self
    }

    /// 设置是否递归搜索
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// 检查输入是否为单文件
    pub fn is_single_file(&self) -> bool {
        self.input.is_file()
    }

    /// 检查输入是否为目录
    pub fn is_directory(&self) -> bool {
        self.input.is_dir()
    }

    /// 收集所有匹配的文件
    ///
    /// 单文件输入不做模式过滤；输入不存在时返回 `FileNotFound`。
    pub fn collect(&self) -> Result<Vec<PathBuf>> {
        if self.is_single_file() {
            return Ok(vec![self.input.clone()]);
        }

        if !self.is_directory() {
            return Err(ReduceError::FileNotFound {
                path: self.input.display().to_string(),
            });
        }

        let patterns = self.compile_patterns()?;
        let max_depth = if self.recursive { usize::MAX } else { 1 };

        let mut files: Vec<PathBuf> = WalkDir::new(&self.input)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|entry| Self::matches_patterns(&patterns, entry.path()))
            .map(|e| e.path().to_path_buf())
            .collect();

        files.sort();
        Ok(files)
    }

    fn compile_patterns(&self) -> Result<Vec<Pattern>> {
        self.patterns
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| {
                    ReduceError::InvalidArgument(format!("invalid pattern '{}': {}", p, e))
                })
            })
            .collect()
    }

    /// 检查文件名是否匹配任一模式
    fn matches_patterns(patterns: &[Pattern], path: &Path) -> bool {
        let filename = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => return false,
        };

        patterns.iter().any(|pattern| pattern.matches(filename))
    }
}
