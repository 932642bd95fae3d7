use clap::Parser;
use itertools::Itertools;
use std::path::PathBuf;
use thiserror::Error;

use crate::common::models::Language;

/// Osho World 音频下载器
#[derive(Parser, Debug)]
#[command(name = "oshodl")]
#[command(version = "0.1")]
#[command(author = "rpeng252@gmail.com")]
#[command(about = "抓取 Osho World 音频目录并按系列下载", long_about = None)]
pub struct Cli {
    /// 目录语言
    #[arg(long, value_enum, default_value_t = Language::Hindi)]
    pub language: Language,

    /// 音频保存目录
    #[arg(long, value_name = "DIR")]
    #[arg(default_value = "downloads")]
    #[arg(value_hint = clap::ValueHint::DirPath)]
    pub output_dir: PathBuf,

    /// 目录缓存目录
    #[arg(long, value_name = "DIR")]
    #[arg(default_value = ".")]
    #[arg(value_hint = clap::ValueHint::DirPath)]
    pub cache_dir: PathBuf,

    /// 忽略缓存，重新抓取目录
    #[arg(long)]
    pub refresh: bool,

    /// 按标题过滤系列 (正则，不区分大小写)
    #[arg(long, value_name = "REGEX")]
    pub search: Option<String>,

    /// 要下载的系列序号 (可选)
    #[arg(long, value_name = "RANGE")]
    #[arg(help = "指定要下载的系列，如: 1,3-5 或 all；不指定时只列出目录")]
    pub select: Option<String>,

    #[arg(long, value_name = "并发数", default_value_t = 4)]
    pub concurrency: usize,

    /// 不显示下载进度条
    #[arg(long)]
    pub no_progress: bool,

    /// 输出调试日志
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Error, PartialEq)]
pub enum SelectionError {
    #[error("无效的序号: {0}")]
    InvalidNumber(String),
    #[error("无效的范围格式: {0}")]
    InvalidRange(String),
    #[error("起始序号不能大于结束序号: {0}")]
    Reversed(String),
    #[error("序号 {index} 超出范围 (共 {len} 项)")]
    OutOfRange { index: usize, len: usize },
    #[error("没有有效的序号")]
    Empty,
}

/// 解析 `1,3-5` 或 `all` 形式的选择，返回从 0 开始、升序去重的下标
pub fn parse_selection(input: &str, len: usize) -> Result<Vec<usize>, SelectionError> {
    let input = input.trim();
    if input.eq_ignore_ascii_case("all") {
        return Ok((0..len).collect());
    }

    let mut picked = Vec::new();
    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if let Some((start, end)) = part.split_once('-') {
            let start = parse_index(start, part)?;
            let end = parse_index(end, part)?;
            if start > end {
                return Err(SelectionError::Reversed(part.to_string()));
            }
            picked.extend(start..=end);
        } else {
            picked.push(parse_index(part, part)?);
        }
    }

    if let Some(&index) = picked.iter().find(|&&i| i > len) {
        return Err(SelectionError::OutOfRange { index, len });
    }

    let picked: Vec<usize> = picked.into_iter().sorted_unstable().dedup().map(|i| i - 1).collect();
    if picked.is_empty() {
        return Err(SelectionError::Empty);
    }
    Ok(picked)
}

// 序号从 1 开始
fn parse_index(raw: &str, part: &str) -> Result<usize, SelectionError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(SelectionError::InvalidRange(part.to_string()));
    }
    match raw.parse::<usize>() {
        Ok(0) | Err(_) => Err(SelectionError::InvalidNumber(raw.to_string())),
        Ok(n) => Ok(n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selection_mixed() {
        assert_eq!(parse_selection("1,3-5", 6).unwrap(), vec![0, 2, 3, 4]);
        assert_eq!(parse_selection(" 5, 2-3 ,2 ", 6).unwrap(), vec![1, 2, 4]);
    }

    #[test]
    fn test_parse_selection_all() {
        assert_eq!(parse_selection("all", 3).unwrap(), vec![0, 1, 2]);
        assert_eq!(parse_selection("ALL", 0).unwrap(), Vec::<usize>::new());
    }

    #[test]
    fn test_parse_selection_errors() {
        assert_eq!(
            parse_selection("0", 3),
            Err(SelectionError::InvalidNumber("0".to_string()))
        );
        assert_eq!(
            parse_selection("4-2", 5),
            Err(SelectionError::Reversed("4-2".to_string()))
        );
        assert_eq!(
            parse_selection("2-", 5),
            Err(SelectionError::InvalidRange("2-".to_string()))
        );
        assert_eq!(
            parse_selection("7", 5),
            Err(SelectionError::OutOfRange { index: 7, len: 5 })
        );
        assert_eq!(parse_selection(" , ", 5), Err(SelectionError::Empty));
        assert!(matches!(
            parse_selection("x", 5),
            Err(SelectionError::InvalidNumber(_))
        ));
    }

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::parse_from([
            "oshodl",
            "--language",
            "english",
            "--select",
            "1-2",
            "--concurrency",
            "8",
            "--no-progress",
        ]);
        assert_eq!(cli.language, Language::English);
        assert_eq!(cli.select.as_deref(), Some("1-2"));
        assert_eq!(cli.concurrency, 8);
        assert!(cli.no_progress);
        assert!(!cli.refresh);
    }
}
