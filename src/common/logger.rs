//! 面向用户的控制台输出：目录列表、下载摘要和状态提示。
//! 诊断信息走 `tracing`，这里只负责给人看的内容。

use colored::*;

use crate::catalog::{SeriesContent, SeriesNode};
use crate::downloader::models::DownloadReport;

pub struct PrettyLogger;

impl PrettyLogger {
    fn line(icon: ColoredString, message: &str) {
        println!("{} {}", icon, message);
    }

    pub fn success(message: impl AsRef<str>) {
        Self::line("✓".green().bold(), message.as_ref());
    }

    pub fn info(message: impl AsRef<str>) {
        Self::line("ℹ".blue().bold(), message.as_ref());
    }

    pub fn warning(message: impl AsRef<str>) {
        Self::line("⚠".yellow().bold(), message.as_ref());
    }

    pub fn error(message: impl AsRef<str>) {
        Self::line("✗".red().bold(), message.as_ref());
    }

    /// 阶段标题（抓取目录、开始下载某个系列）
    pub fn stage(title: impl AsRef<str>) {
        println!("\n{} {}", "▶".cyan().bold(), title.as_ref().bold());
    }

    /// 编号的目录列表，序号从 1 开始，与 `--select` 一致
    pub fn catalog<'a>(nodes: impl IntoIterator<Item = &'a SeriesNode>) {
        let rule = "─".repeat(50).bright_black();
        println!("{}", rule);
        for (idx, node) in nodes.into_iter().enumerate() {
            println!(
                "{} {} {}",
                format!("[{:>3}]", idx + 1).bright_black(),
                node.title.bold(),
                Self::describe(node).cyan()
            );
        }
        println!("{}", rule);
    }

    pub fn describe(node: &SeriesNode) -> String {
        match &node.content {
            SeriesContent::Leaf { episodes } => format!("{} 集", episodes.len()),
            SeriesContent::Container { subseries } => {
                format!("{} 个子系列，{} 集", subseries.len(), node.episode_count())
            }
        }
    }

    pub fn summary_line(report: &DownloadReport) -> String {
        let failed = report.failed();
        let failed_text = format!("{} 失败", failed);
        format!(
            "{}: {} 完成，{}",
            report.label,
            format!("{}/{}", report.progress.completed, report.progress.total).green(),
            if failed > 0 {
                failed_text.red().to_string()
            } else {
                failed_text
            }
        )
    }

    /// 所有系列下载结束后的摘要
    pub fn download_summary(reports: &[DownloadReport]) {
        println!("\n{}", "🎉 下载结束".green().bold());
        for report in reports {
            println!("  {}", Self::summary_line(report));
        }
    }
}
