use std::path::PathBuf;
use std::time::Duration;

use crate::catalog::Episode;
use crate::common::retry::RetryPolicy;

use super::error::DownloadError;
use super::progress::ProgressSnapshot;

#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// 并发下载数（同时存在的连接数）
    pub concurrency: usize,
    /// 写盘缓冲大小
    pub chunk_size: usize,
    /// 进度/ETA 刷新间隔，不小于 1 秒
    pub report_interval: Duration,
    pub retry: RetryPolicy,
    pub show_progress: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            chunk_size: 1024 * 1024,
            report_interval: Duration::from_secs(1),
            retry: RetryPolicy::default(),
            show_progress: true,
        }
    }
}

impl DownloadConfig {
    /// 实际使用的刷新间隔，小于 1 秒时按 1 秒处理
    pub fn report_interval(&self) -> Duration {
        self.report_interval.max(MIN_REPORT_INTERVAL)
    }
}

const MIN_REPORT_INTERVAL: Duration = Duration::from_secs(1);

// 单集下载任务，只在一次下载调用期间存在
#[derive(Debug, Clone)]
pub struct DownloadTask {
    /// 在所属系列中的序号（从 0 开始）
    pub index: usize,
    pub episode: Episode,
    pub output_path: PathBuf,
    pub temp_path: PathBuf,
}

impl DownloadTask {
    pub fn new(index: usize, episode: Episode, folder: &std::path::Path) -> Self {
        let name = episode.file_name();
        let output_path = folder.join(&name);
        let temp_path = folder.join(format!("{}.part", name));
        Self {
            index,
            episode,
            output_path,
            temp_path,
        }
    }
}

#[derive(Debug)]
pub enum TaskStatus {
    /// 目标文件已存在且非空，未发起请求
    AlreadyPresent,
    Completed { bytes: u64, elapsed: Duration },
    Failed(DownloadError),
    /// 取消后未提交或中途停止
    Cancelled,
}

impl TaskStatus {
    pub fn is_done(&self) -> bool {
        matches!(self, TaskStatus::AlreadyPresent | TaskStatus::Completed { .. })
    }
}

#[derive(Debug)]
pub struct EpisodeOutcome {
    pub index: usize,
    pub slug: String,
    pub path: PathBuf,
    pub status: TaskStatus,
}

/// 一次系列/子系列下载的结果
#[derive(Debug)]
pub struct DownloadReport {
    pub label: String,
    pub outcomes: Vec<EpisodeOutcome>,
    pub progress: ProgressSnapshot,
}

impl DownloadReport {
    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, TaskStatus::Failed(_)))
            .count()
    }
}
