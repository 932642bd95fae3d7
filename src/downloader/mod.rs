//! 下载引擎：有界并发地下载一个系列（或其子系列）的全部剧集。
//!
//! 剧集按目录顺序提交，完成顺序不作保证；已存在的非空文件直接记为完成。
//! 单集失败只体现在该集的结果中，不影响同批其他任务。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashSet;
use indicatif::{MultiProgress, ProgressDrawTarget};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::catalog::{Episode, SeriesContent, SeriesNode};
use crate::common::utils::sanitize;

pub mod core;
pub mod error;
pub mod models;
pub mod progress;
pub mod source;

use self::core::{TaskContext, run_task};
use error::DownloadError;
use models::{DownloadConfig, DownloadReport, DownloadTask, EpisodeOutcome, TaskStatus};
use progress::ProgressTracker;
use source::MediaSource;

pub struct FetchEngine<S: MediaSource> {
    source: Arc<S>,
    config: DownloadConfig,
    cancel: CancellationToken,
    in_flight: Arc<DashSet<PathBuf>>,
    multi: MultiProgress,
}

impl<S: MediaSource> FetchEngine<S> {
    pub fn new(source: S, config: DownloadConfig) -> Self {
        let multi = if config.show_progress {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };
        Self {
            source: Arc::new(source),
            config,
            cancel: CancellationToken::new(),
            in_flight: Arc::new(DashSet::new()),
            multi,
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// 下载一个系列，返回每一集的结果（容器系列按子系列顺序展开）
    pub async fn download(&self, node: &SeriesNode, destination_folder: &Path) -> Vec<EpisodeOutcome> {
        self.download_series(node, destination_folder)
            .await
            .into_iter()
            .flat_map(|report| report.outcomes)
            .collect()
    }

    /// 下载一个系列：普通系列一份报告，容器系列每个子系列一份报告
    pub async fn download_series(&self, node: &SeriesNode, root: &Path) -> Vec<DownloadReport> {
        info!("=== 开始下载系列: {} ===", node.title);
        let folder = node.folder(root);

        let reports = match &node.content {
            SeriesContent::Leaf { episodes } => {
                vec![self.download_episodes(&node.title, episodes, &folder).await]
            }
            SeriesContent::Container { subseries } => {
                let mut reports = Vec::with_capacity(subseries.len());
                for (idx, sub) in subseries.iter().enumerate() {
                    info!(
                        "--- 子系列 [{}/{}]: {} ({} 集) ---",
                        idx + 1,
                        subseries.len(),
                        sub.title,
                        sub.episodes.len()
                    );
                    let label = format!("{} / {}", node.title, sub.title);
                    let sub_folder = folder.join(sanitize(&sub.slug));
                    reports.push(self.download_episodes(&label, &sub.episodes, &sub_folder).await);
                }
                reports
            }
        };

        info!("=== 系列结束: {} ===", node.title);
        reports
    }

    /// 有界并发下载一组剧集到 `folder`，结果按剧集顺序返回
    pub async fn download_episodes(
        &self,
        label: &str,
        episodes: &[Episode],
        folder: &Path,
    ) -> DownloadReport {
        let total = episodes.len();
        let tracker = Arc::new(ProgressTracker::new(total));
        let ctx = Arc::new(TaskContext {
            source: Arc::clone(&self.source),
            tracker: Arc::clone(&tracker),
            config: self.config.clone(),
            cancel: self.cancel.clone(),
            in_flight: Arc::clone(&self.in_flight),
            multi: self.multi.clone(),
            total,
        });

        // 许可在提交循环中按顺序获取，任务数与连接数都不超过并发上限
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut handles = Vec::with_capacity(total);
        let mut outcomes = Vec::with_capacity(total);

        for (index, episode) in episodes.iter().enumerate() {
            let task = DownloadTask::new(index, episode.clone(), folder);

            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                outcomes.push(EpisodeOutcome {
                    index,
                    slug: task.episode.slug.clone(),
                    path: task.output_path.clone(),
                    status: TaskStatus::Cancelled,
                });
                continue;
            };

            let meta = (index, task.episode.slug.clone(), task.output_path.clone());
            let ctx = Arc::clone(&ctx);
            let handle = tokio::spawn(async move {
                let _permit = permit;
                run_task(ctx, task).await
            });
            handles.push((meta, handle));
        }

        for ((index, slug, path), handle) in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    error!("下载任务异常退出: {}, 错误: {}", slug, e);
                    outcomes.push(EpisodeOutcome {
                        index,
                        slug,
                        path,
                        status: TaskStatus::Failed(DownloadError::TaskAborted(e.to_string())),
                    });
                }
            }
        }
        outcomes.sort_by_key(|o| o.index);

        let progress = tracker.snapshot();
        info!(
            "{}: 完成 {}/{}，用时 {}s",
            label,
            progress.completed,
            progress.total,
            (chrono::Local::now() - progress.started_at).num_seconds()
        );

        DownloadReport {
            label: label.to_string(),
            outcomes,
            progress,
        }
    }
}
