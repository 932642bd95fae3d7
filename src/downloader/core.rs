use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashSet;
use futures::StreamExt;
use indicatif::{MultiProgress, ProgressBar, ProgressFinish, ProgressStyle};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::common::utils::FormatTool;

use super::error::DownloadError;
use super::models::{DownloadConfig, DownloadTask, EpisodeOutcome, TaskStatus};
use super::progress::ProgressTracker;
use super::source::MediaSource;

const PB_STYLE: &str =
    "{prefix} {spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {bytes}/{total_bytes} {msg}";

// 同一次系列下载中所有任务共享的上下文
pub(crate) struct TaskContext<S> {
    pub source: Arc<S>,
    pub tracker: Arc<ProgressTracker>,
    pub config: DownloadConfig,
    pub cancel: CancellationToken,
    pub in_flight: Arc<DashSet<PathBuf>>,
    pub multi: MultiProgress,
    pub total: usize,
}

// 正在写入的目标路径登记，保证同一路径同时只有一个写入者
struct DestinationClaim {
    in_flight: Arc<DashSet<PathBuf>>,
    path: PathBuf,
}

impl DestinationClaim {
    fn acquire(in_flight: &Arc<DashSet<PathBuf>>, path: &Path) -> Result<Self, DownloadError> {
        if !in_flight.insert(path.to_path_buf()) {
            return Err(DownloadError::DestinationBusy(path.to_path_buf()));
        }
        Ok(Self {
            in_flight: Arc::clone(in_flight),
            path: path.to_path_buf(),
        })
    }
}

impl Drop for DestinationClaim {
    fn drop(&mut self) {
        self.in_flight.remove(&self.path);
    }
}

pub(crate) async fn run_task<S: MediaSource>(
    ctx: Arc<TaskContext<S>>,
    task: DownloadTask,
) -> EpisodeOutcome {
    let status = match fetch_episode(&ctx, &task).await {
        Ok(status) => status,
        Err(DownloadError::Cancelled) => {
            info!("    [{}/{}] 已取消: {}", task.index + 1, ctx.total, task.episode.slug);
            TaskStatus::Cancelled
        }
        Err(e) => {
            error!(
                "    [{}/{}] ❌ 下载失败: {}, 错误: {}",
                task.index + 1,
                ctx.total,
                task.output_path.display(),
                e
            );
            TaskStatus::Failed(e)
        }
    };

    EpisodeOutcome {
        index: task.index,
        slug: task.episode.slug.clone(),
        path: task.output_path.clone(),
        status,
    }
}

async fn fetch_episode<S: MediaSource>(
    ctx: &TaskContext<S>,
    task: &DownloadTask,
) -> Result<TaskStatus, DownloadError> {
    let _claim = DestinationClaim::acquire(&ctx.in_flight, &task.output_path)?;

    // 已存在且非空视为已完成，不发起任何请求
    if let Ok(meta) = tokio::fs::metadata(&task.output_path).await {
        if meta.is_file() && meta.len() > 0 {
            info!(
                "    [{}/{}] 已存在: {}",
                task.index + 1,
                ctx.total,
                task.output_path.display()
            );
            ctx.tracker.mark_done(0.0);
            return Ok(TaskStatus::AlreadyPresent);
        }
    }

    if let Some(parent) = task.output_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    info!(
        "    [{}/{}] 开始下载: {}",
        task.index + 1,
        ctx.total,
        task.episode.file_name()
    );
    let started = Instant::now();
    let what = format!("下载 {}", task.episode.slug);

    let result = tokio::select! {
        _ = ctx.cancel.cancelled() => Err(DownloadError::Cancelled),
        result = ctx.config.retry.run(&what, |attempt| stream_to_temp(ctx, task, attempt)) => result,
    };

    let written = match result {
        Ok(written) => written,
        Err(e) => {
            remove_temp(&task.temp_path).await;
            return Err(e);
        }
    };

    // 校验通过后才以最终文件名出现
    if let Err(e) = tokio::fs::rename(&task.temp_path, &task.output_path).await {
        remove_temp(&task.temp_path).await;
        return Err(e.into());
    }
    let elapsed = started.elapsed();
    ctx.tracker.mark_done(elapsed.as_secs_f64());
    info!(
        "    [{}/{}] ✅ 完成: {} ({}, {:.1}s, ETA {})",
        task.index + 1,
        ctx.total,
        task.output_path.display(),
        FormatTool::format_size(written),
        elapsed.as_secs_f64(),
        ctx.tracker.eta()
    );

    Ok(TaskStatus::Completed {
        bytes: written,
        elapsed,
    })
}

// 单次尝试：流式写入临时文件并校验长度，返回写入的字节数
async fn stream_to_temp<S: MediaSource>(
    ctx: &TaskContext<S>,
    task: &DownloadTask,
    attempt: u32,
) -> Result<u64, DownloadError> {
    let response = ctx.source.open(&task.episode.file).await?;
    // 优先使用响应头长度，其次使用目录中声明的大小
    let expected = response.content_length.or(task.episode.size);
    debug!(
        "第 {} 次尝试 {}: 期望长度 {:?}",
        attempt, task.episode.file, expected
    );

    let file = tokio::fs::File::create(&task.temp_path).await?;
    let mut writer = BufWriter::with_capacity(ctx.config.chunk_size.max(1), file);
    let bar = new_progress_bar(ctx, task, expected);

    let mut body = response.body;
    let mut written = 0u64;
    let report_interval = ctx.config.report_interval();
    let mut last_report = Instant::now();
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        writer.write_all(&chunk).await?;
        written += chunk.len() as u64;
        bar.set_position(written);

        if last_report.elapsed() >= report_interval {
            let eta = ctx.tracker.eta();
            bar.set_message(format!("ETA {}", eta));
            debug!("{}: {} 字节，系列 ETA {}", task.episode.slug, written, eta);
            last_report = Instant::now();
        }
    }

    writer.flush().await?;
    writer.into_inner().sync_all().await?;
    bar.finish_and_clear();

    if let Some(expected) = expected {
        if written != expected {
            warn!(
                "    [!] 文件大小不符: {} (期望 {}，实际 {})，删除后重试",
                task.episode.file_name(),
                expected,
                written
            );
            remove_temp(&task.temp_path).await;
            return Err(DownloadError::SizeMismatch { expected, written });
        }
    }

    Ok(written)
}

fn new_progress_bar<S>(ctx: &TaskContext<S>, task: &DownloadTask, len: Option<u64>) -> ProgressBar {
    // 出错提前返回时进度条随 drop 一起清除
    let bar = ctx
        .multi
        .add(ProgressBar::new(len.unwrap_or(0)).with_finish(ProgressFinish::AndClear));
    if let Ok(style) = ProgressStyle::with_template(PB_STYLE) {
        bar.set_style(style.progress_chars("#>-"));
    }
    let name: String = task.episode.file_name().chars().take(40).collect();
    bar.set_prefix(format!("[{}/{}] {:40}", task.index + 1, ctx.total, name));
    bar.set_message(format!("ETA {}", ctx.tracker.eta()));
    bar
}

async fn remove_temp(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("已删除临时文件: {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("删除临时文件失败 {}: {}", path.display(), e),
    }
}
