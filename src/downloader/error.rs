use std::path::PathBuf;

use thiserror::Error;

use crate::common::client::error::ApiError;
use crate::common::retry::Retryable;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("请求失败: {0}")]
    Api(#[from] ApiError),

    #[error("数据流中断: {0}")]
    Stream(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("文件大小不符: 期望 {expected} 字节，实际写入 {written} 字节")]
    SizeMismatch { expected: u64, written: u64 },

    #[error("目标文件正在被其他任务写入: {0}")]
    DestinationBusy(PathBuf),

    #[error("下载已取消")]
    Cancelled,

    #[error("下载任务异常退出: {0}")]
    TaskAborted(String),
}

impl Retryable for DownloadError {
    // 传输层的瞬时错误和大小不符（删除后重下）会重试；磁盘错误、取消不重试
    fn is_transient(&self) -> bool {
        match self {
            DownloadError::Api(e) => e.is_transient(),
            DownloadError::Stream(_) | DownloadError::SizeMismatch { .. } => true,
            DownloadError::Io(_)
            | DownloadError::DestinationBusy(_)
            | DownloadError::Cancelled
            | DownloadError::TaskAborted(_) => false,
        }
    }
}
