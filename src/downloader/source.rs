use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};

use crate::common::client::client::OshoClient;

use super::error::DownloadError;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, DownloadError>> + Send>>;

/// 打开后的媒体响应
pub struct MediaResponse {
    /// 响应头中的 Content-Length
    pub content_length: Option<u64>,
    pub body: ByteStream,
}

/// 媒体文件来源，`file` 为剧集的站内相对路径
#[async_trait]
pub trait MediaSource: Send + Sync + 'static {
    async fn open(&self, file: &str) -> Result<MediaResponse, DownloadError>;
}

#[async_trait]
impl MediaSource for OshoClient {
    async fn open(&self, file: &str) -> Result<MediaResponse, DownloadError> {
        let response = self.get_raw_response(file).await?;
        let content_length = response.content_length();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| DownloadError::Stream(e.to_string())))
            .boxed();
        Ok(MediaResponse {
            content_length,
            body,
        })
    }
}
