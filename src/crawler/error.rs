use thiserror::Error;

use crate::catalog::store::CacheError;
use crate::common::client::error::ApiError;

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("部署令牌解析失败: {0}")]
    Token(#[source] ApiError),

    #[error("系列列表获取失败: {0}")]
    Listing(#[source] ApiError),

    #[error("节点 {slug} 抓取失败: {source}")]
    Node {
        slug: String,
        #[source]
        source: ApiError,
    },

    #[error("目录缓存写入失败: {0}")]
    Cache(#[from] CacheError),

    #[error("抓取已取消")]
    Cancelled,
}
