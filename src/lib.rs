pub mod catalog;
pub mod cli;
pub mod common;
pub mod crawler;
pub mod downloader;

pub use catalog::store::{CacheError, CacheStore, JsonCacheStore};
pub use catalog::{CatalogTree, Episode, SeriesContent, SeriesNode, SubSeriesNode};
pub use common::models::Language;
pub use common::retry::RetryPolicy;
pub use crawler::{CatalogCrawler, CrawlConfig, error::CrawlError};
pub use downloader::{
    FetchEngine,
    models::{DownloadConfig, EpisodeOutcome, TaskStatus},
    progress::{Eta, ProgressTracker},
};
