//! 目录模型：系列 → （可选）子系列 → 剧集，顺序与接口声明顺序一致。

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::common::de::{opt_string_or_number, opt_u64_lenient, string_or_null};
use crate::common::models::Language;
use crate::common::utils::sanitize;

pub mod store;

/// 单个可下载的音频条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    #[serde(default, deserialize_with = "string_or_null")]
    pub title: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub slug: String,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub duration: Option<String>,
    /// 站内相对路径，拼接在站点根地址之后
    pub file: String,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub description: Option<String>,
    /// 接口声明的字节数（可选）
    #[serde(default, deserialize_with = "opt_u64_lenient")]
    pub size: Option<u64>,
}

impl Episode {
    // 远程路径最后一段清洗后作为本地文件名，清洗后为空时退回 slug
    pub fn file_name(&self) -> String {
        let last = self
            .file
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or_default();
        let name = sanitize(last);
        if name.is_empty() {
            let fallback = sanitize(&self.slug);
            if fallback.is_empty() { "episode".to_string() } else { fallback }
        } else {
            name
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubSeriesNode {
    pub title: String,
    pub slug: String,
    pub episodes: Vec<Episode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SeriesContent {
    /// 直接包含剧集
    #[serde(alias = "series")]
    Leaf { episodes: Vec<Episode> },
    /// 包含子系列，每个子系列各自包含剧集
    Container { subseries: Vec<SubSeriesNode> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesNode {
    pub title: String,
    pub slug: String,
    #[serde(flatten)]
    pub content: SeriesContent,
}

impl SeriesNode {
    pub fn leaf(title: impl Into<String>, slug: impl Into<String>, episodes: Vec<Episode>) -> Self {
        Self {
            title: title.into(),
            slug: slug.into(),
            content: SeriesContent::Leaf { episodes },
        }
    }

    pub fn container(
        title: impl Into<String>,
        slug: impl Into<String>,
        subseries: Vec<SubSeriesNode>,
    ) -> Self {
        Self {
            title: title.into(),
            slug: slug.into(),
            content: SeriesContent::Container { subseries },
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self.content, SeriesContent::Container { .. })
    }

    pub fn episode_count(&self) -> usize {
        match &self.content {
            SeriesContent::Leaf { episodes } => episodes.len(),
            SeriesContent::Container { subseries } => {
                subseries.iter().map(|s| s.episodes.len()).sum()
            }
        }
    }

    /// 该系列的下载目录：`<root>/<series-slug>`
    pub fn folder(&self, root: &Path) -> PathBuf {
        root.join(sanitize(&self.slug))
    }
}

/// 一次抓取得到的完整（或部分）目录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogTree {
    pub language: Language,
    pub series: Vec<SeriesNode>,
    /// 抓取完整走完了列表且没有节点失败
    #[serde(default)]
    pub complete: bool,
    /// 抓取失败、需要下次补抓的系列 slug
    #[serde(default)]
    pub failed: Vec<String>,
}

impl CatalogTree {
    pub fn new(language: Language) -> Self {
        Self {
            language,
            series: Vec::new(),
            complete: false,
            failed: Vec::new(),
        }
    }

    pub fn find(&self, slug: &str) -> Option<&SeriesNode> {
        self.series.iter().find(|s| s.slug == slug)
    }

    pub fn episode_count(&self) -> usize {
        self.series.iter().map(SeriesNode::episode_count).sum()
    }
}
