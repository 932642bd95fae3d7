use serde::Deserialize;
use serde_json::Value;

use crate::catalog::Episode;
use crate::common::de::string_or_null;

// 声明总数：列表接口是 [{"total": N}]，剧集接口是 N
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DeclaredTotal {
    Plain(u64),
    Wrapped(Vec<TotalEntry>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct TotalEntry {
    #[serde(default)]
    pub total: u64,
}

impl DeclaredTotal {
    pub fn value(&self) -> u64 {
        match self {
            DeclaredTotal::Plain(n) => *n,
            DeclaredTotal::Wrapped(entries) => entries.first().map(|e| e.total).unwrap_or(0),
        }
    }
}

impl Default for DeclaredTotal {
    fn default() -> Self {
        DeclaredTotal::Plain(0)
    }
}

// search-series-home 响应
#[derive(Debug, Deserialize)]
pub struct SeriesListResponse {
    pub items: Vec<SeriesItem>,
    #[serde(default)]
    pub total: DeclaredTotal,
}

// 系列列表条目
#[derive(Debug, Clone, Deserialize)]
pub struct SeriesItem {
    #[serde(default, deserialize_with = "string_or_null")]
    pub title: String,
    pub slug: String,
    // 存在该字段即为包含子系列的容器
    #[serde(rename = "countSeries", default)]
    pub count_series: Option<Value>,
}

impl SeriesItem {
    pub fn is_container(&self) -> bool {
        self.count_series.is_some()
    }
}

// subseries-filter 响应
#[derive(Debug, Deserialize)]
pub struct SubSeriesListResponse {
    #[serde(rename = "listData")]
    pub list_data: Vec<SubSeriesItem>,
    #[serde(default)]
    pub total: DeclaredTotal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubSeriesItem {
    #[serde(default, deserialize_with = "string_or_null")]
    pub title: String,
    pub slug: String,
}

// series-filter 响应
#[derive(Debug, Deserialize)]
pub struct EpisodeListResponse {
    #[serde(rename = "listData")]
    pub list_data: Vec<Episode>,
    #[serde(default)]
    pub total: DeclaredTotal,
}

// /_next/data/<token>/<slug>.json 响应
#[derive(Debug, Deserialize)]
pub struct PageDataResponse {
    #[serde(rename = "pageProps")]
    pub page_props: PageProps,
}

#[derive(Debug, Deserialize)]
pub struct PageProps {
    pub data: PageDataWrapper,
}

#[derive(Debug, Deserialize)]
pub struct PageDataWrapper {
    #[serde(rename = "pageData")]
    pub page_data: PageData,
}

#[derive(Debug, Deserialize)]
pub struct PageData {
    #[serde(rename = "categoryData")]
    pub category_data: CategoryData,
    // 页面内嵌的第一页剧集，英文目录通常没有
    #[serde(rename = "listData", default)]
    pub list_data: Option<Vec<Episode>>,
    #[serde(default)]
    pub total: Option<DeclaredTotal>,
}

#[derive(Debug, Deserialize)]
pub struct CategoryData {
    #[serde(rename = "_id")]
    pub id: String,
}
