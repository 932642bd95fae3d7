use async_trait::async_trait;
use serde_json::json;

use super::pagination::Page;
use super::token::BuildToken;
use crate::catalog::Episode;
use crate::common::client::client::OshoClient;
use crate::common::client::error::ApiError;
use crate::common::client::models::listing::{
    EpisodeListResponse, PageDataResponse, SeriesItem, SeriesListResponse, SubSeriesItem,
    SubSeriesListResponse,
};
use crate::common::models::Language;

const SERIES_LIST_PATH: &str = "/api/server/audio/search-series-home";
const SUBSERIES_FILTER_PATH: &str = "/api/server/audio/subseries-filter";
const SERIES_FILTER_PATH: &str = "/api/server/audio/series-filter";

/// 节点详情页：分页接口需要的 id，以及页面内嵌的第一页剧集
#[derive(Debug, Clone)]
pub struct NodeDetail {
    pub category_id: String,
    pub first_page: Option<Page<Episode>>,
}

/// 抓取器依赖的站点接口，每个方法对应一次远程调用
#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn series_page(&self, language: Language, page: u32)
    -> Result<Page<SeriesItem>, ApiError>;

    async fn subseries_page(
        &self,
        category_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Page<SubSeriesItem>, ApiError>;

    async fn episodes_page(
        &self,
        category_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Page<Episode>, ApiError>;

    async fn node_detail(&self, token: &BuildToken, slug: &str) -> Result<NodeDetail, ApiError>;
}

#[async_trait]
impl CatalogApi for OshoClient {
    async fn series_page(
        &self,
        language: Language,
        page: u32,
    ) -> Result<Page<SeriesItem>, ApiError> {
        let body = json!({"page": page, "sortBy": "name", "language": language.as_str()});
        let resp: SeriesListResponse = self.post_json(SERIES_LIST_PATH, &body).await?;
        Ok(Page::new(resp.items, resp.total.value()))
    }

    async fn subseries_page(
        &self,
        category_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Page<SubSeriesItem>, ApiError> {
        let body = json!({
            "currentId": category_id,
            "perPage": per_page,
            "sortBy": "index-dsc",
            "page": page,
        });
        let resp: SubSeriesListResponse = self.post_json(SUBSERIES_FILTER_PATH, &body).await?;
        Ok(Page::new(resp.list_data, resp.total.value()))
    }

    async fn episodes_page(
        &self,
        category_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Page<Episode>, ApiError> {
        let body = json!({
            "currentId": category_id,
            "perPage": per_page,
            "page": page,
            "search": "",
        });
        let resp: EpisodeListResponse = self.post_json(SERIES_FILTER_PATH, &body).await?;
        Ok(Page::new(resp.list_data, resp.total.value()))
    }

    async fn node_detail(&self, token: &BuildToken, slug: &str) -> Result<NodeDetail, ApiError> {
        let path = format!("/_next/data/{}/{}.json", token, slug.trim_matches('/'));
        let resp: PageDataResponse = self.get_json(&path).await?;
        let data = resp.page_props.data.page_data;

        // 内嵌列表和总数都存在时才当作第一页使用
        let first_page = match (data.list_data, data.total) {
            (Some(items), Some(total)) => Some(Page::new(items, total.value())),
            _ => None,
        };

        Ok(NodeDetail {
            category_id: data.category_data.id,
            first_page,
        })
    }
}
