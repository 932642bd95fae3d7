//! 目录抓取器：顺序遍历多级分页接口，生成 系列 → 子系列 → 剧集 的有序目录。
//!
//! 每个远程调用都经过同一个 [`RetryPolicy`]；单个系列失败只记录在
//! [`CatalogTree::failed`] 中，不影响其他系列。每抓完一个系列就写一次缓存，
//! 下次运行可以从部分目录继续。

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalog::store::CacheStore;
use crate::catalog::{CatalogTree, Episode, SeriesNode, SubSeriesNode};
use crate::common::client::error::ApiError;
use crate::common::client::models::listing::{SeriesItem, SubSeriesItem};
use crate::common::models::Language;
use crate::common::retry::RetryPolicy;

pub mod api;
pub mod error;
pub mod pagination;
pub mod token;

use api::CatalogApi;
use error::CrawlError;
use pagination::{Page, accumulate_until_total, fetch_remaining_pages};
use token::{BuildToken, BuildTokenSource};

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub retry: RetryPolicy,
    pub episodes_per_page: u32,
    pub subseries_per_page: u32,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            episodes_per_page: 10,
            subseries_per_page: 16,
        }
    }
}

// 单次远程调用的失败：重试耗尽后的接口错误，或被取消
#[derive(Debug)]
enum CallError {
    Api(ApiError),
    Cancelled,
}

impl CallError {
    fn into_crawl(self, wrap: impl FnOnce(ApiError) -> CrawlError) -> CrawlError {
        match self {
            CallError::Api(e) => wrap(e),
            CallError::Cancelled => CrawlError::Cancelled,
        }
    }

    fn for_node(self, slug: &str) -> CrawlError {
        self.into_crawl(|source| CrawlError::Node {
            slug: slug.to_string(),
            source,
        })
    }
}

pub struct CatalogCrawler<A, T> {
    api: A,
    tokens: T,
    config: CrawlConfig,
    cancel: CancellationToken,
}

impl<A: CatalogApi, T: BuildTokenSource> CatalogCrawler<A, T> {
    pub fn new(api: A, tokens: T, config: CrawlConfig) -> Self {
        Self {
            api,
            tokens,
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// 完整抓取一种语言的目录
    pub async fn crawl(&self, language: Language) -> Result<CatalogTree, CrawlError> {
        self.crawl_with(language, None, None).await
    }

    /// 抓取目录：`previous` 中已有的系列直接复用，每完成一个系列写一次 `store`
    pub async fn crawl_with(
        &self,
        language: Language,
        previous: Option<&CatalogTree>,
        store: Option<&dyn CacheStore>,
    ) -> Result<CatalogTree, CrawlError> {
        let previous = previous.filter(|p| p.language == language);
        let listing = self.fetch_series_list(language).await?;
        info!("系列总数: {}", listing.len());

        let mut tree = CatalogTree::new(language);
        let mut token: Option<BuildToken> = None;

        for (idx, item) in listing.iter().enumerate() {
            if self.cancel.is_cancelled() {
                Self::checkpoint(store, &tree).await?;
                return Err(CrawlError::Cancelled);
            }

            if let Some(node) = previous.and_then(|p| reusable_node(p, item)) {
                debug!("复用已缓存的系列: {}", item.slug);
                tree.series.push(node.clone());
                continue;
            }

            info!("[{}/{}] 抓取系列: {}", idx + 1, listing.len(), item.title);

            // 令牌只在确实需要抓取节点时解析一次
            let token = match &token {
                Some(token) => token.clone(),
                None => {
                    let resolved = self.resolve_token(language).await?;
                    token = Some(resolved.clone());
                    resolved
                }
            };

            match self.crawl_node(&token, item).await {
                Ok(node) => {
                    info!("    ✓ {}: {} 集", node.title, node.episode_count());
                    tree.series.push(node);
                }
                Err(CrawlError::Cancelled) => {
                    Self::checkpoint(store, &tree).await?;
                    return Err(CrawlError::Cancelled);
                }
                Err(e) => {
                    warn!("    ✗ 跳过系列 {}: {}", item.slug, e);
                    tree.failed.push(item.slug.clone());
                }
            }
            Self::checkpoint(store, &tree).await?;
        }

        tree.complete = tree.failed.is_empty();
        Self::checkpoint(store, &tree).await?;

        if tree.complete {
            info!("目录抓取完成: {} 个系列，{} 集", tree.series.len(), tree.episode_count());
        } else {
            warn!("目录抓取结束，{} 个系列失败，下次运行会补抓", tree.failed.len());
        }
        Ok(tree)
    }

    /// 系列列表：逐页累积直到达到第一页声明的总数
    pub async fn fetch_series_list(&self, language: Language) -> Result<Vec<SeriesItem>, CrawlError> {
        accumulate_until_total("系列列表", |page| {
            self.call(format!("系列列表第 {} 页", page), move |_| {
                self.api.series_page(language, page)
            })
        })
        .await
        .map_err(|e| e.into_crawl(CrawlError::Listing))
    }

    /// 容器系列的子系列列表，失败时归到 `slug` 所在的系列
    pub async fn fetch_subseries(
        &self,
        slug: &str,
        category_id: &str,
    ) -> Result<Vec<SubSeriesItem>, CrawlError> {
        self.subseries_of(category_id)
            .await
            .map_err(|e| e.for_node(slug))
    }

    /// 剧集列表：已取得的第一页（没有则请求第 1 页）+ 其余各页
    pub async fn fetch_episodes(
        &self,
        slug: &str,
        category_id: &str,
        first_page: Option<Page<Episode>>,
    ) -> Result<Vec<Episode>, CrawlError> {
        self.episodes_of(category_id, first_page)
            .await
            .map_err(|e| e.for_node(slug))
    }

    async fn resolve_token(&self, language: Language) -> Result<BuildToken, CrawlError> {
        self.call("解析部署令牌".to_string(), |_| self.tokens.resolve(language))
            .await
            .map_err(|e| e.into_crawl(CrawlError::Token))
    }

    // 单个系列：详情页 -> （子系列 ->）剧集
    async fn crawl_node(&self, token: &BuildToken, item: &SeriesItem) -> Result<SeriesNode, CrawlError> {
        let slug = item.slug.as_str();
        let detail = self
            .call(format!("系列 {} 详情", slug), |_| self.api.node_detail(token, slug))
            .await
            .map_err(|e| e.for_node(slug))?;

        if !item.is_container() {
            let episodes = self
                .episodes_of(&detail.category_id, detail.first_page)
                .await
                .map_err(|e| e.for_node(slug))?;
            return Ok(SeriesNode::leaf(item.title.clone(), item.slug.clone(), episodes));
        }

        let subs = self
            .subseries_of(&detail.category_id)
            .await
            .map_err(|e| e.for_node(slug))?;
        debug!("    子系列: {} 个", subs.len());

        let mut subseries = Vec::with_capacity(subs.len());
        for (idx, sub) in subs.into_iter().enumerate() {
            debug!("    [{}] 子系列: {}", idx + 1, sub.title);
            let sub_slug = sub.slug.as_str();
            let sub_detail = self
                .call(format!("子系列 {} 详情", sub_slug), |_| {
                    self.api.node_detail(token, sub_slug)
                })
                .await
                .map_err(|e| e.for_node(slug))?;
            let episodes = self
                .episodes_of(&sub_detail.category_id, sub_detail.first_page)
                .await
                .map_err(|e| e.for_node(slug))?;
            subseries.push(SubSeriesNode {
                title: sub.title,
                slug: sub.slug,
                episodes,
            });
        }

        Ok(SeriesNode::container(item.title.clone(), item.slug.clone(), subseries))
    }

    async fn subseries_of(&self, category_id: &str) -> Result<Vec<SubSeriesItem>, CallError> {
        let per_page = self.config.subseries_per_page;
        accumulate_until_total("子系列列表", |page| {
            self.call(format!("子系列列表第 {} 页", page), move |_| {
                self.api.subseries_page(category_id, page, per_page)
            })
        })
        .await
    }

    async fn episodes_of(
        &self,
        category_id: &str,
        first_page: Option<Page<Episode>>,
    ) -> Result<Vec<Episode>, CallError> {
        let per_page = self.config.episodes_per_page;
        let first = match first_page {
            Some(page) => page,
            None => {
                self.call("剧集列表第 1 页".to_string(), |_| {
                    self.api.episodes_page(category_id, 1, per_page)
                })
                .await?
            }
        };
        debug!("    剧集: 声明 {} 集", first.total);

        fetch_remaining_pages("剧集列表", first, per_page, |page| {
            self.call(format!("剧集列表第 {} 页", page), move |_| {
                self.api.episodes_page(category_id, page, per_page)
            })
        })
        .await
    }

    // 带重试与取消的远程调用
    async fn call<R, F, Fut>(&self, what: String, op: F) -> Result<R, CallError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<R, ApiError>>,
    {
        if self.cancel.is_cancelled() {
            return Err(CallError::Cancelled);
        }
        tokio::select! {
            _ = self.cancel.cancelled() => Err(CallError::Cancelled),
            result = self.config.retry.run(&what, op) => result.map_err(CallError::Api),
        }
    }

    async fn checkpoint(store: Option<&dyn CacheStore>, tree: &CatalogTree) -> Result<(), CrawlError> {
        if let Some(store) = store {
            store.save(tree).await?;
        }
        Ok(())
    }
}

// 上次目录中同 slug、同类型的系列可以直接复用
fn reusable_node<'a>(previous: &'a CatalogTree, item: &SeriesItem) -> Option<&'a SeriesNode> {
    previous
        .find(&item.slug)
        .filter(|node| node.is_container() == item.is_container())
}
