use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use osho_downloader::catalog::store::{CacheStore, JsonCacheStore};
use osho_downloader::common::client::error::ApiError;
use osho_downloader::common::client::models::listing::{SeriesItem, SubSeriesItem};
use osho_downloader::crawler::api::{CatalogApi, NodeDetail};
use osho_downloader::crawler::pagination::Page;
use osho_downloader::crawler::token::{BuildToken, BuildTokenSource};
use osho_downloader::{
    CatalogCrawler, CrawlConfig, CrawlError, Episode, Language, RetryPolicy, SeriesContent,
};

fn episode(slug: &str) -> Episode {
    Episode {
        title: slug.to_uppercase(),
        slug: slug.to_string(),
        duration: None,
        file: format!("/audio/{}.mp3", slug),
        description: None,
        size: None,
    }
}

fn episodes(prefix: &str, n: usize) -> Vec<Episode> {
    (1..=n).map(|i| episode(&format!("{}-{:02}", prefix, i))).collect()
}

fn page_of<T: Clone>(items: &[T], page: u32, per_page: u32) -> Page<T> {
    let start = ((page - 1) * per_page) as usize;
    let chunk = items
        .iter()
        .skip(start)
        .take(per_page as usize)
        .cloned()
        .collect();
    Page::new(chunk, items.len() as u64)
}

fn transient() -> ApiError {
    ApiError::Status {
        status: StatusCode::SERVICE_UNAVAILABLE,
        url: "https://example.test".to_string(),
    }
}

#[derive(Default)]
struct SiteState {
    listing: Vec<SeriesItem>,
    listing_per_page: u32,
    // slug -> (category id, 详情页是否内嵌第一页剧集)
    details: HashMap<String, (String, bool)>,
    subseries: HashMap<String, Vec<SubSeriesItem>>,
    episodes: HashMap<String, Vec<Episode>>,
    broken: Mutex<HashSet<String>>,
    flaky: Mutex<HashMap<String, u32>>,
    hang_on: Option<(String, CancellationToken)>,
    detail_calls: Mutex<Vec<String>>,
    episode_pages: Mutex<Vec<(String, u32)>>,
}

#[derive(Clone)]
struct FakeSite {
    state: Arc<SiteState>,
}

impl FakeSite {
    fn detail_calls(&self) -> Vec<String> {
        self.state.detail_calls.lock().unwrap().clone()
    }

    fn repair(&self, slug: &str) {
        self.state.broken.lock().unwrap().remove(slug);
    }
}

#[async_trait]
impl CatalogApi for FakeSite {
    async fn series_page(&self, language: Language, page: u32) -> Result<Page<SeriesItem>, ApiError> {
        assert_eq!(language, Language::Hindi);
        Ok(page_of(&self.state.listing, page, self.state.listing_per_page))
    }

    async fn subseries_page(
        &self,
        category_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Page<SubSeriesItem>, ApiError> {
        let subs = self.state.subseries.get(category_id).cloned().unwrap_or_default();
        Ok(page_of(&subs, page, per_page))
    }

    async fn episodes_page(
        &self,
        category_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Page<Episode>, ApiError> {
        self.state
            .episode_pages
            .lock()
            .unwrap()
            .push((category_id.to_string(), page));
        if self.state.broken.lock().unwrap().contains(category_id) {
            return Err(ApiError::InvalidResponse(format!("{} 分页异常", category_id)));
        }
        let eps = self.state.episodes.get(category_id).cloned().unwrap_or_default();
        Ok(page_of(&eps, page, per_page))
    }

    async fn node_detail(&self, token: &BuildToken, slug: &str) -> Result<NodeDetail, ApiError> {
        assert_eq!(token.as_str(), "build-123");
        self.state.detail_calls.lock().unwrap().push(slug.to_string());

        if let Some((hang, cancel)) = &self.state.hang_on {
            if hang == slug {
                cancel.cancel();
                std::future::pending::<()>().await;
            }
        }
        if self.state.broken.lock().unwrap().contains(slug) {
            return Err(ApiError::InvalidResponse(format!("{} 结构异常", slug)));
        }
        {
            let mut flaky = self.state.flaky.lock().unwrap();
            if let Some(left) = flaky.get_mut(slug) {
                if *left > 0 {
                    *left -= 1;
                    return Err(transient());
                }
            }
        }

        let (category_id, embedded) = self
            .state
            .details
            .get(slug)
            .cloned()
            .ok_or_else(|| ApiError::InvalidResponse(format!("未知节点 {}", slug)))?;
        let first_page = embedded.then(|| {
            let eps = self.state.episodes.get(&category_id).cloned().unwrap_or_default();
            page_of(&eps, 1, 10)
        });
        Ok(NodeDetail {
            category_id,
            first_page,
        })
    }
}

#[derive(Clone, Default)]
struct FakeTokens {
    resolved: Arc<AtomicUsize>,
}

#[async_trait]
impl BuildTokenSource for FakeTokens {
    async fn resolve(&self, _language: Language) -> Result<BuildToken, ApiError> {
        self.resolved.fetch_add(1, Ordering::SeqCst);
        Ok(BuildToken::new("build-123"))
    }
}

fn series_item(title: &str, slug: &str, container: bool) -> SeriesItem {
    SeriesItem {
        title: title.to_string(),
        slug: slug.to_string(),
        count_series: container.then(|| json!(2)),
    }
}

// alpha: 23 集的普通系列；beta: 两个子系列的容器；gamma: 5 集的普通系列
fn sample_site() -> SiteState {
    let mut state = SiteState {
        listing: vec![
            series_item("Alpha", "alpha", false),
            series_item("Beta", "beta", true),
            series_item("Gamma", "gamma", false),
        ],
        listing_per_page: 2,
        ..SiteState::default()
    };
    state.details.insert("alpha".into(), ("cat-alpha".into(), true));
    state.details.insert("beta".into(), ("cat-beta".into(), false));
    state.details.insert("beta-one".into(), ("cat-beta-one".into(), false));
    state.details.insert("beta-two".into(), ("cat-beta-two".into(), true));
    state.details.insert("gamma".into(), ("cat-gamma".into(), true));
    state.subseries.insert(
        "cat-beta".into(),
        vec![
            SubSeriesItem {
                title: "Beta One".into(),
                slug: "beta-one".into(),
            },
            SubSeriesItem {
                title: "Beta Two".into(),
                slug: "beta-two".into(),
            },
        ],
    );
    state.episodes.insert("cat-alpha".into(), episodes("alpha", 23));
    state.episodes.insert("cat-beta-one".into(), episodes("b1", 3));
    state.episodes.insert("cat-beta-two".into(), episodes("b2", 12));
    state.episodes.insert("cat-gamma".into(), episodes("gamma", 5));
    state
}

fn fast_config() -> CrawlConfig {
    CrawlConfig {
        retry: RetryPolicy::new(3, Duration::ZERO),
        ..CrawlConfig::default()
    }
}

#[tokio::test]
async fn crawl_builds_ordered_tree_with_containers() {
    let site = FakeSite {
        state: Arc::new(sample_site()),
    };
    let tokens = FakeTokens::default();
    let crawler = CatalogCrawler::new(site.clone(), tokens.clone(), fast_config());

    let tree = crawler.crawl(Language::Hindi).await.unwrap();

    assert!(tree.complete);
    assert!(tree.failed.is_empty());
    let slugs: Vec<&str> = tree.series.iter().map(|s| s.slug.as_str()).collect();
    assert_eq!(slugs, vec!["alpha", "beta", "gamma"]);

    let alpha = &tree.series[0];
    assert!(!alpha.is_container());
    let SeriesContent::Leaf { episodes } = &alpha.content else {
        panic!("alpha 应为普通系列");
    };
    let order: Vec<&str> = episodes.iter().map(|e| e.slug.as_str()).collect();
    let expected: Vec<String> = (1..=23).map(|i| format!("alpha-{:02}", i)).collect();
    assert_eq!(order, expected.iter().map(String::as_str).collect::<Vec<_>>());

    let SeriesContent::Container { subseries } = &tree.series[1].content else {
        panic!("beta 应为容器");
    };
    assert_eq!(subseries.len(), 2);
    assert_eq!(subseries[0].slug, "beta-one");
    assert_eq!(subseries[0].episodes.len(), 3);
    assert_eq!(subseries[1].episodes.len(), 12);
    assert_eq!(tree.episode_count(), 23 + 3 + 12 + 5);

    // 令牌只解析一次；内嵌了第一页的节点不会重复请求第 1 页
    assert_eq!(tokens.resolved.load(Ordering::SeqCst), 1);
    let pages = site.state.episode_pages.lock().unwrap().clone();
    assert!(pages.contains(&("cat-alpha".to_string(), 2)));
    assert!(pages.contains(&("cat-alpha".to_string(), 3)));
    assert!(!pages.contains(&("cat-alpha".to_string(), 1)));
    assert!(pages.contains(&("cat-beta-one".to_string(), 1)));
    assert!(!pages.iter().any(|(id, _)| id == "cat-gamma"));
}

#[tokio::test]
async fn transient_errors_are_retried() {
    let state = sample_site();
    state.flaky.lock().unwrap().insert("gamma".into(), 2);
    let site = FakeSite {
        state: Arc::new(state),
    };
    let crawler = CatalogCrawler::new(site.clone(), FakeTokens::default(), fast_config());

    let tree = crawler.crawl(Language::Hindi).await.unwrap();

    assert!(tree.complete);
    assert_eq!(tree.find("gamma").unwrap().episode_count(), 5);
    let gamma_calls = site.detail_calls().iter().filter(|s| *s == "gamma").count();
    assert_eq!(gamma_calls, 3);
}

#[tokio::test]
async fn failed_node_is_skipped_then_resumed_from_cache() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonCacheStore::new(dir.path());

    let state = sample_site();
    state.broken.lock().unwrap().insert("beta".into());
    let site = FakeSite {
        state: Arc::new(state),
    };
    let crawler = CatalogCrawler::new(site.clone(), FakeTokens::default(), fast_config());

    let tree = crawler
        .crawl_with(Language::Hindi, None, Some(&store))
        .await
        .unwrap();
    assert!(!tree.complete);
    assert_eq!(tree.failed, vec!["beta".to_string()]);
    let slugs: Vec<&str> = tree.series.iter().map(|s| s.slug.as_str()).collect();
    assert_eq!(slugs, vec!["alpha", "gamma"]);
    // 非瞬时错误不重试
    assert_eq!(site.detail_calls().iter().filter(|s| *s == "beta").count(), 1);

    let cached = store.load(Language::Hindi).await.unwrap().unwrap();
    assert_eq!(cached, tree);

    // 修复后继续：只抓取缺失的系列
    site.repair("beta");
    site.state.detail_calls.lock().unwrap().clear();
    let resumed = crawler
        .crawl_with(Language::Hindi, Some(&cached), Some(&store))
        .await
        .unwrap();

    assert!(resumed.complete);
    let slugs: Vec<&str> = resumed.series.iter().map(|s| s.slug.as_str()).collect();
    assert_eq!(slugs, vec!["alpha", "beta", "gamma"]);
    assert_eq!(site.detail_calls(), vec!["beta", "beta-one", "beta-two"]);
    assert!(store.load(Language::Hindi).await.unwrap().unwrap().complete);
}

#[tokio::test]
async fn cancellation_checkpoints_partial_tree() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonCacheStore::new(dir.path());
    let cancel = CancellationToken::new();

    let mut state = sample_site();
    state.hang_on = Some(("beta".into(), cancel.clone()));
    let site = FakeSite {
        state: Arc::new(state),
    };
    let crawler = CatalogCrawler::new(site, FakeTokens::default(), fast_config())
        .with_cancellation(cancel);

    let result = crawler.crawl_with(Language::Hindi, None, Some(&store)).await;
    assert!(matches!(result, Err(CrawlError::Cancelled)));

    let partial = store.load(Language::Hindi).await.unwrap().unwrap();
    assert!(!partial.complete);
    assert_eq!(partial.series.len(), 1);
    assert_eq!(partial.series[0].slug, "alpha");
}

#[tokio::test]
async fn fully_cached_tree_needs_no_token() {
    let site = FakeSite {
        state: Arc::new(sample_site()),
    };
    let tokens = FakeTokens::default();
    let crawler = CatalogCrawler::new(site.clone(), tokens.clone(), fast_config());
    let first = crawler.crawl(Language::Hindi).await.unwrap();
    site.state.detail_calls.lock().unwrap().clear();

    let again = crawler
        .crawl_with(Language::Hindi, Some(&first), None)
        .await
        .unwrap();

    assert_eq!(again.series, first.series);
    assert!(site.detail_calls().is_empty());
    assert_eq!(tokens.resolved.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn episode_errors_name_the_series_slug() {
    let state = sample_site();
    state.broken.lock().unwrap().insert("cat-gamma".into());
    let site = FakeSite {
        state: Arc::new(state),
    };
    let crawler = CatalogCrawler::new(site, FakeTokens::default(), fast_config());

    let err = crawler
        .fetch_episodes("gamma", "cat-gamma", None)
        .await
        .unwrap_err();
    assert!(
        matches!(&err, CrawlError::Node { slug, .. } if slug == "gamma"),
        "unexpected error: {:?}",
        err
    );

    let subs = crawler.fetch_subseries("beta", "cat-beta").await.unwrap();
    assert_eq!(subs.len(), 2);
    assert_eq!(subs[0].slug, "beta-one");
}
