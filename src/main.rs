use anyhow::{Context, bail};
use clap::Parser;
use regex::RegexBuilder;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use osho_downloader::catalog::store::{CacheStore, JsonCacheStore};
use osho_downloader::catalog::{CatalogTree, SeriesNode};
use osho_downloader::cli::{Cli, parse_selection};
use osho_downloader::common::client::client::{ClientConfig, OshoClient};
use osho_downloader::common::logger::PrettyLogger;
use osho_downloader::crawler::token::PageBuildTokenSource;
use osho_downloader::crawler::{CatalogCrawler, CrawlConfig};
use osho_downloader::downloader::FetchEngine;
use osho_downloader::downloader::models::DownloadConfig;
use osho_downloader::CrawlError;

/// 读取缓存目录；缺失、不完整或要求刷新时重新抓取
async fn load_catalog(
    args: &Cli,
    client: &OshoClient,
    store: &JsonCacheStore,
    cancel: &CancellationToken,
) -> anyhow::Result<CatalogTree> {
    let cached = if args.refresh {
        info!("忽略缓存，重新抓取目录");
        None
    } else {
        match store.load(args.language).await {
            Ok(cached) => cached,
            Err(e) => {
                warn!("缓存不可用，将重新抓取: {}", e);
                None
            }
        }
    };

    let cached = match cached {
        Some(tree) if tree.complete => {
            info!(
                "使用缓存目录: {} ({} 个系列)",
                store.path_for(args.language).display(),
                tree.series.len()
            );
            return Ok(tree);
        }
        Some(partial) => {
            info!("缓存目录不完整，继续抓取 (已有 {} 个系列)", partial.series.len());
            Some(partial)
        }
        None => None,
    };

    PrettyLogger::stage(format!("抓取目录 ({})", args.language));
    let crawler = CatalogCrawler::new(
        client.clone(),
        PageBuildTokenSource::new(client.clone()),
        CrawlConfig::default(),
    )
    .with_cancellation(cancel.clone());

    match crawler
        .crawl_with(args.language, cached.as_ref(), Some(store as &dyn CacheStore))
        .await
    {
        Ok(tree) => Ok(tree),
        Err(CrawlError::Cancelled) => bail!("目录抓取已取消，已抓取部分已写入缓存"),
        Err(e) => Err(e).context("目录抓取失败"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    // 初始化日志
    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();
    debug!("命令行参数: {:?}", args);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("收到中断信号，正在停止...");
                cancel.cancel();
            }
        });
    }

    let client = OshoClient::new(&ClientConfig::default()).context("创建 HTTP 客户端失败")?;
    let store = JsonCacheStore::new(&args.cache_dir);
    let tree = load_catalog(&args, &client, &store, &cancel).await?;
    if !tree.failed.is_empty() {
        PrettyLogger::warning(format!(
            "{} 个系列抓取失败，下次运行会补抓: {}",
            tree.failed.len(),
            tree.failed.join(", ")
        ));
    }

    // 标题过滤
    let listed: Vec<&SeriesNode> = match &args.search {
        Some(pattern) => {
            let re = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .with_context(|| format!("无效的搜索表达式: {}", pattern))?;
            tree.series.iter().filter(|node| re.is_match(&node.title)).collect()
        }
        None => tree.series.iter().collect(),
    };

    PrettyLogger::catalog(listed.iter().copied());

    let Some(selection) = &args.select else {
        PrettyLogger::info(format!("共 {} 个系列，使用 --select 选择要下载的系列", listed.len()));
        return Ok(());
    };
    let picked = parse_selection(selection, listed.len()).context("解析 --select 失败")?;

    let config = DownloadConfig {
        concurrency: args.concurrency.max(1),
        show_progress: !args.no_progress,
        ..DownloadConfig::default()
    };
    let engine = FetchEngine::new(client, config).with_cancellation(cancel.clone());
    let root = args.output_dir.join(args.language.as_str());

    let mut reports = Vec::new();
    for (n, idx) in picked.iter().enumerate() {
        if cancel.is_cancelled() {
            break;
        }
        let node = listed[*idx];
        PrettyLogger::stage(format!("[{}/{}] {}", n + 1, picked.len(), node.title));
        reports.extend(engine.download_series(node, &root).await);
    }
    PrettyLogger::download_summary(&reports);
    let failed: usize = reports.iter().map(|r| r.failed()).sum();

    if cancel.is_cancelled() {
        bail!("下载已取消");
    }
    if failed > 0 {
        PrettyLogger::error(format!("{} 集下载失败", failed));
        bail!("{} 集下载失败，重新运行可补下", failed);
    }
    PrettyLogger::success("全部下载完成！");
    Ok(())
}
