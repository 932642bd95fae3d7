//! 部署令牌（Next.js buildId）解析。
//!
//! 令牌只在一次抓取内有效，不做跨运行缓存。解析依赖站点页面的内部格式，
//! 所以抓取器只通过 [`BuildTokenSource`] 使用它，测试时可以直接替换。

use std::fmt;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info};

use crate::common::client::client::OshoClient;
use crate::common::client::error::ApiError;
use crate::common::models::Language;

lazy_static! {
    static ref BUILD_ID_MARKER: Regex = Regex::new(r#""buildId"\s*:\s*"([^"]+)""#).expect("静态正则");
    static ref BUILD_MANIFEST: Regex =
        Regex::new(r"/_next/static/([^/]+)/_buildManifest\.js").expect("静态正则");
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildToken(String);

impl BuildToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BuildToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait]
pub trait BuildTokenSource: Send + Sync {
    async fn resolve(&self, language: Language) -> Result<BuildToken, ApiError>;
}

/// 从页面源码中提取令牌：优先内嵌的 `"buildId"`，其次 `_buildManifest.js` 的路径
pub fn extract_build_token(html: &str) -> Option<BuildToken> {
    BUILD_ID_MARKER
        .captures(html)
        .or_else(|| BUILD_MANIFEST.captures(html))
        .and_then(|caps| caps.get(1))
        .map(|m| BuildToken::new(m.as_str()))
}

// 通过语言对应的落地页解析令牌
pub struct PageBuildTokenSource {
    client: OshoClient,
}

impl PageBuildTokenSource {
    pub fn new(client: OshoClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BuildTokenSource for PageBuildTokenSource {
    async fn resolve(&self, language: Language) -> Result<BuildToken, ApiError> {
        debug!("解析部署令牌: {}", language.landing_path());
        let html = self.client.get_text(language.landing_path()).await?;
        let token = extract_build_token(&html).ok_or(ApiError::TokenNotFound)?;
        info!("部署令牌: {}", token);
        Ok(token)
    }
}
