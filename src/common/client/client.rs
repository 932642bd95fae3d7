use std::time::Duration;

use reqwest::{
    Client, ClientBuilder, Response, Url,
    header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT},
};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, error};

use super::error::ApiError;

pub const DEFAULT_BASE_URL: &str = "https://oshoworld.com";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    /// 接口请求的整体超时
    pub request_timeout: Duration,
    /// 媒体下载的建连超时
    pub connect_timeout: Duration,
    /// 媒体下载的单次读超时，长文件不受整体超时限制
    pub read_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(60),
        }
    }
}

// 站点客户端：接口请求与媒体下载共用默认请求头，但使用不同的超时设置
#[derive(Debug, Clone)]
pub struct OshoClient {
    pub inner: Client,
    media: Client,
    base: Url,
}

impl OshoClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let base = Url::parse(&config.base_url)?;

        let inner = ClientBuilder::new()
            .timeout(config.request_timeout)
            .default_headers(Self::get_default_headers())
            .build()?;

        let media = ClientBuilder::new()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .default_headers(Self::get_default_headers())
            .build()?;

        Ok(Self { inner, media, base })
    }

    pub fn get_default_headers() -> HeaderMap {
        // 创建默认请求头
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("Mozilla/5.0"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// 站内路径（例如 `/api/...` 或剧集的 `file` 字段）拼成完整 URL
    pub fn url(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base.join(path)?)
    }

    // POST JSON 请求
    pub async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.url(path)?;
        debug!("POST {}", url);
        let resp = self.inner.post(url).json(body).send().await?;
        Self::handle_response::<T>(resp).await
    }

    // GET JSON 请求
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path)?;
        debug!("GET {}", url);
        let resp = self.inner.get(url).send().await?;
        Self::handle_response::<T>(resp).await
    }

    // GET 页面文本（用于解析部署令牌）
    pub async fn get_text(&self, path: &str) -> Result<String, ApiError> {
        let url = self.url(path)?;
        debug!("GET {}", url);
        let resp = Self::check_status(self.inner.get(url).send().await?)?;
        Ok(resp.text().await?)
    }

    // 媒体文件的原始响应，调用方自行流式读取
    pub async fn get_raw_response(&self, path: &str) -> Result<Response, ApiError> {
        let url = self.url(path)?;
        debug!("GET (media) {}", url);
        let resp = self.media.get(url).send().await?;
        Self::check_status(resp)
    }

    fn check_status(resp: Response) -> Result<Response, ApiError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        error!("请求失败，状态码: {}，URL: {}", status, resp.url());
        Err(ApiError::Status {
            status,
            url: resp.url().to_string(),
        })
    }

    async fn handle_response<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
        let resp = Self::check_status(resp)?;
        let url = resp.url().to_string();
        let raw_body = resp.bytes().await?;

        match serde_json::from_slice::<T>(&raw_body) {
            Ok(data) => Ok(data),
            Err(e) => {
                error!("失败的请求的URL: {}", url);
                error!("JSON 结构匹配失败: {}", e);
                error!("期望的结构 可能是: {}", std::any::type_name::<T>());
                let preview: String = String::from_utf8_lossy(&raw_body).chars().take(200).collect();
                Err(ApiError::InvalidResponse(format!(
                    "结构匹配失败: {}. 响应: {}",
                    e, preview
                )))
            }
        }
    }
}
