use reqwest::StatusCode;
use thiserror::Error;

use crate::common::retry::Retryable;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("网络请求失败: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("HTTP 状态异常: {status} ({url})")]
    Status { status: StatusCode, url: String },

    #[error("响应解析失败: {0}")]
    InvalidResponse(String),

    #[error("无效的URL: {0}")]
    InvalidUrl(String),

    #[error("未能在落地页中找到部署令牌")]
    TokenNotFound,
}

impl ApiError {
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Reqwest(e) => e.status(),
            _ => None,
        }
    }
}

impl Retryable for ApiError {
    // 超时、连接失败、5xx、429 视为瞬时错误；结构不符等属于致命错误
    fn is_transient(&self) -> bool {
        match self {
            ApiError::Reqwest(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.is_request()
                    || e.is_body()
                    || e.status().is_some_and(is_transient_status)
            }
            ApiError::Status { status, .. } => is_transient_status(*status),
            ApiError::InvalidResponse(_) | ApiError::InvalidUrl(_) | ApiError::TokenNotFound => {
                false
            }
        }
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidResponse(e.to_string())
    }
}

impl From<url::ParseError> for ApiError {
    fn from(e: url::ParseError) -> Self {
        Self::InvalidUrl(e.to_string())
    }
}
