pub mod poll;
pub mod retry;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use crate::config::HTTP_TIMEOUT_SECS;
use crate::error::{AppError, Result};

/// Status and raw body of a vendor response. Non-2xx responses are returned,
/// not raised, so callers decide whether they are retryable.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> Result<Value> {
        Ok(serde_json::from_str(&self.body)?)
    }

    /// Turns a non-2xx response into `AppError::Api`.
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(AppError::Api { status: self.status, body: self.body })
        }
    }
}

/// One implementation per vendor; signing and auth headers live behind it.
/// `path` is relative to the vendor base URL unless it is already absolute.
#[async_trait]
pub trait ApiClient: Send + Sync {
    async fn authenticate(&mut self) -> Result<()>;

    async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<ApiResponse>;
}

pub fn build_http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()?)
}

/// Joins a base URL and a path, leaving absolute URLs untouched.
pub fn resolve_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        path.to_string()
    } else {
        format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}

/// Sends a prepared request and captures status + body without judging them.
pub async fn send(builder: reqwest::RequestBuilder) -> Result<ApiResponse> {
    let resp = builder.send().await?;
    let status = resp.status().as_u16();
    let body = resp.text().await?;
    Ok(ApiResponse { status, body })
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_url_joins_and_passes_absolute() {
        assert_eq!(resolve_url("https://a.test/", "/x/y"), "https://a.test/x/y");
        assert_eq!(resolve_url("https://a.test", "x"), "https://a.test/x");
        assert_eq!(resolve_url("https://a.test", "https://b.test/z?q=1"), "https://b.test/z?q=1");
    }

    #[test]
    fn error_for_status_keeps_body() {
        let resp = ApiResponse { status: 400, body: "bad".to_string() };
        match resp.error_for_status() {
            Err(AppError::Api { status, body }) => {
                assert_eq!(status, 400);
                assert_eq!(body, "bad");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }
}
