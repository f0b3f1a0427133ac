use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::GoogleConfig;
use crate::error::{AppError, Result};
use crate::http::{build_http_client, resolve_url, send, ApiClient, ApiResponse};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Google Ads REST client. `authenticate` must run before any request.
pub struct GoogleClient {
    http: reqwest::Client,
    base_url: String,
    token_url: String,
    client_id: String,
    client_secret: String,
    refresh_token: String,
    developer_token: String,
    login_customer_id: Option<String>,
    access_token: Option<String>,
}

impl GoogleClient {
    pub fn new(cfg: &GoogleConfig) -> Result<Self> {
        Ok(Self {
            http: build_http_client()?,
            base_url: format!("{}/{}", cfg.api_url.trim_end_matches('/'), cfg.api_version),
            token_url: cfg.token_url.clone(),
            client_id: cfg.client_id.clone(),
            client_secret: cfg.client_secret.clone(),
            refresh_token: cfg.refresh_token.clone(),
            developer_token: cfg.developer_token.clone(),
            login_customer_id: cfg.login_customer_id.clone(),
            access_token: None,
        })
    }
}

#[async_trait]
impl ApiClient for GoogleClient {
    /// Exchanges the refresh token for a short-lived access token.
    async fn authenticate(&mut self) -> Result<()> {
        let form = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", self.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];
        let resp = send(self.http.post(&self.token_url).form(&form)).await?;
        if !resp.is_success() {
            warn!(status = resp.status, "Google OAuth token exchange rejected");
            return Err(AppError::Auth(format!("token endpoint returned {}: {}", resp.status, resp.body)));
        }
        let token: TokenResponse = serde_json::from_str(&resp.body)
            .map_err(|e| AppError::Auth(format!("unreadable token response: {e}")))?;
        debug!(expires_in = ?token.expires_in, "Google access token obtained");
        self.access_token = Some(token.access_token);
        Ok(())
    }

    async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<ApiResponse> {
        let token = self
            .access_token
            .as_deref()
            .ok_or_else(|| AppError::Auth("Google client used before authenticate".to_string()))?;
        let url = resolve_url(&self.base_url, path);
        let mut builder = self
            .http
            .request(method, &url)
            .bearer_auth(token)
            .header("developer-token", &self.developer_token);
        if let Some(login) = &self.login_customer_id {
            builder = builder.header("login-customer-id", login);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }
        send(builder).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn request_before_authenticate_is_an_auth_error() {
        let cfg = GoogleConfig {
            api_url: "https://ads.test".to_string(),
            api_version: "v17".to_string(),
            token_url: "https://oauth.test/token".to_string(),
            developer_token: "dev".to_string(),
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            refresh_token: "refresh".to_string(),
            customer_id: "1234567890".to_string(),
            login_customer_id: None,
            max_attempts: 3,
            retry_base_delay: Duration::from_secs(1),
        };
        let client = GoogleClient::new(&cfg).unwrap();
        assert_eq!(client.base_url, "https://ads.test/v17");
        let err = client.request(Method::POST, "/customers/1/googleAds:searchStream", None).await.unwrap_err();
        assert!(matches!(err, AppError::Auth(_)));
    }
}
