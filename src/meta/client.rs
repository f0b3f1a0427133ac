use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use crate::config::MetaConfig;
use crate::error::Result;
use crate::http::{build_http_client, resolve_url, send, ApiClient, ApiResponse};

/// Graph API client authenticated with a long-lived access token.
pub struct MetaClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl MetaClient {
    pub fn new(cfg: &MetaConfig) -> Result<Self> {
        Ok(Self {
            http: build_http_client()?,
            base_url: graph_base_url(cfg),
            access_token: cfg.access_token.clone(),
        })
    }
}

/// `{api_url}/{version}`, e.g. `https://graph.facebook.com/v19.0`.
pub fn graph_base_url(cfg: &MetaConfig) -> String {
    format!("{}/{}", cfg.api_url.trim_end_matches('/'), cfg.api_version)
}

#[async_trait]
impl ApiClient for MetaClient {
    async fn authenticate(&mut self) -> Result<()> {
        // The token is issued out of band; nothing to exchange.
        Ok(())
    }

    async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<ApiResponse> {
        let url = resolve_url(&self.base_url, path);
        let mut builder = self.http.request(method, &url).bearer_auth(&self.access_token);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        send(builder).await
    }
}
