// src/ingest/http.rs
//! HTTP seam shared by the adapters. `Transport` is the trait tests fake;
//! `HttpTransport` is the reqwest-backed production implementation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use indexmap::IndexMap;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT_LANGUAGE};
use std::time::Duration;
use thiserror::Error;

use crate::config::HttpConfig;

/// Why a single fetch failed. Adapters log these and skip the unit.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("timeout fetching {url}")]
    Timeout { url: String },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected payload from {url}: {reason}")]
    Shape { url: String, reason: String },
}

impl FetchError {
    fn from_reqwest(url: &str, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                source: e,
            }
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// GET a page and return its body. Non-2xx is an error.
    async fn get_text(&self, url: &str) -> Result<String, FetchError>;

    /// POST a JSON body and parse the JSON response. Non-2xx or a non-JSON
    /// body is an error.
    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, FetchError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a client with the configured user agent/timeout plus per-source headers
    /// (e.g. a `Referer` the GraphQL endpoint expects).
    pub fn new(cfg: &HttpConfig, extra_headers: &IndexMap<String, String>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("de-DE,de;q=0.9,en-US;q=0.8,en;q=0.7"),
        );
        for (k, v) in extra_headers {
            let name = HeaderName::from_bytes(k.as_bytes())
                .with_context(|| format!("invalid header name `{k}`"))?;
            let value =
                HeaderValue::from_str(v).with_context(|| format!("invalid value for header `{k}`"))?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .connect_timeout(Duration::from_secs(cfg.timeout_secs.min(10)))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .default_headers(headers)
            .build()
            .context("building http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        resp.text().await.map_err(|e| FetchError::from_reqwest(url, e))
    }

    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, FetchError> {
        let resp = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let text = resp
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        serde_json::from_str(&text).map_err(|e| FetchError::Shape {
            url: url.to_string(),
            reason: format!("non-JSON body ({e})"),
        })
    }
}
