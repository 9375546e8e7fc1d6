//! HTTP client interface (spec.md §4.9 `HTTPClient`) and the retry wrapper
//! spec.md §5 requires: only transport-level errors get retried, never HTTP
//! status codes.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::error::{CrawlError, CrawlResult};

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub text: String,
}

#[async_trait::async_trait]
pub trait HttpClient: Send + Sync {
    async fn fetch(
        &self,
        url: &Url,
        timeout_ms: u64,
        headers: &[(&str, &str)],
    ) -> CrawlResult<FetchResponse>;
}

pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new(user_agent: &str) -> CrawlResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| CrawlError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn fetch(
        &self,
        url: &Url,
        timeout_ms: u64,
        headers: &[(&str, &str)],
    ) -> CrawlResult<FetchResponse> {
        let mut header_map = HeaderMap::new();
        for (k, v) in headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(k.as_bytes()),
                HeaderValue::from_str(v),
            ) {
                header_map.insert(name, value);
            }
        }

        let result = self
            .client
            .get(url.clone())
            .headers(header_map)
            .timeout(Duration::from_millis(timeout_ms))
            .send()
            .await;

        let response = match result {
            Ok(r) => r,
            Err(e) if e.is_timeout() => return Err(CrawlError::Timeout(timeout_ms)),
            Err(e) => return Err(CrawlError::Transport(e.to_string())),
        };

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| CrawlError::Transport(e.to_string()))?;

        Ok(FetchResponse { status, text })
    }
}

/// Retries transport-level failures up to `retries` additional attempts.
/// HTTP status codes are never retried here; callers interpret status after
/// a successful fetch.
pub async fn fetch_with_retries(
    client: &dyn HttpClient,
    url: &Url,
    timeout_ms: u64,
    headers: &[(&str, &str)],
    retries: usize,
) -> CrawlResult<FetchResponse> {
    let mut attempt = 0;
    loop {
        match client.fetch(url, timeout_ms, headers).await {
            Ok(resp) => return Ok(resp),
            Err(CrawlError::Timeout(ms)) if attempt < retries => {
                attempt += 1;
                tracing::debug!(url = %url, attempt, "retrying after timeout");
                let _ = ms;
            }
            Err(CrawlError::Transport(msg)) if attempt < retries => {
                attempt += 1;
                tracing::debug!(url = %url, attempt, %msg, "retrying after transport error");
            }
            Err(other) => return Err(other),
        }
    }
}
