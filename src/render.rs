//! Headless-browser render fallback interface (spec.md §4.9 `HTMLRenderer`).
//!
//! This crate never embeds a real browser (spec.md Non-goals: "JavaScript
//! execution semantics beyond delegating to a headless renderer"); it only
//! defines the trait workers escalate to, plus a couple of concrete
//! instances useful without one: a no-op default and a re-fetch test double
//! that exercises the full escalation path in the test suite.

use url::Url;

use crate::error::{CrawlError, CrawlResult};
use crate::http::HttpClient;

#[async_trait::async_trait]
pub trait HtmlRenderer: Send + Sync {
    async fn render(&self, url: &Url, timeout_ms: u64, user_agent: &str) -> CrawlResult<String>;
}

/// Used when no renderer is configured; any `htmlInsufficient` escalation
/// against it fails the job, per spec.md §9(b).
pub struct NullRenderer;

#[async_trait::async_trait]
impl HtmlRenderer for NullRenderer {
    async fn render(&self, _url: &Url, _timeout_ms: u64, _user_agent: &str) -> CrawlResult<String> {
        Err(CrawlError::RenderUnavailable(
            "no headless renderer configured".to_string(),
        ))
    }
}

/// Test double: re-fetches the same URL through an ordinary HTTP client.
/// Stands in for a real headless browser in integration tests that exercise
/// the render-escalation protocol end to end without bundling one.
pub struct ReqwestRenderer<'a> {
    client: &'a dyn HttpClient,
}

impl<'a> ReqwestRenderer<'a> {
    pub fn new(client: &'a dyn HttpClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl<'a> HtmlRenderer for ReqwestRenderer<'a> {
    async fn render(&self, url: &Url, timeout_ms: u64, user_agent: &str) -> CrawlResult<String> {
        let resp = self
            .client
            .fetch(url, timeout_ms, &[("User-Agent", user_agent)])
            .await?;
        if resp.status >= 200 && resp.status < 300 {
            Ok(resp.text)
        } else {
            Err(CrawlError::Http {
                status: resp.status,
                reason: "render fetch failed".to_string(),
            })
        }
    }
}
