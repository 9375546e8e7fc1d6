//! `crawly-site` mirrors a documentation site into a cross-linked local
//! Markdown tree: it respects `robots.txt`, prefers a site's own Markdown
//! companions over scraping HTML, and falls back to a headless renderer
//! only when a static HTML fetch yields too little content to keep.

pub mod autoscaler;
pub mod cli;
pub mod config;
pub mod content;
pub mod dedup;
pub mod error;
pub mod http;
pub mod job;
pub mod logging;
pub mod output;
pub mod ratelimit;
pub mod render;
pub mod robots;
pub mod scheduler;
pub mod url_util;
pub mod worker;

use std::sync::Arc;

use url::Url;

use config::{CrawlMode, CrawlScope, CrawlerConfig};
use content::html_pipeline::{DefaultHtmlExtractor, Html2MdTransformer};
use error::{CrawlError, CrawlResult};
use http::ReqwestHttpClient;
use logging::Progress;
use render::NullRenderer;
use scheduler::{CrawlReport, EngineDeps, Scheduler};

/// Derive the crawl scope from the seed URL: origin plus its pathname
/// prefix, trailing slash preserved (spec.md §6).
fn scope_from_seed(url: &Url) -> CrawlScope {
    CrawlScope {
        origin: url.origin().ascii_serialization(),
        path_prefix: url.path().to_string(),
    }
}

/// Run a crawl (or scrape-only pass) against `seeds` under `config`, with no
/// terminal progress output.
pub async fn run(config: CrawlerConfig, seeds: Vec<String>) -> CrawlResult<CrawlReport> {
    run_with_progress(config, seeds, Progress::none()).await
}

/// Same as [`run`], reporting saved/failed counts to `progress` as jobs
/// complete.
pub async fn run_with_progress(
    config: CrawlerConfig,
    seeds: Vec<String>,
    progress: Progress,
) -> CrawlResult<CrawlReport> {
    let config = Arc::new(config);

    let urls: Vec<Url> = seeds
        .iter()
        .map(|s| Url::parse(s).map_err(CrawlError::from))
        .collect::<CrawlResult<_>>()?;

    let scope = match config.mode {
        CrawlMode::Crawl => urls.first().map(scope_from_seed),
        CrawlMode::ScrapeOnly => None,
    };

    let http = Arc::new(ReqwestHttpClient::new(&config.user_agent)?);
    let engine = EngineDeps {
        http: http.clone(),
        renderer: Arc::new(NullRenderer),
        extractor: Arc::new(DefaultHtmlExtractor),
        transformer: Arc::new(Html2MdTransformer),
    };

    let mut scheduler = Scheduler::with_progress(config.clone(), engine, progress);
    scheduler.seed(urls, scope);

    Ok(scheduler.run().await)
}
