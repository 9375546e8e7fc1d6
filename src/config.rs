//! Crawl configuration: bounds and behaviors for the crawl engine.
//!
//! Mirrors the teacher's `CrawlerConfig`/`CrawlerBuilder` split, generalized
//! to every knob spec.md §6 names plus the autoscaler/worker constants
//! spec.md §4.8/§4.5 pins as defaults.

use std::path::PathBuf;

pub const USER_AGENT: &str = "crawly-site/0.1 (+https://www.crystalsoft.it)";

pub const DEFAULT_MAX_DEPTH: usize = 5;
pub const DEFAULT_MAX_PAGES: usize = 200;
pub const DEFAULT_CONCURRENCY: usize = 8;
pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_RETRIES: usize = 2;
pub const DEFAULT_DELAY_MS: u64 = 250;

/// Minimum number of workers of each kind kept alive while work remains.
pub const MIN_WORKERS_PER_KIND: usize = 1;
/// Floor for `maxTotalWorkers = max(concurrency, MIN_TOTAL_WORKERS)`.
pub const MIN_TOTAL_WORKERS: usize = 2;

pub const MAX_SPAWN_PER_TICK: usize = 5;
pub const MAX_STOP_PER_TICK: usize = 5;
pub const AUTOSCALE_TICK_MS: u64 = 1_000;
pub const AUTOSCALE_TARGET_DRAIN_MS: f64 = 2_000.0;
pub const EWMA_ALPHA: f64 = 0.3;

pub const DEFAULT_MARKDOWN_ACTIVE_MS: f64 = 200.0;
pub const DEFAULT_HYBRID_ACTIVE_MS: f64 = 600.0;
pub const DEFAULT_MARKDOWN_UNAVAILABLE_RATE: f64 = 0.25;

pub const WORKER_INACTIVITY_MS: u64 = 30_000;

/// Shared probabilistic filter sizing: ~1M bits, 4 hash probes.
pub const BLOOM_BITS: usize = 1 << 20;
pub const BLOOM_HASHES: u32 = 4;

/// `crawl <url>` discovers links; `url`/`urls` only scrape the given pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlMode {
    Crawl,
    ScrapeOnly,
}

/// Scope a discovered link must stay within to be added to the frontier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlScope {
    pub origin: String,
    pub path_prefix: String,
}

#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    pub out_dir: PathBuf,
    pub concurrency: usize,
    pub timeout_ms: u64,
    pub retries: usize,
    pub user_agent: String,
    pub max_depth: usize,
    pub max_pages: usize,
    pub delay_ms: u64,
    pub robots_enabled: bool,
    pub render_enabled: bool,
    pub overwrite_llms: bool,
    pub clutter_enabled: bool,
    pub verbose: bool,
    pub mode: CrawlMode,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from(".docs"),
            concurrency: DEFAULT_CONCURRENCY,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retries: DEFAULT_RETRIES,
            user_agent: USER_AGENT.to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
            max_pages: DEFAULT_MAX_PAGES,
            delay_ms: DEFAULT_DELAY_MS,
            robots_enabled: true,
            render_enabled: true,
            overwrite_llms: false,
            clutter_enabled: false,
            verbose: false,
            mode: CrawlMode::Crawl,
        }
    }
}

impl CrawlerConfig {
    /// `maxTotalWorkers = max(concurrency, MIN_TOTAL_WORKERS)`.
    pub fn max_total_workers(&self) -> usize {
        self.concurrency.max(MIN_TOTAL_WORKERS)
    }
}

/// Builder pattern for [`CrawlerConfig`], following the teacher's
/// `CrawlerBuilder` shape.
#[derive(Debug, Default)]
pub struct CrawlerConfigBuilder {
    config: CrawlerConfig,
}

impl CrawlerConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: CrawlerConfig::default(),
        }
    }

    pub fn out_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.out_dir = dir.into();
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeout_ms = ms;
        self
    }

    pub fn retries(mut self, n: usize) -> Self {
        self.config.retries = n;
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = depth;
        self
    }

    pub fn max_pages(mut self, pages: usize) -> Self {
        self.config.max_pages = pages;
        self
    }

    pub fn delay_ms(mut self, ms: u64) -> Self {
        self.config.delay_ms = ms;
        self
    }

    pub fn robots_enabled(mut self, enabled: bool) -> Self {
        self.config.robots_enabled = enabled;
        self
    }

    pub fn render_enabled(mut self, enabled: bool) -> Self {
        self.config.render_enabled = enabled;
        self
    }

    pub fn overwrite_llms(mut self, enabled: bool) -> Self {
        self.config.overwrite_llms = enabled;
        self
    }

    pub fn clutter_enabled(mut self, enabled: bool) -> Self {
        self.config.clutter_enabled = enabled;
        self
    }

    pub fn verbose(mut self, enabled: bool) -> Self {
        self.config.verbose = enabled;
        self
    }

    pub fn mode(mut self, mode: CrawlMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn build(self) -> CrawlerConfig {
        self.config
    }
}
