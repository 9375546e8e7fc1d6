//! Command-line surface (ambient; spec.md §6). Parses into a
//! [`crate::config::CrawlerConfig`] plus a resolved seed list, leaving the
//! actual crawl to [`crate::run`].

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "crawly-site", version, about = "Mirror a documentation site into a cross-linked local Markdown tree.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Bare positional URL with no subcommand defaults to `crawl <url>`.
    pub url: Option<String>,

    #[command(flatten)]
    pub opts: CoreOpts,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Crawl starting from `url`, discovering in-scope links as it goes.
    Crawl {
        url: String,
        #[command(flatten)]
        opts: CoreOpts,
    },
    /// Scrape a single URL; no link discovery for the frontier.
    Url {
        url: String,
        #[command(flatten)]
        opts: CoreOpts,
    },
    /// Scrape every URL listed one-per-line in `file`; no link discovery.
    Urls {
        file: PathBuf,
        #[command(flatten)]
        opts: CoreOpts,
    },
}

#[derive(Args, Debug, Clone)]
pub struct CoreOpts {
    #[arg(long = "out-dir", env = "CRAWLY_OUT_DIR", default_value = ".docs")]
    pub out_dir: PathBuf,

    #[arg(long, default_value_t = crate::config::DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    #[arg(long, default_value_t = crate::config::DEFAULT_TIMEOUT_MS)]
    pub timeout: u64,

    #[arg(long, default_value_t = crate::config::DEFAULT_RETRIES)]
    pub retries: usize,

    #[arg(long = "user-agent", default_value = crate::config::USER_AGENT)]
    pub user_agent: String,

    #[arg(long = "max-depth", default_value_t = crate::config::DEFAULT_MAX_DEPTH)]
    pub max_depth: usize,

    #[arg(long = "max-pages", default_value_t = crate::config::DEFAULT_MAX_PAGES)]
    pub max_pages: usize,

    #[arg(long, default_value_t = crate::config::DEFAULT_DELAY_MS)]
    pub delay: u64,

    #[arg(long = "robots", default_value_t = true, action = clap::ArgAction::Set)]
    pub robots: bool,

    #[arg(long = "render", default_value_t = true, action = clap::ArgAction::Set)]
    pub render: bool,

    #[arg(long = "overwrite-llms", default_value_t = false)]
    pub overwrite_llms: bool,

    #[arg(long = "clutter", default_value_t = false)]
    pub clutter: bool,

    #[arg(long, default_value_t = false)]
    pub verbose: bool,
}

impl CoreOpts {
    pub fn into_config(self) -> crate::config::CrawlerConfig {
        crate::config::CrawlerConfigBuilder::new()
            .out_dir(self.out_dir)
            .concurrency(self.concurrency)
            .timeout_ms(self.timeout)
            .retries(self.retries)
            .user_agent(self.user_agent)
            .max_depth(self.max_depth)
            .max_pages(self.max_pages)
            .delay_ms(self.delay)
            .robots_enabled(self.robots)
            .render_enabled(self.render)
            .overwrite_llms(self.overwrite_llms)
            .clutter_enabled(self.clutter)
            .verbose(self.verbose)
            .build()
    }
}
