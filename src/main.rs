use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::AsyncBufReadExt;

use crawly_site::cli::{Cli, Command};
use crawly_site::config::CrawlMode;
use crawly_site::logging::{init_tracing, Progress};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let (mode, url, opts) = match cli.command {
        Some(Command::Crawl { url, opts }) => (CrawlMode::Crawl, SeedSpec::Single(url), opts),
        Some(Command::Url { url, opts }) => (CrawlMode::ScrapeOnly, SeedSpec::Single(url), opts),
        Some(Command::Urls { file, opts }) => (CrawlMode::ScrapeOnly, SeedSpec::File(file), opts),
        None => match cli.url {
            Some(url) => (CrawlMode::Crawl, SeedSpec::Single(url), cli.opts),
            None => {
                eprintln!("error: a URL or subcommand is required (crawl/url/urls)");
                return ExitCode::from(2);
            }
        },
    };

    init_tracing(opts.verbose);
    let verbose = opts.verbose;
    let mut config = opts.into_config();
    config.mode = mode;

    let seeds = match resolve_seeds(url).await {
        Ok(seeds) => seeds,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::from(1);
        }
    };

    let progress = Progress::new(verbose);

    tokio::select! {
        result = crawly_site::run_with_progress(config, seeds, progress.clone()) => {
            match result {
                Ok(report) => {
                    progress.finish(report.saved, report.failures.len());
                    for (url, reason) in &report.failures {
                        tracing::warn!(%url, %reason, "failed");
                    }
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("error: {e}");
                    ExitCode::from(1)
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            ExitCode::from(130)
        }
        _ = terminate() => {
            ExitCode::from(143)
        }
    }
}

enum SeedSpec {
    Single(String),
    File(std::path::PathBuf),
}

async fn resolve_seeds(spec: SeedSpec) -> Result<Vec<String>> {
    match spec {
        SeedSpec::Single(url) => Ok(vec![url]),
        SeedSpec::File(path) => {
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("opening seed list {}", path.display()))?;
            let mut lines = tokio::io::BufReader::new(file).lines();
            let mut seeds = Vec::new();
            while let Some(line) = lines.next_line().await? {
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    seeds.push(trimmed.to_string());
                }
            }
            Ok(seeds)
        }
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sig = signal(SignalKind::terminate()).expect("installing SIGTERM handler");
    sig.recv().await;
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
