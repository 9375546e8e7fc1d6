//! Terminal logging and progress (ambient; spec.md §1's "terminal logging
//! with progress bar" external collaborator).
//!
//! `--verbose` switches to line-oriented `tracing` logs; otherwise a
//! spinner-style [`indicatif::ProgressBar`] renders saved/failed counters
//! when stdout is a TTY.

use std::io::IsTerminal;

use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber. Safe to call once per process.
pub fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "crawly_site=debug,info" } else { "crawly_site=info,warn" })
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
}

/// A progress bar when attached to a TTY and not `--verbose`; otherwise a
/// no-op handle that ignores every call. Cheap to clone: `ProgressBar`
/// clones share the same underlying draw target.
#[derive(Clone)]
pub struct Progress {
    bar: Option<ProgressBar>,
}

impl Progress {
    /// No-op handle, for callers (tests, library embedders) that don't want
    /// terminal output.
    pub fn none() -> Self {
        Self { bar: None }
    }

    pub fn new(verbose: bool) -> Self {
        if verbose || !std::io::stdout().is_terminal() {
            return Self { bar: None };
        }
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner} saved: {pos} failed: {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message("0");
        Self { bar: Some(bar) }
    }

    pub fn inc_saved(&self) {
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }

    pub fn set_failed(&self, failed: usize) {
        if let Some(bar) = &self.bar {
            bar.set_message(failed.to_string());
        }
    }

    pub fn finish(&self, saved: usize, failed: usize) {
        if let Some(bar) = &self.bar {
            bar.finish_with_message(format!("done — saved {saved}, failed {failed}"));
        }
    }
}
