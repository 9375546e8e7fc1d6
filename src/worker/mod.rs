//! The two-tier worker pool (spec.md §4.5, §4.6, §9 "Two-tier worker pool").
//!
//! Workers are plain `tokio` tasks running the cooperative state machine
//! from spec.md; they communicate with the scheduler exclusively through
//! the typed [`crate::job::ToWorker`]/[`crate::job::FromWorker`] messages,
//! and share no mutable state with each other except the append-only
//! [`crate::dedup::SharedBloomFilter`].

pub mod hybrid;
pub mod markdown;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::content::html_pipeline::{HtmlExtractor, HtmlToMarkdown};
use crate::dedup::SharedBloomFilter;
use crate::http::HttpClient;
use crate::job::{FromWorker, ToWorker, WorkerKind};
use crate::render::HtmlRenderer;

/// Everything a worker task needs that is not job-specific. Cheap to clone
/// (`Arc` throughout); constructed once by the scheduler at pool start.
#[derive(Clone)]
pub struct WorkerDeps {
    pub http: Arc<dyn HttpClient>,
    pub renderer: Arc<dyn HtmlRenderer>,
    pub extractor: Arc<dyn HtmlExtractor>,
    pub transformer: Arc<dyn HtmlToMarkdown>,
    pub bloom: SharedBloomFilter,
    pub out_dir: PathBuf,
    pub user_agent: String,
    pub timeout_ms: u64,
    pub retries: usize,
    pub overwrite_llms: bool,
    pub clutter_enabled: bool,
    pub render_enabled: bool,
    pub inactivity_ms: u64,
}

/// Scheduler-side handle to a running worker task.
pub struct WorkerHandle {
    pub id: u64,
    pub kind: WorkerKind,
    pub tx: mpsc::Sender<ToWorker>,
}

/// Every message a worker emits is tagged with its own id, since the
/// scheduler multiplexes all workers over one channel and needs to know
/// which pool slot to update.
pub type TaggedFromWorker = (u64, FromWorker);

pub fn spawn_markdown_worker(
    id: u64,
    deps: WorkerDeps,
    from_worker: mpsc::Sender<TaggedFromWorker>,
) -> WorkerHandle {
    let (tx, rx) = mpsc::channel(8);
    tokio::spawn(markdown::run(id, deps, rx, from_worker));
    WorkerHandle {
        id,
        kind: WorkerKind::Markdown,
        tx,
    }
}

pub fn spawn_hybrid_worker(
    id: u64,
    deps: WorkerDeps,
    from_worker: mpsc::Sender<TaggedFromWorker>,
) -> WorkerHandle {
    let (tx, rx) = mpsc::channel(8);
    tokio::spawn(hybrid::run(id, deps, rx, from_worker));
    WorkerHandle {
        id,
        kind: WorkerKind::Hybrid,
        tx,
    }
}
