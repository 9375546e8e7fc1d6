//! Job records and the worker pool's typed message schema (spec.md §3, §9).

use std::collections::VecDeque;

use tokio::time::Instant;
use url::Url;

use crate::config::CrawlScope;

pub type JobId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerKind {
    Markdown,
    Hybrid,
}

#[derive(Debug, Clone)]
pub struct Job {
    pub job_id: JobId,
    pub url: Url,
    pub depth: usize,
    pub can_go_deeper: bool,
    pub crawl_context: Option<CrawlScope>,
    pub wait_until: Instant,
}

/// Two FIFO queues keyed by worker kind. Only the scheduler mutates these.
#[derive(Default)]
pub struct Frontier {
    pub markdown_queue: VecDeque<Job>,
    pub hybrid_queue: VecDeque<Job>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_for(&mut self, kind: WorkerKind) -> &mut VecDeque<Job> {
        match kind {
            WorkerKind::Markdown => &mut self.markdown_queue,
            WorkerKind::Hybrid => &mut self.hybrid_queue,
        }
    }

    pub fn pending(&self, kind: WorkerKind) -> usize {
        match kind {
            WorkerKind::Markdown => self.markdown_queue.len(),
            WorkerKind::Hybrid => self.hybrid_queue.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.markdown_queue.is_empty() && self.hybrid_queue.is_empty()
    }
}

/// Scheduler → worker.
#[derive(Debug, Clone)]
pub enum ToWorker {
    Assign(Job),
    RenderWithPlaywright { job_id: JobId },
    Stop,
}

/// Worker → scheduler.
#[derive(Debug, Clone)]
pub enum FromWorker {
    Completed {
        job_id: JobId,
        discovered_links: Vec<Url>,
        active_ms: u64,
    },
    Failed {
        job_id: JobId,
        reason: String,
    },
    MarkdownUnavailable {
        job_id: JobId,
    },
    HtmlInsufficient {
        job_id: JobId,
    },
    Stopped {
        worker_id: u64,
        kind: WorkerKind,
        reason: StopReason,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Idle,
    Requested,
    Error,
}
