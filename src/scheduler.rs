//! Scheduler: queues, visited/known sets, robots policy, rate limiter,
//! counters, dispatch policy, and termination (spec.md §4.7).
//!
//! Runs as a single task; the only state shared by address with workers is
//! the append-only [`crate::dedup::SharedBloomFilter`] (spec.md §5).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{interval, Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

use crate::autoscaler::{Autoscaler, TickInputs};
use crate::config::{CrawlerConfig, CrawlScope, AUTOSCALE_TICK_MS};
use crate::content::html_pipeline::HtmlExtractor;
use crate::content::html_pipeline::HtmlToMarkdown;
use crate::dedup::{new_shared_filter, SharedBloomFilter};
use crate::http::HttpClient;
use crate::job::{Frontier, FromWorker, Job, JobId, ToWorker, WorkerKind};
use crate::logging::Progress;
use crate::ratelimit::RateLimiter;
use crate::render::HtmlRenderer;
use crate::robots::RobotsPolicy;
use crate::url_util::normalize_for_queue;
use crate::worker::{spawn_hybrid_worker, spawn_markdown_worker, TaggedFromWorker, WorkerDeps, WorkerHandle};

/// Final tally returned to the caller once the crawl is done.
#[derive(Debug, Default)]
pub struct CrawlReport {
    pub saved: usize,
    pub failures: Vec<(String, String)>,
}

struct WorkerSlot {
    handle: WorkerHandle,
    busy: bool,
}

/// Everything the scheduler needs to build [`WorkerDeps`] for newly spawned
/// workers; assembled once by the caller (`crate::lib`/CLI).
pub struct EngineDeps {
    pub http: Arc<dyn HttpClient>,
    pub renderer: Arc<dyn HtmlRenderer>,
    pub extractor: Arc<dyn HtmlExtractor>,
    pub transformer: Arc<dyn HtmlToMarkdown>,
}

pub struct Scheduler {
    config: Arc<CrawlerConfig>,
    engine: EngineDeps,
    bloom: SharedBloomFilter,

    frontier: Frontier,
    jobs: HashMap<JobId, Job>,
    visited: HashSet<String>,
    known: HashSet<String>,
    robots_cache: HashMap<String, RobotsPolicy>,
    limiter: RateLimiter,

    markdown_workers: HashMap<u64, WorkerSlot>,
    hybrid_workers: HashMap<u64, WorkerSlot>,
    next_worker_id: u64,
    next_job_id: JobId,

    saved_count: usize,
    in_flight_count: usize,
    failures: Vec<(String, String)>,

    autoscaler: Autoscaler,
    from_worker_tx: mpsc::Sender<TaggedFromWorker>,
    from_worker_rx: mpsc::Receiver<TaggedFromWorker>,
    progress: Progress,
}

impl Scheduler {
    pub fn new(config: Arc<CrawlerConfig>, engine: EngineDeps) -> Self {
        Self::with_progress(config, engine, Progress::none())
    }

    pub fn with_progress(config: Arc<CrawlerConfig>, engine: EngineDeps, progress: Progress) -> Self {
        let (from_worker_tx, from_worker_rx) = mpsc::channel(256);
        Self {
            config,
            engine,
            bloom: new_shared_filter(),
            frontier: Frontier::new(),
            jobs: HashMap::new(),
            visited: HashSet::new(),
            known: HashSet::new(),
            robots_cache: HashMap::new(),
            limiter: RateLimiter::new(),
            markdown_workers: HashMap::new(),
            hybrid_workers: HashMap::new(),
            next_worker_id: 0,
            next_job_id: 0,
            saved_count: 0,
            in_flight_count: 0,
            failures: Vec::new(),
            autoscaler: Autoscaler::new(),
            from_worker_tx,
            from_worker_rx,
            progress,
        }
    }

    fn worker_deps(&self) -> WorkerDeps {
        WorkerDeps {
            http: self.engine.http.clone(),
            renderer: self.engine.renderer.clone(),
            extractor: self.engine.extractor.clone(),
            transformer: self.engine.transformer.clone(),
            bloom: self.bloom.clone(),
            out_dir: self.config.out_dir.clone(),
            user_agent: self.config.user_agent.clone(),
            timeout_ms: self.config.timeout_ms,
            retries: self.config.retries,
            overwrite_llms: self.config.overwrite_llms,
            clutter_enabled: self.config.clutter_enabled,
            render_enabled: self.config.render_enabled,
            inactivity_ms: crate::config::WORKER_INACTIVITY_MS,
        }
    }

    fn spawn_worker(&mut self, kind: WorkerKind) {
        let id = self.next_worker_id;
        self.next_worker_id += 1;
        let deps = self.worker_deps();
        let handle = match kind {
            WorkerKind::Markdown => spawn_markdown_worker(id, deps, self.from_worker_tx.clone()),
            WorkerKind::Hybrid => spawn_hybrid_worker(id, deps, self.from_worker_tx.clone()),
        };
        let slot = WorkerSlot { handle, busy: false };
        match kind {
            WorkerKind::Markdown => {
                self.markdown_workers.insert(id, slot);
            }
            WorkerKind::Hybrid => {
                self.hybrid_workers.insert(id, slot);
            }
        }
    }

    fn pool_mut(&mut self, kind: WorkerKind) -> &mut HashMap<u64, WorkerSlot> {
        match kind {
            WorkerKind::Markdown => &mut self.markdown_workers,
            WorkerKind::Hybrid => &mut self.hybrid_workers,
        }
    }

    fn idle_worker_ids(&self, kind: WorkerKind) -> Vec<u64> {
        let pool = match kind {
            WorkerKind::Markdown => &self.markdown_workers,
            WorkerKind::Hybrid => &self.hybrid_workers,
        };
        pool.iter().filter(|(_, s)| !s.busy).map(|(id, _)| *id).collect()
    }

    pub fn seed(&mut self, urls: Vec<Url>, scope: Option<CrawlScope>) {
        for url in urls {
            let key = normalize_for_queue(&url);
            if !self.known.insert(key.clone()) {
                continue;
            }
            self.bloom.insert(&key);
            let job_id = self.next_job_id;
            self.next_job_id += 1;
            let can_go_deeper = 0 < self.config.max_depth;
            self.jobs.insert(
                job_id,
                Job {
                    job_id,
                    url,
                    depth: 0,
                    can_go_deeper,
                    crawl_context: scope.clone(),
                    wait_until: Instant::now(),
                },
            );
            self.frontier.markdown_queue.push_back(self.jobs[&job_id].clone());
        }
    }

    async fn robots_policy(&mut self, url: &Url) -> RobotsPolicy {
        let origin = url.origin().ascii_serialization();
        if !self.config.robots_enabled {
            return RobotsPolicy::allow_all("robots disabled");
        }
        if let Some(policy) = self.robots_cache.get(&origin) {
            return policy.clone();
        }
        let robots_url = match Url::parse(&format!("{origin}/robots.txt")) {
            Ok(u) => u,
            Err(_) => {
                let policy = RobotsPolicy::allow_all("unparseable origin");
                self.robots_cache.insert(origin, policy.clone());
                return policy;
            }
        };
        let policy = match self
            .engine
            .http
            .fetch(&robots_url, self.config.timeout_ms, &[("User-Agent", &self.config.user_agent)])
            .await
        {
            Ok(resp) if resp.status >= 200 && resp.status < 300 => {
                RobotsPolicy::parse(&resp.text, &self.config.user_agent)
            }
            Ok(_) => RobotsPolicy::allow_all("robots.txt fetch returned non-2xx"),
            Err(e) => {
                debug!(%origin, error = %e, "robots.txt fetch failed, allowing all");
                RobotsPolicy::allow_all("robots.txt fetch failed")
            }
        };
        self.robots_cache.insert(origin, policy.clone());
        policy
    }

    /// Pop the head of `kind`'s queue, skipping visited/robots-denied jobs,
    /// and either assign it to `worker_id` or leave the worker idle.
    async fn assign_next(&mut self, worker_id: u64, kind: WorkerKind) {
        loop {
            let Some(job) = self.frontier.queue_for(kind).pop_front() else {
                if let Some(slot) = self.pool_mut(kind).get_mut(&worker_id) {
                    slot.busy = false;
                }
                return;
            };

            // Only the markdown queue can hold a stale duplicate worth
            // dropping; a hybridQueue entry is always the same job already
            // committed (visited, in-flight) during its markdown attempt,
            // re-routed here by `onMarkdownUnavailable` — not a fresh pop.
            let policy = if kind == WorkerKind::Markdown {
                let key = normalize_for_queue(&job.url);
                if self.visited.contains(&key) {
                    continue;
                }
                let policy = self.robots_policy(&job.url).await;
                if !policy.is_allowed(job.url.path()) {
                    warn!(url = %job.url, "blocked by robots.txt");
                    continue;
                }
                self.visited.insert(key);
                self.in_flight_count += 1;
                policy
            } else {
                self.robots_policy(&job.url).await
            };

            let origin = job.url.origin().ascii_serialization();
            let delay_ms = policy.effective_delay_ms(self.config.delay_ms);
            let wait_until = self.limiter.compute_wait(&origin, delay_ms).await;

            let mut dispatched = job.clone();
            dispatched.wait_until = wait_until;
            self.jobs.insert(dispatched.job_id, dispatched.clone());

            if let Some(slot) = self.pool_mut(kind).get_mut(&worker_id) {
                slot.busy = true;
                let _ = slot.handle.tx.send(ToWorker::Assign(dispatched)).await;
            }
            return;
        }
    }

    /// `savedCount + pending < maxPages`; visited/known filtering; pushes a
    /// new job per accepted link; dispatches idle workers afterward.
    async fn enqueue_links(&mut self, links: Vec<Url>, parent_depth: usize, scope: Option<CrawlScope>) {
        for link in links {
            let pending = self.frontier.markdown_queue.len() + self.frontier.hybrid_queue.len();
            if self.saved_count + pending >= self.config.max_pages {
                break;
            }
            let key = normalize_for_queue(&link);
            if self.visited.contains(&key) || !self.known.insert(key.clone()) {
                continue;
            }
            self.bloom.insert(&key);

            let job_id = self.next_job_id;
            self.next_job_id += 1;
            let depth = parent_depth + 1;
            let job = Job {
                job_id,
                url: link,
                depth,
                can_go_deeper: depth < self.config.max_depth,
                crawl_context: scope.clone(),
                wait_until: Instant::now(),
            };
            self.jobs.insert(job_id, job.clone());
            self.frontier.markdown_queue.push_back(job);
        }
        self.dispatch_idle().await;
    }

    /// Send an `assignNext` to every currently idle worker of both kinds.
    async fn dispatch_idle(&mut self) {
        for id in self.idle_worker_ids(WorkerKind::Markdown) {
            self.assign_next(id, WorkerKind::Markdown).await;
        }
        for id in self.idle_worker_ids(WorkerKind::Hybrid) {
            self.assign_next(id, WorkerKind::Hybrid).await;
        }
    }

    fn worker_kind_of(&self, worker_id: u64) -> Option<WorkerKind> {
        if self.markdown_workers.contains_key(&worker_id) {
            Some(WorkerKind::Markdown)
        } else if self.hybrid_workers.contains_key(&worker_id) {
            Some(WorkerKind::Hybrid)
        } else {
            None
        }
    }

    async fn handle_from_worker(&mut self, worker_id: u64, msg: FromWorker) {
        match msg {
            FromWorker::Completed { job_id, discovered_links, active_ms } => {
                if let Some(kind) = self.worker_kind_of(worker_id) {
                    self.autoscaler.observe_active_ms(kind, active_ms);
                    if kind == WorkerKind::Markdown {
                        self.autoscaler.observe_markdown_unavailable(false);
                    }
                }
                self.in_flight_count = self.in_flight_count.saturating_sub(1);
                self.saved_count += 1;
                self.progress.inc_saved();
                let (depth, scope) = self
                    .jobs
                    .get(&job_id)
                    .map(|j| (j.depth, j.crawl_context.clone()))
                    .unwrap_or((0, None));
                info!(job_id, "saved");
                self.enqueue_links(discovered_links, depth, scope).await;
                if let Some(kind) = self.worker_kind_of(worker_id) {
                    self.assign_next(worker_id, kind).await;
                }
            }
            FromWorker::Failed { job_id, reason } => {
                self.in_flight_count = self.in_flight_count.saturating_sub(1);
                let url = self.jobs.get(&job_id).map(|j| j.url.to_string()).unwrap_or_default();
                warn!(job_id, %reason, "job failed");
                self.failures.push((url, reason));
                self.progress.set_failed(self.failures.len());
                if let Some(kind) = self.worker_kind_of(worker_id) {
                    self.assign_next(worker_id, kind).await;
                }
            }
            FromWorker::MarkdownUnavailable { job_id } => {
                self.autoscaler.observe_markdown_unavailable(true);
                if let Some(job) = self.jobs.get(&job_id).cloned() {
                    self.frontier.hybrid_queue.push_back(job);
                }
                if let Some(kind) = self.worker_kind_of(worker_id) {
                    self.assign_next(worker_id, kind).await;
                }
                self.dispatch_idle().await;
            }
            FromWorker::HtmlInsufficient { job_id } => {
                if let Some(slot) = self.hybrid_workers.get(&worker_id) {
                    let _ = slot.handle.tx.send(ToWorker::RenderWithPlaywright { job_id }).await;
                }
            }
            FromWorker::Stopped { worker_id, kind, reason } => {
                debug!(worker_id, ?kind, ?reason, "worker stopped");
                self.pool_mut(kind).remove(&worker_id);
            }
        }
    }

    fn is_done(&self) -> bool {
        self.saved_count >= self.config.max_pages
            || (self.in_flight_count == 0 && self.frontier.is_empty())
    }

    async fn autoscale_tick(&mut self) {
        let inputs = TickInputs {
            pending_markdown: self.frontier.pending(WorkerKind::Markdown),
            pending_hybrid: self.frontier.pending(WorkerKind::Hybrid),
            in_flight_markdown: self.markdown_workers.values().filter(|s| s.busy).count(),
            in_flight_hybrid: self.hybrid_workers.values().filter(|s| s.busy).count(),
            idle_markdown: self.idle_worker_ids(WorkerKind::Markdown).len(),
            idle_hybrid: self.idle_worker_ids(WorkerKind::Hybrid).len(),
            max_total_workers: self.config.max_total_workers(),
        };
        let actions = self.autoscaler.tick(
            self.markdown_workers.len(),
            self.hybrid_workers.len(),
            &inputs,
        );

        let markdown_to_stop: Vec<u64> = self
            .idle_worker_ids(WorkerKind::Markdown)
            .into_iter()
            .take(actions.stop_markdown)
            .collect();
        for id in markdown_to_stop {
            if let Some(slot) = self.markdown_workers.get_mut(&id) {
                slot.busy = true; // stops it from being picked again before `Stopped` arrives
                let _ = slot.handle.tx.send(ToWorker::Stop).await;
            }
        }
        let hybrid_to_stop: Vec<u64> = self
            .idle_worker_ids(WorkerKind::Hybrid)
            .into_iter()
            .take(actions.stop_hybrid)
            .collect();
        for id in hybrid_to_stop {
            if let Some(slot) = self.hybrid_workers.get_mut(&id) {
                slot.busy = true;
                let _ = slot.handle.tx.send(ToWorker::Stop).await;
            }
        }
        for _ in 0..actions.spawn_markdown {
            self.spawn_worker(WorkerKind::Markdown);
        }
        for _ in 0..actions.spawn_hybrid {
            self.spawn_worker(WorkerKind::Hybrid);
        }
    }

    /// Drive the crawl to completion: seed must already have been called.
    pub async fn run(mut self) -> CrawlReport {
        for _ in 0..crate::config::MIN_WORKERS_PER_KIND {
            self.spawn_worker(WorkerKind::Markdown);
            self.spawn_worker(WorkerKind::Hybrid);
        }
        self.dispatch_idle().await;

        let mut ticker = interval(Duration::from_millis(AUTOSCALE_TICK_MS));
        loop {
            if self.is_done() {
                break;
            }
            tokio::select! {
                maybe_msg = self.from_worker_rx.recv() => {
                    match maybe_msg {
                        Some((worker_id, msg)) => {
                            self.handle_from_worker(worker_id, msg).await;
                        }
                        None => break,
                    }
                }
                _ = ticker.tick() => {
                    self.autoscale_tick().await;
                }
            }
        }

        for slot in self.markdown_workers.values().chain(self.hybrid_workers.values()) {
            let _ = slot.handle.tx.send(ToWorker::Stop).await;
        }

        // `stopAll`: wait for every worker's `Stopped` before returning,
        // rather than leaving spawned tasks to finish independently.
        while !self.markdown_workers.is_empty() || !self.hybrid_workers.is_empty() {
            match self.from_worker_rx.recv().await {
                Some((id, FromWorker::Stopped { .. })) => {
                    self.markdown_workers.remove(&id);
                    self.hybrid_workers.remove(&id);
                }
                Some(_) => {}
                None => break,
            }
        }

        CrawlReport {
            saved: self.saved_count,
            failures: self.failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn termination_when_saved_reaches_max_pages() {
        let config = Arc::new(CrawlerConfig {
            max_pages: 1,
            ..CrawlerConfig::default()
        });
        let mut sched = Scheduler::new(
            config,
            EngineDeps {
                http: Arc::new(crate::http::ReqwestHttpClient::new("test").unwrap()),
                renderer: Arc::new(crate::render::NullRenderer),
                extractor: Arc::new(crate::content::html_pipeline::DefaultHtmlExtractor),
                transformer: Arc::new(crate::content::html_pipeline::Html2MdTransformer),
            },
        );
        sched.saved_count = 1;
        assert!(sched.is_done());
    }

    #[test]
    fn termination_when_queues_empty_and_nothing_in_flight() {
        let config = Arc::new(CrawlerConfig::default());
        let sched = Scheduler::new(
            config,
            EngineDeps {
                http: Arc::new(crate::http::ReqwestHttpClient::new("test").unwrap()),
                renderer: Arc::new(crate::render::NullRenderer),
                extractor: Arc::new(crate::content::html_pipeline::DefaultHtmlExtractor),
                transformer: Arc::new(crate::content::html_pipeline::Html2MdTransformer),
            },
        );
        assert!(sched.is_done());
    }
}
