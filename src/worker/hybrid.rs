//! Hybrid-HTML worker (spec.md §4.6): fetches HTML, strips clutter, and
//! escalates to the render fallback when the static fetch yields too little
//! content to be worth keeping.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, timeout, Instant};

use crate::content::html_pipeline::{build_scrape_result, is_sufficient_content, strip_clutter_tags};
use crate::content::links::{extract_links_from_dom, rewrite_links_in_result};
use crate::error::CrawlError;
use crate::http::fetch_with_retries;
use crate::job::{FromWorker, Job, StopReason, ToWorker, WorkerKind};
use crate::output::build_output_paths;

use super::WorkerDeps;

pub async fn run(
    id: u64,
    deps: WorkerDeps,
    mut rx: mpsc::Receiver<ToWorker>,
    tx: mpsc::Sender<super::TaggedFromWorker>,
) {
    // A job whose static fetch was insufficient and is waiting for the
    // scheduler's `RenderWithPlaywright` go-ahead.
    let mut pending_render: Option<Job> = None;

    loop {
        let recv = timeout(Duration::from_millis(deps.inactivity_ms), rx.recv()).await;
        let msg = match recv {
            Ok(Some(msg)) => msg,
            Ok(None) => return,
            Err(_) => {
                let _ = tx
                    .send((
                        id,
                        FromWorker::Stopped {
                            worker_id: id,
                            kind: WorkerKind::Hybrid,
                            reason: StopReason::Idle,
                        },
                    ))
                    .await;
                return;
            }
        };

        match msg {
            ToWorker::Stop => {
                let _ = tx
                    .send((
                        id,
                        FromWorker::Stopped {
                            worker_id: id,
                            kind: WorkerKind::Hybrid,
                            reason: StopReason::Requested,
                        },
                    ))
                    .await;
                return;
            }
            ToWorker::Assign(job) => {
                let outcome = fetch_and_extract(&deps, &job).await;
                match outcome {
                    JobStage::Done(result) => {
                        let _ = tx.send((id, result)).await;
                    }
                    JobStage::NeedsRender => {
                        let job_id = job.job_id;
                        pending_render = Some(job);
                        let _ = tx.send((id, FromWorker::HtmlInsufficient { job_id })).await;
                    }
                }
            }
            ToWorker::RenderWithPlaywright { job_id } => {
                let Some(job) = pending_render.take() else {
                    continue;
                };
                if job.job_id != job_id {
                    pending_render = Some(job);
                    continue;
                }
                let outcome = render_and_extract(&deps, &job).await;
                let _ = tx.send((id, outcome)).await;
            }
        }
    }
}

enum JobStage {
    Done(FromWorker),
    NeedsRender,
}

async fn fetch_and_extract(deps: &WorkerDeps, job: &Job) -> JobStage {
    sleep_until(job.wait_until).await;
    let started = Instant::now();

    let headers = [("Accept", "text/html,application/xhtml+xml")];
    let fetch = fetch_with_retries(
        deps.http.as_ref(),
        &job.url,
        deps.timeout_ms,
        &headers,
        deps.retries,
    )
    .await;

    let html = match fetch {
        Ok(resp) if resp.status >= 200 && resp.status < 300 => resp.text,
        Ok(resp) => {
            return JobStage::Done(FromWorker::Failed {
                job_id: job.job_id,
                reason: format!("http {} fetching html", resp.status),
            });
        }
        Err(CrawlError::Timeout(_)) | Err(CrawlError::Transport(_)) | Err(_) => {
            return JobStage::Done(FromWorker::Failed {
                job_id: job.job_id,
                reason: "transport failure fetching html".to_string(),
            });
        }
    };

    let (cleaned, _) = strip_clutter_tags(&html);
    if !is_sufficient_content(&cleaned) {
        if deps.render_enabled {
            return JobStage::NeedsRender;
        }
        return JobStage::Done(FromWorker::Failed {
            job_id: job.job_id,
            reason: "insufficient content and no renderer configured".to_string(),
        });
    }

    JobStage::Done(finish(deps, job, &html, started).await)
}

async fn render_and_extract(deps: &WorkerDeps, job: &Job) -> FromWorker {
    let started = Instant::now();
    let rendered = deps
        .renderer
        .render(&job.url, deps.timeout_ms, &deps.user_agent)
        .await;

    let html = match rendered {
        Ok(html) => html,
        Err(e) => {
            return FromWorker::Failed {
                job_id: job.job_id,
                reason: format!("render escalation failed: {e}"),
            };
        }
    };

    let (cleaned, _) = strip_clutter_tags(&html);
    if !is_sufficient_content(&cleaned) {
        return FromWorker::Failed {
            job_id: job.job_id,
            reason: "rendered html still insufficient".to_string(),
        };
    }

    finish(deps, job, &html, started).await
}

async fn finish(deps: &WorkerDeps, job: &Job, html: &str, started: Instant) -> FromWorker {
    let Some(mut result) = build_scrape_result(
        html,
        &job.url,
        deps.extractor.as_ref(),
        deps.transformer.as_ref(),
        deps.clutter_enabled,
    ) else {
        return FromWorker::Failed {
            job_id: job.job_id,
            reason: "content became insufficient during extraction".to_string(),
        };
    };

    let discovered_links = if job.can_go_deeper {
        match &job.crawl_context {
            Some(scope) => extract_links_from_dom(html, &job.url, scope),
            None => Vec::new(),
        }
    } else {
        Vec::new()
    };

    let paths = build_output_paths(&job.url, &deps.out_dir);
    let bloom = deps.bloom.clone();
    let is_known = |key: &str| bloom.contains(key);
    rewrite_links_in_result(&mut result, &job.url, &paths.dir, &deps.out_dir, &is_known);

    if let Err(e) = write_result(deps, &paths, &result).await {
        return FromWorker::Failed {
            job_id: job.job_id,
            reason: e.to_string(),
        };
    }

    FromWorker::Completed {
        job_id: job.job_id,
        discovered_links,
        active_ms: started.elapsed().as_millis() as u64,
    }
}

async fn write_result(
    deps: &WorkerDeps,
    paths: &crate::output::OutputPaths,
    result: &crate::content::ScrapeResult,
) -> std::io::Result<()> {
    tokio::fs::create_dir_all(&paths.dir).await?;
    tokio::fs::write(&paths.page_path, &result.page).await?;
    if let Some(clutter) = &result.clutter {
        tokio::fs::write(&paths.clutter_path, clutter).await?;
    }
    if deps.overwrite_llms || !tokio::fs::try_exists(&paths.llms_path).await.unwrap_or(false) {
        tokio::fs::write(&paths.llms_path, &result.llms).await?;
    }
    if deps.overwrite_llms || !tokio::fs::try_exists(&paths.llms_full_path).await.unwrap_or(false) {
        tokio::fs::write(&paths.llms_full_path, &result.llms_full).await?;
    }
    Ok(())
}
