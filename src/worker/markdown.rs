//! Markdown-source worker (spec.md §4.5): tries a Markdown companion of the
//! page before ever touching HTML, since Markdown needs no extraction or
//! clutter stripping.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, timeout, Instant};
use url::Url;

use crate::content::links::{extract_links_from_markdown, rewrite_links_in_result};
use crate::content::markdown_pipeline::build_scrape_result;
use crate::error::CrawlError;
use crate::http::fetch_with_retries;
use crate::job::{FromWorker, Job, StopReason, ToWorker, WorkerKind};
use crate::output::build_output_paths;

use super::WorkerDeps;

/// Strips the hash; root paths become `/llms.txt`; `.md`/`.txt` paths are
/// left unchanged; trailing slashes are dropped before appending `.md`.
fn build_markdown_candidate_url(url: &Url) -> Option<Url> {
    let path = url.path();
    if path.ends_with(".css") || path.ends_with(".js") {
        return None;
    }

    let mut candidate = url.clone();
    candidate.set_fragment(None);

    let new_path = if path.is_empty() || path == "/" {
        "/llms.txt".to_string()
    } else if path.ends_with(".md") || path.ends_with(".txt") {
        path.to_string()
    } else if let Some(trimmed) = path.strip_suffix('/') {
        if trimmed.is_empty() {
            "/llms.txt".to_string()
        } else if trimmed.ends_with(".md") {
            trimmed.to_string()
        } else {
            format!("{trimmed}.md")
        }
    } else {
        format!("{path}.md")
    };

    candidate.set_path(&new_path);
    Some(candidate)
}

pub async fn run(
    id: u64,
    deps: WorkerDeps,
    mut rx: mpsc::Receiver<ToWorker>,
    tx: mpsc::Sender<super::TaggedFromWorker>,
) {
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
                            kind: WorkerKind::Markdown,
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
                            kind: WorkerKind::Markdown,
                            reason: StopReason::Requested,
                        },
                    ))
                    .await;
                return;
            }
            ToWorker::RenderWithPlaywright { .. } => {
                // Markdown workers never hold a job awaiting render escalation.
            }
            ToWorker::Assign(job) => {
                let outcome = run_job(&deps, &job).await;
                let _ = tx.send((id, outcome)).await;
            }
        }
    }
}

async fn run_job(deps: &WorkerDeps, job: &Job) -> FromWorker {
    sleep_until(job.wait_until).await;
    let started = Instant::now();

    let Some(candidate) = build_markdown_candidate_url(&job.url) else {
        return FromWorker::MarkdownUnavailable { job_id: job.job_id };
    };

    let headers = [("Accept", "text/markdown,text/plain;q=0.9,*/*;q=0.8")];
    let fetch = fetch_with_retries(
        deps.http.as_ref(),
        &candidate,
        deps.timeout_ms,
        &headers,
        deps.retries,
    )
    .await;

    let response = match fetch {
        Ok(resp) if resp.status >= 200 && resp.status < 300 => resp,
        Ok(resp) if resp.status == 404 || resp.status == 410 => {
            return FromWorker::MarkdownUnavailable { job_id: job.job_id };
        }
        Ok(_) => return FromWorker::MarkdownUnavailable { job_id: job.job_id },
        Err(CrawlError::Timeout(_)) | Err(CrawlError::Transport(_)) => {
            return FromWorker::Failed {
                job_id: job.job_id,
                reason: "transport failure fetching markdown companion".to_string(),
            };
        }
        Err(_) => return FromWorker::MarkdownUnavailable { job_id: job.job_id },
    };

    let mut result = build_scrape_result(&response.text, &job.url);

    let discovered_links = if job.can_go_deeper {
        match &job.crawl_context {
            Some(scope) => extract_links_from_markdown(&response.text, &job.url, scope),
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

#[cfg(test)]
mod tests {
    use super::*;

    fn u(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn candidate_appends_md_to_final_segment() {
        let candidate = build_markdown_candidate_url(&u("https://x.com/docs/guide")).unwrap();
        assert_eq!(candidate.path(), "/docs/guide.md");
    }

    #[test]
    fn candidate_drops_trailing_slash_before_appending_md() {
        let candidate = build_markdown_candidate_url(&u("https://x.com/docs/")).unwrap();
        assert_eq!(candidate.path(), "/docs.md");
    }

    #[test]
    fn candidate_uses_llms_txt_for_root() {
        assert_eq!(
            build_markdown_candidate_url(&u("https://x.com/")).unwrap().path(),
            "/llms.txt"
        );
        assert_eq!(
            build_markdown_candidate_url(&u("https://x.com")).unwrap().path(),
            "/llms.txt"
        );
    }

    #[test]
    fn candidate_leaves_existing_md_or_txt_unchanged() {
        assert_eq!(
            build_markdown_candidate_url(&u("https://x.com/already.md"))
                .unwrap()
                .path(),
            "/already.md"
        );
        assert_eq!(
            build_markdown_candidate_url(&u("https://x.com/notes.txt"))
                .unwrap()
                .path(),
            "/notes.txt"
        );
    }

    #[test]
    fn candidate_strips_hash() {
        let candidate = build_markdown_candidate_url(&u("https://x.com/docs/guide#section")).unwrap();
        assert_eq!(candidate.fragment(), None);
    }

    #[test]
    fn candidate_refuses_css_and_js() {
        assert!(build_markdown_candidate_url(&u("https://x.com/app.css")).is_none());
        assert!(build_markdown_candidate_url(&u("https://x.com/bundle.js")).is_none());
    }
}
