//! End-to-end: insufficient static HTML escalates to the render fallback,
//! and with no headless renderer configured the job surfaces as a failure
//! rather than vanishing silently.

use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crawly_site::config::{CrawlMode, CrawlerConfigBuilder};
use crawly_site::logging::Progress;

#[tokio::test]
async fn render_escalation_without_renderer_fails_the_job() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/docs.md"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body><p>too short</p></body></html>"))
        .mount(&server)
        .await;

    let out = tempdir().unwrap();
    let config = CrawlerConfigBuilder::new()
        .out_dir(out.path())
        .mode(CrawlMode::ScrapeOnly)
        .render_enabled(true)
        .delay_ms(0)
        .build();

    let report = crawly_site::run_with_progress(
        config,
        vec![format!("{}/docs", server.uri())],
        Progress::none(),
    )
    .await
    .unwrap();

    assert_eq!(report.saved, 0);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].1.contains("render escalation failed"));
}
