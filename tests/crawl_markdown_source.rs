//! End-to-end: a page with a Markdown companion is saved without ever
//! touching the HTML pipeline.

use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crawly_site::config::{CrawlMode, CrawlerConfigBuilder};
use crawly_site::logging::Progress;
use crawly_site::output::build_output_paths;

#[tokio::test]
async fn saves_page_from_markdown_companion() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/docs.md"))
        .respond_with(ResponseTemplate::new(200).set_body_string("# Guide\n\nHello from markdown."))
        .mount(&server)
        .await;

    let out = tempdir().unwrap();
    let config = CrawlerConfigBuilder::new()
        .out_dir(out.path())
        .mode(CrawlMode::ScrapeOnly)
        .delay_ms(0)
        .build();

    let seed = format!("{}/docs", server.uri());
    let report = crawly_site::run_with_progress(config, vec![seed.clone()], Progress::none())
        .await
        .unwrap();

    assert_eq!(report.saved, 1);
    assert!(report.failures.is_empty());

    let paths = build_output_paths(&url::Url::parse(&seed).unwrap(), out.path());
    let content = std::fs::read_to_string(&paths.page_path).unwrap();
    assert!(content.contains("Hello from markdown."));
    assert!(content.starts_with("---\nSource: "));
}
