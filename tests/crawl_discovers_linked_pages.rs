//! End-to-end: `crawl` mode follows an in-scope link discovered on the seed
//! page and saves both pages.

use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crawly_site::config::{CrawlMode, CrawlerConfigBuilder};
use crawly_site::logging::Progress;

#[tokio::test]
async fn follows_in_scope_link_from_seed_page() {
    let server = MockServer::start().await;

    // Root has no Markdown companion, so it falls to the HTML worker, which
    // discovers a link to /child.
    Mock::given(method("GET"))
        .and(path("/llms.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let root_body = format!(
        "<html><head><title>Root</title></head><body><main><p>{}</p><a href=\"/child\">Child</a></main></body></html>",
        "word ".repeat(100)
    );
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(root_body))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/child.md"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let child_body = format!(
        "<html><head><title>Child</title></head><body><main><p>{}</p></main></body></html>",
        "word ".repeat(100)
    );
    Mock::given(method("GET"))
        .and(path("/child"))
        .respond_with(ResponseTemplate::new(200).set_body_string(child_body))
        .mount(&server)
        .await;

    let out = tempdir().unwrap();
    let config = CrawlerConfigBuilder::new()
        .out_dir(out.path())
        .mode(CrawlMode::Crawl)
        .max_depth(3)
        .max_pages(10)
        .delay_ms(0)
        .build();

    let report = crawly_site::run_with_progress(config, vec![server.uri()], Progress::none())
        .await
        .unwrap();

    assert_eq!(report.saved, 2);
    assert!(report.failures.is_empty());
}
