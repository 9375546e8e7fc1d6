//! Content pipeline for raw Markdown input (spec.md §4.5): frontmatter,
//! title normalization, and the llms-family variants.

use url::Url;

use super::{ensure_title, render_frontmatter, ScrapeResult};

/// Build a [`ScrapeResult`] from a fetched Markdown companion document.
/// `clutter` is never produced from a Markdown source — there is nothing to
/// strip.
pub fn build_scrape_result(raw_markdown: &str, source_url: &Url) -> ScrapeResult {
    let fallback_title = source_url
        .path_segments()
        .and_then(|mut segs| segs.next_back())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| source_url.host_str().unwrap_or("Untitled"));

    let body = ensure_title(raw_markdown.trim(), fallback_title);
    let frontmatter = render_frontmatter(source_url);
    let page = format!("{frontmatter}{body}\n");

    ScrapeResult {
        page: page.clone(),
        clutter: None,
        llms: page.clone(),
        llms_full: page,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_page_with_frontmatter_and_single_title() {
        let url = Url::parse("https://example.com/docs").unwrap();
        let result = build_scrape_result("# Title\nBody", &url);
        assert_eq!(result.page.matches("# Title").count(), 1);
        assert!(result.page.starts_with("---\nSource: https://example.com/docs\n"));
        assert!(result.page.contains("Body"));
    }

    #[test]
    fn adds_title_when_missing() {
        let url = Url::parse("https://example.com/docs/guide").unwrap();
        let result = build_scrape_result("Just body text.", &url);
        assert!(result.page.contains("# guide"));
    }
}
