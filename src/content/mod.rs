//! Content pipeline: HTML/Markdown → cleaned Markdown, plus the link
//! rewriter that turns known in-scope absolute URLs into relative on-disk
//! paths (spec.md §4.4-§4.6).

pub mod html_pipeline;
pub mod links;
pub mod markdown_pipeline;

use chrono::{SecondsFormat, Utc};
use url::Url;

/// The four Markdown variants every successful job produces, each carrying
/// identical frontmatter.
#[derive(Debug, Clone)]
pub struct ScrapeResult {
    pub page: String,
    pub clutter: Option<String>,
    pub llms: String,
    pub llms_full: String,
}

/// `Source`/`Fetched` frontmatter header, spec.md §6's exact four lines.
pub fn render_frontmatter(source_url: &Url) -> String {
    let fetched = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    format!("---\nSource: {source_url}\nFetched: {fetched}\n---\n\n")
}

/// Ensure the body has a leading `# Title`; does not duplicate an existing
/// heading.
pub fn ensure_title(body: &str, fallback_title: &str) -> String {
    let trimmed = body.trim_start();
    if trimmed.starts_with("# ") {
        body.to_string()
    } else {
        format!("# {fallback_title}\n\n{body}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frontmatter_has_four_header_lines() {
        let fm = render_frontmatter(&Url::parse("https://x.com/a").unwrap());
        let lines: Vec<&str> = fm.lines().collect();
        assert_eq!(lines[0], "---");
        assert_eq!(lines[1], "Source: https://x.com/a");
        assert!(lines[2].starts_with("Fetched: "));
        assert_eq!(lines[3], "---");
    }

    #[test]
    fn ensure_title_does_not_duplicate_heading() {
        let body = "# Already Titled\n\nBody text.";
        assert_eq!(ensure_title(body, "Fallback"), body);
    }

    #[test]
    fn ensure_title_adds_heading_when_missing() {
        let body = "Body text.";
        let result = ensure_title(body, "My Title");
        assert!(result.starts_with("# My Title\n\n"));
        assert!(result.ends_with("Body text."));
    }
}
