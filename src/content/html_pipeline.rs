//! Content pipeline for HTML input (spec.md §4.6): clutter stripping,
//! main-content extraction, the "sufficient content" gate, and the
//! HTML-to-Markdown transformer singleton (spec.md §9 "Global state").

use std::sync::OnceLock;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use scraper::{Html, Selector};
use url::Url;

use super::{ensure_title, render_frontmatter, ScrapeResult};

const CLUTTER_TAGS: &[&str] = &[
    "script",
    "style",
    "nav",
    "header",
    "footer",
    "iframe",
    "svg",
    "noscript",
    "template",
    "form",
    "button",
    "input",
];

const SUFFICIENT_CONTENT_CHARS: usize = 200;

fn clutter_tag_pattern(tag: &str) -> Regex {
    Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}>|<{tag}\b[^>]*/>")).unwrap()
}

fn skip_to_content_pattern() -> Regex {
    Regex::new(r#"(?is)<([a-zA-Z0-9]+)\b[^>]*(?:class|id)\s*=\s*"[^"]*skip-to-content[^"]*"[^>]*>.*?</\1>"#)
        .unwrap()
}

/// Remove nav/header/footer/script/style/iframe/svg/noscript/template/
/// form/button/input and skip-to-content elements; return the stripped HTML
/// plus the removed fragments (used for the optional `clutter.md` variant).
pub fn strip_clutter_tags(html: &str) -> (String, Vec<String>) {
    let mut remaining = html.to_string();
    let mut removed = Vec::new();

    for tag in CLUTTER_TAGS {
        let re = clutter_tag_pattern(tag);
        remaining = re
            .replace_all(&remaining, |caps: &Captures| {
                removed.push(caps[0].to_string());
                String::new()
            })
            .to_string();
    }

    let skip_re = skip_to_content_pattern();
    remaining = skip_re
        .replace_all(&remaining, |caps: &Captures| {
            removed.push(caps[0].to_string());
            String::new()
        })
        .to_string();

    (remaining, removed)
}

/// Body text minus script/style tags and whitespace, counted in characters.
pub fn visible_text_len(html: &str) -> usize {
    let document = Html::parse_document(html);
    document
        .root_element()
        .text()
        .collect::<String>()
        .chars()
        .filter(|c| !c.is_whitespace())
        .count()
}

pub fn is_sufficient_content(html: &str) -> bool {
    visible_text_len(html) > SUFFICIENT_CONTENT_CHARS
}

/// Readability-style main-content extractor: prefers `<main>`, `<article>`,
/// or `[role=main]`; falls back to the cleaned `<body>`. Intentionally a
/// simple heuristic — rule design for this extractor is out of scope
/// (spec.md §1).
pub trait HtmlExtractor: Send + Sync {
    fn extract_main(&self, cleaned_html: &str) -> String;
}

pub struct DefaultHtmlExtractor;

impl HtmlExtractor for DefaultHtmlExtractor {
    fn extract_main(&self, cleaned_html: &str) -> String {
        let document = Html::parse_document(cleaned_html);
        let candidates = ["main", "article", "[role=main]"];
        for selector_str in candidates {
            if let Ok(selector) = Selector::parse(selector_str) {
                if let Some(el) = document.select(&selector).next() {
                    return el.inner_html();
                }
            }
        }
        let body_selector = Selector::parse("body").unwrap();
        document
            .select(&body_selector)
            .next()
            .map(|b| b.inner_html())
            .unwrap_or_else(|| cleaned_html.to_string())
    }
}

/// HTML-to-Markdown transformer interface (spec.md §4.9 `HTMLToMarkdown`).
pub trait HtmlToMarkdown: Send + Sync {
    fn convert(&self, html: &str) -> String;
}

static HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#{1,6})(\s.*)?$").unwrap());
static LINK_TEXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]*)\]").unwrap());
static TABLE_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\|?\s*:?-{2,}:?\s*(\|\s*:?-{2,}:?\s*)*\|?$").unwrap());
static STRIKE_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<(?:del|s|strike)(?:\s[^>]*)?>").unwrap());
static STRIKE_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</(?:del|s|strike)>").unwrap());

/// Collapse internal whitespace runs inside `[link text]`.
fn collapse_anchor_whitespace(md: &str) -> String {
    LINK_TEXT
        .replace_all(md, |caps: &Captures| {
            let collapsed: Vec<&str> = caps[1].split_whitespace().collect();
            format!("[{}]", collapsed.join(" "))
        })
        .to_string()
}

/// Shift every heading so the shallowest one in the document becomes `#`.
fn promote_headings(md: &str) -> String {
    let min_level = md
        .lines()
        .filter_map(|l| HEADING.captures(l).map(|c| c[1].len()))
        .min();

    let Some(min_level) = min_level else {
        return md.to_string();
    };
    if min_level <= 1 {
        return md.to_string();
    }
    let shift = min_level - 1;

    md.lines()
        .map(|l| match HEADING.captures(l) {
            Some(caps) => {
                let level = caps[1].len();
                let new_level = (level - shift).max(1);
                let rest = caps.get(2).map(|m| m.as_str()).unwrap_or("");
                format!("{}{}", "#".repeat(new_level), rest)
            }
            None => l.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fabricate a blank header + separator row for a Markdown table block
/// that is missing one.
fn fabricate_table_headers(md: &str) -> String {
    let lines: Vec<&str> = md.lines().collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
        if lines[i].trim_start().starts_with('|') {
            let mut j = i;
            let mut block = Vec::new();
            while j < lines.len() && lines[j].trim_start().starts_with('|') {
                block.push(lines[j]);
                j += 1;
            }
            let has_separator = block.len() >= 2 && TABLE_SEPARATOR.is_match(block[1].trim());
            if !has_separator {
                let cols = block[0].matches('|').count().saturating_sub(1).max(1);
                out.push(format!("|{}", " |".repeat(cols)));
                out.push(format!("|{}", "---|".repeat(cols)));
            }
            out.extend(block.iter().map(|s| s.to_string()));
            i = j;
        } else {
            out.push(lines[i].to_string());
            i += 1;
        }
    }
    out.join("\n")
}

/// Process-wide singleton transformer (spec.md §9): constructed once with
/// fixed rules for anchors, tables, and strikethrough.
pub struct Html2MdTransformer;

impl HtmlToMarkdown for Html2MdTransformer {
    fn convert(&self, html: &str) -> String {
        let prepared = STRIKE_CLOSE
            .replace_all(&STRIKE_OPEN.replace_all(html, "~~"), "~~")
            .into_owned();
        let raw = html2md::parse_html(&prepared);
        let raw = collapse_anchor_whitespace(&raw);
        let raw = promote_headings(&raw);
        fabricate_table_headers(&raw)
    }
}

static TRANSFORMER: OnceLock<Html2MdTransformer> = OnceLock::new();

pub fn global_transformer() -> &'static Html2MdTransformer {
    TRANSFORMER.get_or_init(|| Html2MdTransformer)
}

/// Orchestrates clutter-stripping, main-content extraction, and the
/// sufficient-content gate. Returns `None` when the extracted content is
/// insufficient (caller should escalate to the render fallback).
pub fn build_scrape_result(
    html: &str,
    source_url: &Url,
    extractor: &dyn HtmlExtractor,
    transformer: &dyn HtmlToMarkdown,
    want_clutter: bool,
) -> Option<ScrapeResult> {
    let (cleaned, removed) = strip_clutter_tags(html);

    if !is_sufficient_content(&cleaned) {
        return None;
    }

    let main_html = extractor.extract_main(&cleaned);
    let title = Html::parse_document(html)
        .select(&Selector::parse("title").unwrap())
        .next()
        .map(|t| t.text().collect::<String>())
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| source_url.host_str().unwrap_or("Untitled").to_string());

    let page_md = ensure_title(&transformer.convert(&main_html), title.trim());
    let full_md = ensure_title(&transformer.convert(&cleaned), title.trim());

    let frontmatter = render_frontmatter(source_url);
    let page = format!("{frontmatter}{page_md}\n");
    let llms_full = format!("{frontmatter}{full_md}\n");

    let clutter = if want_clutter && !removed.is_empty() {
        let clutter_md = transformer.convert(&removed.join("\n"));
        Some(format!("{frontmatter}{clutter_md}\n"))
    } else {
        None
    };

    Some(ScrapeResult {
        page: page.clone(),
        clutter,
        llms: page,
        llms_full,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_clutter_tags() {
        let html = "<html><body><nav>Nav</nav><main>Main content here that is long enough to pass the sufficient-content gate easily, padded padded padded padded padded padded.</main><script>evil()</script></body></html>";
        let (cleaned, removed) = strip_clutter_tags(html);
        assert!(!cleaned.contains("Nav"));
        assert!(!cleaned.contains("evil()"));
        assert!(cleaned.contains("Main content"));
        assert_eq!(removed.len(), 2);
    }

    #[test]
    fn sufficient_content_gate() {
        let short = "<body><p>too short</p></body>";
        let long = format!("<body><p>{}</p></body>", "word ".repeat(100));
        assert!(!is_sufficient_content(short));
        assert!(is_sufficient_content(&long));
    }

    #[test]
    fn extractor_prefers_main_over_body() {
        let html = "<html><body><div>Other</div><main><p>The real content</p></main></body></html>";
        let extracted = DefaultHtmlExtractor.extract_main(html);
        assert!(extracted.contains("The real content"));
        assert!(!extracted.contains("Other"));
    }

    #[test]
    fn heading_promotion_shifts_to_top_level() {
        let md = "### Title\n#### Sub\nbody";
        let promoted = promote_headings(md);
        assert!(promoted.starts_with("# Title"));
        assert!(promoted.contains("## Sub"));
    }

    #[test]
    fn table_header_fabricated_when_missing() {
        let md = "| a | b |\n| 1 | 2 |";
        let out = fabricate_table_headers(md);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "| | |");
        assert_eq!(lines[1], "|---|---|");
        assert_eq!(lines[2], "| a | b |");
        assert_eq!(lines[3], "| 1 | 2 |");
    }

    #[test]
    fn table_header_left_alone_when_present() {
        let md = "| a | b |\n|---|---|\n| 1 | 2 |";
        let out = fabricate_table_headers(md);
        assert_eq!(out, md);
    }
}
