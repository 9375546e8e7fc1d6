//! Link extraction (from DOM and from Markdown) and link rewriting
//! (spec.md §4.4).

use std::collections::HashSet;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use scraper::{Html, Selector};
use url::Url;

use crate::config::CrawlScope;
use crate::output::build_output_paths;
use crate::url_util::{is_html_candidate, is_path_in_scope};

const EXTERNAL_MARKER: char = '↗';

static INLINE_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]\n]*)\]\(\s*([^)\s]+)(?:\s+[^)]*)?\)").unwrap());
static REF_DEF: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\s*\[[^\]\n]+\]:\s*)(\S+)").unwrap());
static AUTOLINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"<(https?://[^>\s]+)>").unwrap());
static JSX_HREF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"href=(?:"([^"]*)"|'([^']*)'|\{"([^"]*)"\})"#).unwrap());
static BARE_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r#"https?://[^\s)>\]"']+"#).unwrap());
static FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(```|~~~)").unwrap());

/// Drop cross-origin, out-of-scope, or non-HTML-candidate targets.
fn accept_link(target: &Url, origin_url: &Url, scope: &CrawlScope) -> bool {
    if target.scheme() != "http" && target.scheme() != "https" {
        return false;
    }
    if target.origin() != origin_url.origin() {
        return false;
    }
    if !is_path_in_scope(target.path(), &scope.path_prefix) {
        return false;
    }
    is_html_candidate(target)
}

/// Select anchors with `href`, resolve against `<base href>` if present,
/// else against `base_url`; strip hash/query; dedup, order-preserving.
pub fn extract_links_from_dom(html: &str, base_url: &Url, scope: &CrawlScope) -> Vec<Url> {
    let document = Html::parse_document(html);

    let base_selector = Selector::parse("base[href]").unwrap();
    let effective_base = document
        .select(&base_selector)
        .next()
        .and_then(|el| el.value().attr("href"))
        .and_then(|href| base_url.join(href).ok())
        .unwrap_or_else(|| base_url.clone());

    let anchor_selector = Selector::parse("a[href]").unwrap();

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for el in document.select(&anchor_selector) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        let Ok(mut resolved) = effective_base.join(href) else {
            continue;
        };
        resolved.set_fragment(None);
        resolved.set_query(None);
        if !accept_link(&resolved, base_url, scope) {
            continue;
        }
        if seen.insert(resolved.to_string()) {
            out.push(resolved);
        }
    }
    out
}

fn resolve_with_scope_repair(href: &str, base_url: &Url, scope: &CrawlScope) -> Option<Url> {
    let resolved = base_url.join(href).ok()?;
    if href.starts_with('/') && !is_path_in_scope(resolved.path(), &scope.path_prefix) {
        let prefixed = format!("{}{}", scope.path_prefix.trim_end_matches('/'), href);
        if let Ok(repaired) = base_url.join(&prefixed) {
            if is_path_in_scope(repaired.path(), &scope.path_prefix) {
                return Some(repaired);
            }
        }
    }
    Some(resolved)
}

fn push_candidate(
    href: &str,
    base_url: &Url,
    scope: &CrawlScope,
    seen: &mut HashSet<String>,
    out: &mut Vec<Url>,
) {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return;
    }
    let Some(mut resolved) = resolve_with_scope_repair(href, base_url, scope) else {
        return;
    };
    resolved.set_fragment(None);
    resolved.set_query(None);
    if !accept_link(&resolved, base_url, scope) {
        return;
    }
    if seen.insert(resolved.to_string()) {
        out.push(resolved);
    }
}

/// Scan inline links, reference definitions, autolinks, and JSX-like
/// `href` attributes; bare URLs outside code fences and reference lines.
pub fn extract_links_from_markdown(markdown: &str, base_url: &Url, scope: &CrawlScope) -> Vec<Url> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let mut in_fence = false;

    for line in markdown.lines() {
        if FENCE.is_match(line) {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }

        if let Some(caps) = REF_DEF.captures(line) {
            push_candidate(&caps[2], base_url, scope, &mut seen, &mut out);
            continue;
        }

        let mut consumed: Vec<(usize, usize)> = Vec::new();

        for caps in INLINE_LINK.captures_iter(line) {
            let m = caps.get(2).unwrap();
            consumed.push((m.start(), m.end()));
            push_candidate(m.as_str(), base_url, scope, &mut seen, &mut out);
        }
        for caps in AUTOLINK.captures_iter(line) {
            let whole = caps.get(0).unwrap();
            consumed.push((whole.start(), whole.end()));
            push_candidate(&caps[1], base_url, scope, &mut seen, &mut out);
        }
        for caps in JSX_HREF.captures_iter(line) {
            let whole = caps.get(0).unwrap();
            consumed.push((whole.start(), whole.end()));
            let href = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map(|g| g.as_str())
                .unwrap_or("");
            push_candidate(href, base_url, scope, &mut seen, &mut out);
        }

        for m in BARE_URL.find_iter(line) {
            if consumed.iter().any(|(s, e)| m.start() >= *s && m.end() <= *e) {
                continue;
            }
            push_candidate(m.as_str(), base_url, scope, &mut seen, &mut out);
        }
    }

    out
}

fn add_external_marker(text: &str) -> String {
    if text.trim_end().ends_with(EXTERNAL_MARKER) {
        text.to_string()
    } else {
        format!("{text} {EXTERNAL_MARKER}")
    }
}

fn remove_external_marker(text: &str) -> String {
    let trimmed = text.trim_end();
    match trimmed.strip_suffix(EXTERNAL_MARKER) {
        Some(stripped) => stripped.trim_end().to_string(),
        None => text.to_string(),
    }
}

/// POSIX-separator relative path between a directory and a target file.
fn relative_posix(from_dir: &Path, to_file: &Path) -> String {
    let from: Vec<_> = from_dir.components().collect();
    let to: Vec<_> = to_file.components().collect();
    let mut i = 0;
    while i < from.len() && i < to.len() && from[i] == to[i] {
        i += 1;
    }
    let ups = from.len() - i;
    let mut parts: Vec<String> = (0..ups).map(|_| "..".to_string()).collect();
    parts.extend(to[i..].iter().map(|c| c.as_os_str().to_string_lossy().to_string()));
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

/// Membership oracle abstracting over "(a) exact known set OR (b) link-hints
/// set for this job" (spec.md §4.4). The scheduler supplies a closure over
/// its exact `HashSet<String>`; workers supply one over the shared
/// [`crate::dedup::BloomFilter`], since §5 forbids sharing the exact set by
/// address with worker tasks.
struct RewriteCtx<'a> {
    base_url: &'a Url,
    current_dir: &'a Path,
    out_dir: &'a Path,
    is_known: &'a dyn Fn(&str) -> bool,
}

impl<'a> RewriteCtx<'a> {
    /// (a)/(b) the membership oracle, or (c) the target's `page_path`
    /// already exists on disk.
    fn decide(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() {
            return None;
        }
        let resolved = self.base_url.join(href).ok()?;
        if resolved.scheme() != "http" && resolved.scheme() != "https" {
            return None;
        }
        let mut normalized = resolved.clone();
        normalized.set_fragment(None);
        normalized.set_query(None);
        let key = normalized.to_string();

        let target_paths = build_output_paths(&normalized, self.out_dir);
        let known_enough = (self.is_known)(&key) || target_paths.page_path.exists();

        if !known_enough {
            return None;
        }

        let mut rel = relative_posix(self.current_dir, &target_paths.page_path);
        if let Some(frag) = resolved.fragment() {
            rel.push('#');
            rel.push_str(frag);
        }
        Some(rel)
    }

    fn is_external(&self, href: &str) -> bool {
        match self.base_url.join(href) {
            Ok(resolved) => resolved.origin() != self.base_url.origin(),
            Err(_) => false,
        }
    }
}

fn rewrite_inline_links(line: &str, ctx: &RewriteCtx) -> String {
    INLINE_LINK
        .replace_all(line, |caps: &Captures| {
            let text = &caps[1];
            let href = &caps[2];
            if let Some(rel) = ctx.decide(href) {
                format!("[{}]({rel})", remove_external_marker(text))
            } else if ctx.is_external(href) {
                format!("[{}]({href})", add_external_marker(text))
            } else {
                caps[0].to_string()
            }
        })
        .to_string()
}

fn rewrite_jsx_href(line: &str, ctx: &RewriteCtx) -> String {
    JSX_HREF
        .replace_all(line, |caps: &Captures| {
            let href = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map(|g| g.as_str())
                .unwrap_or("");
            match ctx.decide(href) {
                Some(rel) => {
                    if caps.get(1).is_some() {
                        format!("href=\"{rel}\"")
                    } else if caps.get(2).is_some() {
                        format!("href='{rel}'")
                    } else {
                        format!("href={{\"{rel}\"}}")
                    }
                }
                None => caps[0].to_string(),
            }
        })
        .to_string()
}

fn rewrite_reference_def(line: &str, ctx: &RewriteCtx) -> Option<String> {
    REF_DEF.captures(line).map(|caps| {
        let prefix = &caps[1];
        let href = &caps[2];
        match ctx.decide(href) {
            Some(rel) => format!("{prefix}{rel}"),
            None => line.to_string(),
        }
    })
}

fn linkify_bare_urls(line: &str, ctx: &RewriteCtx) -> String {
    let mut result = String::with_capacity(line.len());
    let mut last = 0;
    for m in BARE_URL.find_iter(line) {
        if line[..m.start()].ends_with('<') {
            continue;
        }
        if let Some(rel) = ctx.decide(m.as_str()) {
            result.push_str(&line[last..m.start()]);
            result.push('[');
            result.push_str(m.as_str());
            result.push_str("](");
            result.push_str(&rel);
            result.push(')');
            last = m.end();
        }
    }
    result.push_str(&line[last..]);
    result
}

fn extract_plain_url(value: &str) -> String {
    let value = value.trim();
    if let Some(caps) = INLINE_LINK.captures(value) {
        return caps[2].to_string();
    }
    let value = value.trim_start_matches('<').trim_end_matches('>');
    remove_external_marker(value).trim().to_string()
}

/// Keep the `Source:` frontmatter line a plain URL string, even if the
/// incoming text had it wrapped as a link, an autolink, or marked external.
fn normalize_source_line(frontmatter: &str) -> String {
    let mut out = String::with_capacity(frontmatter.len());
    for line in frontmatter.lines() {
        if let Some(rest) = line.strip_prefix("Source:") {
            out.push_str("Source: ");
            out.push_str(&extract_plain_url(rest));
        } else {
            out.push_str(line);
        }
        out.push('\n');
    }
    out
}

/// Split a leading `---\n...\n---\n` frontmatter block (plus the blank line
/// that follows it) from the body, normalizing the `Source:` line.
fn split_frontmatter(text: &str) -> (Option<String>, &str) {
    if !text.starts_with("---\n") {
        return (None, text);
    }
    let Some(rel_end) = text[4..].find("\n---\n") else {
        return (None, text);
    };
    let fm_end = 4 + rel_end + 5;
    let mut frontmatter = normalize_source_line(&text[..fm_end]);
    let mut body_start = fm_end;
    if let Some(rest) = text.get(body_start..) {
        if let Some(stripped) = rest.strip_prefix('\n') {
            frontmatter.push('\n');
            body_start = text.len() - stripped.len();
        }
    }
    (Some(frontmatter), &text[body_start..])
}

/// Rewrite in-scope known links to relative on-disk paths; mark remaining
/// external links with a trailing `↗`, added once and removed once rewritten.
pub fn rewrite_markdown_text(
    text: &str,
    base_url: &Url,
    current_dir: &Path,
    out_dir: &Path,
    is_known: &dyn Fn(&str) -> bool,
) -> String {
    let ctx = RewriteCtx {
        base_url,
        current_dir,
        out_dir,
        is_known,
    };

    let (frontmatter, body) = split_frontmatter(text);

    let mut in_fence = false;
    let mut out_lines: Vec<String> = Vec::new();
    for line in body.lines() {
        if FENCE.is_match(line) {
            in_fence = !in_fence;
            out_lines.push(line.to_string());
            continue;
        }
        if in_fence {
            out_lines.push(line.to_string());
            continue;
        }
        if let Some(rewritten) = rewrite_reference_def(line, &ctx) {
            out_lines.push(rewritten);
            continue;
        }
        let processed = rewrite_inline_links(line, &ctx);
        let processed = rewrite_jsx_href(&processed, &ctx);
        let processed = linkify_bare_urls(&processed, &ctx);
        out_lines.push(processed);
    }

    let rewritten_body = out_lines.join("\n");
    match frontmatter {
        Some(fm) => format!("{fm}{rewritten_body}"),
        None => rewritten_body,
    }
}

/// Rewrite every Markdown variant of a [`crate::content::ScrapeResult`].
pub fn rewrite_links_in_result(
    result: &mut crate::content::ScrapeResult,
    base_url: &Url,
    current_dir: &Path,
    out_dir: &Path,
    is_known: &dyn Fn(&str) -> bool,
) {
    result.page = rewrite_markdown_text(&result.page, base_url, current_dir, out_dir, is_known);
    if let Some(clutter) = &result.clutter {
        result.clutter = Some(rewrite_markdown_text(
            clutter, base_url, current_dir, out_dir, is_known,
        ));
    }
    result.llms = rewrite_markdown_text(&result.llms, base_url, current_dir, out_dir, is_known);
    result.llms_full = rewrite_markdown_text(
        &result.llms_full,
        base_url,
        current_dir,
        out_dir,
        is_known,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn scope(origin: &str, prefix: &str) -> CrawlScope {
        CrawlScope {
            origin: origin.to_string(),
            path_prefix: prefix.to_string(),
        }
    }

    #[test]
    fn dom_extraction_drops_cross_origin_and_non_html() {
        let html = r#"<html><body>
            <a href="/a">A</a>
            <a href="https://other.com/x">X</a>
            <a href="/img.png">img</a>
            <a href="/a#frag?x=1">A again</a>
        </body></html>"#;
        let base = Url::parse("https://s.com/").unwrap();
        let links = extract_links_from_dom(html, &base, &scope("https://s.com", "/"));
        let strs: Vec<String> = links.iter().map(|u| u.to_string()).collect();
        assert_eq!(strs, vec!["https://s.com/a".to_string()]);
    }

    #[test]
    fn markdown_extraction_finds_inline_ref_autolink_and_jsx() {
        let md = "\
[One](/one)
[two]: /two
<https://s.com/three>
<div href=\"/four\"></div>
```
https://s.com/in-fence
```
https://s.com/bare
";
        let base = Url::parse("https://s.com/").unwrap();
        let links = extract_links_from_markdown(md, &base, &scope("https://s.com", "/"));
        let strs: Vec<String> = links.iter().map(|u| u.to_string()).collect();
        assert_eq!(
            strs,
            vec![
                "https://s.com/one",
                "https://s.com/two",
                "https://s.com/three",
                "https://s.com/four",
                "https://s.com/bare",
            ]
        );
    }

    #[test]
    fn rewrite_known_link_to_relative_path() {
        let base = Url::parse("https://s.com/a/").unwrap();
        let mut known = HashSet::new();
        known.insert("https://s.com/b/".to_string());
        let is_known = |key: &str| known.contains(key);
        let text = "See [B](https://s.com/b/) for more.";
        let out = rewrite_markdown_text(
            text,
            &base,
            Path::new("out/s_com/a"),
            Path::new("out"),
            &is_known,
        );
        assert_eq!(out, "See [B](../b/page.md) for more.");
    }

    #[test]
    fn rewrite_marks_external_once_and_removes_once_rewritten() {
        let base = Url::parse("https://s.com/a/").unwrap();
        let is_known = |_: &str| false;
        let text = "See [Ext](https://other.com/x).";
        let out = rewrite_markdown_text(
            text,
            &base,
            Path::new("out/s_com/a"),
            Path::new("out"),
            &is_known,
        );
        assert_eq!(out, "See [Ext ↗](https://other.com/x).");

        // idempotent: running again does not double the marker.
        let out2 = rewrite_markdown_text(
            &out,
            &base,
            Path::new("out/s_com/a"),
            Path::new("out"),
            &is_known,
        );
        assert_eq!(out2, out);
    }

    #[test]
    fn frontmatter_source_line_normalized_to_plain_url() {
        let text = "---\nSource: [x](https://s.com/a) ↗\nFetched: 2024-01-01T00:00:00Z\n---\n\nBody";
        let is_known = |_: &str| false;
        let out = rewrite_markdown_text(
            text,
            &Url::parse("https://s.com/a").unwrap(),
            Path::new("out/s_com/a"),
            Path::new("out"),
            &is_known,
        );
        assert!(out.contains("Source: https://s.com/a\n"));
    }
}
