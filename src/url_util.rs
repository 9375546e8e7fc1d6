//! URL normalization and scope checks (spec.md §3, §4.1).

use once_cell::sync::Lazy;
use regex::RegexSet;
use url::Url;

/// Case-insensitive suffix match against a blocked-extension set. Anything
/// matching is excluded from HTML candidacy (images/fonts/binary/css/js).
static BLOCKED_EXTENSIONS: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"(?i)\.png$",
        r"(?i)\.jpe?g$",
        r"(?i)\.gif$",
        r"(?i)\.svg$",
        r"(?i)\.webp$",
        r"(?i)\.ico$",
        r"(?i)\.bmp$",
        r"(?i)\.woff2?$",
        r"(?i)\.ttf$",
        r"(?i)\.otf$",
        r"(?i)\.eot$",
        r"(?i)\.css$",
        r"(?i)\.m?js$",
        r"(?i)\.json$",
        r"(?i)\.xml$",
        r"(?i)\.zip$",
        r"(?i)\.gz$",
        r"(?i)\.tar$",
        r"(?i)\.pdf$",
        r"(?i)\.mp4$",
        r"(?i)\.mp3$",
        r"(?i)\.wav$",
        r"(?i)\.avi$",
        r"(?i)\.mov$",
        r"(?i)\.wasm$",
    ])
    .expect("blocked extension patterns are valid")
});

/// Strip hash and query, keep scheme/host/path, return the canonical string.
///
/// Idempotent: `normalize_for_queue(normalize_for_queue(u)) ==
/// normalize_for_queue(u)`, and URLs differing only by hash/query collapse
/// to the same string.
pub fn normalize_for_queue(url: &Url) -> String {
    let mut clone = url.clone();
    clone.set_fragment(None);
    clone.set_query(None);
    clone.to_string()
}

/// A target is in scope iff its pathname equals the scope, equals the scope
/// plus a trailing slash, or starts with `scope + "/"`. Scope `/` matches
/// everything.
pub fn is_path_in_scope(pathname: &str, scope: &str) -> bool {
    if scope == "/" {
        return true;
    }
    let trimmed_scope = scope.trim_end_matches('/');
    pathname == trimmed_scope
        || pathname == format!("{trimmed_scope}/")
        || pathname.starts_with(&format!("{trimmed_scope}/"))
}

/// Inverse of the blocked-extension match on the URL's pathname.
pub fn is_html_candidate(url: &Url) -> bool {
    !BLOCKED_EXTENSIONS.is_match(url.path())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn normalize_strips_hash_and_query() {
        let a = normalize_for_queue(&u("https://x.com/a?b=1#frag"));
        let b = normalize_for_queue(&u("https://x.com/a"));
        assert_eq!(a, b);
    }

    #[test]
    fn normalize_is_idempotent() {
        let a = normalize_for_queue(&u("https://x.com/a?b=1#frag"));
        let b = normalize_for_queue(&u(&a));
        assert_eq!(a, b);
    }

    #[test]
    fn scope_matches_root() {
        assert!(is_path_in_scope("/anything/deep", "/"));
    }

    #[test]
    fn scope_matches_exact_and_prefix() {
        assert!(is_path_in_scope("/docs", "/docs"));
        assert!(is_path_in_scope("/docs/", "/docs"));
        assert!(is_path_in_scope("/docs/a/b", "/docs"));
        assert!(!is_path_in_scope("/docsx", "/docs"));
        assert!(!is_path_in_scope("/other", "/docs"));
    }

    #[test]
    fn html_candidacy_blocks_known_extensions() {
        assert!(!is_html_candidate(&u("https://x.com/a.CSS")));
        assert!(!is_html_candidate(&u("https://x.com/a.js")));
        assert!(!is_html_candidate(&u("https://x.com/img.PNG")));
        assert!(is_html_candidate(&u("https://x.com/a")));
        assert!(is_html_candidate(&u("https://x.com/a.html")));
    }
}
