//! Deterministic URL → filesystem mapping (spec.md §4.1, §6).

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9]+").unwrap());

/// All four possible output paths for a page, plus its directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub dir: PathBuf,
    pub page_path: PathBuf,
    pub clutter_path: PathBuf,
    pub llms_path: PathBuf,
    pub llms_full_path: PathBuf,
}

/// Replace runs of non-alphanumerics with `_`, trim, lowercase. Empty input
/// becomes `fallback`.
fn normalize_segment(raw: &str, fallback: &str) -> String {
    let collapsed = NON_ALNUM.replace_all(raw, "_");
    let trimmed = collapsed.trim_matches('_').to_lowercase();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed
    }
}

/// Deterministic `<out_dir>/<host>/<path-segments>/` layout with fixed
/// filenames. Two URLs with equal `normalize_for_queue` output map to equal
/// `page_path`, since both normalize the same `Url::path()`/`Url::host()`.
pub fn build_output_paths(url: &Url, out_dir: &Path) -> OutputPaths {
    let host_raw = url.host_str().unwrap_or("");
    let host = normalize_segment(host_raw, "index");

    let mut dir = out_dir.join(host);

    let segments: Vec<&str> = url
        .path()
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    if segments.is_empty() {
        dir.push("root");
    } else {
        for seg in segments {
            dir.push(normalize_segment(seg, "root"));
        }
    }

    OutputPaths {
        page_path: dir.join("page.md"),
        clutter_path: dir.join("clutter.md"),
        llms_path: dir.join(".llms.md"),
        llms_full_path: dir.join("llms-full.md"),
        dir,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn maps_host_and_path() {
        let paths = build_output_paths(&u("https://docs.example.com/a/b"), Path::new(".docs"));
        assert_eq!(
            paths.page_path,
            PathBuf::from(".docs/docs_example_com/a/b/page.md")
        );
        assert_eq!(
            paths.clutter_path,
            PathBuf::from(".docs/docs_example_com/a/b/clutter.md")
        );
        assert_eq!(
            paths.llms_path,
            PathBuf::from(".docs/docs_example_com/a/b/.llms.md")
        );
        assert_eq!(
            paths.llms_full_path,
            PathBuf::from(".docs/docs_example_com/a/b/llms-full.md")
        );
    }

    #[test]
    fn root_path_maps_to_root_segment() {
        let paths = build_output_paths(&u("https://example.com/"), Path::new("out"));
        assert_eq!(paths.page_path, PathBuf::from("out/example_com/root/page.md"));
    }

    #[test]
    fn normalization_is_deterministic_across_equivalent_urls() {
        let a = build_output_paths(&u("https://Example.com/a?x=1#h"), Path::new("out"));
        let b = build_output_paths(&u("https://example.com/a"), Path::new("out"));
        assert_eq!(a.page_path, b.page_path);
    }
}
