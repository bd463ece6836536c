//! Page discovery and reference extraction.

use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
};

use regex::Regex;
use walkdir::WalkDir;

static REFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:^|\s)(?:href|src)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid regex")
});

/// Every `.html` file under `root`, sorted.
pub fn html_pages(root: &Path) -> Result<Vec<PathBuf>, walkdir::Error> {
    let mut pages = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if entry.file_type().is_file()
            && entry.path().extension().and_then(|e| e.to_str()) == Some("html")
        {
            pages.push(entry.into_path());
        }
    }
    pages.sort();
    Ok(pages)
}

/// Values of `href` and `src` attributes, in document order.
#[must_use]
pub fn extract_references(html: &str) -> Vec<String> {
    REFERENCE_RE
        .captures_iter(html)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().trim().to_string())
        .collect()
}

/// `/`-separated form of `path` relative to `root`.
pub(crate) fn relative_display(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
