//! Link graph verification.
//!
//! Every internal `.html` reference in every page is resolved against the
//! files actually present in the output tree. A reference is broken when the
//! file it resolves to does not exist.

use std::{
    collections::HashMap,
    fs,
    path::{Component, Path, PathBuf},
};

use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::scan::{self, relative_display};

/// Verification errors.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Directory walk error.
    #[error("failed to walk output tree: {0}")]
    Walk(#[from] walkdir::Error),

    /// Report serialization error.
    #[error("failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),

    /// The output directory does not exist.
    #[error("output directory not found: {}", .0.display())]
    MissingRoot(PathBuf),
}

/// Result type for verification.
pub type Result<T> = std::result::Result<T, VerifyError>;

/// What a raw reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// Another site or scheme; not checked.
    External,
    /// In-page anchor or script; not checked.
    Anchor,
    Internal,
}

/// Classify a raw attribute value.
#[must_use]
pub fn classify_reference(raw: &str) -> ReferenceKind {
    let lower = raw.trim().to_ascii_lowercase();
    if lower.starts_with('#') || lower.starts_with("javascript:") {
        ReferenceKind::Anchor
    } else if lower.starts_with("http://")
        || lower.starts_with("https://")
        || lower.starts_with("//")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        ReferenceKind::External
    } else {
        ReferenceKind::Internal
    }
}

/// The page path of an internal reference, if it names an `.html` file.
///
/// Fragment and query are dropped first.
#[must_use]
pub fn page_target(raw: &str) -> Option<&str> {
    let end = raw.find(['#', '?']).unwrap_or(raw.len());
    let path = raw[..end].trim();
    path.ends_with(".html").then_some(path)
}

/// Which prefix rule resolved a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveRule {
    /// `/x.html`, from the output root.
    Absolute,
    /// `./x.html`, from the source page's directory.
    SameDir,
    /// `../x.html`, up from the source page's directory.
    Parent,
    /// `x.html`, treated as same-directory.
    Bare,
}

/// A reference resolved to a path under the output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub rule: ResolveRule,
    /// Normalized path relative to the root.
    pub target: PathBuf,
    /// The path climbs above the root.
    pub escapes_root: bool,
}

/// Resolve `path` as referenced from the page at `source` (relative to the root).
#[must_use]
pub fn resolve_reference(source: &Path, path: &str) -> Resolved {
    let source_dir = source.parent().unwrap_or(Path::new(""));
    let (rule, joined) = if let Some(rest) = path.strip_prefix('/') {
        (ResolveRule::Absolute, PathBuf::from(rest.trim_start_matches('/')))
    } else if let Some(rest) = path.strip_prefix("./") {
        (ResolveRule::SameDir, source_dir.join(rest))
    } else if path.starts_with("../") {
        (ResolveRule::Parent, source_dir.join(path))
    } else {
        (ResolveRule::Bare, source_dir.join(path))
    };

    let (target, escapes_root) = normalize(&joined);
    Resolved {
        rule,
        target,
        escapes_root,
    }
}

/// Lexical normalization. Parent steps past the start are kept as `..`.
fn normalize(path: &Path) -> (PathBuf, bool) {
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    let mut escaped = 0usize;
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::ParentDir => {
                if parts.pop().is_none() {
                    escaped += 1;
                }
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }

    let mut out = PathBuf::new();
    for _ in 0..escaped {
        out.push("..");
    }
    out.extend(parts);
    (out, escaped > 0)
}

fn squash(name: &str) -> String {
    let stem = name.strip_suffix(".html").unwrap_or(name);
    stem.chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Up to three `.html` files in `dir` whose names resemble `expected`.
///
/// Names are compared with separators and the extension removed; a candidate
/// matches when either name contains the other.
#[must_use]
pub fn suggest_similar(dir: &Path, expected: &str) -> Vec<String> {
    let wanted = squash(expected);
    if wanted.is_empty() {
        return Vec::new();
    }
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut found: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|name| name.ends_with(".html") && name != expected)
        .filter(|name| {
            let have = squash(name);
            !have.is_empty() && (have.contains(&wanted) || wanted.contains(&have))
        })
        .collect();
    found.sort();
    found.truncate(3);
    found
}

/// One reference that does not resolve to a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrokenLink {
    /// Page containing the reference, relative to the root.
    pub source: String,
    /// Attribute value as written.
    pub reference: String,
    /// Where it resolved to, relative to the root.
    pub target: String,
    pub rule: ResolveRule,
    /// Existing files with similar names in the target directory.
    pub suggestions: Vec<String>,
}

/// Aggregated result of a verification pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VerifyReport {
    pub pages_scanned: usize,
    pub references_checked: usize,
    /// Pages that could not be read.
    pub unreadable_pages: Vec<String>,
    pub broken: Vec<BrokenLink>,
}

#[derive(Serialize)]
struct CommonReference<'a> {
    reference: &'a str,
    count: usize,
}

#[derive(Serialize)]
struct ReportFile<'a> {
    pages_scanned: usize,
    references_checked: usize,
    broken_count: usize,
    pages_with_errors: usize,
    most_common: Vec<CommonReference<'a>>,
    unreadable_pages: &'a [String],
    broken: &'a [BrokenLink],
}

impl VerifyReport {
    /// No broken references were found.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.broken.is_empty()
    }

    /// Number of distinct pages with at least one broken reference.
    #[must_use]
    pub fn pages_with_errors(&self) -> usize {
        let mut sources: Vec<&str> = self.broken.iter().map(|b| b.source.as_str()).collect();
        sources.dedup();
        sources.len()
    }

    /// The `n` most frequent broken references with their counts.
    ///
    /// Ties are ordered by reference text.
    #[must_use]
    pub fn most_common(&self, n: usize) -> Vec<(&str, usize)> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for link in &self.broken {
            *counts.entry(link.reference.as_str()).or_default() += 1;
        }
        let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        ranked.truncate(n);
        ranked
    }

    /// Write the report with its summary as pretty JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = ReportFile {
            pages_scanned: self.pages_scanned,
            references_checked: self.references_checked,
            broken_count: self.broken.len(),
            pages_with_errors: self.pages_with_errors(),
            most_common: self
                .most_common(5)
                .into_iter()
                .map(|(reference, count)| CommonReference { reference, count })
                .collect(),
            unreadable_pages: &self.unreadable_pages,
            broken: &self.broken,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(&file)?)?;
        info!(path = %path.display(), broken = self.broken.len(), "wrote link report");
        Ok(())
    }
}

enum PageResult {
    Checked {
        references: usize,
        broken: Vec<BrokenLink>,
    },
    Unreadable(String),
}

/// Verifies references across a built output tree.
#[derive(Debug, Clone)]
pub struct LinkGraphVerifier {
    root: PathBuf,
}

impl LinkGraphVerifier {
    /// Create a verifier for the tree at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Check every page. Broken links are listed in page order.
    pub fn verify(&self) -> Result<VerifyReport> {
        if !self.root.is_dir() {
            return Err(VerifyError::MissingRoot(self.root.clone()));
        }

        let pages = scan::html_pages(&self.root)?;
        info!(pages = pages.len(), root = %self.root.display(), "verifying links");

        let results: Vec<PageResult> = pages.par_iter().map(|page| self.check_page(page)).collect();

        let mut report = VerifyReport {
            pages_scanned: pages.len(),
            ..VerifyReport::default()
        };
        for result in results {
            match result {
                PageResult::Checked { references, broken } => {
                    report.references_checked += references;
                    report.broken.extend(broken);
                }
                PageResult::Unreadable(page) => report.unreadable_pages.push(page),
            }
        }

        info!(
            references = report.references_checked,
            broken = report.broken.len(),
            "link verification complete"
        );
        Ok(report)
    }

    fn check_page(&self, page: &Path) -> PageResult {
        let source = relative_display(&self.root, page);
        let html = match fs::read_to_string(page) {
            Ok(html) => html,
            Err(e) => {
                warn!(page = %source, error = %e, "failed to read page");
                return PageResult::Unreadable(source);
            }
        };

        let relative = page.strip_prefix(&self.root).unwrap_or(page);
        let mut references = 0;
        let mut broken = Vec::new();

        for raw in scan::extract_references(&html) {
            if classify_reference(&raw) != ReferenceKind::Internal {
                continue;
            }
            let Some(path) = page_target(&raw) else {
                continue;
            };
            references += 1;

            let resolved = resolve_reference(relative, path);
            let full = self.root.join(&resolved.target);
            if !resolved.escapes_root && full.is_file() {
                continue;
            }

            let expected = resolved
                .target
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let suggestions = if resolved.escapes_root {
                Vec::new()
            } else {
                full.parent()
                    .map(|dir| suggest_similar(dir, &expected))
                    .unwrap_or_default()
            };

            debug!(page = %source, reference = %raw, "broken link");
            broken.push(BrokenLink {
                source: source.clone(),
                target: resolved
                    .target
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/"),
                reference: raw,
                rule: resolved.rule,
                suggestions,
            });
        }

        PageResult::Checked { references, broken }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_classify_reference() {
        assert_eq!(classify_reference("https://x.com/a.html"), ReferenceKind::External);
        assert_eq!(classify_reference("//cdn.x.com/a.js"), ReferenceKind::External);
        assert_eq!(classify_reference("mailto:a@b.uy"), ReferenceKind::External);
        assert_eq!(classify_reference("#top"), ReferenceKind::Anchor);
        assert_eq!(classify_reference("javascript:void(0)"), ReferenceKind::Anchor);
        assert_eq!(classify_reference("./a.html"), ReferenceKind::Internal);
    }

    #[test]
    fn test_page_target() {
        assert_eq!(page_target("../index.html#top"), Some("../index.html"));
        assert_eq!(page_target("a.html?x=1"), Some("a.html"));
        assert_eq!(page_target("/css/site.css"), None);
        assert_eq!(page_target("/james/"), None);
    }

    #[test]
    fn test_resolve_rules() {
        let source = Path::new("james/modelos/j-60.html");

        let r = resolve_reference(source, "/index.html");
        assert_eq!((r.rule, r.target.as_path()), (ResolveRule::Absolute, Path::new("index.html")));

        let r = resolve_reference(source, "./j-80.html");
        assert_eq!(r.rule, ResolveRule::SameDir);
        assert_eq!(r.target, Path::new("james/modelos/j-80.html"));

        let r = resolve_reference(source, "../reparaciones/cambiar-anodo.html");
        assert_eq!(r.rule, ResolveRule::Parent);
        assert_eq!(r.target, Path::new("james/reparaciones/cambiar-anodo.html"));

        let r = resolve_reference(source, "j-80.html");
        assert_eq!(r.rule, ResolveRule::Bare);
        assert_eq!(r.target, Path::new("james/modelos/j-80.html"));
        assert!(!r.escapes_root);
    }

    #[test]
    fn test_resolve_escaping_root() {
        let r = resolve_reference(Path::new("index.html"), "../../x.html");
        assert!(r.escapes_root);
        assert_eq!(r.target, Path::new("../../x.html"));
    }

    #[test]
    fn test_suggest_similar() {
        let dir = TempDir::new().unwrap();
        for name in [
            "reemplazar-termostato.html",
            "cambiar-anodo.html",
            "cambiar-anodo-magnesio.html",
            "cambiar_resistencia.html",
            "notas.txt",
        ] {
            fs::write(dir.path().join(name), "").unwrap();
        }

        assert_eq!(
            suggest_similar(dir.path(), "cambiaranodo.html"),
            vec!["cambiar-anodo-magnesio.html", "cambiar-anodo.html"]
        );
        assert_eq!(
            suggest_similar(dir.path(), "cambiar-resistencia.html"),
            vec!["cambiar_resistencia.html"]
        );
        assert!(suggest_similar(dir.path(), "cambiar-termostato.html").is_empty());
        assert!(suggest_similar(&dir.path().join("missing"), "a.html").is_empty());
    }

    #[test]
    fn test_verify_finds_broken_links() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "index.html", r#"<a href="./james/index.html">James</a>"#);
        write(
            root,
            "james/index.html",
            r##"<a href="./reparaciones/cambiar-termostato.html">x</a>
               <a href="reparaciones/reemplazar-termostato.html">ok</a>
               <a href="https://tienda.uy/a.html">ext</a>
               <a href="#top">top</a>
               <link href="/css/site.css">"##,
        );
        write(root, "james/reparaciones/reemplazar-termostato.html", r#"<a href="../index.html">up</a>"#);

        let report = LinkGraphVerifier::new(root).verify().unwrap();

        assert_eq!(report.pages_scanned, 3);
        assert_eq!(report.references_checked, 4);
        assert_eq!(report.broken.len(), 1);
        let broken = &report.broken[0];
        assert_eq!(broken.source, "james/index.html");
        assert_eq!(broken.reference, "./reparaciones/cambiar-termostato.html");
        assert_eq!(broken.target, "james/reparaciones/cambiar-termostato.html");
        assert_eq!(broken.rule, ResolveRule::SameDir);
        assert!(broken.suggestions.is_empty());
    }

    #[test]
    fn test_verify_reports_every_broken_link() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        for brand in ["a", "b", "c"] {
            write(
                root,
                &format!("{brand}/index.html"),
                r#"<a href="./gone.html">1</a><a href="/missing.html">2</a>"#,
            );
        }

        let report = LinkGraphVerifier::new(root).verify().unwrap();

        assert_eq!(report.broken.len(), 6);
        assert_eq!(report.pages_with_errors(), 3);
        assert_eq!(report.most_common(5), vec![("./gone.html", 3), ("/missing.html", 3)]);
    }

    #[test]
    fn test_write_json() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "index.html", r#"<a href="nope.html">x</a>"#);
        let report = LinkGraphVerifier::new(dir.path()).verify().unwrap();

        let path = dir.path().join("reports/broken_links.json");
        report.write_json(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(value["broken_count"], 1);
        assert_eq!(value["pages_with_errors"], 1);
        assert_eq!(value["broken"][0]["target"], "nope.html");
        assert_eq!(value["broken"][0]["rule"], "bare");
        assert_eq!(value["most_common"][0]["reference"], "nope.html");
    }

    #[test]
    fn test_missing_root() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            LinkGraphVerifier::new(dir.path().join("public")).verify(),
            Err(VerifyError::MissingRoot(_))
        ));
    }
}
