//! Sitemap generation.
//!
//! Walks the built output tree and emits an XML sitemap. Priority and change
//! frequency are derived from the shape of each page path.

use std::{fs, path::Path};

use chrono::{NaiveDate, Utc};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Sitemap generation errors.
#[derive(Debug, Error)]
pub enum SitemapError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Directory walk error.
    #[error("failed to walk output tree: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Result type for sitemap operations.
pub type Result<T> = std::result::Result<T, SitemapError>;

/// Change frequency for sitemap entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeFreq {
    Weekly,
    Monthly,
}

impl ChangeFreq {
    fn as_str(self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

/// A sitemap URL entry.
#[derive(Debug, Clone, PartialEq)]
pub struct SitemapEntry {
    /// Path relative to the site root, `/` separated, with a leading `/`.
    pub path: String,

    /// Absolute URL.
    pub loc: String,

    pub lastmod: NaiveDate,

    pub changefreq: ChangeFreq,

    /// Priority (0.0 to 1.0).
    pub priority: f32,
}

/// Canonical URL path for a page file relative to the output root.
///
/// `index.html` maps to `/`, `a/index.html` to `/a/`, anything else one-to-one.
#[must_use]
pub fn url_path(relative: &str) -> String {
    if relative == "index.html" {
        return "/".to_string();
    }
    match relative.strip_suffix("/index.html") {
        Some(dir) => format!("/{dir}/"),
        None => format!("/{relative}"),
    }
}

/// Priority and change frequency for a page file relative to the output root.
#[must_use]
pub fn classify(relative: &str) -> (f32, ChangeFreq) {
    let has_segment = |name: &str| relative.split('/').any(|s| s == name);

    if relative == "index.html" {
        (1.0, ChangeFreq::Weekly)
    } else if has_segment("modelos") {
        (0.8, ChangeFreq::Monthly)
    } else if has_segment("reparaciones") {
        (0.7, ChangeFreq::Monthly)
    } else if relative.ends_with("/index.html") {
        (0.9, ChangeFreq::Weekly)
    } else {
        (0.6, ChangeFreq::Monthly)
    }
}

/// Sitemap emitter over an output directory.
#[derive(Debug, Clone)]
pub struct SitemapEmitter {
    base_url: String,
    lastmod: NaiveDate,
}

impl SitemapEmitter {
    /// Create an emitter stamping entries with today's date.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            lastmod: Utc::now().date_naive(),
        }
    }

    /// Use a fixed lastmod date.
    #[must_use]
    pub fn with_lastmod(mut self, lastmod: NaiveDate) -> Self {
        self.lastmod = lastmod;
        self
    }

    /// Collect an entry for every HTML page under `output_dir`.
    ///
    /// The root entry comes first; the rest are sorted by path.
    pub fn collect(&self, output_dir: &Path) -> Result<Vec<SitemapEntry>> {
        let mut entries = Vec::new();

        for entry in WalkDir::new(output_dir) {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|e| e.to_str()) != Some("html")
            {
                continue;
            }
            let Ok(relative) = path.strip_prefix(output_dir) else {
                continue;
            };
            let relative = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            let (priority, changefreq) = classify(&relative);
            let url = url_path(&relative);
            entries.push(SitemapEntry {
                loc: format!("{}{url}", self.base_url),
                path: url,
                lastmod: self.lastmod,
                changefreq,
                priority,
            });
        }

        entries.sort_by(|a, b| (a.path != "/", &a.path).cmp(&(b.path != "/", &b.path)));
        debug!(count = entries.len(), "collected sitemap entries");
        Ok(entries)
    }

    /// Render entries as sitemap XML.
    #[must_use]
    pub fn render(&self, entries: &[SitemapEntry]) -> String {
        let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        xml.push('\n');
        xml.push_str(r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">"#);
        xml.push('\n');

        for entry in entries {
            xml.push_str("  <url>\n");
            xml.push_str(&format!("    <loc>{}</loc>\n", escape_xml(&entry.loc)));
            xml.push_str(&format!(
                "    <lastmod>{}</lastmod>\n",
                entry.lastmod.format("%Y-%m-%d")
            ));
            xml.push_str(&format!(
                "    <changefreq>{}</changefreq>\n",
                entry.changefreq.as_str()
            ));
            xml.push_str(&format!("    <priority>{:.1}</priority>\n", entry.priority));
            xml.push_str("  </url>\n");
        }

        xml.push_str("</urlset>\n");
        xml
    }

    /// Collect, render and write `sitemap.xml` into `output_dir`.
    ///
    /// Returns the number of URLs written.
    pub fn write(&self, output_dir: &Path) -> Result<usize> {
        let entries = self.collect(output_dir)?;
        let path = output_dir.join("sitemap.xml");
        fs::write(&path, self.render(&entries))?;
        info!(urls = entries.len(), path = %path.display(), "wrote sitemap");
        Ok(entries.len())
    }
}

/// Escape special XML characters.
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
