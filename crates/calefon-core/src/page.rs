//! Generated page representation.

use std::path::{Path, PathBuf};

/// What a generated page is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageKind {
    /// `{slug}/index.html`
    BrandIndex,
    /// `{slug}/modelos/{id}.html`
    Model,
    /// `{slug}/reparaciones/{id}.html`
    Repair,
    /// Anything else, such as the root index.
    Other,
}

impl PageKind {
    /// Whether the page is rendered from a single model's data.
    #[must_use]
    pub fn is_model_bound(self) -> bool {
        matches!(self, Self::Model)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BrandIndex => "brand-index",
            Self::Model => "model",
            Self::Repair => "repair",
            Self::Other => "other",
        }
    }
}

/// A fully assembled page, ready to be written.
#[derive(Debug, Clone)]
pub struct Page {
    /// Path relative to the output root.
    pub path: PathBuf,

    /// Final HTML.
    pub content: String,

    pub kind: PageKind,
}

impl Page {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, content: impl Into<String>, kind: PageKind) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            kind,
        }
    }

    /// Brand index page path.
    #[must_use]
    pub fn brand_index_path(slug: &str) -> PathBuf {
        Path::new(slug).join("index.html")
    }

    /// Model page path.
    #[must_use]
    pub fn model_path(slug: &str, model_id: &str) -> PathBuf {
        Path::new(slug)
            .join("modelos")
            .join(format!("{model_id}.html"))
    }

    /// Repair page path.
    #[must_use]
    pub fn repair_path(slug: &str, repair_id: &str) -> PathBuf {
        Path::new(slug)
            .join("reparaciones")
            .join(format!("{repair_id}.html"))
    }
}
