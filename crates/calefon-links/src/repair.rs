//! Literal link repair.
//!
//! Rewrites renamed link targets in built pages by plain substring
//! replacement. No HTML parsing is done, so each rule's `old` text has to be
//! specific enough not to match anything else in a page.

use std::{
    fs,
    path::{Path, PathBuf},
};

use calefon_core::config::RepairConfig;
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::scan::{self, relative_display};

/// Repair errors.
#[derive(Debug, Error)]
pub enum RepairError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Directory walk error.
    #[error("failed to walk output tree: {0}")]
    Walk(#[from] walkdir::Error),

    /// A rule with nothing to match.
    #[error("rewrite rule has empty `old` text")]
    EmptyPattern,

    /// A replacement can form a pattern again, alone or with its neighbours.
    #[error("replacement '{new}' can re-form the pattern '{old}', repairs would not be idempotent")]
    NotIdempotent { new: String, old: String },
}

/// Result type for repair operations.
pub type Result<T> = std::result::Result<T, RepairError>;

/// A confirmed rename: every `old` becomes `new`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteRule {
    pub old: String,
    pub new: String,
    /// Only files whose relative path contains this text are touched.
    pub scope: Option<String>,
}

impl RewriteRule {
    /// Create an unscoped rule.
    pub fn new(old: impl Into<String>, new: impl Into<String>) -> Result<Self> {
        let rule = Self {
            old: old.into(),
            new: new.into(),
            scope: None,
        };
        if rule.old.is_empty() {
            return Err(RepairError::EmptyPattern);
        }
        Ok(rule)
    }

    /// Limit the rule to files whose relative path contains `scope`.
    #[must_use]
    pub fn scoped(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    fn applies_to(&self, relative: &str) -> bool {
        self.scope
            .as_deref()
            .is_none_or(|scope| relative.contains(scope))
    }
}

/// Renames made in the page vocabulary.
#[must_use]
pub fn default_rules() -> Vec<RewriteRule> {
    vec![
        RewriteRule {
            old: "cambiar-termostato.html".to_string(),
            new: "reemplazar-termostato.html".to_string(),
            scope: None,
        },
        RewriteRule {
            old: "mantenimiento-anodo.html".to_string(),
            new: "cambiar-anodo.html".to_string(),
            scope: None,
        },
    ]
}

/// Changes made to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRepair {
    /// Path relative to the root.
    pub path: String,
    pub replacements: usize,
}

/// Outcome of a repair pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub files_scanned: usize,
    /// Files with at least one replacement, in path order.
    pub files: Vec<FileRepair>,
    /// Pages that could not be read or written; they were left as they were.
    pub failed_pages: Vec<String>,
    /// Nothing was written.
    pub dry_run: bool,
}

impl RepairReport {
    /// Total replacements across all files.
    #[must_use]
    pub fn total(&self) -> usize {
        self.files.iter().map(|f| f.replacements).sum()
    }
}

/// Applies rewrite rules to every page in a tree.
#[derive(Debug, Clone)]
pub struct LinkRepairer {
    rules: Vec<RewriteRule>,
    dry_run: bool,
}

impl LinkRepairer {
    /// Create a repairer, rejecting rule sets that would not be idempotent.
    pub fn new(rules: Vec<RewriteRule>) -> Result<Self> {
        for rule in &rules {
            if rule.old.is_empty() {
                return Err(RepairError::EmptyPattern);
            }
        }
        for rule in &rules {
            if let Some(other) = rules.iter().find(|o| can_reform(&rule.new, &o.old)) {
                return Err(RepairError::NotIdempotent {
                    new: rule.new.clone(),
                    old: other.old.clone(),
                });
            }
        }
        Ok(Self {
            rules,
            dry_run: false,
        })
    }

    /// Repairer with only the built-in rules.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            rules: default_rules(),
            dry_run: false,
        }
    }

    /// Repairer from configuration: built-in rules (if enabled) followed by configured ones.
    pub fn from_config(config: &RepairConfig) -> Result<Self> {
        let mut rules = if config.include_defaults {
            default_rules()
        } else {
            Vec::new()
        };
        for rule in &config.rules {
            let mut built = RewriteRule::new(&rule.old, &rule.new)?;
            built.scope = rule.scope.clone();
            rules.push(built);
        }
        Self::new(rules)
    }

    /// Count replacements without writing files.
    #[must_use]
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// The active rules, in application order.
    #[must_use]
    pub fn rules(&self) -> &[RewriteRule] {
        &self.rules
    }

    /// Apply every rule that covers `relative` to `content`.
    ///
    /// Returns the rewritten text and the number of replacements.
    #[must_use]
    pub fn apply(&self, relative: &str, content: &str) -> (String, usize) {
        let mut text = content.to_string();
        let mut count = 0;
        for rule in self.rules.iter().filter(|r| r.applies_to(relative)) {
            let hits = text.matches(rule.old.as_str()).count();
            if hits > 0 {
                text = text.replace(rule.old.as_str(), &rule.new);
                count += hits;
            }
        }
        (text, count)
    }

    /// Repair one file under `root`. Returns the number of replacements.
    pub fn repair_file(&self, root: &Path, path: &Path) -> Result<usize> {
        let relative = relative_display(root, path);
        let content = fs::read_to_string(path)?;
        let (text, count) = self.apply(&relative, &content);

        if count > 0 && !self.dry_run {
            fs::write(path, text)?;
        }
        if count > 0 {
            debug!(path = %relative, replacements = count, dry_run = self.dry_run, "repaired links");
        }
        Ok(count)
    }

    /// Repair every page under `root`.
    ///
    /// A page that cannot be read or written is logged, listed in
    /// [`RepairReport::failed_pages`] and skipped; the other pages are still
    /// repaired.
    pub fn repair_tree(&self, root: &Path) -> Result<RepairReport> {
        let pages: Vec<PathBuf> = scan::html_pages(root)?;
        let outcomes: Vec<(String, Result<usize>)> = pages
            .par_iter()
            .map(|page| (relative_display(root, page), self.repair_file(root, page)))
            .collect();

        let mut files = Vec::new();
        let mut failed_pages = Vec::new();
        for (path, outcome) in outcomes {
            match outcome {
                Ok(0) => {}
                Ok(replacements) => files.push(FileRepair { path, replacements }),
                Err(e) => {
                    warn!(path = %path, error = %e, "failed to repair page");
                    failed_pages.push(path);
                }
            }
        }

        let report = RepairReport {
            files_scanned: pages.len(),
            files,
            failed_pages,
            dry_run: self.dry_run,
        };
        info!(
            files = report.files.len(),
            replacements = report.total(),
            failed = report.failed_pages.len(),
            dry_run = self.dry_run,
            "link repair complete"
        );
        Ok(report)
    }
}

/// Whether writing `new` into some page can leave an occurrence of `old`.
///
/// That happens when `new` contains `old`, when `old` contains `new`, when
/// the two overlap at either end, or when an empty `new` joins the text
/// around a removed match.
fn can_reform(new: &str, old: &str) -> bool {
    if new.is_empty() {
        return old.chars().nth(1).is_some();
    }
    if new.contains(old) || old.contains(new) {
        return true;
    }
    let (n, o) = (new.as_bytes(), old.as_bytes());
    (1..n.len().min(o.len())).any(|k| n[n.len() - k..] == o[..k] || n[..k] == o[o.len() - k..])
}
