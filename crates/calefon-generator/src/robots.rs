//! Robots.txt generation.

use std::{fmt::Write as _, fs, path::Path};

use calefon_core::config::{RobotsConfig, SiteConfig};
use thiserror::Error;
use tracing::info;

/// Robots generation errors.
#[derive(Debug, Error)]
pub enum RobotsError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for robots generation.
pub type Result<T> = std::result::Result<T, RobotsError>;

/// Robots.txt generator.
#[derive(Debug, Clone)]
pub struct RobotsGenerator {
    robots: RobotsConfig,
    base_url: String,
}

impl RobotsGenerator {
    /// Create a new robots generator.
    #[must_use]
    pub fn new(robots: RobotsConfig, site: &SiteConfig) -> Self {
        Self {
            robots,
            base_url: site.base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Point the sitemap line at a different base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Contents of robots.txt.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::from("User-agent: *\n");
        for path in &self.robots.disallow {
            let _ = writeln!(out, "Disallow: {path}");
        }
        for path in &self.robots.allow {
            let _ = writeln!(out, "Allow: {path}");
        }
        let _ = writeln!(out, "Sitemap: {}/sitemap.xml", self.base_url);
        out
    }

    /// Write robots.txt into `output_dir`. Returns false when disabled.
    pub fn generate(&self, output_dir: &Path) -> Result<bool> {
        if !self.robots.enabled {
            return Ok(false);
        }

        info!("generating robots.txt");
        fs::write(output_dir.join("robots.txt"), self.render())?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn site() -> SiteConfig {
        SiteConfig::new("Calefones", "https://example.com/")
    }

    #[test]
    fn test_render() {
        let robots = RobotsConfig {
            disallow: vec!["/borradores/".to_string()],
            allow: vec!["/".to_string()],
            ..RobotsConfig::default()
        };
        let text = RobotsGenerator::new(robots, &site()).render();

        assert_eq!(
            text,
            "User-agent: *\nDisallow: /borradores/\nAllow: /\nSitemap: https://example.com/sitemap.xml\n"
        );
    }

    #[test]
    fn test_generate_disabled() {
        let dir = TempDir::new().unwrap();
        let robots = RobotsConfig {
            enabled: false,
            ..RobotsConfig::default()
        };

        assert!(!RobotsGenerator::new(robots, &site()).generate(dir.path()).unwrap());
        assert!(!dir.path().join("robots.txt").exists());
    }

    #[test]
    fn test_generate_writes_file() {
        let dir = TempDir::new().unwrap();
        let generator = RobotsGenerator::new(RobotsConfig::default(), &site())
            .with_base_url("https://staging.example.com");

        assert!(generator.generate(dir.path()).unwrap());
        let text = std::fs::read_to_string(dir.path().join("robots.txt")).unwrap();
        assert!(text.contains("Sitemap: https://staging.example.com/sitemap.xml"));
    }
}
