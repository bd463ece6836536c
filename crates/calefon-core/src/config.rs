//! Site configuration management.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Main configuration structure for calefon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Site-wide settings.
    pub site: SiteConfig,

    /// Input data locations.
    #[serde(default)]
    pub data: DataConfig,

    /// Build settings.
    #[serde(default)]
    pub build: BuildConfig,

    /// Generated-content cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// External text generation settings.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Link verification settings.
    #[serde(default)]
    pub links: LinksConfig,

    /// Link repair rules.
    #[serde(default)]
    pub repair: RepairConfig,

    /// robots.txt settings.
    #[serde(default)]
    pub robots: RobotsConfig,
}

/// Site-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Site title.
    pub title: String,

    /// Base URL for the site (e.g., "https://example.com").
    pub base_url: String,

    /// Spare-parts store linked from generated pages.
    #[serde(default = "default_store_url")]
    pub store_url: String,

    /// Language code for the `lang` attribute.
    #[serde(default = "default_language")]
    pub language: String,
}

/// Locations of the brand list, catalog and templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// JSON array of brand display names.
    #[serde(default = "default_brands_path")]
    pub brands: PathBuf,

    /// JSON array of catalog entries.
    #[serde(default = "default_catalog_path")]
    pub catalog: PathBuf,

    /// Directory with template overrides (`layout.html`, `repair.html`, `home.html`).
    #[serde(default)]
    pub templates_dir: Option<PathBuf>,
}

/// Build configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Output directory for generated site.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Assemble brands in parallel.
    #[serde(default = "default_true")]
    pub parallel: bool,

    /// Fail a model-bound page that still contains `{{placeholder}}` tokens.
    #[serde(default)]
    pub strict_placeholders: bool,
}

/// Storage backend for the content cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Single JSON object file, rewritten on every put.
    #[default]
    Json,
    /// Embedded SQLite database.
    Sqlite,
}

/// Content cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Backend kind.
    #[serde(default)]
    pub backend: CacheBackend,

    /// Store location.
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
}

/// External text generation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Whether to call the external service on cache misses.
    #[serde(default)]
    pub enabled: bool,

    /// Service endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Calls per fragment, first try included, before falling back to
    /// local text. Also read from the older `max_retries` key.
    #[serde(default = "default_max_attempts", alias = "max_retries")]
    pub max_attempts: u32,

    /// First backoff delay; doubled after every failed attempt.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Per-attempt request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Pause after each successful generation.
    #[serde(default)]
    pub pause_ms: u64,

    /// Brands per run allowed to call the service; `None` means all of them.
    #[serde(default)]
    pub brands_per_run: Option<usize>,
}

/// Link verification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinksConfig {
    /// Where the broken-link report is written.
    #[serde(default = "default_report_path")]
    pub report: PathBuf,
}

/// A configured literal rewrite rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteRuleConfig {
    /// Text to replace.
    pub old: String,

    /// Replacement text.
    pub new: String,

    /// Only touch pages whose relative path contains this string.
    #[serde(default)]
    pub scope: Option<String>,
}

/// Link repair configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairConfig {
    /// Include the built-in rename table.
    #[serde(default = "default_true")]
    pub include_defaults: bool,

    /// Extra rules applied after the built-in ones.
    #[serde(default)]
    pub rules: Vec<RewriteRuleConfig>,
}

/// robots.txt configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobotsConfig {
    /// Whether to write robots.txt.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Allowed paths.
    #[serde(default)]
    pub allow: Vec<String>,

    /// Disallowed paths.
    #[serde(default)]
    pub disallow: Vec<String>,
}

// Default value functions
fn default_store_url() -> String {
    "https://casadelcalefon.uy".to_string()
}

fn default_language() -> String {
    "es".to_string()
}

fn default_brands_path() -> PathBuf {
    PathBuf::from("data/brands.json")
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from("data/catalog.json")
}

fn default_output_dir() -> String {
    "public".to_string()
}

fn default_true() -> bool {
    true
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("data/generated_content.json")
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash-exp:generateContent"
        .to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_report_path() -> PathBuf {
    PathBuf::from("broken_links.json")
}

impl SiteConfig {
    /// Create site settings with defaults for everything but title and base URL.
    pub fn new(title: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            base_url: base_url.into(),
            store_url: default_store_url(),
            language: default_language(),
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            brands: default_brands_path(),
            catalog: default_catalog_path(),
            templates_dir: None,
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            parallel: true,
            strict_placeholders: false,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            path: default_cache_path(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_endpoint(),
            api_key_env: default_api_key_env(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            timeout_secs: default_timeout_secs(),
            pause_ms: 0,
            brands_per_run: None,
        }
    }
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            report: default_report_path(),
        }
    }
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            include_defaults: true,
            rules: Vec::new(),
        }
    }
}

impl Default for RobotsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allow: Vec::new(),
            disallow: Vec::new(),
        }
    }
}

impl Config {
    /// Create a configuration with default sections around the given site settings.
    pub fn new(site: SiteConfig) -> Self {
        Self {
            site,
            data: DataConfig::default(),
            build: BuildConfig::default(),
            cache: CacheConfig::default(),
            generation: GenerationConfig::default(),
            links: LinksConfig::default(),
            repair: RepairConfig::default(),
            robots: RobotsConfig::default(),
        }
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CoreError::config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            CoreError::config_with_source(
                format!("Failed to parse config file: {}", path.display()),
                e,
            )
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration, letting `CALEFON__SECTION__KEY` environment variables override the file.
    pub fn load_with_env(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CoreError::config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("CALEFON").separator("__"))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.site.title.is_empty() {
            return Err(CoreError::config("site.title cannot be empty"));
        }

        if self.site.base_url.is_empty() {
            return Err(CoreError::config("site.base_url cannot be empty"));
        }

        if self.site.base_url.ends_with('/') {
            tracing::warn!("site.base_url should not have a trailing slash");
        }

        if self.generation.enabled && self.generation.max_attempts == 0 {
            return Err(CoreError::config(
                "generation.max_attempts must be at least 1",
            ));
        }

        if self.generation.brands_per_run == Some(0) {
            return Err(CoreError::config(
                "generation.brands_per_run must be at least 1 when set",
            ));
        }

        for rule in &self.repair.rules {
            if rule.old.is_empty() {
                return Err(CoreError::config("repair rule with empty `old` text"));
            }
        }

        Ok(())
    }

    /// Get the full URL for a path.
    pub fn url_for(&self, path: &str) -> String {
        let base = self.site.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }
}
