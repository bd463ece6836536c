//! Calefon Generator Library
//!
//! Page generation engine for the calefon repair-guide site.
//!
//! # Modules
//!
//! - [`template`] - Placeholder templates, section suppression and block insertion
//! - [`cache`] - Durable content cache with JSON and SQLite backends
//! - [`narrative`] - Narrative sections with cache, retries and local fallback
//! - [`http`] - HTTP client for the external text service
//! - [`fragments`] - HTML fragments derived from catalog data
//! - [`repairs`] - Repair guide catalogue
//! - [`sitemap`] - XML sitemap generation
//! - [`robots`] - robots.txt generation
//! - [`build`] - Build orchestration

pub mod build;
pub mod cache;
pub mod fragments;
pub mod http;
pub mod narrative;
pub mod repairs;
pub mod robots;
pub mod sitemap;
pub mod template;

pub use build::{BuildError, BuildStats, SiteBuilder};
pub use cache::{CacheKey, ContentCache, ContentStore, JsonFileStore, SqliteStore};
pub use http::HttpGenerator;
pub use narrative::{
    GenerationError, LocalGenerator, NarrativeRequest, Narrator, RetryingGenerator, TextGenerator,
};
pub use repairs::{REPAIR_TYPES, RepairType};
pub use robots::RobotsGenerator;
pub use sitemap::{SitemapEmitter, SitemapEntry};
pub use template::{Template, TemplateContext, TemplateRegistry};
