//! Calefon CLI Library
//!
//! Command implementations for the calefon binary. The binary entry point only
//! parses arguments and dispatches here.
//!
//! # Modules
//!
//! - [`cmd`] - Command implementations (build, check, repair, sitemap, cache)
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use calefon::cmd;
//!
//! // Build the site without calling the text service
//! cmd::build::run(Path::new("calefon.toml"), None, None, false, true, 0, None).unwrap();
//! ```

pub mod cmd;

pub use calefon_core::{Config, DataStore};
pub use calefon_generator::{BuildStats, SiteBuilder};
pub use calefon_links::{LinkGraphVerifier, LinkRepairer};

/// Initialize tracing with the specified verbosity level.
///
/// # Arguments
///
/// * `verbose` - Verbosity level (0 = WARN, 1 = INFO, 2 = DEBUG, 3+ = TRACE)
pub fn init_tracing(verbose: u8) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();
}
