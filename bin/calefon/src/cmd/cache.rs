//! Cache command - inspect and edit generated fragments

use std::path::Path;

use calefon_generator::ContentCache;
use color_eyre::eyre::{Result, WrapErr, bail};

use super::load_config;

fn open(config_path: &Path) -> Result<ContentCache> {
    let config = load_config(config_path)?;
    ContentCache::open(&config.cache).wrap_err("Failed to open content cache")
}

/// Print every cached key.
pub fn list(config_path: &Path) -> Result<()> {
    let keys = open(config_path)?.keys().wrap_err("Failed to read cache")?;
    for key in &keys {
        println!("{key}");
    }
    tracing::info!(count = keys.len(), "Listed cache keys");
    Ok(())
}

/// Print one cached fragment.
pub fn get(config_path: &Path, key: &str) -> Result<()> {
    match open(config_path)?.get(key).wrap_err("Failed to read cache")? {
        Some(value) => {
            println!("{value}");
            Ok(())
        }
        None => bail!("No cached fragment for '{key}'"),
    }
}

/// Remove one cached fragment; the next online build regenerates it.
pub fn remove(config_path: &Path, key: &str) -> Result<()> {
    if open(config_path)?.remove(key).wrap_err("Failed to update cache")? {
        println!("  ✓ Removed {key}");
        Ok(())
    } else {
        bail!("No cached fragment for '{key}'")
    }
}
