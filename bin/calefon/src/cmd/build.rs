//! Build command - generates the site

use std::{path::Path, time::Duration};

use calefon_core::{Config, DataStore};
use calefon_generator::{
    ContentCache, HttpGenerator, Narrator, RetryingGenerator, RobotsGenerator, SiteBuilder,
    SitemapEmitter, TemplateRegistry,
};
use color_eyre::eyre::{Result, WrapErr, bail};

use super::{load_config, output_dir};

/// Run the build command.
///
/// Generates every page, then `sitemap.xml` and `robots.txt` unless disabled.
/// Only brands `start..start + batch` may call the text service; `batch`
/// falls back to `generation.brands_per_run`.
pub fn run(
    config_path: &Path,
    output: Option<&Path>,
    base_url: Option<&str>,
    no_sitemap: bool,
    offline: bool,
    start: usize,
    batch: Option<usize>,
) -> Result<()> {
    tracing::info!(?config_path, ?output, ?base_url, offline, start, ?batch, "Starting build");

    let mut config = load_config(config_path)?;
    if let Some(url) = base_url {
        tracing::info!(base_url = url, "Overriding site base URL from CLI");
        config.site.base_url = url.to_string();
    }
    let output = output_dir(&config, output);
    config.build.output_dir = output.to_string_lossy().to_string();

    let store = DataStore::load(&config.data.brands, &config.data.catalog)
        .wrap_err("Failed to load brand data")?;

    let mut templates = TemplateRegistry::new();
    if let Some(dir) = &config.data.templates_dir {
        let count = templates
            .load_dir(dir)
            .wrap_err_with(|| format!("Failed to load templates from {}", dir.display()))?;
        tracing::info!(count, dir = %dir.display(), "Loaded templates");
    }

    let cache = ContentCache::open(&config.cache).wrap_err("Failed to open content cache")?;
    let narrator = narrator(&config, cache, offline);
    let batch = batch.or(config.generation.brands_per_run);
    if batch == Some(0) {
        bail!("--batch must be at least 1");
    }

    let builder = SiteBuilder::new(config.clone(), store, narrator, &output)
        .with_templates(templates)
        .with_generation_window(start, batch);
    let stats = builder.build().wrap_err("Build failed")?;

    let mut sitemap_urls = None;
    if !no_sitemap {
        sitemap_urls = Some(
            SitemapEmitter::new(&config.site.base_url)
                .write(&output)
                .wrap_err("Failed to write sitemap")?,
        );
        RobotsGenerator::new(config.robots.clone(), &config.site)
            .generate(&output)
            .wrap_err("Failed to write robots.txt")?;
    }

    println!();
    if stats.failed_pages == 0 {
        println!("  ✓ Build completed successfully!");
    } else {
        println!("  ⚠ Build completed with {} failed page(s)", stats.failed_pages);
    }
    println!();
    println!("  Brands:        {}", stats.brands);
    println!("  Brand pages:   {}", stats.brand_pages);
    println!("  Model pages:   {}", stats.model_pages);
    println!("  Repair pages:  {}", stats.repair_pages);
    if stats.unresolved_pages > 0 {
        println!("  Placeholders:  {} page(s) with unresolved tokens", stats.unresolved_pages);
    }
    println!(
        "  Narrative:     {} generated, {} cached, {} fallback",
        stats.narrative.external_calls, stats.narrative.cache_hits, stats.narrative.fallbacks
    );
    if let Some(urls) = sitemap_urls {
        println!("  Sitemap URLs:  {urls}");
    }
    if stats.deferred_brands > 0 {
        println!("  Deferred:      {} brand(s) used cached or local text only", stats.deferred_brands);
    }
    if let (Some(next), Some(batch)) = (stats.next_start, batch) {
        println!();
        println!("  ⚠ Brands remain after this batch, resume with:");
        println!("    calefon build --start {next} --batch {batch}");
    }
    println!();
    println!("  Duration:      {:.2}s", stats.duration_ms as f64 / 1000.0);
    println!("  Output:        {}", output.display());
    println!();

    tracing::info!(?stats, "Build completed");

    Ok(())
}

/// Narrator for this run: external generation when enabled and configured,
/// otherwise cached fragments and local text only.
fn narrator(config: &Config, cache: ContentCache, offline: bool) -> Narrator {
    let generation = &config.generation;
    if offline || !generation.enabled {
        return Narrator::offline(cache);
    }

    match HttpGenerator::from_config(generation) {
        Ok(http) => {
            let retrying = RetryingGenerator::new(
                http,
                generation.max_attempts,
                Duration::from_millis(generation.base_delay_ms),
            );
            Narrator::new(cache, Box::new(retrying))
                .with_pause(Duration::from_millis(generation.pause_ms))
        }
        Err(e) => {
            tracing::warn!(error = %e, "text generation unavailable, building offline");
            println!("  ⚠ Text generation unavailable ({e}), using cached and local text");
            Narrator::offline(cache)
        }
    }
}
