//! Sitemap command - regenerate sitemap.xml and robots.txt

use std::path::Path;

use calefon_generator::{RobotsGenerator, SitemapEmitter};
use color_eyre::eyre::{Result, WrapErr, bail};

use super::{load_config, output_dir};

/// Run the sitemap command over an existing build.
pub fn run(config_path: &Path, output: Option<&Path>, base_url: Option<&str>) -> Result<()> {
    let config = load_config(config_path)?;
    let root = output_dir(&config, output);
    if !root.is_dir() {
        bail!("Output directory {} does not exist, run `calefon build` first", root.display());
    }
    let base_url = base_url.unwrap_or(&config.site.base_url);

    let urls = SitemapEmitter::new(base_url)
        .write(&root)
        .wrap_err("Failed to write sitemap")?;
    let robots = RobotsGenerator::new(config.robots.clone(), &config.site)
        .with_base_url(base_url)
        .generate(&root)
        .wrap_err("Failed to write robots.txt")?;

    println!("  ✓ sitemap.xml with {urls} URL(s)");
    if robots {
        println!("  ✓ robots.txt");
    }

    Ok(())
}
