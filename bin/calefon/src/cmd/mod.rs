//! Command implementations.

pub mod build;
pub mod cache;
pub mod check;
pub mod repair;
pub mod sitemap;

use std::path::{Path, PathBuf};

use calefon_core::Config;
use color_eyre::eyre::{Result, WrapErr};

/// Load configuration, applying `CALEFON__*` environment overrides.
pub(crate) fn load_config(config_path: &Path) -> Result<Config> {
    Config::load_with_env(config_path).wrap_err("Failed to load configuration")
}

/// Output directory from the command line, or the configured one.
pub(crate) fn output_dir(config: &Config, output: Option<&Path>) -> PathBuf {
    output.map_or_else(|| PathBuf::from(&config.build.output_dir), Path::to_path_buf)
}

/// Minimal site configuration and data for command tests.
#[cfg(test)]
pub(crate) mod fixture {
    use std::{fs, path::PathBuf};

    use tempfile::TempDir;

    pub struct Site {
        pub dir: TempDir,
        pub config: PathBuf,
        pub output: PathBuf,
    }

    pub fn site() -> Site {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::write(root.join("brands.json"), r#"["James", "Orion"]"#).unwrap();
        fs::write(
            root.join("catalog.json"),
            r#"[{"brand": "James", "models": [{"id": "j-60", "name": "J 60",
                "description": "Calefón de 60 litros",
                "specs": {"resistencia": "Brida 1500W", "termostato": "Varilla"}}]}]"#,
        )
        .unwrap();

        let output = root.join("public");
        let config = root.join("calefon.toml");
        fs::write(
            &config,
            format!(
                r#"
[site]
title = "Calefones"
base_url = "https://example.com"

[data]
brands = '{brands}'
catalog = '{catalog}'

[build]
output_dir = '{output}'

[cache]
backend = "json"
path = '{cache}'

[links]
report = '{report}'
"#,
                brands = root.join("brands.json").display(),
                catalog = root.join("catalog.json").display(),
                output = output.display(),
                cache = root.join("cache/generated_content.json").display(),
                report = root.join("broken_links.json").display(),
            ),
        )
        .unwrap();

        Site {
            dir,
            config,
            output,
        }
    }
}
