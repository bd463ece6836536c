//! Repair command - rewrite renamed link targets

use std::path::Path;

use calefon_links::LinkRepairer;
use color_eyre::eyre::{Result, WrapErr};

use super::{load_config, output_dir};

/// Run the repair command.
pub fn run(config_path: &Path, output: Option<&Path>, dry_run: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let root = output_dir(&config, output);

    let repairer = LinkRepairer::from_config(&config.repair)
        .wrap_err("Invalid repair rules")?
        .dry_run(dry_run);
    tracing::info!(root = %root.display(), rules = repairer.rules().len(), dry_run, "Repairing links");

    let report = repairer
        .repair_tree(&root)
        .wrap_err("Link repair failed")?;

    for file in &report.files {
        println!("  ✓ {:50} {} replacement(s)", file.path, file.replacements);
    }
    for page in &report.failed_pages {
        println!("  ⚠ could not repair {page}");
    }

    println!();
    println!("Summary:");
    println!("  Pages scanned:  {}", report.files_scanned);
    println!("  Pages changed:  {}", report.files.len());
    println!("  Replacements:   {}", report.total());
    if !report.failed_pages.is_empty() {
        println!("  Failed pages:   {}", report.failed_pages.len());
    }
    if dry_run {
        println!();
        println!("  ⚠ Dry run, no files were written");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::cmd::{build, fixture};

    #[test]
    fn test_repair_dry_run_then_apply() {
        let site = fixture::site();
        build::run(&site.config, None, None, true, true, 0, None).unwrap();
        let page = site.output.join("james/index.html");
        let html = fs::read_to_string(&page).unwrap();
        let broken = html.replace("reemplazar-termostato.html", "cambiar-termostato.html");
        fs::write(&page, &broken).unwrap();

        run(&site.config, None, true).unwrap();
        assert_eq!(fs::read_to_string(&page).unwrap(), broken);

        run(&site.config, None, false).unwrap();
        assert_eq!(fs::read_to_string(&page).unwrap(), html);
    }
}
