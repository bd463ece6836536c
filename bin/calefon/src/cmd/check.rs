//! Check command - verify internal links in the built site

use std::path::Path;

use calefon_links::LinkGraphVerifier;
use color_eyre::eyre::{Result, WrapErr, bail};

use super::{load_config, output_dir};

/// Broken links printed before the listing is cut short.
const SHOWN_PER_RUN: usize = 20;

/// Run the check command.
///
/// Every broken link is written to the JSON report; the console shows a summary.
pub fn run(
    config_path: &Path,
    output: Option<&Path>,
    strict: bool,
    report_path: Option<&Path>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let root = output_dir(&config, output);
    let report_path = report_path.unwrap_or(&config.links.report);
    tracing::info!(root = %root.display(), strict, "Checking links");

    println!("Checking links in {}...", root.display());
    let report = LinkGraphVerifier::new(&root)
        .verify()
        .wrap_err("Link verification failed")?;
    report
        .write_json(report_path)
        .wrap_err("Failed to write link report")?;

    for link in report.broken.iter().take(SHOWN_PER_RUN) {
        println!("  ✗ {} -> {}", link.source, link.reference);
        println!("      expected: {}", link.target);
        if !link.suggestions.is_empty() {
            println!("      similar:  {}", link.suggestions.join(", "));
        }
    }
    if report.broken.len() > SHOWN_PER_RUN {
        println!(
            "  ... and {} more (see {})",
            report.broken.len() - SHOWN_PER_RUN,
            report_path.display()
        );
    }
    for page in &report.unreadable_pages {
        println!("  ⚠ could not read {page}");
    }

    println!();
    println!("Summary:");
    println!("  Pages:            {}", report.pages_scanned);
    println!("  References:       {}", report.references_checked);
    println!("  Broken links:     {}", report.broken.len());
    println!("  Pages with errors: {}", report.pages_with_errors());
    println!("  Report:           {}", report_path.display());

    if report.is_clean() {
        println!();
        println!("✓ No broken links found");
        return Ok(());
    }

    println!();
    println!("Most common:");
    for (reference, count) in report.most_common(5) {
        println!("  • {reference} ({count} page(s))");
    }

    if strict {
        bail!("Found {} broken link(s) (strict mode)", report.broken.len());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::cmd::{build, fixture};

    #[test]
    fn test_check_clean_site() {
        let site = fixture::site();
        build::run(&site.config, None, None, true, true, 0, None).unwrap();

        run(&site.config, None, true, None).unwrap();

        let report = fs::read_to_string(site.dir.path().join("broken_links.json")).unwrap();
        assert!(report.contains("\"broken_count\": 0"));
    }

    #[test]
    fn test_check_strict_fails_on_broken_link() {
        let site = fixture::site();
        build::run(&site.config, None, None, true, true, 0, None).unwrap();
        fs::write(site.output.join("extra.html"), r#"<a href="./perdido.html">x</a>"#).unwrap();
        let report = site.dir.path().join("custom.json");

        run(&site.config, None, false, Some(&report)).unwrap();
        assert!(run(&site.config, None, true, Some(&report)).is_err());
        assert!(report.exists());
    }
}
