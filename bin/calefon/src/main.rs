//! Calefon CLI
//!
//! Builds the repair-guide site and runs the post-build link and sitemap passes.
//!
//! This is the binary entry point. The library functionality is in `lib.rs`.

use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::Result;

/// Command-line interface for calefon.
#[derive(Parser)]
#[command(
    name = "calefon",
    version,
    about = "Static generator for water-heater repair guides"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "calefon.toml")]
    config: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(clap::Subcommand)]
enum Commands {
    /// Generate every brand, model and repair page
    Build {
        /// Output directory (defaults to build.output_dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Override site base URL (e.g., https://example.com)
        #[arg(long)]
        base_url: Option<String>,
        /// Skip sitemap.xml and robots.txt
        #[arg(long)]
        no_sitemap: bool,
        /// Never call the text generation service
        #[arg(long)]
        offline: bool,
        /// Index of the first brand allowed to call the text service
        #[arg(long, default_value_t = 0)]
        start: usize,
        /// Brands allowed to call the text service in this run
        /// (defaults to generation.brands_per_run)
        #[arg(long)]
        batch: Option<usize>,
    },
    /// Verify internal links in the built site
    Check {
        /// Output directory to verify (defaults to build.output_dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Exit with an error when broken links are found
        #[arg(long)]
        strict: bool,
        /// Where to write the JSON report (defaults to links.report)
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Rewrite renamed link targets in the built site
    Repair {
        /// Output directory to repair (defaults to build.output_dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Report replacements without writing
        #[arg(long)]
        dry_run: bool,
    },
    /// Regenerate sitemap.xml and robots.txt for an existing build
    Sitemap {
        /// Output directory (defaults to build.output_dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Override site base URL
        #[arg(long)]
        base_url: Option<String>,
    },
    /// Inspect or edit the generated content cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

/// Content cache actions.
#[derive(clap::Subcommand)]
enum CacheAction {
    /// List cached keys
    List,
    /// Print one cached fragment
    Get { key: String },
    /// Delete one cached fragment so it is generated again
    Remove { key: String },
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    calefon::init_tracing(cli.verbose);

    match cli.command {
        Commands::Build {
            output,
            base_url,
            no_sitemap,
            offline,
            start,
            batch,
        } => {
            calefon::cmd::build::run(
                &cli.config,
                output.as_deref(),
                base_url.as_deref(),
                no_sitemap,
                offline,
                start,
                batch,
            )?;
        }
        Commands::Check {
            output,
            strict,
            report,
        } => {
            calefon::cmd::check::run(&cli.config, output.as_deref(), strict, report.as_deref())?;
        }
        Commands::Repair { output, dry_run } => {
            calefon::cmd::repair::run(&cli.config, output.as_deref(), dry_run)?;
        }
        Commands::Sitemap { output, base_url } => {
            calefon::cmd::sitemap::run(&cli.config, output.as_deref(), base_url.as_deref())?;
        }
        Commands::Cache { action } => match action {
            CacheAction::List => calefon::cmd::cache::list(&cli.config)?,
            CacheAction::Get { key } => calefon::cmd::cache::get(&cli.config, &key)?,
            CacheAction::Remove { key } => calefon::cmd::cache::remove(&cli.config, &key)?,
        },
    }

    Ok(())
}
