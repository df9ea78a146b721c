//! Forum Archiver main entry point
//!
//! This is the command-line interface for the forum archiver.

use anyhow::Context;
use clap::{Parser, Subcommand};
use forum_archiver::config::{
    delay_ms_from_secs, load_config_with_hash, parse_section_indices, validate, Config,
};
use forum_archiver::crawler::run_crawl;
use forum_archiver::media::{run_media, MediaOptions};
use forum_archiver::output::{print_crawl_summary, print_media_summary, print_sections};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Forum Archiver: an offline mirror builder for paginated forums
///
/// Crawls forum sections into self-contained HTML files with inlined
/// images, resumes from where it stopped, and downloads the videos the
/// archived threads reference.
#[derive(Parser, Debug)]
#[command(name = "forum-archiver")]
#[command(version = "1.0.0")]
#[command(about = "An offline mirror builder for paginated forums", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Archive forum sections
    Crawl {
        /// Comma-separated section indices (e.g., 0,1,5); all when omitted
        #[arg(long, value_name = "INDICES")]
        sections: Option<String>,

        /// Delay between page renders, in seconds
        #[arg(long, value_name = "SECS")]
        delay: Option<f64>,

        /// Keep images remote instead of inlining them
        #[arg(long)]
        no_embed_images: bool,

        /// Inline linked stylesheets
        #[arg(long)]
        embed_css: bool,
    },

    /// List configured sections with their indices
    Sections,

    /// Scan the archive for video references and download them
    Media {
        /// Comma-separated section indices (e.g., 0,1,5); all when omitted
        #[arg(long, value_name = "INDICES")]
        sections: Option<String>,

        /// Only scan and report; download nothing
        #[arg(long)]
        scan_only: bool,

        /// Maximum downloads attempted per section
        #[arg(long, value_name = "N")]
        max_per_section: Option<usize>,

        /// Retry videos that previously failed
        #[arg(long)]
        retry_failed: bool,

        /// Downloader format selector
        #[arg(long, value_name = "FMT")]
        format: Option<String>,

        /// Download rate limit (e.g., 1M)
        #[arg(long, value_name = "RATE")]
        rate_limit: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    match cli.command {
        Command::Sections => {
            print_sections(&config.sections);
        }

        Command::Crawl {
            sections,
            delay,
            no_embed_images,
            embed_css,
        } => {
            if let Some(secs) = delay {
                config.crawler.delay_ms =
                    delay_ms_from_secs(secs).context("Invalid --delay value")?;
            }
            if no_embed_images {
                config.crawler.embed_images = false;
            }
            if embed_css {
                config.crawler.embed_css = true;
            }
            validate(&config).context("Invalid configuration after overrides")?;

            let indices = section_indices(sections.as_deref())?;
            log_selection(&config, indices.as_deref());

            let summary = run_crawl(config, indices).await.context("Crawl failed")?;
            print_crawl_summary(&summary);
        }

        Command::Media {
            sections,
            scan_only,
            max_per_section,
            retry_failed,
            format,
            rate_limit,
        } => {
            if let Some(format) = format {
                config.media.format = format;
            }
            if rate_limit.is_some() {
                config.media.rate_limit = rate_limit;
            }

            let options = MediaOptions {
                sections: section_indices(sections.as_deref())?,
                scan_only,
                max_per_section,
                retry_failed,
                ..MediaOptions::default()
            };

            let summary = run_media(&config, &options).await.context("Media pass failed")?;
            if !summary.scan_only {
                print_media_summary(&summary);
            }
        }
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("forum_archiver=info,warn"),
            1 => EnvFilter::new("forum_archiver=debug,info"),
            2 => EnvFilter::new("forum_archiver=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn section_indices(raw: Option<&str>) -> anyhow::Result<Option<Vec<usize>>> {
    raw.map(parse_section_indices)
        .transpose()
        .context("Invalid --sections value")
}

fn log_selection(config: &Config, indices: Option<&[usize]>) {
    match indices {
        Some(indices) => tracing::info!("Selected section indices: {:?}", indices),
        None => tracing::info!("All {} sections selected", config.sections.len()),
    }
}
