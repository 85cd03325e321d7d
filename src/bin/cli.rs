//! Librova CLI
//!
//! Local execution entry point for scheduled runs and for checking how
//! individual listings are parsed and tagged.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use librova::{
    error::{AppError, Result},
    models::Config,
    pipeline::{self, Pipeline},
    services::{CategoryClassifier, PrivacyFilter, TemporalNormalizer},
    storage::{ApiSink, EventSink, LocalSink},
    utils::http,
};

/// Librova - Library Event Scraper
#[derive(Parser, Debug)]
#[command(
    name = "librova",
    version,
    about = "Scrapes public library event calendars into tagged events"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Clean up past events, then scrape every configured source
    Run {
        /// Write events to a local JSON file instead of the events API
        #[arg(long, value_name = "PATH")]
        dry_run: Option<PathBuf>,
    },

    /// Remove past events from the events API
    Cleanup,

    /// Validate the configuration file
    Validate,

    /// Show the privacy verdict and categories for a listing
    Classify {
        title: String,
        description: Option<String>,
    },

    /// Show the normalized start (and end) for a date and time text
    ParseDate {
        date: String,
        time: Option<String>,

        /// Treat the date as an all-day event
        #[arg(long)]
        all_day: bool,
    },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Build the events API sink from `[sink]` and the API key variable.
fn api_sink(config: &Config, client: reqwest::Client) -> Result<ApiSink> {
    let key = config.sink.api_key().ok_or_else(|| {
        AppError::config(format!(
            "{} is not set; export it or use --dry-run",
            config.sink.api_key_env
        ))
    })?;
    Ok(ApiSink::new(client, &config.sink.api_url, key))
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load_or_default(&cli.config);
    config.apply_env_overrides();

    match cli.command {
        Command::Run { dry_run } => {
            log::info!("Librova starting...");
            let client = http::create_async_client(&config.http)?;
            let sink: Box<dyn EventSink> = match dry_run {
                Some(path) => {
                    log::info!("Dry run: writing events to {}", path.display());
                    Box::new(LocalSink::new(path))
                }
                None => Box::new(api_sink(&config, client.clone())?),
            };

            let summary = pipeline::run_pipeline(&config, sink.as_ref(), &client).await?;
            log::info!(
                "Emitted {} events ({} new, {} duplicates, {} failed) from {} sources",
                summary.emitted(),
                summary.inserted(),
                summary.duplicates(),
                summary.failed(),
                summary.sources.len()
            );
        }

        Command::Cleanup => {
            let client = http::create_async_client(&config.http)?;
            let sink = api_sink(&config, client)?;
            pipeline::run_cleanup(&sink).await;
        }

        Command::Validate => {
            log::info!("Validating {}...", cli.config.display());

            if let Err(e) = Pipeline::new(&config) {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!(
                "Config OK: {} sources, {} categories, {} exclusion phrases",
                config.sources.len(),
                config.categories.len(),
                config.exclusions.len()
            );
        }

        Command::Classify { title, description } => {
            let description = description.unwrap_or_default();
            let filter = PrivacyFilter::new(&config.exclusions);
            if let Some(phrase) = filter.blocking_phrase(&title, &description) {
                println!("private (matched '{}')", phrase);
                return Ok(());
            }

            let classifier = CategoryClassifier::new(&config.categories)?;
            let ids = classifier.classify(&title, &description);
            println!("public");
            for id in &ids {
                println!("  {:>3} {}", id, classifier.key_of(*id).unwrap_or("?"));
            }
        }

        Command::ParseDate {
            date,
            time,
            all_day,
        } => {
            let today = pipeline::local_now(config.tz()?).date();
            let normalizer = TemporalNormalizer::new(today);
            let range = normalizer.normalize_range(&date, time.as_deref(), all_day)?;
            println!("start: {}", range.start);
            if let Some(end) = range.end {
                println!("end:   {}", end);
            }
        }
    }

    Ok(())
}
