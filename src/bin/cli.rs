//! Floorbot CLI
//!
//! Local execution entry point.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use floorbot::{
    error::Result,
    models::{floor_count, Config},
    pipeline,
    storage::{FloorStorage, LocalStorage},
};

/// Floorbot - BBS floor crawler and auto-replier
#[derive(Parser, Debug)]
#[command(
    name = "floorbot",
    version,
    about = "Crawls BBS floors and answers keyword matches"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Sub-forum slug, overriding the configured one
    #[arg(long)]
    sub: Option<String>,

    /// Numeric forum id paired with --sub
    #[arg(long)]
    sub_id: Option<String>,

    /// Root directory for per-sub data files
    #[arg(long)]
    data_dir: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl recent floors into the stored snapshot
    Crawl {
        /// Listing pages to scan, overriding the configured depth
        #[arg(long)]
        pages: Option<u32>,

        /// Only keep floors newer than this many minutes ago
        #[arg(long)]
        minutes: Option<i64>,

        /// Keep every floor in the window regardless of keywords
        #[arg(long)]
        match_all: bool,
    },

    /// Answer matched floors from the stored snapshot
    Reply,

    /// Move answered floors into the archive
    Archive,

    /// Incremental crawl, reply, and archive since the last run
    Pipeline,

    /// Validate the configuration file
    Validate,

    /// Show snapshot and ledger summary
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("Floorbot starting...");

    let mut config = Config::load_or_default(&cli.config);
    if let Some(sub) = cli.sub {
        config.site.sub = sub;
    }
    if let Some(sub_id) = cli.sub_id {
        config.site.sub_id = sub_id;
    }
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    let storage = LocalStorage::new(&config.data_dir, &config.site.sub);

    match cli.command {
        Command::Crawl {
            pages,
            minutes,
            match_all,
        } => {
            if let Some(pages) = pages {
                config.crawl.listing_pages = pages;
            }
            if let Some(minutes) = minutes {
                config.crawl.lookback_minutes = minutes;
            }
            if match_all {
                config.crawl.match_all = true;
            }
            config.validate()?;

            pipeline::run_crawl(&config, &storage, None).await?;
        }

        Command::Reply => {
            config.validate()?;
            pipeline::run_reply(&config, &storage).await?;
        }

        Command::Archive => {
            pipeline::run_archive(&storage).await?;
        }

        Command::Pipeline => {
            config.validate()?;
            pipeline::run_pipeline(&config, &storage).await?;
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!(
                "Config OK: sub {} (fid {}), {} listing pages, {:?} replies",
                config.site.sub,
                config.site.sub_id,
                config.crawl.listing_pages,
                config.reply.mode
            );
        }

        Command::Info => {
            let floors = storage.load_floors().await?;
            let archived = storage.load_archived().await?;
            let ledger = storage.load_ledger().await?;

            log::info!(
                "Sub {}: {} active floors across {} posts",
                config.site.sub,
                floor_count(&floors),
                floors.len()
            );
            log::info!(
                "Archive: {} floors across {} posts",
                floor_count(&archived),
                archived.len()
            );
            log::info!("Ledger: {} answered floors", ledger.len());
            match storage.load_last_run().await? {
                Some(at) => log::info!("Last run: {}", at),
                None => log::info!("No recorded run yet."),
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
