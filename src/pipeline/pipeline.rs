// src/pipeline/pipeline.rs

//! Incremental end-to-end run.

use chrono::Duration;

use crate::error::Result;
use crate::models::Config;
use crate::storage::FloorStorage;
use crate::utils::time::forum_now;

use super::archive::run_archive;
use super::crawl::run_crawl;
use super::reply::run_reply;

/// Crawl everything since the last completed run, answer what matched,
/// then archive. The new timestamp is recorded right after the crawl so
/// a failed reply stage never widens the next window.
pub async fn run_pipeline(config: &Config, storage: &dyn FloorStorage) -> Result<()> {
    let now = forum_now();
    let since = match storage.load_last_run().await? {
        Some(at) => at,
        None => now - Duration::minutes(config.crawl.lookback_minutes),
    };
    log::info!("Incremental run covering activity after {}", since);

    run_crawl(config, storage, Some(since)).await?;
    storage.save_last_run(now).await?;

    run_reply(config, storage).await?;
    run_archive(storage).await?;

    Ok(())
}
