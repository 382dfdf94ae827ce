// src/pipeline/crawl.rs

//! Floor crawling pipeline.

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset};

use crate::error::Result;
use crate::models::{self, Config};
use crate::services::{FloorCrawler, HttpClient, HupuExtractor};
use crate::storage::FloorStorage;
use crate::utils::time::forum_now;

/// What a crawl run did, for callers that log or assert on it.
#[derive(Debug)]
pub struct CrawlSummary {
    pub posts: usize,
    pub floors: usize,
    pub listing_failures: usize,
    pub page_failures: usize,
}

/// Crawl the configured subforum and overwrite the stored snapshot.
///
/// `min_time` falls back to the configured lookback when not given.
pub async fn run_crawl(
    config: &Config,
    storage: &dyn FloorStorage,
    min_time: Option<DateTime<FixedOffset>>,
) -> Result<CrawlSummary> {
    let min_time = min_time
        .or_else(|| Some(forum_now() - Duration::minutes(config.crawl.lookback_minutes)));

    let vocab = storage.load_vocab().await?;
    let query_terms = if config.crawl.match_all {
        Vec::new()
    } else {
        vocab.terms()
    };
    if query_terms.is_empty() {
        log::info!("No query terms, keeping every floor in the window");
    }

    let client = Arc::new(HttpClient::new(&config.client)?);
    if let Some(url) = &config.client.warmup_url {
        client.warm_up(url).await;
    }

    let extractor = HupuExtractor::new(&config.site)?;
    let crawler = FloorCrawler::new(client, extractor, &config.site, &config.crawl)?;

    log::info!(
        "Crawling {} listing pages of {}",
        config.crawl.listing_pages,
        config.site.sub
    );
    let outcome = crawler.crawl(min_time, &query_terms).await;

    let mut store = outcome.store;
    models::prune_empty_posts(&mut store);
    let summary = CrawlSummary {
        posts: store.len(),
        floors: models::floor_count(&store),
        listing_failures: outcome.listing_failures,
        page_failures: outcome.thread_page_failures,
    };
    storage.save_floors(&store).await?;

    log::info!(
        "Kept {} floors across {} posts ({} listing failures, {} page failures)",
        summary.floors,
        summary.posts,
        summary.listing_failures,
        summary.page_failures
    );

    Ok(summary)
}
