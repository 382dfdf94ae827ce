// src/services/crawler.rs

//! Floor crawler service.
//!
//! Scans listing pages for recently-active threads, then walks each
//! retained thread backward from its last page collecting floors that pass
//! the time cutoff and the query filter.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use futures::stream::{self, StreamExt};
use url::Url;

use crate::error::Result;
use crate::models::{CrawlConfig, Floor, FloorStore, Post, PostEntry, SiteConfig};
use crate::services::client::HttpClient;
use crate::services::extract::PageExtractor;
use crate::utils::time::forum_now;
use crate::utils::{listing_url, thread_page_url};

/// Summary of a crawl run.
#[derive(Debug, Default)]
pub struct CrawlOutcome {
    pub store: FloorStore,
    pub listing_total: usize,
    pub listing_failures: usize,
    pub threads_walked: usize,
    pub thread_pages_fetched: usize,
    pub thread_page_failures: usize,
    pub floors_kept: usize,
}

#[derive(Default)]
struct ThreadWalk {
    floors: BTreeMap<u32, Floor>,
    pages_fetched: usize,
    page_failures: usize,
}

/// Service crawling one sub-forum per run.
pub struct FloorCrawler<E> {
    client: Arc<HttpClient>,
    extractor: E,
    base_url: Url,
    sub: String,
    listing_pages: u32,
    concurrency: usize,
}

impl<E: PageExtractor> FloorCrawler<E> {
    pub fn new(
        client: Arc<HttpClient>,
        extractor: E,
        site: &SiteConfig,
        crawl: &CrawlConfig,
    ) -> Result<Self> {
        Ok(Self {
            client,
            extractor,
            base_url: site.base_url()?,
            sub: site.sub.clone(),
            listing_pages: crawl.listing_pages,
            concurrency: crawl.max_concurrent.max(1),
        })
    }

    /// Crawl the configured listing depth. Posts are kept when their last
    /// reply is strictly newer than `min_time`; floors additionally need a
    /// case-insensitive hit on some query term (empty terms keep all).
    /// Network failures cost coverage, never the run.
    pub async fn crawl(
        &self,
        min_time: Option<DateTime<FixedOffset>>,
        query_terms: &[String],
    ) -> CrawlOutcome {
        let now = forum_now();
        let mut outcome = CrawlOutcome {
            listing_total: self.listing_pages as usize,
            ..CrawlOutcome::default()
        };

        // Stage 1: listing pages, bounded fan-out, merged in page order so
        // a later page's observation of a post wins.
        let listing_urls: Vec<String> = (1..=self.listing_pages)
            .map(|page| listing_url(self.base_url.as_str(), &self.sub, page))
            .collect();

        let mut posts: BTreeMap<String, Post> = BTreeMap::new();
        let mut listing_stream = stream::iter(listing_urls)
            .map(|url| async move {
                let body = self.client.fetch_text(&url).await;
                (url, body)
            })
            .buffered(self.concurrency);

        while let Some((url, body)) = listing_stream.next().await {
            let Some(html) = body else {
                outcome.listing_failures += 1;
                log::warn!("Listing page {} yielded nothing", url);
                continue;
            };
            for post in self.extractor.extract_posts(&html, now) {
                if min_time.map_or(true, |cutoff| post.last_reply_time > cutoff) {
                    posts.insert(post.post_id.clone(), post);
                }
            }
        }

        // Stage 2: walk each retained thread, fanning out across threads
        // while each walk itself stays strictly sequential.
        outcome.threads_walked = posts.len();
        let mut walk_stream = stream::iter(posts.into_values())
            .map(|post| async move {
                let walk = self.walk_thread(&post, min_time, query_terms).await;
                (post, walk)
            })
            .buffer_unordered(self.concurrency);

        let mut store = FloorStore::new();
        while let Some((post, walk)) = walk_stream.next().await {
            outcome.thread_pages_fetched += walk.pages_fetched;
            outcome.thread_page_failures += walk.page_failures;
            if walk.floors.is_empty() {
                continue;
            }
            outcome.floors_kept += walk.floors.len();
            store.insert(
                post.post_id.clone(),
                PostEntry {
                    meta: post,
                    floors: walk.floors,
                },
            );
        }

        outcome.store = store;
        outcome
    }

    /// Walk one thread backward from its last page. A page with no floor
    /// elements ends the walk; so does the first floor at or before the
    /// cutoff, since everything on earlier pages is older still. A fetch
    /// failure only skips its page.
    async fn walk_thread(
        &self,
        post: &Post,
        min_time: Option<DateTime<FixedOffset>>,
        query_terms: &[String],
    ) -> ThreadWalk {
        let mut walk = ThreadWalk::default();
        'pages: for page in (1..=post.page_count.max(1)).rev() {
            let url = thread_page_url(self.base_url.as_str(), &post.post_id, page);
            let Some(html) = self.client.fetch_text(&url).await else {
                walk.page_failures += 1;
                continue;
            };
            walk.pages_fetched += 1;

            let extracted = self.extractor.extract_floors(&html, &url);
            if !extracted.has_content {
                log::debug!("Thread {} page {} has no floors, stopping", post.post_id, page);
                break;
            }
            for floor in extracted.floors.into_iter().rev() {
                if let Some(cutoff) = min_time {
                    if floor.time <= cutoff {
                        break 'pages;
                    }
                }
                if matches_any_term(&floor.content, query_terms) {
                    walk.floors.insert(floor.floor_number, floor);
                }
            }
        }
        walk
    }
}

/// Case-insensitive containment against any term; no terms keeps everything.
fn matches_any_term(content: &str, terms: &[String]) -> bool {
    if terms.is_empty() {
        return true;
    }
    let content = content.to_uppercase();
    terms.iter().any(|term| content.contains(&term.to_uppercase()))
}
