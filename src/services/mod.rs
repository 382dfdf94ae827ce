//! Service layer for the forum bot.
//!
//! This module contains the business logic for:
//! - HTTP session handling (`HttpClient`)
//! - Listing and thread extraction (`HupuExtractor`)
//! - Floor crawling (`FloorCrawler`)
//! - Reply matching (`ReplyMatcher`)
//! - Reply dispatch (`ReplyDispatcher`)

mod client;
mod crawler;
mod dispatcher;
mod extract;
mod matcher;

pub use client::{HttpClient, PostResponse};
pub use crawler::{CrawlOutcome, FloorCrawler};
pub use dispatcher::{DispatchOutcome, DispatchReport, ReplyDispatcher, ReplyStatus};
pub use extract::{FloorPage, HupuExtractor, PageExtractor};
pub use matcher::ReplyMatcher;
