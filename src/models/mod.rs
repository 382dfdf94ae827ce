// src/models/mod.rs

//! Domain models for the floor bot.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod floor;
mod reply;
mod vocab;

// Re-export all public types
pub use config::{ClientConfig, Config, CrawlConfig, ReplyConfig, SiteConfig};
pub use floor::{
    Floor, FloorStore, OP_FLOOR_ID, Post, PostEntry, floor_count, mark_replied,
    prune_empty_posts, sweep_replied,
};
pub use reply::{LedgerEntry, ReplyIntent, ReplyMode, merge_ledger};
pub use vocab::{StatsTable, VocabEntry, Vocabulary};
