// src/models/reply.rs

//! Reply targeting types and the persisted dedup ledger.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// How matched floors are answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyMode {
    /// Canned replies looked up in the keyword vocabulary.
    #[default]
    Keyword,
    /// Stat comparison between two subjects named in the floor.
    Comparison,
    /// Content fetched from a third-party service.
    External,
}

/// A reply ready to be dispatched. Derived from a matched floor, never
/// persisted before dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyIntent {
    pub post_id: String,
    pub sub_id: String,
    /// Floor anchor to quote; `"tpc"` targets the opening post.
    pub quote_floor_id: String,
    /// Resolved text, signature block included.
    pub content: String,
}

/// One floor we already answered, keyed by post id and floor anchor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub post_id: String,
    pub floor_id: String,
}

impl LedgerEntry {
    pub fn new(post_id: impl Into<String>, floor_id: impl Into<String>) -> Self {
        Self {
            post_id: post_id.into(),
            floor_id: floor_id.into(),
        }
    }
}

/// Append newly sent entries to the ledger, dropping duplicates while
/// keeping first-seen order.
pub fn merge_ledger(ledger: &mut Vec<LedgerEntry>, sent: Vec<LedgerEntry>) {
    let mut seen: HashSet<LedgerEntry> = ledger.iter().cloned().collect();
    for entry in sent {
        if seen.insert(entry.clone()) {
            ledger.push(entry);
        }
    }
}
