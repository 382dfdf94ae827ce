// src/models/floor.rs

//! Posts, floors, and the persisted floor store.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::models::reply::LedgerEntry;

/// Anchor token the site assigns to the opening post.
pub const OP_FLOOR_ID: &str = "tpc";

/// A thread observed on a listing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Site-assigned thread id, stable across observations.
    pub post_id: String,

    /// Sub-forum slug as it appears in listing URLs.
    pub sub: String,

    /// Numeric forum id the reply endpoint expects.
    pub sub_id: String,

    /// Canonical URL of the thread's first page.
    pub url: String,

    /// Thread title with embedded newlines removed.
    pub title: String,

    /// Page count as advertised by the listing's multipage indicator.
    pub page_count: u32,

    /// Most recent reply time shown on the listing, widened per
    /// `utils::time::parse_listing_time`.
    pub last_reply_time: DateTime<FixedOffset>,
}

/// A single reply inside a thread. Floor 0 is the opening post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Floor {
    pub floor_number: u32,

    /// Site anchor token, unique within the post; `"tpc"` for the opening
    /// post. Used as the quote target when replying.
    pub floor_id: String,

    /// Direct link to the floor (page URL plus anchor fragment).
    pub url: String,

    pub username: String,

    /// Cleaned text content, quoted subtrees excluded.
    pub content: String,

    pub time: DateTime<FixedOffset>,

    /// Set once a reply to this floor has been confirmed sent. Absent in
    /// older snapshots, so deserialization defaults it to false.
    #[serde(default)]
    pub replied: bool,
}

impl Floor {
    /// Whether this floor is the opening post.
    pub fn is_op(&self) -> bool {
        self.floor_id == OP_FLOOR_ID
    }
}

/// One thread's snapshot entry: listing metadata plus the kept floors,
/// ascending by floor number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostEntry {
    pub meta: Post,
    pub floors: BTreeMap<u32, Floor>,
}

impl PostEntry {
    pub fn new(meta: Post) -> Self {
        Self {
            meta,
            floors: BTreeMap::new(),
        }
    }
}

/// The whole persisted snapshot, keyed by post id.
pub type FloorStore = BTreeMap<String, PostEntry>;

/// Drop post entries whose floor map is empty. Empty entries are never
/// persisted.
pub fn prune_empty_posts(store: &mut FloorStore) {
    store.retain(|_, entry| !entry.floors.is_empty());
}

/// Total floors across all posts.
pub fn floor_count(store: &FloorStore) -> usize {
    store.values().map(|entry| entry.floors.len()).sum()
}

/// Flip the `replied` flag on every floor named by `sent`.
pub fn mark_replied(store: &mut FloorStore, sent: &[LedgerEntry]) {
    for entry in sent {
        if let Some(post) = store.get_mut(&entry.post_id) {
            for floor in post.floors.values_mut() {
                if floor.floor_id == entry.floor_id {
                    floor.replied = true;
                }
            }
        }
    }
}

/// Move every replied floor from `active` into `archived`, merging with
/// whatever the archive already holds, and prune empty post entries from
/// both sides. A floor lives in exactly one of the two stores afterwards.
/// Running the sweep twice in a row changes nothing.
pub fn sweep_replied(active: &mut FloorStore, archived: &mut FloorStore) {
    for (post_id, entry) in active.iter_mut() {
        let replied: Vec<u32> = entry
            .floors
            .iter()
            .filter(|(_, floor)| floor.replied)
            .map(|(number, _)| *number)
            .collect();
        if replied.is_empty() {
            continue;
        }
        let slot = archived
            .entry(post_id.clone())
            .or_insert_with(|| PostEntry::new(entry.meta.clone()));
        slot.meta = entry.meta.clone();
        for number in replied {
            if let Some(floor) = entry.floors.remove(&number) {
                slot.floors.insert(number, floor);
            }
        }
    }
    prune_empty_posts(active);
    prune_empty_posts(archived);
}
