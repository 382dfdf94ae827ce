//! Persistence for crawl snapshots and reply bookkeeping.
//!
//! Everything lives as flat documents under one directory per subforum:
//!
//! ```text
//! data/<sub>/
//! ├── floors.json              # active snapshot of matched floors
//! ├── floors_archived.json     # floors whose replies went out
//! ├── replied_floors.json      # dedup ledger of (post, floor) pairs
//! ├── last_run_timestamp.txt   # cutoff for incremental runs
//! ├── stats.json               # comparison table (prepared offline)
//! └── input/
//!     └── keyword_reply.json   # keyword vocabulary (prepared offline)
//! ```

pub mod local;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};

use crate::error::Result;
use crate::models::{FloorStore, LedgerEntry, StatsTable, Vocabulary};

pub use local::LocalStorage;

/// Storage backend for one subforum's documents.
#[async_trait]
pub trait FloorStorage: Send + Sync {
    /// Load the active snapshot; an absent file is an empty store.
    async fn load_floors(&self) -> Result<FloorStore>;

    async fn save_floors(&self, store: &FloorStore) -> Result<()>;

    /// Load the archive of already-answered floors.
    async fn load_archived(&self) -> Result<FloorStore>;

    async fn save_archived(&self, store: &FloorStore) -> Result<()>;

    /// Load the dedup ledger; an absent file is an empty ledger.
    async fn load_ledger(&self) -> Result<Vec<LedgerEntry>>;

    async fn save_ledger(&self, ledger: &[LedgerEntry]) -> Result<()>;

    /// When the pipeline last completed, if ever recorded.
    async fn load_last_run(&self) -> Result<Option<DateTime<FixedOffset>>>;

    async fn save_last_run(&self, at: DateTime<FixedOffset>) -> Result<()>;

    /// The keyword vocabulary prepared offline.
    async fn load_vocab(&self) -> Result<Vocabulary>;

    /// The comparison stats table prepared offline.
    async fn load_stats(&self) -> Result<StatsTable>;

    /// Flip the `replied` flag on every floor the entries name and persist
    /// the snapshot.
    async fn mark_replied(&self, sent: &[LedgerEntry]) -> Result<()> {
        let mut store = self.load_floors().await?;
        crate::models::mark_replied(&mut store, sent);
        self.save_floors(&store).await
    }

    /// Move replied floors from the snapshot into the archive. Returns how
    /// many floors moved; running it again moves zero.
    async fn archive_sweep(&self) -> Result<usize> {
        let mut active = self.load_floors().await?;
        let mut archived = self.load_archived().await?;
        let before = crate::models::floor_count(&active);
        crate::models::sweep_replied(&mut active, &mut archived);
        let moved = before - crate::models::floor_count(&active);
        self.save_floors(&active).await?;
        self.save_archived(&archived).await?;
        Ok(moved)
    }
}
