//! Local filesystem storage.
//!
//! Every write goes through a temp file followed by a rename, so a crash
//! mid-write never leaves a truncated document behind.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde::{de::DeserializeOwned, Serialize};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{FloorStore, LedgerEntry, StatsTable, Vocabulary};
use crate::storage::FloorStorage;

const FLOORS_FILE: &str = "floors.json";
const ARCHIVED_FILE: &str = "floors_archived.json";
const LEDGER_FILE: &str = "replied_floors.json";
const LAST_RUN_FILE: &str = "last_run_timestamp.txt";
const VOCAB_FILE: &str = "input/keyword_reply.json";
const STATS_FILE: &str = "stats.json";

/// Flat-file backend for one subforum, rooted at `<data_dir>/<sub>/`.
#[derive(Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    pub fn new(data_dir: impl Into<PathBuf>, sub: &str) -> Self {
        Self {
            root_dir: data_dir.into().join(sub),
        }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    async fn ensure_dir(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if the file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl FloorStorage for LocalStorage {
    async fn load_floors(&self) -> Result<FloorStore> {
        Ok(self.read_json(FLOORS_FILE).await?.unwrap_or_default())
    }

    async fn save_floors(&self, store: &FloorStore) -> Result<()> {
        self.write_json(FLOORS_FILE, store).await
    }

    async fn load_archived(&self) -> Result<FloorStore> {
        Ok(self.read_json(ARCHIVED_FILE).await?.unwrap_or_default())
    }

    async fn save_archived(&self, store: &FloorStore) -> Result<()> {
        self.write_json(ARCHIVED_FILE, store).await
    }

    async fn load_ledger(&self) -> Result<Vec<LedgerEntry>> {
        Ok(self.read_json(LEDGER_FILE).await?.unwrap_or_default())
    }

    async fn save_ledger(&self, ledger: &[LedgerEntry]) -> Result<()> {
        self.write_json(LEDGER_FILE, ledger).await
    }

    async fn load_last_run(&self) -> Result<Option<DateTime<FixedOffset>>> {
        let Some(bytes) = self.read_bytes(LAST_RUN_FILE).await? else {
            return Ok(None);
        };
        let raw = String::from_utf8_lossy(&bytes);
        match DateTime::parse_from_rfc3339(raw.trim()) {
            Ok(at) => Ok(Some(at)),
            Err(err) => {
                log::warn!("ignoring unreadable {}: {}", LAST_RUN_FILE, err);
                Ok(None)
            }
        }
    }

    async fn save_last_run(&self, at: DateTime<FixedOffset>) -> Result<()> {
        let stamp = at.to_rfc3339_opts(SecondsFormat::Secs, false);
        self.write_bytes(LAST_RUN_FILE, stamp.as_bytes()).await
    }

    async fn load_vocab(&self) -> Result<Vocabulary> {
        match self.read_json(VOCAB_FILE).await? {
            Some(vocab) => Ok(vocab),
            None => {
                log::warn!("no {} found", VOCAB_FILE);
                Ok(Vocabulary::default())
            }
        }
    }

    async fn load_stats(&self) -> Result<StatsTable> {
        match self.read_json(STATS_FILE).await? {
            Some(stats) => Ok(stats),
            None => {
                log::warn!("no {} found", STATS_FILE);
                Ok(StatsTable::default())
            }
        }
    }
}
