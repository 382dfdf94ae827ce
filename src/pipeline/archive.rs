// src/pipeline/archive.rs

//! Archival sweep: replied floors move out of the active snapshot.

use crate::error::Result;
use crate::storage::FloorStorage;

pub async fn run_archive(storage: &dyn FloorStorage) -> Result<usize> {
    let moved = storage.archive_sweep().await?;
    if moved > 0 {
        log::info!("Archived {} replied floors", moved);
    } else {
        log::info!("Nothing to archive");
    }
    Ok(moved)
}
