//! Pipeline entry points for forum bot operations.
//!
//! - `run_crawl`: snapshot qualifying floors from the subforum
//! - `run_reply`: answer matched floors and update the ledger
//! - `run_archive`: move answered floors into the archive document
//! - `run_pipeline`: incremental crawl, reply, and archive in one pass

pub mod archive;
pub mod crawl;
pub mod pipeline;
pub mod reply;

pub use archive::run_archive;
pub use crawl::{run_crawl, CrawlSummary};
pub use pipeline::run_pipeline;
pub use reply::{run_reply, ReplySummary};
