// src/pipeline/reply.rs

//! Reply pipeline: match stored floors, dispatch, record what was sent.

use std::sync::Arc;

use crate::error::Result;
use crate::models::{merge_ledger, Config};
use crate::services::{HttpClient, ReplyDispatcher, ReplyMatcher, ReplyStatus};
use crate::storage::FloorStorage;

#[derive(Debug)]
pub struct ReplySummary {
    pub intents: usize,
    pub sent: usize,
}

/// Answer every matched, not-yet-answered floor in the stored snapshot.
///
/// Accepted replies land in the ledger and flip their floors' `replied`
/// flag; everything else is logged and left for a later run.
pub async fn run_reply(config: &Config, storage: &dyn FloorStorage) -> Result<ReplySummary> {
    let store = storage.load_floors().await?;
    let mut ledger = storage.load_ledger().await?;
    let vocab = storage.load_vocab().await?;
    let stats = storage.load_stats().await?;

    if vocab.is_empty() {
        log::warn!("Vocabulary is empty, nothing can match");
    }

    let client = Arc::new(HttpClient::new(&config.client)?);
    if let Some(url) = &config.client.warmup_url {
        client.warm_up(url).await;
    }

    let matcher = ReplyMatcher::new(client.clone(), &config.reply, vocab, stats);
    let intents = matcher.build_intents(&store, &ledger).await;
    if intents.is_empty() {
        log::info!("No floors to answer");
        return Ok(ReplySummary { intents: 0, sent: 0 });
    }

    log::info!("Dispatching {} replies", intents.len());
    let dispatcher = ReplyDispatcher::new(client, &config.site, &config.reply);
    let report = dispatcher.dispatch(intents).await;

    let summary = ReplySummary {
        intents: report.outcomes.len(),
        sent: report.sent.len(),
    };
    log::info!(
        "Replies: {} sent, {} abandoned, {} deleted posts, {} ban hits, {} skipped",
        summary.sent,
        report.count(ReplyStatus::Abandoned),
        report.count(ReplyStatus::PostDeleted),
        report.count(ReplyStatus::AccountBanned),
        report.count(ReplyStatus::SkippedDeletedPost)
            + report.count(ReplyStatus::SkippedBannedSub),
    );

    if !report.sent.is_empty() {
        merge_ledger(&mut ledger, report.sent.clone());
        storage.save_ledger(&ledger).await?;
        storage.mark_replied(&report.sent).await?;
    }

    Ok(summary)
}
