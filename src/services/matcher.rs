// src/services/matcher.rs

//! Turns stored floors into reply intents.
//!
//! Matching here is case-sensitive, unlike the crawl-time filter: the
//! crawler casts a wide net, while an actual reply only goes out on an
//! exact-case hit. At most one intent is produced per floor, from the
//! first term that matches.

use std::collections::HashSet;
use std::sync::Arc;

use rand::seq::SliceRandom;

use crate::models::{
    FloorStore, LedgerEntry, ReplyConfig, ReplyIntent, ReplyMode, StatsTable, Vocabulary,
};
use crate::services::client::HttpClient;

const KEYWORD_MISS: &str = "keyword not found";
const COMPARISON_MISS: &str = "comparison not found";
const EXTERNAL_MISS: &str = "sorry, the content service let me down";

pub struct ReplyMatcher {
    client: Arc<HttpClient>,
    vocab: Vocabulary,
    stats: StatsTable,
    mode: ReplyMode,
    signature: String,
    external_url: Option<String>,
    do_not_reply: HashSet<String>,
}

impl ReplyMatcher {
    pub fn new(
        client: Arc<HttpClient>,
        reply: &ReplyConfig,
        vocab: Vocabulary,
        stats: StatsTable,
    ) -> Self {
        Self {
            client,
            vocab,
            stats,
            mode: reply.mode,
            signature: reply.signature.clone(),
            external_url: reply.external_url.clone(),
            do_not_reply: reply.do_not_reply.iter().cloned().collect(),
        }
    }

    /// Walk the store in ascending order and build one intent per floor
    /// that matches a term and is not excluded. Excluded floors are
    /// skipped; they never block the rest of their post.
    pub async fn build_intents(
        &self,
        store: &FloorStore,
        ledger: &[LedgerEntry],
    ) -> Vec<ReplyIntent> {
        let answered: HashSet<(&str, &str)> = ledger
            .iter()
            .map(|entry| (entry.post_id.as_str(), entry.floor_id.as_str()))
            .collect();
        let terms = self.vocab.terms();

        let mut intents = Vec::new();
        for (post_id, entry) in store {
            for floor in entry.floors.values() {
                if floor.replied || self.do_not_reply.contains(&floor.username) {
                    continue;
                }
                if answered.contains(&(post_id.as_str(), floor.floor_id.as_str())) {
                    continue;
                }
                let Some(term) = terms.iter().find(|t| floor.content.contains(t.as_str()))
                else {
                    continue;
                };
                let content = self.resolve_content(term, &floor.content).await;
                intents.push(ReplyIntent {
                    post_id: post_id.clone(),
                    sub_id: entry.meta.sub_id.clone(),
                    quote_floor_id: floor.floor_id.clone(),
                    content: format!("{}\n\n{}", content, self.signature),
                });
            }
        }
        intents
    }

    async fn resolve_content(&self, term: &str, floor_content: &str) -> String {
        match self.mode {
            ReplyMode::Keyword => self.keyword_content(term),
            ReplyMode::Comparison => self.comparison_content(term, floor_content),
            ReplyMode::External => self.external_content().await,
        }
    }

    fn keyword_content(&self, term: &str) -> String {
        self.vocab
            .resolve(term)
            .and_then(|candidates| candidates.choose(&mut rand::thread_rng()))
            .cloned()
            .unwrap_or_else(|| KEYWORD_MISS.to_string())
    }

    fn comparison_content(&self, term: &str, floor_content: &str) -> String {
        let Some((a, b)) = comparison_subjects(term, floor_content) else {
            return COMPARISON_MISS.to_string();
        };
        self.stats
            .compare(&a, &b)
            .unwrap_or_else(|| COMPARISON_MISS.to_string())
    }

    async fn external_content(&self) -> String {
        let Some(url) = self.external_url.as_deref() else {
            return EXTERNAL_MISS.to_string();
        };
        match self.client.fetch_text(url).await {
            Some(body) if !body.trim().is_empty() => body.trim().to_string(),
            _ => EXTERNAL_MISS.to_string(),
        }
    }
}

/// Pull the two compared subjects out of a floor: drop the `#term#` tag,
/// split once on `vs`, then take the nearest word on each side.
fn comparison_subjects(term: &str, content: &str) -> Option<(String, String)> {
    let stripped = content.replace(&format!("#{term}#"), "");
    let (left, right) = stripped.trim().split_once("vs")?;
    let a = left.split_whitespace().last()?.to_string();
    let b = right.split_whitespace().next()?.to_string();
    Some((a, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClientConfig, Floor, Post, PostEntry};
    use crate::utils::time::forum_tz;
    use chrono::TimeZone;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn dummy_client() -> Arc<HttpClient> {
        let config = ClientConfig {
            cookie_file: "missing-cookie.txt".to_string(),
            retries: 0,
            backoff_ms: 1,
            ..ClientConfig::default()
        };
        Arc::new(HttpClient::new(&config).unwrap())
    }

    fn floor(number: u32, username: &str, content: &str) -> Floor {
        Floor {
            floor_number: number,
            floor_id: if number == 0 {
                "tpc".to_string()
            } else {
                format!("pid{number}")
            },
            url: format!("https://bbs.hupu.com/100.html#pid{number}"),
            username: username.to_string(),
            content: content.to_string(),
            time: forum_tz().with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap(),
            replied: false,
        }
    }

    fn store_of(floors: Vec<Floor>) -> FloorStore {
        let meta = Post {
            post_id: "100".to_string(),
            sub: "lol".to_string(),
            sub_id: "3441".to_string(),
            url: "https://bbs.hupu.com/100.html".to_string(),
            title: "a thread".to_string(),
            page_count: 1,
            last_reply_time: forum_tz().with_ymd_and_hms(2024, 3, 10, 9, 30, 0).unwrap(),
        };
        let mut entry = PostEntry::new(meta);
        for f in floors {
            entry.floors.insert(f.floor_number, f);
        }
        let mut store = FloorStore::new();
        store.insert("100".to_string(), entry);
        store
    }

    fn keyword_matcher(vocab_json: &str) -> ReplyMatcher {
        let reply = ReplyConfig {
            signature: "-- bot".to_string(),
            ..ReplyConfig::default()
        };
        ReplyMatcher::new(
            dummy_client(),
            &reply,
            serde_json::from_str(vocab_json).unwrap(),
            StatsTable::default(),
        )
    }

    #[tokio::test]
    async fn ledgered_floors_produce_no_second_intent() {
        let matcher = keyword_matcher(r#"{"ahri": ["pick ahri"]}"#);
        let store = store_of(vec![floor(1, "alice", "ahri is fun"), floor(2, "bob", "ban ahri")]);

        let first = matcher.build_intents(&store, &[]).await;
        assert_eq!(first.len(), 2);

        let ledger: Vec<LedgerEntry> = first
            .iter()
            .map(|intent| LedgerEntry::new(intent.post_id.clone(), intent.quote_floor_id.clone()))
            .collect();
        let second = matcher.build_intents(&store, &ledger).await;
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn excluded_floors_are_skipped_not_fatal_to_the_post() {
        let reply = ReplyConfig {
            do_not_reply: vec!["blocked_user".to_string()],
            signature: "-- bot".to_string(),
            ..ReplyConfig::default()
        };
        let matcher = ReplyMatcher::new(
            dummy_client(),
            &reply,
            serde_json::from_str(r#"{"ahri": ["pick ahri"]}"#).unwrap(),
            StatsTable::default(),
        );
        let mut already_replied = floor(1, "alice", "ahri top");
        already_replied.replied = true;
        let store = store_of(vec![
            already_replied,
            floor(2, "blocked_user", "ahri mid"),
            floor(3, "carol", "ahri support"),
        ]);

        let intents = matcher.build_intents(&store, &[]).await;
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].quote_floor_id, "pid3");
    }

    #[tokio::test]
    async fn reply_matching_is_case_sensitive() {
        let matcher = keyword_matcher(r#"{"ahri": ["pick ahri"]}"#);
        let store = store_of(vec![floor(1, "alice", "AHRI in caps"), floor(2, "bob", "ahri exact")]);

        let intents = matcher.build_intents(&store, &[]).await;
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].quote_floor_id, "pid2");
    }

    #[tokio::test]
    async fn alias_terms_resolve_to_canonical_replies() {
        let matcher = keyword_matcher(r#"{"ahri": ["pick ahri"], "阿狸": "%ahri%"}"#);
        let store = store_of(vec![floor(1, "alice", "阿狸中单怎么样")]);

        let intents = matcher.build_intents(&store, &[]).await;
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].content, "pick ahri\n\n-- bot");
    }

    #[tokio::test]
    async fn unknown_keyword_falls_back_to_literal() {
        let matcher = keyword_matcher(r#"{"ahri": "%gone%"}"#);
        let store = store_of(vec![floor(1, "alice", "ahri?")]);

        let intents = matcher.build_intents(&store, &[]).await;
        assert_eq!(intents[0].content, "keyword not found\n\n-- bot");
    }

    #[tokio::test]
    async fn opening_post_keeps_its_anchor_token() {
        let matcher = keyword_matcher(r#"{"ahri": ["pick ahri"]}"#);
        let store = store_of(vec![floor(0, "op", "ahri thread")]);

        let intents = matcher.build_intents(&store, &[]).await;
        assert_eq!(intents[0].quote_floor_id, "tpc");
    }

    #[tokio::test]
    async fn comparison_mode_formats_paired_stats() {
        let reply = ReplyConfig {
            mode: ReplyMode::Comparison,
            signature: "-- bot".to_string(),
            ..ReplyConfig::default()
        };
        let stats: StatsTable = serde_json::from_str(
            r#"{"win rate": {"阿狸": "52%", "劫": "49%"}}"#,
        )
        .unwrap();
        let matcher = ReplyMatcher::new(
            dummy_client(),
            &reply,
            serde_json::from_str(r#"{"对比": []}"#).unwrap(),
            stats,
        );
        let store = store_of(vec![
            floor(1, "alice", "#对比# 阿狸 vs 劫 谁强"),
            floor(2, "bob", "对比一下没有分隔符"),
        ]);

        let intents = matcher.build_intents(&store, &[]).await;
        assert_eq!(intents.len(), 2);
        assert_eq!(
            intents[0].content,
            "win rate:\n\t阿狸: 52%\n\t劫: 49%\n\n\n-- bot"
        );
        assert_eq!(intents[1].content, "comparison not found\n\n-- bot");
    }

    #[tokio::test]
    async fn external_mode_fetches_content_and_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/quote"))
            .respond_with(ResponseTemplate::new(200).set_body_string("wisdom of the day"))
            .mount(&server)
            .await;

        let reply = ReplyConfig {
            mode: ReplyMode::External,
            external_url: Some(format!("{}/quote", server.uri())),
            signature: "-- bot".to_string(),
            ..ReplyConfig::default()
        };
        let matcher = ReplyMatcher::new(
            dummy_client(),
            &reply,
            serde_json::from_str(r#"{"ahri": []}"#).unwrap(),
            StatsTable::default(),
        );
        let store = store_of(vec![floor(1, "alice", "ahri!")]);

        let intents = matcher.build_intents(&store, &[]).await;
        assert_eq!(intents[0].content, "wisdom of the day\n\n-- bot");

        let broken = ReplyConfig {
            mode: ReplyMode::External,
            external_url: Some(format!("{}/missing-quote", server.uri())),
            signature: "-- bot".to_string(),
            ..ReplyConfig::default()
        };
        let matcher = ReplyMatcher::new(
            dummy_client(),
            &broken,
            serde_json::from_str(r#"{"ahri": []}"#).unwrap(),
            StatsTable::default(),
        );
        let intents = matcher.build_intents(&store, &[]).await;
        assert_eq!(
            intents[0].content,
            format!("{EXTERNAL_MISS}\n\n-- bot")
        );
    }

    #[test]
    fn comparison_subjects_take_nearest_words() {
        let (a, b) = comparison_subjects("对比", "#对比# 大家觉得 阿狸 vs 劫 谁更强").unwrap();
        assert_eq!(a, "阿狸");
        assert_eq!(b, "劫");
        assert!(comparison_subjects("对比", "没有分隔符").is_none());
        assert!(comparison_subjects("对比", "#对比# vs 劫").is_none());
    }
}
