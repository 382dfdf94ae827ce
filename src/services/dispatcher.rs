// src/services/dispatcher.rs

//! Sends queued replies to the forum and classifies what came back.
//!
//! The legacy form endpoint reports most failures in prose rather than
//! status codes, so the response body is probed for known markers. Two
//! of them are terminal for the whole run: a deleted thread invalidates
//! every intent against that post, and a subforum ban invalidates every
//! intent against that sub. Both are recorded in shared state so later
//! intents skip without touching the network.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::{stream, StreamExt};
use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::models::{LedgerEntry, ReplyConfig, ReplyIntent, SiteConfig, OP_FLOOR_ID};
use crate::services::client::HttpClient;
use crate::utils::{ban_check_url, reply_post_url};

const DELETED_MARKER: &str = "页面不存在";
const ERROR_MARKER: &str = "出错";
const BANNED_MARKER: &str = "您在该板块封禁中";

/// Terminal state of one dispatched intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    Sent,
    /// Every attempt came back retryable.
    Abandoned,
    /// The thread no longer exists.
    PostDeleted,
    /// The account is banned in the subforum.
    AccountBanned,
    /// Not tried: the thread was already seen to be deleted.
    SkippedDeletedPost,
    /// Not tried: the subforum ban was already seen.
    SkippedBannedSub,
}

#[derive(Debug)]
pub struct DispatchOutcome {
    pub intent: ReplyIntent,
    pub status: ReplyStatus,
}

/// What happened to a whole batch. `sent` holds the ledger entries for
/// accepted replies, ready to merge into the persistent ledger.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub outcomes: Vec<DispatchOutcome>,
    pub sent: Vec<LedgerEntry>,
}

impl DispatchReport {
    pub fn count(&self, status: ReplyStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }
}

#[derive(Default)]
struct ShortCircuit {
    deleted_posts: HashSet<String>,
    banned_subs: HashSet<String>,
}

enum Attempt {
    Accepted,
    Deleted,
    Banned,
    Transient,
}

pub struct ReplyDispatcher {
    client: Arc<HttpClient>,
    post_url: String,
    base_url: String,
    max_attempts: u32,
    retry_delay: Duration,
    concurrency: usize,
    state: Mutex<ShortCircuit>,
}

impl ReplyDispatcher {
    pub fn new(client: Arc<HttpClient>, site: &SiteConfig, reply: &ReplyConfig) -> Self {
        Self {
            client,
            post_url: reply_post_url(&site.base_url),
            base_url: site.base_url.clone(),
            max_attempts: reply.max_attempts.max(1),
            retry_delay: Duration::from_secs(reply.retry_delay_secs),
            concurrency: reply.max_concurrent.max(1),
            state: Mutex::new(ShortCircuit::default()),
        }
    }

    /// Send a batch of intents with bounded fan-out. Every intent ends up
    /// in the report exactly once, whatever happened to it.
    pub async fn dispatch(&self, intents: Vec<ReplyIntent>) -> DispatchReport {
        let mut in_flight = stream::iter(intents)
            .map(|intent| async move {
                let status = self.send_with_retry(&intent).await;
                DispatchOutcome { intent, status }
            })
            .buffer_unordered(self.concurrency);

        let mut report = DispatchReport::default();
        while let Some(outcome) = in_flight.next().await {
            match outcome.status {
                ReplyStatus::Sent => {
                    log::info!(
                        "replied to {}#{}",
                        outcome.intent.post_id,
                        outcome.intent.quote_floor_id
                    );
                    report.sent.push(LedgerEntry::new(
                        outcome.intent.post_id.clone(),
                        outcome.intent.quote_floor_id.clone(),
                    ));
                }
                ReplyStatus::Abandoned => log::warn!(
                    "gave up on {}#{} after {} attempts",
                    outcome.intent.post_id,
                    outcome.intent.quote_floor_id,
                    self.max_attempts
                ),
                ReplyStatus::PostDeleted => {
                    log::warn!("post {} is gone, dropping its replies", outcome.intent.post_id)
                }
                ReplyStatus::AccountBanned => {
                    log::warn!("banned in sub {}, dropping its replies", outcome.intent.sub_id)
                }
                ReplyStatus::SkippedDeletedPost | ReplyStatus::SkippedBannedSub => log::debug!(
                    "skipping {}#{}",
                    outcome.intent.post_id,
                    outcome.intent.quote_floor_id
                ),
            }
            report.outcomes.push(outcome);
        }
        report
    }

    async fn send_with_retry(&self, intent: &ReplyIntent) -> ReplyStatus {
        for attempt in 1..=self.max_attempts {
            if let Some(skip) = self.short_circuit(intent).await {
                return skip;
            }
            match self.try_send(intent).await {
                Attempt::Accepted => return ReplyStatus::Sent,
                Attempt::Deleted => {
                    self.record_deleted(&intent.post_id).await;
                    return ReplyStatus::PostDeleted;
                }
                Attempt::Banned => {
                    self.record_banned(&intent.sub_id).await;
                    return ReplyStatus::AccountBanned;
                }
                Attempt::Transient => {
                    if attempt < self.max_attempts {
                        sleep(self.retry_delay).await;
                    }
                }
            }
        }
        ReplyStatus::Abandoned
    }

    async fn try_send(&self, intent: &ReplyIntent) -> Attempt {
        let payload = build_payload(intent);
        let response = match self.client.post_form(&self.post_url, &payload).await {
            Ok(response) => response,
            Err(err) => {
                log::debug!("reply post to {} failed: {}", intent.post_id, err);
                return Attempt::Transient;
            }
        };
        if response.body.contains(DELETED_MARKER) {
            return Attempt::Deleted;
        }
        if response.body.contains(ERROR_MARKER) {
            return if self.is_banned(intent).await {
                Attempt::Banned
            } else {
                Attempt::Transient
            };
        }
        if !response.is_success() {
            return Attempt::Transient;
        }
        Attempt::Accepted
    }

    /// A generic error page can mean anything; hitting the reply form
    /// for the same thread tells a ban apart from a hiccup.
    async fn is_banned(&self, intent: &ReplyIntent) -> bool {
        let url = ban_check_url(&self.base_url, &intent.sub_id, &intent.post_id);
        match self.client.fetch_text(&url).await {
            Some(body) => body.contains(BANNED_MARKER),
            None => false,
        }
    }

    async fn short_circuit(&self, intent: &ReplyIntent) -> Option<ReplyStatus> {
        let state = self.state.lock().await;
        if state.deleted_posts.contains(&intent.post_id) {
            return Some(ReplyStatus::SkippedDeletedPost);
        }
        if state.banned_subs.contains(&intent.sub_id) {
            return Some(ReplyStatus::SkippedBannedSub);
        }
        None
    }

    async fn record_deleted(&self, post_id: &str) {
        self.state.lock().await.deleted_posts.insert(post_id.to_string());
    }

    async fn record_banned(&self, sub_id: &str) {
        self.state.lock().await.banned_subs.insert(sub_id.to_string());
    }
}

/// The legacy endpoint form fields. The content is percent-encoded with
/// line breaks as `<br/>`; `quotepid` is left out when answering the
/// opening post itself.
fn build_payload(intent: &ReplyIntent) -> Vec<(String, String)> {
    let encoded = urlencoding::encode(&intent.content.replace('\n', "<br/>")).into_owned();
    let mut fields = vec![
        ("atc_content".to_string(), encoded),
        ("step".to_string(), "2".to_string()),
        ("action".to_string(), "reply".to_string()),
        ("fid".to_string(), intent.sub_id.clone()),
        ("tid".to_string(), intent.post_id.clone()),
        ("atc_html".to_string(), "1".to_string()),
    ];
    if intent.quote_floor_id != OP_FLOOR_ID {
        fields.push(("quotepid".to_string(), intent.quote_floor_id.clone()));
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClientConfig;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn intent(post_id: &str, floor_id: &str) -> ReplyIntent {
        ReplyIntent {
            post_id: post_id.to_string(),
            sub_id: "3441".to_string(),
            quote_floor_id: floor_id.to_string(),
            content: "some answer\n\n-- bot".to_string(),
        }
    }

    fn dispatcher_for(server: &MockServer, max_attempts: u32) -> ReplyDispatcher {
        let client = ClientConfig {
            cookie_file: "missing-cookie.txt".to_string(),
            retries: 0,
            backoff_ms: 1,
            ..ClientConfig::default()
        };
        let site = SiteConfig {
            base_url: server.uri(),
            sub: "lol".to_string(),
            sub_id: "3441".to_string(),
        };
        let reply = ReplyConfig {
            max_attempts,
            retry_delay_secs: 0,
            max_concurrent: 1,
            ..ReplyConfig::default()
        };
        ReplyDispatcher::new(Arc::new(HttpClient::new(&client).unwrap()), &site, &reply)
    }

    #[tokio::test]
    async fn accepted_reply_lands_in_the_sent_list() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/post.php"))
            .and(query_param("action", "reply"))
            .and(body_string_contains("tid=100"))
            .and(body_string_contains("quotepid=pid7"))
            .respond_with(ResponseTemplate::new(200).set_body_string("回复成功"))
            .expect(1)
            .mount(&server)
            .await;

        let dispatcher = dispatcher_for(&server, 3);
        let report = dispatcher.dispatch(vec![intent("100", "pid7")]).await;

        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].status, ReplyStatus::Sent);
        assert_eq!(report.sent, vec![LedgerEntry::new("100", "pid7")]);
    }

    #[tokio::test]
    async fn deleted_post_short_circuits_its_other_intents() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/post.php"))
            .respond_with(ResponseTemplate::new(200).set_body_string("页面不存在"))
            .expect(1)
            .mount(&server)
            .await;

        let dispatcher = dispatcher_for(&server, 3);
        let report = dispatcher
            .dispatch(vec![intent("100", "pid7"), intent("100", "pid8")])
            .await;

        assert_eq!(report.count(ReplyStatus::PostDeleted), 1);
        assert_eq!(report.count(ReplyStatus::SkippedDeletedPost), 1);
        assert!(report.sent.is_empty());
    }

    #[tokio::test]
    async fn ban_short_circuits_the_whole_sub() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/post.php"))
            .respond_with(ResponseTemplate::new(200).set_body_string("系统出错了"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/post.php"))
            .and(query_param("fid", "3441"))
            .and(query_param("tid", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_string("您在该板块封禁中"))
            .expect(1)
            .mount(&server)
            .await;

        let dispatcher = dispatcher_for(&server, 3);
        let report = dispatcher
            .dispatch(vec![intent("100", "pid7"), intent("200", "pid9")])
            .await;

        assert_eq!(report.count(ReplyStatus::AccountBanned), 1);
        assert_eq!(report.count(ReplyStatus::SkippedBannedSub), 1);
        assert!(report.sent.is_empty());
    }

    #[tokio::test]
    async fn error_page_without_a_ban_is_retried_then_abandoned() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/post.php"))
            .respond_with(ResponseTemplate::new(200).set_body_string("系统出错了"))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/post.php"))
            .respond_with(ResponseTemplate::new(200).set_body_string("一切正常"))
            .expect(2)
            .mount(&server)
            .await;

        let dispatcher = dispatcher_for(&server, 2);
        let report = dispatcher.dispatch(vec![intent("100", "pid7")]).await;

        assert_eq!(report.outcomes[0].status, ReplyStatus::Abandoned);
    }

    #[tokio::test]
    async fn server_errors_exhaust_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/post.php"))
            .respond_with(ResponseTemplate::new(500).set_body_string("nope"))
            .expect(3)
            .mount(&server)
            .await;

        let dispatcher = dispatcher_for(&server, 3);
        let report = dispatcher.dispatch(vec![intent("100", "pid7")]).await;

        assert_eq!(report.count(ReplyStatus::Abandoned), 1);
    }

    #[test]
    fn payload_skips_quote_for_the_opening_post() {
        let quoted = build_payload(&intent("100", "pid7"));
        assert!(quoted.contains(&("quotepid".to_string(), "pid7".to_string())));

        let op = build_payload(&intent("100", OP_FLOOR_ID));
        assert!(op.iter().all(|(key, _)| key != "quotepid"));
        let content = &op.iter().find(|(key, _)| key == "atc_content").unwrap().1;
        assert_eq!(content, "some%20answer%3Cbr%2F%3E%3Cbr%2F%3E--%20bot");
    }
}
