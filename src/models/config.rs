// src/models/config.rs

//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::reply::ReplyMode;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Forum identity: base URL and the targeted sub-forum
    #[serde(default)]
    pub site: SiteConfig,

    /// HTTP session behavior
    #[serde(default)]
    pub client: ClientConfig,

    /// Crawl depth, cutoff, and concurrency
    #[serde(default)]
    pub crawl: CrawlConfig,

    /// Reply resolution and dispatch behavior
    #[serde(default)]
    pub reply: ReplyConfig,

    /// Root directory for per-sub data files
    #[serde(default = "defaults::data_dir")]
    pub data_dir: String,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.site.base_url().is_err() {
            return Err(AppError::validation("site.base_url is not a valid URL"));
        }
        if self.site.sub.trim().is_empty() {
            return Err(AppError::validation("site.sub is empty"));
        }
        if self.site.sub_id.trim().is_empty() {
            return Err(AppError::validation("site.sub_id is empty"));
        }
        if self.client.user_agents.is_empty() {
            return Err(AppError::validation("client.user_agents is empty"));
        }
        if self.client.timeout_secs == 0 {
            return Err(AppError::validation("client.timeout_secs must be > 0"));
        }
        if self.crawl.listing_pages == 0 {
            return Err(AppError::validation("crawl.listing_pages must be > 0"));
        }
        if self.crawl.max_concurrent == 0 {
            return Err(AppError::validation("crawl.max_concurrent must be > 0"));
        }
        if self.crawl.lookback_minutes <= 0 {
            return Err(AppError::validation("crawl.lookback_minutes must be > 0"));
        }
        if self.reply.max_attempts == 0 {
            return Err(AppError::validation("reply.max_attempts must be > 0"));
        }
        if self.reply.max_concurrent == 0 {
            return Err(AppError::validation("reply.max_concurrent must be > 0"));
        }
        if self.reply.mode == ReplyMode::External
            && self.reply.external_url.as_deref().unwrap_or("").trim().is_empty()
        {
            return Err(AppError::validation(
                "reply.external_url is required in external mode",
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site: SiteConfig::default(),
            client: ClientConfig::default(),
            crawl: CrawlConfig::default(),
            reply: ReplyConfig::default(),
            data_dir: defaults::data_dir(),
        }
    }
}

/// Forum identity settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Base URL of the forum
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Sub-forum slug as used in listing URLs (e.g. "lol")
    #[serde(default = "defaults::sub")]
    pub sub: String,

    /// Numeric forum id the reply endpoint expects (e.g. "3441")
    #[serde(default = "defaults::sub_id")]
    pub sub_id: String,
}

impl SiteConfig {
    /// The base URL parsed once for href resolution.
    pub fn base_url(&self) -> Result<Url> {
        Ok(Url::parse(&self.base_url)?)
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            sub: defaults::sub(),
            sub_id: defaults::sub_id(),
        }
    }
}

/// HTTP session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// User-Agent pool; each request draws one at random
    #[serde(default = "defaults::user_agents")]
    pub user_agents: Vec<String>,

    /// File holding the session cookie line
    #[serde(default = "defaults::cookie_file")]
    pub cookie_file: String,

    /// Request fetched once per session to switch the site to the legacy
    /// page template the selectors expect
    #[serde(default = "defaults::warmup_url")]
    pub warmup_url: Option<String>,

    /// Per-attempt timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Additional attempts after a retryable failure
    #[serde(default = "defaults::retries")]
    pub retries: u32,

    /// Backoff base in milliseconds, doubled per attempt
    #[serde(default = "defaults::backoff_ms")]
    pub backoff_ms: u64,

    /// Status codes that trigger a retry
    #[serde(default = "defaults::status_forcelist")]
    pub status_forcelist: Vec<u16>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agents: defaults::user_agents(),
            cookie_file: defaults::cookie_file(),
            warmup_url: defaults::warmup_url(),
            timeout_secs: defaults::timeout(),
            retries: defaults::retries(),
            backoff_ms: defaults::backoff_ms(),
            status_forcelist: defaults::status_forcelist(),
        }
    }
}

/// Crawl settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Listing pages to scan per run
    #[serde(default = "defaults::listing_pages")]
    pub listing_pages: u32,

    /// Fallback recency window when no last-run timestamp exists
    #[serde(default = "defaults::lookback_minutes")]
    pub lookback_minutes: i64,

    /// Maximum concurrent page fetches
    #[serde(default = "defaults::crawl_concurrent")]
    pub max_concurrent: usize,

    /// Keep every floor regardless of the trigger vocabulary
    #[serde(default)]
    pub match_all: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            listing_pages: defaults::listing_pages(),
            lookback_minutes: defaults::lookback_minutes(),
            max_concurrent: defaults::crawl_concurrent(),
            match_all: false,
        }
    }
}

/// Reply resolution and dispatch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyConfig {
    /// How matched floors are answered
    #[serde(default)]
    pub mode: ReplyMode,

    /// Usernames never to reply to
    #[serde(default = "defaults::do_not_reply")]
    pub do_not_reply: Vec<String>,

    /// Signature block appended to every reply
    #[serde(default = "defaults::signature")]
    pub signature: String,

    /// Content service endpoint for external mode
    #[serde(default)]
    pub external_url: Option<String>,

    /// Total attempts per reply, first try included
    #[serde(default = "defaults::reply_attempts")]
    pub max_attempts: u32,

    /// Delay between reply attempts in seconds
    #[serde(default = "defaults::retry_delay")]
    pub retry_delay_secs: u64,

    /// Maximum concurrent reply dispatches
    #[serde(default = "defaults::reply_concurrent")]
    pub max_concurrent: usize,
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            mode: ReplyMode::default(),
            do_not_reply: defaults::do_not_reply(),
            signature: defaults::signature(),
            external_url: None,
            max_attempts: defaults::reply_attempts(),
            retry_delay_secs: defaults::retry_delay(),
            max_concurrent: defaults::reply_concurrent(),
        }
    }
}

mod defaults {
    pub fn data_dir() -> String {
        "data".into()
    }

    // Site defaults
    pub fn base_url() -> String {
        "https://bbs.hupu.com".into()
    }
    pub fn sub() -> String {
        "lol".into()
    }
    pub fn sub_id() -> String {
        "3441".into()
    }

    // Client defaults
    pub fn user_agents() -> Vec<String> {
        vec![
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .into(),
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 \
             (KHTML, like Gecko) Version/17.1 Safari/605.1.15"
                .into(),
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 \
             Firefox/121.0"
                .into(),
        ]
    }
    pub fn cookie_file() -> String {
        "cookie.txt".into()
    }
    pub fn warmup_url() -> Option<String> {
        Some("https://bbs.hupu.com/api/v1/dest?id=1&type=CATEGORY".into())
    }
    pub fn timeout() -> u64 {
        10
    }
    pub fn retries() -> u32 {
        3
    }
    pub fn backoff_ms() -> u64 {
        300
    }
    pub fn status_forcelist() -> Vec<u16> {
        vec![500, 502, 504]
    }

    // Crawl defaults
    pub fn listing_pages() -> u32 {
        10
    }
    pub fn lookback_minutes() -> i64 {
        45
    }
    pub fn crawl_concurrent() -> usize {
        20
    }

    // Reply defaults
    pub fn do_not_reply() -> Vec<String> {
        vec!["用户0234988604".into()]
    }
    pub fn signature() -> String {
        "本回复由虎扑非官方机器人自动发送。如果你对这个回复有什么问题或建议，请回复或私信。".into()
    }
    pub fn reply_attempts() -> u32 {
        3
    }
    pub fn retry_delay() -> u64 {
        3
    }
    pub fn reply_concurrent() -> usize {
        5
    }
}
