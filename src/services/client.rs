// src/services/client.rs

//! Session-scoped HTTP client with bounded retry.
//!
//! GETs are retried on connect errors, timeouts, and a configured status
//! forcelist, with exponential backoff. Any other completed response is
//! handed back as-is; callers classify bodies themselves. Reply POSTs go
//! out once per call, the dispatcher owns reply-level retry.

use std::fs;
use std::time::Duration;

use rand::seq::SliceRandom;
use reqwest::Client;
use reqwest::StatusCode;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue, USER_AGENT};

use crate::error::Result;
use crate::models::ClientConfig;

const FALLBACK_USER_AGENT: &str = "Mozilla/5.0";

/// A completed reply POST, body already read.
#[derive(Debug)]
pub struct PostResponse {
    pub status: StatusCode,
    pub body: String,
}

impl PostResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// HTTP session shared by the crawler and the reply dispatcher.
pub struct HttpClient {
    client: Client,
    user_agents: Vec<String>,
    cookie: Option<String>,
    retries: u32,
    backoff: Duration,
    status_forcelist: Vec<u16>,
}

impl HttpClient {
    /// Build the session from configuration, loading the cookie file.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let cookie = match fs::read_to_string(&config.cookie_file) {
            Ok(raw) => {
                let trimmed = raw.trim().to_string();
                if trimmed.is_empty() { None } else { Some(trimmed) }
            }
            Err(e) => {
                log::warn!(
                    "Cookie file {} not readable ({}); requests go out without a session",
                    config.cookie_file,
                    e
                );
                None
            }
        };

        Ok(Self {
            client,
            user_agents: config.user_agents.clone(),
            cookie,
            retries: config.retries,
            backoff: Duration::from_millis(config.backoff_ms),
            status_forcelist: config.status_forcelist.clone(),
        })
    }

    /// Fire the session warm-up request and ignore the outcome. The site
    /// serves the legacy page template only after this endpoint was hit.
    pub async fn warm_up(&self, url: &str) {
        match self.client.get(url).headers(self.headers()).send().await {
            Ok(response) => log::debug!("Warm-up {} -> {}", url, response.status()),
            Err(e) => log::debug!("Warm-up {} failed: {}", url, e),
        }
    }

    /// GET a page, retrying transient failures. `None` after exhaustion
    /// means "no data for this unit of work"; it is never fatal to a run.
    pub async fn fetch_text(&self, url: &str) -> Option<String> {
        for attempt in 0..=self.retries {
            if attempt > 0 {
                tokio::time::sleep(self.backoff * 2u32.pow(attempt - 1)).await;
            }

            let response = match self.client.get(url).headers(self.headers()).send().await {
                Ok(response) => response,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    log::debug!("GET {} attempt {} failed: {}", url, attempt + 1, e);
                    continue;
                }
                Err(e) => {
                    log::warn!("GET {} failed: {}", url, e);
                    return None;
                }
            };

            let status = response.status();
            if self.status_forcelist.contains(&status.as_u16()) {
                log::debug!("GET {} attempt {} got {}", url, attempt + 1, status);
                continue;
            }

            match response.text().await {
                Ok(body) => return Some(body),
                Err(e) => {
                    log::debug!("GET {} body read failed: {}", url, e);
                    continue;
                }
            }
        }
        log::warn!("Giving up on {} after {} attempts", url, self.retries + 1);
        None
    }

    /// POST a form once; the body is read regardless of status so the
    /// caller can classify site error markers.
    pub async fn post_form(&self, url: &str, fields: &[(String, String)]) -> Result<PostResponse> {
        let response = self
            .client
            .post(url)
            .headers(self.headers())
            .form(fields)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        Ok(PostResponse { status, body })
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let agent = self
            .user_agents
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
            .unwrap_or(FALLBACK_USER_AGENT);
        if let Ok(value) = HeaderValue::from_str(agent) {
            headers.insert(USER_AGENT, value);
        }
        if let Some(cookie) = &self.cookie {
            if let Ok(value) = HeaderValue::from_str(cookie) {
                headers.insert(COOKIE, value);
            }
        }
        headers
    }
}
