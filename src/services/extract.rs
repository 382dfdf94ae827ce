// src/services/extract.rs

//! Page extraction for the bbs.hupu.com legacy template.
//!
//! The crawler only sees the `PageExtractor` trait; everything tied to the
//! concrete page layout (selectors, content cleanup, the `tpc` anchor for
//! opening posts) stays in `HupuExtractor`. Both operations are total:
//! malformed rows and floors are skipped individually, never escalated.

use chrono::{DateTime, FixedOffset};
use regex::Regex;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Floor, Post, SiteConfig};
use crate::utils::time::{parse_floor_time, parse_listing_time};
use crate::utils::{post_id_from_href, thread_page_url};

/// Substrings scrubbed from floor content before it is stored: app
/// footprints, edit banners, the broken-video banner, and stray control
/// characters. Joined into one alternation and replaced with nothing.
const CONTENT_FILTERS: &[&str] = &[
    "发自虎扑.+客户端",
    r"发自手机虎扑 m\.hupu\.com",
    "\n",
    "\r",
    r"\\",
    "\u{200b}",
    "\u{a0}",
    "视频无法播放，浏览器版本过低，请升级浏览器或者使用其他浏览器",
    r"\[ 此帖被.+修改 \]",
];

/// Floors found on one thread page, in document order.
///
/// `has_content` reports whether the page contained any floor elements at
/// all; an empty page means pagination is exhausted.
#[derive(Debug, Default)]
pub struct FloorPage {
    pub floors: Vec<Floor>,
    pub has_content: bool,
}

/// Turns raw HTML into domain records. Implementations never fail.
pub trait PageExtractor: Send + Sync {
    /// Parse a listing page into posts. Malformed rows are dropped.
    fn extract_posts(&self, html: &str, now: DateTime<FixedOffset>) -> Vec<Post>;

    /// Parse one thread page into floors. `page_url` seeds the per-floor
    /// anchor links.
    fn extract_floors(&self, html: &str, page_url: &str) -> FloorPage;
}

/// Extractor for the site's legacy page template.
pub struct HupuExtractor {
    base_url: Url,
    sub: String,
    sub_id: String,
    listing_row: Selector,
    title_anchor: Selector,
    multipage: Selector,
    page_anchor: Selector,
    last_reply: Selector,
    floor_block: Selector,
    floor_anchor: Selector,
    content_cell: Selector,
    op_region: Selector,
    time_cell: Selector,
    user_anchor: Selector,
    filters: Regex,
}

impl HupuExtractor {
    pub fn new(site: &SiteConfig) -> Result<Self> {
        Ok(Self {
            base_url: site.base_url()?,
            sub: site.sub.clone(),
            sub_id: site.sub_id.clone(),
            listing_row: parse_selector("ul.for-list li")?,
            title_anchor: parse_selector("a.truetit")?,
            multipage: parse_selector("span.multipage")?,
            page_anchor: parse_selector("a")?,
            last_reply: parse_selector(".endreply a")?,
            floor_block: parse_selector("div.floor-show")?,
            floor_anchor: parse_selector(".floornum")?,
            content_cell: parse_selector("td")?,
            op_region: parse_selector(".quote-content")?,
            time_cell: parse_selector(".stime")?,
            user_anchor: parse_selector(".j_u")?,
            filters: Regex::new(&format!("({})", CONTENT_FILTERS.join("|")))?,
        })
    }

    fn parse_listing_row(
        &self,
        row: &ElementRef<'_>,
        now: DateTime<FixedOffset>,
    ) -> Option<Post> {
        let raw_time: String = row.select(&self.last_reply).next()?.text().collect();
        let last_reply_time = parse_listing_time(&raw_time, now)?;

        let anchor = row.select(&self.title_anchor).next()?;
        let post_id = post_id_from_href(anchor.value().attr("href")?)?;
        let title = anchor
            .text()
            .collect::<String>()
            .replace('\n', "")
            .trim()
            .to_string();

        // The multipage indicator is the page-count source of record;
        // threads without one fit on a single page.
        let page_count = row
            .select(&self.multipage)
            .next()
            .and_then(|pages| pages.select(&self.page_anchor).last())
            .and_then(|a| a.text().collect::<String>().trim().parse().ok())
            .unwrap_or(1);

        Some(Post {
            url: thread_page_url(self.base_url.as_str(), &post_id, 1),
            post_id,
            sub: self.sub.clone(),
            sub_id: self.sub_id.clone(),
            title,
            page_count,
            last_reply_time,
        })
    }

    fn parse_floor(&self, block: &ElementRef<'_>, page_url: &str) -> Option<Floor> {
        let anchor = block.select(&self.floor_anchor).next()?;
        let floor_number: u32 = anchor.value().attr("id")?.trim().parse().ok()?;
        let floor_id = anchor.value().attr("href")?.split('#').nth(1)?.to_string();

        let content_cell = block.select(&self.content_cell).next()?;
        let region = if floor_number == 0 {
            // The opening post wraps its own text in a quote container.
            content_cell.select(&self.op_region).next()?
        } else {
            content_cell
        };
        let mut raw = String::new();
        text_without_blockquotes(region, &mut raw);
        let content = self.filters.replace_all(&raw, "").into_owned();

        let raw_time: String = block.select(&self.time_cell).next()?.text().collect();
        let time = parse_floor_time(&raw_time)?;
        let username = block
            .select(&self.user_anchor)
            .next()?
            .value()
            .attr("uname")?
            .to_string();

        Some(Floor {
            floor_number,
            url: format!("{page_url}#{floor_id}"),
            floor_id,
            username,
            content,
            time,
            replied: false,
        })
    }
}

impl PageExtractor for HupuExtractor {
    fn extract_posts(&self, html: &str, now: DateTime<FixedOffset>) -> Vec<Post> {
        let document = Html::parse_document(&html.replace("&nbsp;", " "));
        let mut posts = Vec::new();
        for row in document.select(&self.listing_row) {
            if let Some(post) = self.parse_listing_row(&row, now) {
                posts.push(post);
            }
        }
        posts
    }

    fn extract_floors(&self, html: &str, page_url: &str) -> FloorPage {
        let document = Html::parse_document(&html.replace("&nbsp;", " "));
        let blocks: Vec<_> = document.select(&self.floor_block).collect();
        let has_content = !blocks.is_empty();
        let mut floors = Vec::new();
        for block in blocks {
            if let Some(floor) = self.parse_floor(&block, page_url) {
                floors.push(floor);
            }
        }
        FloorPage {
            floors,
            has_content,
        }
    }
}

/// Collect an element's text, leaving out any `blockquote` subtree so a
/// floor's content never includes the floor it quotes.
fn text_without_blockquotes(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if el.name() == "blockquote" => {}
            Node::Element(_) => {
                if let Some(child_ref) = ElementRef::wrap(child) {
                    text_without_blockquotes(child_ref, out);
                }
            }
            _ => {}
        }
    }
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}
