//! Utility functions and helpers.

pub mod time;

/// Build the URL of one listing page of a subforum.
///
/// The site paginates listings as `{base}/{slug}-{page}`.
pub fn listing_url(base: &str, slug: &str, page: u32) -> String {
    format!("{}/{}-{}", base.trim_end_matches('/'), slug, page)
}

/// Build the URL of one page of a thread.
///
/// Page 1 is `{base}/{post_id}.html`; later pages insert `-{page}` before
/// the extension.
pub fn thread_page_url(base: &str, post_id: &str, page: u32) -> String {
    let base = base.trim_end_matches('/');
    if page <= 1 {
        format!("{}/{}.html", base, post_id)
    } else {
        format!("{}/{}-{}.html", base, post_id, page)
    }
}

/// Build the form endpoint replies are posted to.
pub fn reply_post_url(base: &str) -> String {
    format!("{}/post.php?action=reply", base.trim_end_matches('/'))
}

/// Build the probe URL whose body reveals a subforum ban.
pub fn ban_check_url(base: &str, sub_id: &str, post_id: &str) -> String {
    format!(
        "{}/post.php?fid={}&tid={}",
        base.trim_end_matches('/'),
        sub_id,
        post_id
    )
}

/// Extract a post id from a listing href of the form `/12345.html`.
pub fn post_id_from_href(href: &str) -> Option<String> {
    let trimmed = href.trim_start_matches('/');
    let id = trimmed.strip_suffix(".html")?;
    if id.is_empty() {
        return None;
    }
    Some(id.to_string())
}
