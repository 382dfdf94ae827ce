// src/utils/time.rs

//! Forum time handling.
//!
//! The site reports every time in China Standard Time (UTC+8) and listing
//! pages expose only a date (`2024-01-05`, `01-05`) or a clock time
//! (`14:30`), never a full timestamp. Both forms are widened to the latest
//! plausible instant inside their bucket so that recency filtering never
//! under-counts a post.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDateTime, TimeZone, Timelike, Utc};

/// Nanosecond payload for the `.999999` microsecond bucket boundary.
const LAST_MICROSECOND: u32 = 999_999_000;

/// The fixed timezone all forum times are normalized to (UTC+8).
pub fn forum_tz() -> FixedOffset {
    FixedOffset::east_opt(8 * 3600).expect("UTC+8 is a valid offset")
}

/// Current time in the forum timezone.
pub fn forum_now() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&forum_tz())
}

/// Parse a last-reply cell from a listing page.
///
/// - `YYYY-MM-DD` (or `MM-DD`, implying the current year) maps to
///   23:59:59.999999 on that day.
/// - `HH:MM` (implying today) maps to the same minute with seconds forced
///   to 59.999999.
///
/// Returns `None` for anything else; callers skip the row.
pub fn parse_listing_time(
    raw: &str,
    now: DateTime<FixedOffset>,
) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.contains('-') {
        let parts: Vec<u32> = raw
            .split('-')
            .map(|p| p.parse().ok())
            .collect::<Option<_>>()?;
        let (year, month, day) = match parts.as_slice() {
            [y, m, d] => (*y as i32, *m, *d),
            [m, d] => (now.year(), *m, *d),
            _ => return None,
        };
        end_of_day(year, month, day)
    } else if raw.contains(':') {
        let (h, m) = raw.split_once(':')?;
        let hour: u32 = h.trim().parse().ok()?;
        let minute: u32 = m.trim().parse().ok()?;
        now.with_hour(hour)?
            .with_minute(minute)?
            .with_second(59)?
            .with_nanosecond(LAST_MICROSECOND)
    } else {
        None
    }
}

/// Parse a floor timestamp (`%Y-%m-%d %H:%M`) in the forum timezone.
pub fn parse_floor_time(raw: &str) -> Option<DateTime<FixedOffset>> {
    let naive = NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%d %H:%M").ok()?;
    naive.and_local_timezone(forum_tz()).single()
}

fn end_of_day(year: i32, month: u32, day: u32) -> Option<DateTime<FixedOffset>> {
    forum_tz()
        .with_ymd_and_hms(year, month, day, 23, 59, 59)
        .single()?
        .with_nanosecond(LAST_MICROSECOND)
}
