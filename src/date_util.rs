use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::error::{Error, Result};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Parse an upstream timestamp.
///
/// Accepts RFC 3339 (`2024-01-05T10:00:00.000Z`), a naive date-time which is
/// read as UTC, and a bare `YYYY-MM-DD` date (midnight UTC).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// 23:59:59 on the same calendar day as `now`, in `now`'s timezone.
/// Falls back to `now` when that wall-clock time does not exist.
pub fn end_of_day<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Tz> {
    now.date_naive()
        .and_hms_opt(23, 59, 59)
        .and_then(|naive| now.timezone().from_local_datetime(&naive).earliest())
        .unwrap_or_else(|| now.clone())
}

/// Elapsed time from `start` to `end` in fractional days. Negative when
/// `end` precedes `start`.
pub fn days_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / MILLIS_PER_DAY
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// The Sunday on or before `date`. Weeks run Sunday through Saturday.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_sunday() as i64)
}

/// Parse a date argument: `YYYY-MM-DD`, or `Nd` meaning N days before `today`.
pub fn parse_date_arg(s: &str, today: NaiveDate) -> Result<NaiveDate> {
    let s = s.trim();
    if let Some(days) = s.strip_suffix(['d', 'D']) {
        if let Ok(n) = days.parse::<u32>() {
            return Ok(today - Duration::days(n as i64));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| Error::InvalidDate(format!("expected YYYY-MM-DD or Nd, got '{s}'")))
}
