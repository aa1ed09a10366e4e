//! IANA time zone lookup and display

use crate::normalize::ValidationError;
use chrono::{DateTime, Offset, TimeZone, Utc};
use chrono_tz::{Tz, TZ_VARIANTS};
use serde::{Deserialize, Serialize};

/// A zone as shown in the picker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimezoneDetail {
    /// IANA id, e.g. `Asia/Ho_Chi_Minh`
    pub id: String,
    /// Last path segment with spaces, e.g. `Ho Chi Minh`
    pub city: String,
    /// First path segment, e.g. `Asia`; empty for ids like `UTC`
    pub region: String,
    /// Offset at the reference instant, e.g. `GMT+07:00`
    pub utc_offset: String,
}

/// Resolve an IANA id
pub fn parse_timezone(id: &str) -> Result<Tz, ValidationError> {
    id.parse::<Tz>()
        .map_err(|_| ValidationError::UnknownTimezone(id.to_string()))
}

/// Details for `id` with its offset at `at`; `None` when the id is unknown
pub fn timezone_detail(id: &str, at: DateTime<Utc>) -> Option<TimezoneDetail> {
    id.parse::<Tz>().ok().map(|tz| detail_for(tz, at))
}

/// Zones whose id or city contains `query`, case-insensitive
///
/// An empty query lists every zone. Results keep the IANA database order.
pub fn search_timezones(query: &str, at: DateTime<Utc>) -> Vec<TimezoneDetail> {
    let needle = query.trim().to_lowercase();
    TZ_VARIANTS
        .iter()
        .filter(|tz| needle.is_empty() || matches_query(tz.name(), &needle))
        .map(|tz| detail_for(*tz, at))
        .collect()
}

/// `GMT+HH:MM` offset of `tz` at `at`
pub fn offset_label(tz: Tz, at: DateTime<Utc>) -> String {
    let seconds = tz
        .offset_from_utc_datetime(&at.naive_utc())
        .fix()
        .local_minus_utc();
    let sign = if seconds < 0 { '-' } else { '+' };
    let seconds = seconds.abs();
    format!("GMT{}{:02}:{:02}", sign, seconds / 3_600, (seconds % 3_600) / 60)
}

/// `City (GMT+HH:MM)` for a known id, the raw id otherwise
pub fn zone_label(id: &str, at: DateTime<Utc>) -> String {
    match timezone_detail(id, at) {
        Some(detail) => format!("{} ({})", detail.city, detail.utc_offset),
        None => id.to_string(),
    }
}

fn matches_query(id: &str, needle: &str) -> bool {
    let id = id.to_lowercase();
    id.contains(needle) || id.replace('_', " ").contains(needle)
}

fn detail_for(tz: Tz, at: DateTime<Utc>) -> TimezoneDetail {
    let id = tz.name();
    let (region, city) = match id.split_once('/') {
        Some((region, rest)) => (region, rest.rsplit('/').next().unwrap_or(rest)),
        None => ("", id),
    };
    TimezoneDetail {
        id: id.to_string(),
        city: city.replace('_', " "),
        region: region.to_string(),
        utc_offset: offset_label(tz, at),
    }
}
