use chrono::{DateTime, Utc};

use crate::domain::errors::ValidationError;
use crate::domain::market_data::{TimeInterval, Timestamp};

/// Parse a feed timestamp: RFC 3339 / ISO-8601, or integer epoch millis.
pub fn parse_feed_timestamp(raw: &str) -> Result<Timestamp, ValidationError> {
    let raw = raw.trim();
    if let Ok(millis) = raw.parse::<u64>() {
        return Ok(Timestamp::from_millis(millis));
    }
    let parsed = DateTime::parse_from_rfc3339(raw)
        .map_err(|e| ValidationError::InvalidTimestamp(format!("`{raw}`: {e}")))?;
    u64::try_from(parsed.timestamp_millis())
        .map(Timestamp::from_millis)
        .map_err(|_| ValidationError::InvalidTimestamp(format!("`{raw}` is before 1970")))
}

fn utc(timestamp: u64) -> Option<DateTime<Utc>> {
    i64::try_from(timestamp).ok().and_then(DateTime::from_timestamp_millis)
}

/// Axis label for a candle open time, using UTC components.
///
/// - intraday timeframes -> `HH:MM`
/// - `1d` -> `DD.MM`
pub fn format_time_label(timestamp: u64, timeframe: TimeInterval) -> String {
    let Some(time) = utc(timestamp) else {
        return String::new();
    };
    match timeframe {
        TimeInterval::OneDay => time.format("%d.%m").to_string(),
        _ => time.format("%H:%M").to_string(),
    }
}

/// Full UTC date and time for the tooltip header.
pub fn format_date_time(timestamp: u64) -> String {
    utc(timestamp).map(|time| time.format("%Y-%m-%d %H:%M:%S").to_string()).unwrap_or_default()
}
