//! Time utility functions

use chrono::{DateTime, TimeZone};

/// Entry timestamp format, second precision, no zone
pub const ENTRY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a timestamp the way entries store `created_at`
pub fn format_entry_timestamp<Tz: TimeZone>(ts: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    ts.format(ENTRY_TIMESTAMP_FORMAT).to_string()
}
