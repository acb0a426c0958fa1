use chrono::{DateTime, TimeZone};

use crate::models::SessionMetadata;

/// Trims, turns whitespace runs into `-`, then keeps only alphanumerics,
/// `-` and `_`.
pub fn sanitize(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}

/// `YYMMDD_HHmm_<name>_<device>` for the moment of export.
pub fn bundle_name<Tz: TimeZone>(now: &DateTime<Tz>, metadata: &SessionMetadata) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{}_{}_{}",
        now.format("%y%m%d_%H%M"),
        sanitize(&metadata.name),
        sanitize(metadata.device.as_str())
    )
}
