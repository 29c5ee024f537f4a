//! Timestamp helpers.

use chrono::{DateTime, Utc};

/// Represents a timestamp that can be serialized/deserialized.
pub type Timestamp = DateTime<Utc>;

/// Returns the current UTC time as an ISO 8601 formatted string.
///
/// Format: `YYYY-MM-DDTHH:MM:SS.ffffff+00:00`
///
/// # Examples
///
/// ```
/// use splatflow::utils::iso_timestamp;
///
/// let ts = iso_timestamp();
/// assert!(ts.contains('T'));
/// assert!(ts.ends_with("+00:00"));
/// ```
#[must_use]
pub fn iso_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}

/// Returns the current UTC timestamp.
#[must_use]
pub fn now_utc() -> Timestamp {
    Utc::now()
}
