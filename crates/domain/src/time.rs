//! Time and timestamp helpers.
//!
//! Two clocks coexist: UTC timestamps for audit fields such as
//! `last_triggered`, and naive wall-clock times of day for rule windows,
//! which are compared against the local clock without any timezone
//! conversion.

use chrono::{DateTime, Local, NaiveTime, Utc};

use crate::error::ValidationError;

/// UTC timestamp used for `last_triggered` and similar audit fields.
pub type Timestamp = DateTime<Utc>;

/// Wall-clock time of day, without date or timezone.
pub type TimeOfDay = NaiveTime;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Return the current local wall-clock time of day.
#[must_use]
pub fn local_time_of_day() -> TimeOfDay {
    Local::now().time()
}

/// Parse `HH:MM` or `HH:MM:SS` into a [`TimeOfDay`].
///
/// # Errors
///
/// Returns [`ValidationError::InvalidTime`] when the text matches neither format.
pub fn parse_time_of_day(text: &str) -> Result<TimeOfDay, ValidationError> {
    let text = text.trim();
    NaiveTime::parse_from_str(text, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .map_err(|_| ValidationError::InvalidTime(text.to_string()))
}
