//! Time window — the wall-clock interval in which a rule is due to be active.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::time::{TimeOfDay, parse_time_of_day};

/// Inclusive `[start, end]` wall-clock interval.
///
/// Containment does not wrap around midnight: a window whose `start` is
/// later than its `end` (e.g. `22:00..06:00`) contains no time at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl TimeWindow {
    #[must_use]
    pub fn new(start: TimeOfDay, end: TimeOfDay) -> Self {
        Self { start, end }
    }

    /// Parse a window from `HH:MM[:SS]` bounds.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidTime`] if either bound is malformed.
    pub fn parse(start: &str, end: &str) -> Result<Self, ValidationError> {
        Ok(Self::new(parse_time_of_day(start)?, parse_time_of_day(end)?))
    }

    /// Whether `now` lies within `[start, end]`.
    #[must_use]
    pub fn contains(&self, now: TimeOfDay) -> bool {
        self.start <= now && now <= self.end
    }

    /// Whether the window was written as crossing midnight, which
    /// [`contains`](Self::contains) never honours.
    #[must_use]
    pub fn wraps_midnight(&self) -> bool {
        self.start > self.end
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}..{}",
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}
