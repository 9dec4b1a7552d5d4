//! UTC day window bounding a single timeline computation.

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{CoreError, CoreResult};

/// The `[start, end]` UTC bounds of one calendar day.
///
/// All pipeline stages operate strictly inside these bounds: intervals are
/// clamped to them, recurrences are never expanded past them, and free
/// slots tile exactly the space between them.
///
/// The end bound is 23:59, matching the day-end sentinel used by timeline
/// consumers (segments render as `HH:mm` strings and the last one ends at
/// `23:59`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayWindow {
    /// Build the window for a calendar day.
    pub fn for_date(date: NaiveDate) -> Self {
        DayWindow {
            start: date.and_hms_opt(0, 0, 0).unwrap().and_utc(),
            end: date.and_hms_opt(23, 59, 0).unwrap().and_utc(),
        }
    }

    /// Parse a `YYYY-MM-DD` string into a day window.
    ///
    /// Malformed dates are rejected here, before the pipeline runs.
    pub fn from_date_str(s: &str) -> CoreResult<Self> {
        let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| CoreError::InvalidDate(s.to_string()))?;
        Ok(Self::for_date(date))
    }

    /// The calendar date this window covers.
    pub fn date(&self) -> NaiveDate {
        self.start.date_naive()
    }
}
