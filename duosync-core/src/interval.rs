//! Busy/available interval types and day-boundary normalization.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::day_window::DayWindow;
use crate::recurrence::RecurrenceRule;

/// Maximum span of a single stored interval.
///
/// Enforced at write time (interval creation), not by the pipeline;
/// bounding the span keeps recurrence expansion and merging costs sane.
pub const MAX_SPAN_DAYS: i64 = 7;

/// What kind of time an interval blocks.
///
/// The variant order is the merge priority: when overlapping intervals
/// collapse into one, the highest-priority category wins
/// (`Sleep > Busy > Other`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Other,
    Busy,
    Sleep,
}

impl Category {
    /// The higher-priority of two categories.
    pub fn max_priority(a: Category, b: Category) -> Category {
        a.max(b)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sleep => "sleep",
            Self::Busy => "busy",
            Self::Other => "other",
        }
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sleep" => Ok(Self::Sleep),
            "busy" => Ok(Self::Busy),
            "other" => Ok(Self::Other),
            other => Err(format!("unknown category '{other}'")),
        }
    }
}

/// A stored busy/available span for one user.
///
/// When `recurrence` is set, `start`/`end` describe the *first* occurrence:
/// the span's duration is reused for every expanded occurrence, and the row
/// itself is not a concrete occurrence until resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub id: i64,
    pub user_id: i64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub category: Category,
    pub description: Option<String>,
    pub recurrence: Option<RecurrenceRule>,
}

impl Interval {
    /// Clamp this interval to a day window.
    ///
    /// Total: never fails. The result may be degenerate (`end <= start`)
    /// when the interval lies outside the window; degenerate intervals are
    /// filtered by downstream stages, never rendered.
    pub fn clamp_to(&self, window: &DayWindow) -> Interval {
        Interval {
            start: self.start.max(window.start),
            end: self.end.min(window.end),
            ..self.clone()
        }
    }

    /// Whether the interval still has positive width.
    pub fn is_degenerate(&self) -> bool {
        self.end <= self.start
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Output of the priority merger: non-overlapping, ascending by start,
/// each entry carrying the highest-priority category among the inputs
/// covering it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub category: Category,
}

impl MergedInterval {
    /// Whether this entry covers the given instant (`[start, end)`).
    pub fn covers(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

/// A gap in the merged busy timeline — the complement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn interval(start: DateTime<Utc>, end: DateTime<Utc>) -> Interval {
        Interval {
            id: 1,
            user_id: 1,
            start,
            end,
            category: Category::Busy,
            description: None,
            recurrence: None,
        }
    }

    #[test]
    fn test_category_priority() {
        assert_eq!(Category::max_priority(Category::Sleep, Category::Busy), Category::Sleep);
        assert_eq!(Category::max_priority(Category::Other, Category::Busy), Category::Busy);
        assert_eq!(Category::max_priority(Category::Other, Category::Other), Category::Other);
        assert!(Category::Sleep > Category::Busy);
        assert!(Category::Busy > Category::Other);
    }

    #[test]
    fn test_clamp_inside_window_is_noop() {
        let window = DayWindow::from_date_str("2024-01-15").unwrap();
        let iv = interval(
            Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap(),
        );
        let clamped = iv.clamp_to(&window);
        assert_eq!(clamped.start, iv.start);
        assert_eq!(clamped.end, iv.end);
        assert!(!clamped.is_degenerate());
    }

    #[test]
    fn test_clamp_spanning_interval() {
        let window = DayWindow::from_date_str("2024-01-15").unwrap();
        let iv = interval(
            Utc.with_ymd_and_hms(2024, 1, 14, 22, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 16, 2, 0, 0).unwrap(),
        );
        let clamped = iv.clamp_to(&window);
        assert_eq!(clamped.start, window.start);
        assert_eq!(clamped.end, window.end);
    }

    #[test]
    fn test_clamp_outside_window_is_degenerate() {
        let window = DayWindow::from_date_str("2024-01-15").unwrap();
        let iv = interval(
            Utc.with_ymd_and_hms(2024, 1, 14, 9, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 14, 10, 0, 0).unwrap(),
        );
        assert!(iv.clamp_to(&window).is_degenerate());
    }

    #[test]
    fn test_category_serde_names() {
        assert_eq!(serde_json::to_string(&Category::Sleep).unwrap(), "\"sleep\"");
        let c: Category = serde_json::from_str("\"other\"").unwrap();
        assert_eq!(c, Category::Other);
    }
}
