//! Recurrence rule expansion for recurring intervals.
//!
//! Expands a recurring template interval into concrete occurrences within a
//! day window, respecting per-date exceptions (cancellations and
//! replacements). Expansion is confined to the window: candidate starts are
//! only generated for dates inside it, so per-request cost is independent
//! of how far in the past the recurrence was defined.

use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::day_window::DayWindow;
use crate::interval::Interval;

/// Set of ISO weekday numbers (1 = Monday .. 7 = Sunday).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeekdaySet(Vec<u8>);

impl WeekdaySet {
    pub fn new(days: impl IntoIterator<Item = Weekday>) -> Self {
        WeekdaySet(days.into_iter().map(|d| d.number_from_monday() as u8).collect())
    }

    /// From raw ISO numbers; out-of-range numbers never match any date.
    pub fn from_iso(days: Vec<u8>) -> Self {
        WeekdaySet(days)
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0.contains(&(day.number_from_monday() as u8))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether every entry is a valid ISO weekday number.
    pub fn is_valid(&self) -> bool {
        self.0.iter().all(|d| (1..=7).contains(d))
    }
}

/// Position of a weekday within its month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekdayOrdinal {
    First,
    Second,
    Third,
    Fourth,
    Last,
}

/// Which date(s) of a month a monthly rule fires on.
///
/// Day-of-month and nth-weekday are distinct variants, so the two can
/// never be set at once; a rule that matches no date in a month (e.g.
/// day 31 in February, or a fifth Monday that does not exist) simply
/// produces no occurrence there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonthlyPattern {
    /// A specific day number, 1–31.
    DayOfMonth(u32),
    /// The last day of the month, whatever its number.
    LastDay,
    /// The nth (or last) occurrence of a weekday, e.g. "first monday".
    NthWeekday { ordinal: WeekdayOrdinal, weekday: u8 },
}

/// Expansion frequency plus its per-frequency filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Frequency {
    /// One occurrence per day, optionally restricted to listed weekdays.
    Daily {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        days_of_week: Option<WeekdaySet>,
    },
    /// Occurrences on each listed weekday.
    Weekly { days_of_week: WeekdaySet },
    /// Occurrences per the monthly pattern, optionally intersected with
    /// a weekday filter.
    Monthly {
        pattern: MonthlyPattern,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        days_of_week: Option<WeekdaySet>,
    },
}

/// A recurrence rule attached to a template interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    #[serde(flatten)]
    pub freq: Frequency,
    /// Inclusive end date; absent means unbounded (bounded in practice by
    /// the query's day window).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<NaiveDate>,
}

impl RecurrenceRule {
    /// Whether this rule fires on the given date.
    pub fn matches_date(&self, date: NaiveDate) -> bool {
        if let Some(until) = self.until {
            if date > until {
                return false;
            }
        }
        match &self.freq {
            Frequency::Daily { days_of_week } => days_of_week
                .as_ref()
                .map_or(true, |set| set.contains(date.weekday())),
            Frequency::Weekly { days_of_week } => days_of_week.contains(date.weekday()),
            Frequency::Monthly { pattern, days_of_week } => {
                pattern.matches_date(date)
                    && days_of_week
                        .as_ref()
                        .map_or(true, |set| set.contains(date.weekday()))
            }
        }
    }
}

impl MonthlyPattern {
    fn matches_date(&self, date: NaiveDate) -> bool {
        match self {
            Self::DayOfMonth(day) => date.day() == *day,
            Self::LastDay => date == last_day_of_month(date.year(), date.month()),
            Self::NthWeekday { ordinal, weekday } => weekday_from_iso(*weekday)
                .is_some_and(|wd| {
                    nth_weekday_of_month(date.year(), date.month(), wd, *ordinal) == Some(date)
                }),
        }
    }
}

/// Per-occurrence override for a recurring interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceException {
    /// Suppress the occurrence entirely.
    Cancelled,
    /// Substitute a modified interval for the templated occurrence.
    Replaced(Interval),
}

/// Exceptions keyed by `(template interval id, occurrence date)`.
pub type ExceptionMap = HashMap<(i64, NaiveDate), RecurrenceException>;

fn weekday_from_iso(n: u8) -> Option<Weekday> {
    match n {
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        7 => Some(Weekday::Sun),
        _ => None,
    }
}

fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    // First of next month always exists; its predecessor is the last day.
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .unwrap()
        .pred_opt()
        .unwrap()
}

/// The nth (or last) given weekday of a month, if it exists.
fn nth_weekday_of_month(
    year: i32,
    month: u32,
    weekday: Weekday,
    ordinal: WeekdayOrdinal,
) -> Option<NaiveDate> {
    match ordinal {
        WeekdayOrdinal::Last => {
            let last = last_day_of_month(year, month);
            let days_back =
                (last.weekday().num_days_from_monday() + 7 - weekday.num_days_from_monday()) % 7;
            Some(last - Duration::days(days_back as i64))
        }
        _ => {
            let n = match ordinal {
                WeekdayOrdinal::First => 0,
                WeekdayOrdinal::Second => 1,
                WeekdayOrdinal::Third => 2,
                WeekdayOrdinal::Fourth => 3,
                WeekdayOrdinal::Last => unreachable!(),
            };
            let first = NaiveDate::from_ymd_opt(year, month, 1)?;
            let days_forward =
                (weekday.num_days_from_monday() + 7 - first.weekday().num_days_from_monday()) % 7;
            // from_ymd_opt returns None past month end (e.g. a fifth Monday).
            NaiveDate::from_ymd_opt(year, month, 1 + days_forward + n * 7)
        }
    }
}

/// Expand one interval into the concrete occurrences intersecting the window.
///
/// Non-recurring intervals pass through unchanged as a single entry.
/// Recurring templates produce one occurrence per matching date inside the
/// window: the occurrence keeps the template's start time-of-day and
/// duration, drops the rule, and is indistinguishable from a non-recurring
/// interval afterwards. Dates before the template's first occurrence never
/// match.
pub fn resolve_occurrences(
    template: &Interval,
    window: &DayWindow,
    exceptions: &ExceptionMap,
) -> Vec<Interval> {
    let rule = match &template.recurrence {
        Some(r) => r,
        None => return vec![template.clone()],
    };

    let duration = template.end - template.start;
    let first_date = template.start.date_naive();
    let start_time = template.start.time();

    let mut occurrences = Vec::new();
    let mut date = window.start.date_naive();
    let last_date = window.end.date_naive();

    while date <= last_date {
        if date >= first_date && rule.matches_date(date) {
            match exceptions.get(&(template.id, date)) {
                Some(RecurrenceException::Cancelled) => {}
                Some(RecurrenceException::Replaced(replacement)) => {
                    occurrences.push(replacement.clone());
                }
                None => {
                    let start = date.and_time(start_time).and_utc();
                    occurrences.push(Interval {
                        start,
                        end: start + duration,
                        recurrence: None,
                        ..template.clone()
                    });
                }
            }
        }
        date = match date.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }

    occurrences
}

/// Resolve a batch of raw intervals into concrete, window-clamped spans.
///
/// Drives normalization and expansion together: occurrences (and
/// pass-through intervals) are clamped to the window and degenerate spans
/// dropped, so the output is ready for the priority merger.
pub fn resolve_all(
    intervals: &[Interval],
    window: &DayWindow,
    exceptions: &ExceptionMap,
) -> Vec<Interval> {
    let mut resolved = Vec::new();
    for interval in intervals {
        for occurrence in resolve_occurrences(interval, window, exceptions) {
            let clamped = occurrence.clamp_to(window);
            if !clamped.is_degenerate() {
                resolved.push(clamped);
            }
        }
    }
    resolved
}
