//! Timeline assembly: pipeline stages composed into caller-facing segments.
//!
//! Drives normalize → resolve → merge → complement over fetched intervals
//! and renders the result as timezone-local `HH:mm` segments. All
//! computation stays in UTC; the timezone is applied for display only.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::complement::free_slots;
use crate::day_window::DayWindow;
use crate::error::{CoreError, CoreResult};
use crate::interval::{Category, Interval, MergedInterval};
use crate::merge::merge_intervals;
use crate::recurrence::{resolve_all, ExceptionMap};

/// Category of a single-user timeline segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimelineCategory {
    Sleep,
    Busy,
    Other,
    Available,
}

impl From<Category> for TimelineCategory {
    fn from(category: Category) -> Self {
        match category {
            Category::Sleep => Self::Sleep,
            Category::Busy => Self::Busy,
            Category::Other => Self::Other,
        }
    }
}

/// Category of a two-user shared timeline segment.
///
/// `Match` means both users are free; `Busy` means the requesting user is
/// busy (non-sleep); `Available` means the requesting user is free but the
/// other user is busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SharedCategory {
    Match,
    Sleep,
    Busy,
    Available,
}

/// A caller-facing timeline unit: local-timezone `HH:mm` bounds plus a
/// category. Segment sequences cover the full day with no gaps or overlaps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineSegment<C> {
    pub start: String,
    pub end: String,
    pub category: C,
}

/// Parse an IANA timezone name.
pub fn parse_timezone(name: &str) -> CoreResult<Tz> {
    name.parse::<Tz>()
        .map_err(|_| CoreError::UnknownTimezone(name.to_string()))
}

fn format_local(instant: DateTime<Utc>, tz: Tz) -> String {
    instant.with_timezone(&tz).format("%H:%M").to_string()
}

/// Build the single-user timeline for one day.
///
/// Busy segments keep their merged category; free slots become
/// [`TimelineCategory::Available`]. Output is sorted by start time.
pub fn build_day_timeline(
    intervals: &[Interval],
    window: &DayWindow,
    tz: Tz,
    exceptions: &ExceptionMap,
) -> Vec<TimelineSegment<TimelineCategory>> {
    let resolved = resolve_all(intervals, window, exceptions);
    let merged = merge_intervals(&resolved);
    let free = free_slots(&merged, window);

    let mut spans: Vec<(DateTime<Utc>, DateTime<Utc>, TimelineCategory)> = merged
        .iter()
        .map(|m| (m.start, m.end, m.category.into()))
        .chain(free.iter().map(|s| (s.start, s.end, TimelineCategory::Available)))
        .collect();
    spans.sort_by_key(|&(start, _, _)| start);

    spans
        .into_iter()
        .map(|(start, end, category)| TimelineSegment {
            start: format_local(start, tz),
            end: format_local(end, tz),
            category,
        })
        .collect()
}

/// Build the shared two-user timeline for one day.
///
/// Each user's busy classification is computed independently, then a single
/// sweep over the sorted union of both users' boundary instants (plus the
/// window bounds) classifies every minimal sub-interval. First match wins:
///
/// 1. either user asleep → `Sleep`
/// 2. requesting user busy (non-sleep) → `Busy`
/// 3. both free → `Match`
/// 4. otherwise (requester free, other busy) → `Available`
///
/// Adjacent sub-intervals with equal category are coalesced.
pub fn build_shared_timeline(
    current: &[Interval],
    other: &[Interval],
    window: &DayWindow,
    tz: Tz,
    exceptions: &ExceptionMap,
) -> Vec<TimelineSegment<SharedCategory>> {
    let current_busy = merge_intervals(&resolve_all(current, window, exceptions));
    let other_busy = merge_intervals(&resolve_all(other, window, exceptions));

    let mut boundaries: Vec<DateTime<Utc>> = vec![window.start, window.end];
    for entry in current_busy.iter().chain(other_busy.iter()) {
        boundaries.push(entry.start);
        boundaries.push(entry.end);
    }
    boundaries.sort();
    boundaries.dedup();

    let mut spans: Vec<(DateTime<Utc>, DateTime<Utc>, SharedCategory)> = Vec::new();
    for pair in boundaries.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        if end <= start {
            continue;
        }
        // Classification is constant inside a minimal sub-interval, so
        // probing its start instant suffices.
        let category = classify_shared(start, &current_busy, &other_busy);
        match spans.last_mut() {
            Some(last) if last.2 == category && last.1 == start => last.1 = end,
            _ => spans.push((start, end, category)),
        }
    }

    spans
        .into_iter()
        .map(|(start, end, category)| TimelineSegment {
            start: format_local(start, tz),
            end: format_local(end, tz),
            category,
        })
        .collect()
}

fn classify_shared(
    instant: DateTime<Utc>,
    current_busy: &[MergedInterval],
    other_busy: &[MergedInterval],
) -> SharedCategory {
    let current = category_at(current_busy, instant);
    let other = category_at(other_busy, instant);

    if current == Some(Category::Sleep) || other == Some(Category::Sleep) {
        SharedCategory::Sleep
    } else if current.is_some() {
        SharedCategory::Busy
    } else if other.is_none() {
        SharedCategory::Match
    } else {
        SharedCategory::Available
    }
}

fn category_at(merged: &[MergedInterval], instant: DateTime<Utc>) -> Option<Category> {
    merged.iter().find(|m| m.covers(instant)).map(|m| m.category)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Tz;

    fn utc(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, h, m, 0).unwrap()
    }

    fn iv(start: DateTime<Utc>, end: DateTime<Utc>, category: Category) -> Interval {
        Interval {
            id: 0,
            user_id: 1,
            start,
            end,
            category,
            description: None,
            recurrence: None,
        }
    }

    fn window() -> DayWindow {
        DayWindow::from_date_str("2024-01-15").unwrap()
    }

    fn no_exceptions() -> ExceptionMap {
        ExceptionMap::new()
    }

    #[test]
    fn test_parse_timezone() {
        assert!(parse_timezone("Europe/Berlin").is_ok());
        assert!(parse_timezone("Mars/Olympus").is_err());
    }

    #[test]
    fn test_single_user_timeline_utc() {
        let segments = build_day_timeline(
            &[iv(utc(9, 0), utc(10, 0), Category::Busy)],
            &window(),
            Tz::UTC,
            &no_exceptions(),
        );
        assert_eq!(
            segments,
            vec![
                TimelineSegment {
                    start: "00:00".into(),
                    end: "09:00".into(),
                    category: TimelineCategory::Available
                },
                TimelineSegment {
                    start: "09:00".into(),
                    end: "10:00".into(),
                    category: TimelineCategory::Busy
                },
                TimelineSegment {
                    start: "10:00".into(),
                    end: "23:59".into(),
                    category: TimelineCategory::Available
                },
            ]
        );
    }

    #[test]
    fn test_single_user_timeline_local_display() {
        // Berlin is UTC+1 in January; display conversion only.
        let tz: Tz = "Europe/Berlin".parse().unwrap();
        let segments = build_day_timeline(
            &[iv(utc(9, 0), utc(10, 0), Category::Other)],
            &window(),
            tz,
            &no_exceptions(),
        );
        assert_eq!(segments[1].start, "10:00");
        assert_eq!(segments[1].end, "11:00");
        assert_eq!(segments[1].category, TimelineCategory::Other);
    }

    #[test]
    fn test_shared_current_busy_wins_over_other_free() {
        // Current busy 09:00-10:00 with `other`, other user free all day.
        let segments = build_shared_timeline(
            &[iv(utc(9, 0), utc(10, 0), Category::Other)],
            &[],
            &window(),
            Tz::UTC,
            &no_exceptions(),
        );
        assert_eq!(
            segments,
            vec![
                TimelineSegment {
                    start: "00:00".into(),
                    end: "09:00".into(),
                    category: SharedCategory::Match
                },
                TimelineSegment {
                    start: "09:00".into(),
                    end: "10:00".into(),
                    category: SharedCategory::Busy
                },
                TimelineSegment {
                    start: "10:00".into(),
                    end: "23:59".into(),
                    category: SharedCategory::Match
                },
            ]
        );
    }

    #[test]
    fn test_shared_sleep_overrides_match_and_busy() {
        // Other user asleep 23:00-23:59; current user free.
        let segments = build_shared_timeline(
            &[],
            &[iv(utc(23, 0), utc(23, 59), Category::Sleep)],
            &window(),
            Tz::UTC,
            &no_exceptions(),
        );
        assert_eq!(segments.last().unwrap().category, SharedCategory::Sleep);
        assert_eq!(segments.last().unwrap().start, "23:00");

        // Even when the current user is simultaneously busy with `other`,
        // the other user's sleep takes the instant.
        let segments = build_shared_timeline(
            &[iv(utc(23, 0), utc(23, 59), Category::Other)],
            &[iv(utc(23, 0), utc(23, 59), Category::Sleep)],
            &window(),
            Tz::UTC,
            &no_exceptions(),
        );
        assert_eq!(segments.last().unwrap().category, SharedCategory::Sleep);
    }

    #[test]
    fn test_shared_available_when_only_other_busy() {
        let segments = build_shared_timeline(
            &[],
            &[iv(utc(14, 0), utc(15, 0), Category::Busy)],
            &window(),
            Tz::UTC,
            &no_exceptions(),
        );
        let mid = &segments[1];
        assert_eq!(mid.start, "14:00");
        assert_eq!(mid.end, "15:00");
        assert_eq!(mid.category, SharedCategory::Available);
    }

    #[test]
    fn test_shared_timeline_covers_day_without_gaps() {
        let segments = build_shared_timeline(
            &[
                iv(utc(1, 0), utc(2, 0), Category::Sleep),
                iv(utc(9, 0), utc(11, 0), Category::Other),
            ],
            &[
                iv(utc(10, 0), utc(12, 0), Category::Busy),
                iv(utc(22, 0), utc(23, 0), Category::Sleep),
            ],
            &window(),
            Tz::UTC,
            &no_exceptions(),
        );
        assert_eq!(segments.first().unwrap().start, "00:00");
        assert_eq!(segments.last().unwrap().end, "23:59");
        for pair in segments.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
            assert_ne!(pair[0].category, pair[1].category, "equal neighbours must coalesce");
        }
    }

    #[test]
    fn test_shared_overlap_splits_at_both_users_boundaries() {
        // Current other-busy 09:00-11:00, partner busy 10:00-12:00:
        // 09-11 Busy (current busy wins), 11-12 Available, rest Match.
        let segments = build_shared_timeline(
            &[iv(utc(9, 0), utc(11, 0), Category::Other)],
            &[iv(utc(10, 0), utc(12, 0), Category::Busy)],
            &window(),
            Tz::UTC,
            &no_exceptions(),
        );
        assert_eq!(
            segments,
            vec![
                TimelineSegment {
                    start: "00:00".into(),
                    end: "09:00".into(),
                    category: SharedCategory::Match
                },
                TimelineSegment {
                    start: "09:00".into(),
                    end: "11:00".into(),
                    category: SharedCategory::Busy
                },
                TimelineSegment {
                    start: "11:00".into(),
                    end: "12:00".into(),
                    category: SharedCategory::Available
                },
                TimelineSegment {
                    start: "12:00".into(),
                    end: "23:59".into(),
                    category: SharedCategory::Match
                },
            ]
        );
    }
}
