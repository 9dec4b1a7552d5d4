//! Priority merge of concrete intervals.

use crate::interval::{Category, Interval, MergedInterval};

/// Merge overlapping intervals into a minimal, sorted, non-overlapping list.
///
/// Overlap or exact touch (`next.start <= last.end`) extends the last merged
/// entry to `max(last.end, next.end)` and lifts its category to the
/// higher-priority of the two (`Sleep > Busy > Other`). Touching intervals
/// collapsing into one is deliberate policy, not adjacency preservation.
///
/// Degenerate inputs (`end <= start`, e.g. clamped away at a day boundary)
/// are dropped. `O(n log n)`, dominated by the sort; idempotent over
/// already-merged input.
pub fn merge_intervals(intervals: &[Interval]) -> Vec<MergedInterval> {
    let mut spans: Vec<&Interval> = intervals.iter().filter(|iv| !iv.is_degenerate()).collect();
    spans.sort_by_key(|iv| iv.start);

    let mut merged: Vec<MergedInterval> = Vec::with_capacity(spans.len());
    for interval in spans {
        match merged.last_mut() {
            Some(last) if interval.start <= last.end => {
                last.end = last.end.max(interval.end);
                last.category = Category::max_priority(last.category, interval.category);
            }
            _ => merged.push(MergedInterval {
                start: interval.start,
                end: interval.end,
                category: interval.category,
            }),
        }
    }
    merged
}

/// Run the merge pass over entries that are already `MergedInterval`s.
///
/// Useful when pooling previously merged lists; merging a single merged
/// list again returns it unchanged.
pub fn remerge(entries: &[MergedInterval]) -> Vec<MergedInterval> {
    let mut sorted: Vec<&MergedInterval> = entries.iter().filter(|e| e.end > e.start).collect();
    sorted.sort_by_key(|e| e.start);

    let mut merged: Vec<MergedInterval> = Vec::with_capacity(sorted.len());
    for entry in sorted {
        match merged.last_mut() {
            Some(last) if entry.start <= last.end => {
                last.end = last.end.max(entry.end);
                last.category = Category::max_priority(last.category, entry.category);
            }
            _ => merged.push(entry.clone()),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

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

    #[test]
    fn test_single_interval() {
        let merged = merge_intervals(&[iv(utc(9, 0), utc(10, 0), Category::Busy)]);
        assert_eq!(
            merged,
            vec![MergedInterval {
                start: utc(9, 0),
                end: utc(10, 0),
                category: Category::Busy
            }]
        );
    }

    #[test]
    fn test_overlap_takes_higher_priority_category() {
        // {09:00-11:00, other} + {10:00-12:00, sleep} -> {09:00-12:00, sleep}
        let merged = merge_intervals(&[
            iv(utc(9, 0), utc(11, 0), Category::Other),
            iv(utc(10, 0), utc(12, 0), Category::Sleep),
        ]);
        assert_eq!(
            merged,
            vec![MergedInterval {
                start: utc(9, 0),
                end: utc(12, 0),
                category: Category::Sleep
            }]
        );
    }

    #[test]
    fn test_touching_intervals_merge_into_one() {
        // [09:00,10:00) + [10:00,11:00) of different categories -> one entry
        // with the higher-priority category.
        let merged = merge_intervals(&[
            iv(utc(9, 0), utc(10, 0), Category::Other),
            iv(utc(10, 0), utc(11, 0), Category::Sleep),
        ]);
        assert_eq!(
            merged,
            vec![MergedInterval {
                start: utc(9, 0),
                end: utc(11, 0),
                category: Category::Sleep
            }]
        );
    }

    #[test]
    fn test_disjoint_intervals_stay_separate() {
        let merged = merge_intervals(&[
            iv(utc(13, 0), utc(14, 0), Category::Busy),
            iv(utc(9, 0), utc(10, 0), Category::Other),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].start, utc(9, 0));
        assert_eq!(merged[1].start, utc(13, 0));
    }

    #[test]
    fn test_contained_interval_does_not_extend() {
        let merged = merge_intervals(&[
            iv(utc(9, 0), utc(12, 0), Category::Other),
            iv(utc(10, 0), utc(11, 0), Category::Busy),
        ]);
        assert_eq!(
            merged,
            vec![MergedInterval {
                start: utc(9, 0),
                end: utc(12, 0),
                category: Category::Busy
            }]
        );
    }

    #[test]
    fn test_degenerate_intervals_dropped() {
        let merged = merge_intervals(&[
            iv(utc(9, 0), utc(9, 0), Category::Busy),
            iv(utc(10, 0), utc(11, 0), Category::Busy),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].start, utc(10, 0));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let input = vec![
            iv(utc(8, 0), utc(9, 30), Category::Sleep),
            iv(utc(9, 0), utc(10, 0), Category::Other),
            iv(utc(12, 0), utc(13, 0), Category::Busy),
        ];
        let once = merge_intervals(&input);
        let twice = remerge(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_unsorted_input_pools_across_users() {
        let mut a = iv(utc(9, 0), utc(10, 0), Category::Busy);
        a.user_id = 1;
        let mut b = iv(utc(9, 30), utc(11, 0), Category::Other);
        b.user_id = 2;
        let merged = merge_intervals(&[b, a]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].start, utc(9, 0));
        assert_eq!(merged[0].end, utc(11, 0));
        assert_eq!(merged[0].category, Category::Busy);
    }
}
