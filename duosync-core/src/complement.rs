//! Free-slot computation: the complement of the merged busy set.

use crate::day_window::DayWindow;
use crate::interval::{FreeSlot, MergedInterval};

/// Compute the gaps between merged busy intervals across the day window.
///
/// Expects `merged` ascending and non-overlapping (the priority merger's
/// output). The emitted slots exactly tile the window's complement of the
/// busy set; zero-width slots are never emitted.
pub fn free_slots(merged: &[MergedInterval], window: &DayWindow) -> Vec<FreeSlot> {
    let mut slots = Vec::new();
    let mut cursor = window.start;

    for entry in merged {
        if cursor < entry.start {
            slots.push(FreeSlot {
                start: cursor,
                end: entry.start,
            });
        }
        cursor = cursor.max(entry.end);
    }

    if cursor < window.end {
        slots.push(FreeSlot {
            start: cursor,
            end: window.end,
        });
    }

    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::Category;
    use chrono::{DateTime, TimeZone, Utc};

    fn utc(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, h, m, 0).unwrap()
    }

    fn busy(start: DateTime<Utc>, end: DateTime<Utc>) -> MergedInterval {
        MergedInterval {
            start,
            end,
            category: Category::Busy,
        }
    }

    fn window() -> DayWindow {
        DayWindow::from_date_str("2024-01-15").unwrap()
    }

    #[test]
    fn test_empty_busy_set_yields_full_day() {
        let slots = free_slots(&[], &window());
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].start, utc(0, 0));
        assert_eq!(slots[0].end, utc(23, 59));
    }

    #[test]
    fn test_single_interval_splits_day() {
        let slots = free_slots(&[busy(utc(9, 0), utc(10, 0))], &window());
        assert_eq!(
            slots,
            vec![
                FreeSlot { start: utc(0, 0), end: utc(9, 0) },
                FreeSlot { start: utc(10, 0), end: utc(23, 59) },
            ]
        );
    }

    #[test]
    fn test_busy_at_day_edges_emits_no_edge_slots() {
        let slots = free_slots(
            &[busy(utc(0, 0), utc(8, 0)), busy(utc(22, 0), utc(23, 59))],
            &window(),
        );
        assert_eq!(slots, vec![FreeSlot { start: utc(8, 0), end: utc(22, 0) }]);
    }

    #[test]
    fn test_full_day_busy_yields_no_slots() {
        let slots = free_slots(&[busy(utc(0, 0), utc(23, 59))], &window());
        assert!(slots.is_empty());
    }

    #[test]
    fn test_tiling_has_no_gaps_or_overlaps() {
        let merged = vec![
            busy(utc(2, 0), utc(3, 0)),
            busy(utc(9, 0), utc(12, 30)),
            busy(utc(18, 15), utc(20, 0)),
        ];
        let slots = free_slots(&merged, &window());

        // Interleave busy and free and check exact coverage of the window.
        let mut pieces: Vec<(DateTime<Utc>, DateTime<Utc>)> = merged
            .iter()
            .map(|m| (m.start, m.end))
            .chain(slots.iter().map(|s| (s.start, s.end)))
            .collect();
        pieces.sort();

        let w = window();
        assert_eq!(pieces.first().unwrap().0, w.start);
        assert_eq!(pieces.last().unwrap().1, w.end);
        for pair in pieces.windows(2) {
            assert_eq!(pair[0].1, pair[1].0, "pieces must tile without gap or overlap");
        }
    }
}
