//! Core timeline computation for DuoSync.
//!
//! This crate is the pure computational pipeline behind the shared
//! availability view:
//! - `interval` — busy/available spans and day-boundary normalization
//! - `recurrence` — expansion of daily/weekly/monthly rules into occurrences
//! - `merge` — category-priority merge of overlapping spans
//! - `complement` — free-slot gaps between merged busy spans
//! - `timeline` — timezone-local segments and the two-user comparison
//!
//! Everything here is synchronous and I/O-free; fetching intervals and
//! serving timelines over HTTP live in `duosync-server`.

pub mod complement;
pub mod day_window;
pub mod error;
pub mod interval;
pub mod merge;
pub mod recurrence;
pub mod timeline;

pub use complement::free_slots;
pub use day_window::DayWindow;
pub use error::{CoreError, CoreResult};
pub use interval::{Category, FreeSlot, Interval, MergedInterval, MAX_SPAN_DAYS};
pub use merge::merge_intervals;
pub use recurrence::{
    ExceptionMap, Frequency, MonthlyPattern, RecurrenceException, RecurrenceRule, WeekdayOrdinal,
    WeekdaySet,
};
pub use timeline::{
    build_day_timeline, build_shared_timeline, parse_timezone, SharedCategory, TimelineCategory,
    TimelineSegment,
};
