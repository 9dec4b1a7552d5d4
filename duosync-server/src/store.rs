//! SQLite-backed interval storage.
//!
//! The storage collaborator behind the timeline orchestrator: interval rows
//! plus per-occurrence recurrence exceptions. Timestamps are stored as
//! RFC3339 UTC strings, recurrence rules and exception replacements as JSON.
//!
//! The connection lives behind a mutex; every public method hops onto the
//! blocking pool so handlers never block the runtime.

use std::str::FromStr;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rusqlite::{params, params_from_iter, types::Value, Connection, OptionalExtension, Row};

use duosync_core::{
    Category, DayWindow, ExceptionMap, Interval, RecurrenceException, RecurrenceRule,
};

/// Fields of an interval row before it has an id.
#[derive(Debug, Clone)]
pub struct NewInterval {
    pub user_id: i64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub category: Category,
    pub description: Option<String>,
    pub recurrence: Option<RecurrenceRule>,
}

impl NewInterval {
    /// Write-time validation. The pipeline itself never sees rows that
    /// fail these checks.
    pub fn validate(&self) -> Result<(), String> {
        if self.end <= self.start {
            return Err("interval end must be after its start".into());
        }
        if self.end - self.start > Duration::days(duosync_core::MAX_SPAN_DAYS) {
            return Err(format!(
                "interval span must not exceed {} days",
                duosync_core::MAX_SPAN_DAYS
            ));
        }
        if let Some(rule) = &self.recurrence {
            validate_rule(rule)?;
        }
        Ok(())
    }
}

/// Reject recurrence rules that could never produce an occurrence or that
/// combine mutually exclusive filters. Read-time resolution stays silent
/// for rules that merely match no date in a given window; contradictions
/// are a write-time error.
pub fn validate_rule(rule: &RecurrenceRule) -> Result<(), String> {
    use duosync_core::{Frequency, MonthlyPattern};

    let check_set = |set: &duosync_core::WeekdaySet| -> Result<(), String> {
        if set.is_empty() {
            return Err("weekday filter must not be empty".into());
        }
        if !set.is_valid() {
            return Err("weekday numbers must be 1 (Monday) through 7 (Sunday)".into());
        }
        Ok(())
    };

    match &rule.freq {
        Frequency::Daily { days_of_week } => {
            if let Some(set) = days_of_week {
                check_set(set)?;
            }
        }
        Frequency::Weekly { days_of_week } => check_set(days_of_week)?,
        Frequency::Monthly { pattern, days_of_week } => {
            match pattern {
                MonthlyPattern::DayOfMonth(day) => {
                    if !(1..=31).contains(day) {
                        return Err("day of month must be 1 through 31".into());
                    }
                }
                MonthlyPattern::LastDay => {}
                MonthlyPattern::NthWeekday { weekday, .. } => {
                    if !(1..=7).contains(weekday) {
                        return Err("weekday numbers must be 1 (Monday) through 7 (Sunday)".into());
                    }
                    if days_of_week.is_some() {
                        return Err(
                            "a weekday filter cannot be combined with an nth-weekday pattern"
                                .into(),
                        );
                    }
                }
            }
            if let Some(set) = days_of_week {
                check_set(set)?;
            }
        }
    }
    Ok(())
}

/// SQLite database holding interval rows and recurrence exceptions.
#[derive(Clone)]
pub struct IntervalStore {
    conn: Arc<Mutex<Connection>>,
}

impl IntervalStore {
    /// Open (and migrate) the database at the given path.
    pub fn open(path: &std::path::Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::migrate(&conn)?;
        Ok(IntervalStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database (for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::migrate(&conn)?;
        Ok(IntervalStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn migrate(conn: &Connection) -> Result<(), rusqlite::Error> {
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS intervals (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     INTEGER NOT NULL,
                start_ts    TEXT NOT NULL,
                end_ts      TEXT NOT NULL,
                category    TEXT NOT NULL,
                description TEXT,
                recurrence  TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_intervals_user ON intervals(user_id);
            CREATE INDEX IF NOT EXISTS idx_intervals_user_span
                ON intervals(user_id, start_ts, end_ts);

            CREATE TABLE IF NOT EXISTS recurrence_exceptions (
                interval_id INTEGER NOT NULL REFERENCES intervals(id) ON DELETE CASCADE,
                date        TEXT NOT NULL,
                cancelled   INTEGER NOT NULL DEFAULT 0,
                replacement TEXT,
                PRIMARY KEY (interval_id, date)
            );",
        )
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| anyhow!("interval store mutex poisoned"))?;
            f(&conn)
        })
        .await?
    }

    /// Fetch all intervals for the given users that may contribute to the
    /// day window: concrete rows whose `[start, end)` intersects it, plus
    /// every recurring template regardless of its own span (the rule may
    /// still produce occurrences inside the window).
    pub async fn fetch_intervals(
        &self,
        user_ids: Vec<i64>,
        window: DayWindow,
    ) -> Result<Vec<Interval>> {
        self.with_conn(move |conn| {
            let placeholders = vec!["?"; user_ids.len()].join(", ");
            let sql = format!(
                "SELECT id, user_id, start_ts, end_ts, category, description, recurrence
                 FROM intervals
                 WHERE user_id IN ({placeholders})
                   AND (recurrence IS NOT NULL OR (start_ts < ? AND end_ts > ?))
                 ORDER BY start_ts"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut values: Vec<Value> = user_ids.into_iter().map(Value::from).collect();
            values.push(window.end.to_rfc3339().into());
            values.push(window.start.to_rfc3339().into());
            let rows = stmt.query_map(params_from_iter(values), row_to_interval)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    /// Fetch the recurrence exceptions belonging to the given users'
    /// intervals, keyed by `(interval id, occurrence date)`.
    pub async fn fetch_exceptions(&self, user_ids: Vec<i64>) -> Result<ExceptionMap> {
        self.with_conn(move |conn| {
            let placeholders = vec!["?"; user_ids.len()].join(", ");
            let sql = format!(
                "SELECT e.interval_id, e.date, e.cancelled, e.replacement
                 FROM recurrence_exceptions e
                 JOIN intervals i ON i.id = e.interval_id
                 WHERE i.user_id IN ({placeholders})"
            );
            let mut stmt = conn.prepare(&sql)?;
            let values: Vec<Value> = user_ids.into_iter().map(Value::from).collect();
            let rows = stmt.query_map(params_from_iter(values), row_to_exception)?;

            let mut exceptions = ExceptionMap::new();
            for row in rows {
                let (key, exception) = row?;
                exceptions.insert(key, exception);
            }
            Ok(exceptions)
        })
        .await
    }

    pub async fn list_intervals(&self, user_id: i64) -> Result<Vec<Interval>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, start_ts, end_ts, category, description, recurrence
                 FROM intervals WHERE user_id = ?1 ORDER BY start_ts",
            )?;
            let rows = stmt.query_map([user_id], row_to_interval)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    pub async fn create_interval(&self, new: NewInterval) -> Result<Interval> {
        self.with_conn(move |conn| {
            let rule_json = new
                .recurrence
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;
            conn.execute(
                "INSERT INTO intervals (user_id, start_ts, end_ts, category, description, recurrence)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    new.user_id,
                    new.start.to_rfc3339(),
                    new.end.to_rfc3339(),
                    new.category.as_str(),
                    new.description,
                    rule_json,
                ],
            )?;
            Ok(Interval {
                id: conn.last_insert_rowid(),
                user_id: new.user_id,
                start: new.start,
                end: new.end,
                category: new.category,
                description: new.description,
                recurrence: new.recurrence,
            })
        })
        .await
    }

    /// Replace an interval's fields. Returns the updated row, or `None`
    /// if no interval with that id exists.
    pub async fn update_interval(&self, id: i64, new: NewInterval) -> Result<Option<Interval>> {
        self.with_conn(move |conn| {
            let rule_json = new
                .recurrence
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;
            let changed = conn.execute(
                "UPDATE intervals
                 SET user_id = ?1, start_ts = ?2, end_ts = ?3, category = ?4,
                     description = ?5, recurrence = ?6
                 WHERE id = ?7",
                params![
                    new.user_id,
                    new.start.to_rfc3339(),
                    new.end.to_rfc3339(),
                    new.category.as_str(),
                    new.description,
                    rule_json,
                    id,
                ],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            Ok(Some(Interval {
                id,
                user_id: new.user_id,
                start: new.start,
                end: new.end,
                category: new.category,
                description: new.description,
                recurrence: new.recurrence,
            }))
        })
        .await
    }

    /// Delete an interval (and, via cascade, its exceptions).
    pub async fn delete_interval(&self, id: i64) -> Result<bool> {
        self.with_conn(move |conn| {
            let deleted = conn.execute("DELETE FROM intervals WHERE id = ?1", [id])?;
            Ok(deleted > 0)
        })
        .await
    }

    /// Insert or replace an exception for one occurrence date of a
    /// recurring interval. Returns `false` when the target interval does
    /// not exist or carries no recurrence rule.
    pub async fn set_exception(
        &self,
        interval_id: i64,
        date: NaiveDate,
        exception: RecurrenceException,
    ) -> Result<bool> {
        self.with_conn(move |conn| {
            let recurring: Option<i64> = conn
                .query_row(
                    "SELECT id FROM intervals WHERE id = ?1 AND recurrence IS NOT NULL",
                    [interval_id],
                    |row| row.get(0),
                )
                .optional()?;
            if recurring.is_none() {
                return Ok(false);
            }

            let (cancelled, replacement) = match &exception {
                RecurrenceException::Cancelled => (true, None),
                RecurrenceException::Replaced(interval) => {
                    (false, Some(serde_json::to_string(interval)?))
                }
            };
            conn.execute(
                "INSERT OR REPLACE INTO recurrence_exceptions
                     (interval_id, date, cancelled, replacement)
                 VALUES (?1, ?2, ?3, ?4)",
                params![interval_id, date.format("%Y-%m-%d").to_string(), cancelled, replacement],
            )?;
            Ok(true)
        })
        .await
    }

    pub async fn delete_exception(&self, interval_id: i64, date: NaiveDate) -> Result<bool> {
        self.with_conn(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM recurrence_exceptions WHERE interval_id = ?1 AND date = ?2",
                params![interval_id, date.format("%Y-%m-%d").to_string()],
            )?;
            Ok(deleted > 0)
        })
        .await
    }
}

fn conversion_error(
    index: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, err.into())
}

fn parse_ts(index: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(index, e))
}

fn row_to_interval(row: &Row) -> rusqlite::Result<Interval> {
    let start: String = row.get(2)?;
    let end: String = row.get(3)?;
    let category: String = row.get(4)?;
    let recurrence: Option<String> = row.get(6)?;

    Ok(Interval {
        id: row.get(0)?,
        user_id: row.get(1)?,
        start: parse_ts(2, &start)?,
        end: parse_ts(3, &end)?,
        category: Category::from_str(&category).map_err(|e| conversion_error(4, e))?,
        description: row.get(5)?,
        recurrence: recurrence
            .map(|json| serde_json::from_str(&json).map_err(|e| conversion_error(6, e)))
            .transpose()?,
    })
}

fn row_to_exception(row: &Row) -> rusqlite::Result<((i64, NaiveDate), RecurrenceException)> {
    let interval_id: i64 = row.get(0)?;
    let date_str: String = row.get(1)?;
    let cancelled: bool = row.get(2)?;
    let replacement: Option<String> = row.get(3)?;

    let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
        .map_err(|e| conversion_error(1, e))?;
    let exception = if cancelled {
        RecurrenceException::Cancelled
    } else {
        let json = replacement
            .ok_or_else(|| conversion_error(3, "exception is neither cancelled nor a replacement"))?;
        RecurrenceException::Replaced(
            serde_json::from_str(&json).map_err(|e| conversion_error(3, e))?,
        )
    };
    Ok(((interval_id, date), exception))
}
