//! Tracks the restore cursor between checkpoints.

use crate::config::RestoreConfig;
use model::{checkpoint::cursor::RestoreCursor, core::value::Value, records::row::RowData};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct RestoreTracker {
    /// Write-column index of the restore column; `None` when restore is off.
    column_index: Option<usize>,
    max_rows: u64,
    interval: Option<Duration>,
    last_value: Option<Value>,
    rows_in_interval: u64,
    rows_total: u64,
    ready: bool,
    interval_started: Instant,
    last_completed: Option<i64>,
}

impl RestoreTracker {
    pub fn disabled() -> Self {
        Self {
            column_index: None,
            max_rows: u64::MAX,
            interval: None,
            last_value: None,
            rows_in_interval: 0,
            rows_total: 0,
            ready: false,
            interval_started: Instant::now(),
            last_completed: None,
        }
    }

    pub fn new(config: &RestoreConfig, column_index: usize) -> Self {
        Self {
            column_index: Some(column_index),
            max_rows: config.max_rows_per_checkpoint,
            interval: config.checkpoint_interval(),
            ..Self::disabled()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.column_index.is_some()
    }

    /// Records a row the store has just committed.
    pub fn on_row_committed(&mut self, row: &RowData) {
        self.rows_total += 1;
        let Some(index) = self.column_index else {
            return;
        };

        let value = row.value_at(index).clone();
        if let Some(previous) = &self.last_value
            && previous != &value
        {
            self.ready = true;
        }
        self.last_value = Some(value);
        self.rows_in_interval += 1;
    }

    /// Rows committed since the previous cursor was emitted.
    pub fn rows_in_interval(&self) -> u64 {
        self.rows_in_interval
    }

    pub fn rows_total(&self) -> u64 {
        self.rows_total
    }

    /// Whether a checkpoint may emit a cursor now.
    pub fn is_ready(&self) -> bool {
        if !self.is_enabled() {
            return false;
        }
        if self.ready || self.rows_in_interval > self.max_rows {
            return true;
        }
        match self.interval {
            Some(interval) => {
                self.rows_in_interval > 0 && self.interval_started.elapsed() >= interval
            }
            None => false,
        }
    }

    /// Emits the cursor for everything committed so far and starts a new
    /// interval. Returns `None` when nothing was committed since the
    /// previous cursor.
    pub fn take_cursor(&mut self) -> Option<RestoreCursor> {
        if self.rows_in_interval == 0 {
            return None;
        }
        let value = self.last_value.clone()?;

        let cursor = RestoreCursor::new(value, self.rows_in_interval, self.rows_total);
        self.rows_in_interval = 0;
        self.ready = false;
        self.interval_started = Instant::now();

        debug!(
            value = %cursor.value,
            rows = cursor.rows_in_interval,
            total = cursor.rows_total,
            "Restore cursor emitted"
        );
        Some(cursor)
    }

    pub fn complete(&mut self, checkpoint_id: i64) {
        self.last_completed = Some(checkpoint_id);
        info!(checkpoint_id, "Checkpoint completed");
    }

    pub fn abort(&mut self, checkpoint_id: i64) {
        warn!(
            checkpoint_id,
            last_completed = ?self.last_completed,
            "Checkpoint aborted; the previous restore cursor stays authoritative"
        );
    }

    pub fn last_completed(&self) -> Option<i64> {
        self.last_completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i64) -> RowData {
        RowData::from_pairs("t", [("id", Value::Int(id)), ("v", Value::Null)])
    }

    #[test]
    fn test_ready_when_restore_value_changes() {
        let mut tracker = RestoreTracker::new(&RestoreConfig::on_column("id"), 0);

        tracker.on_row_committed(&row(1));
        tracker.on_row_committed(&row(1));
        assert!(!tracker.is_ready());

        tracker.on_row_committed(&row(2));
        assert!(tracker.is_ready());

        let cursor = tracker.take_cursor().unwrap();
        assert_eq!(cursor.value, Value::Int(2));
        assert_eq!(cursor.rows_in_interval, 3);
        assert_eq!(cursor.rows_total, 3);

        assert!(!tracker.is_ready());
        assert!(tracker.take_cursor().is_none());
    }

    #[test]
    fn test_ready_after_max_rows() {
        let config = RestoreConfig::on_column("id").with_max_rows(3);
        let mut tracker = RestoreTracker::new(&config, 0);

        for _ in 0..3 {
            tracker.on_row_committed(&row(9));
        }
        // Reaching the threshold is not enough; it must be exceeded.
        assert!(!tracker.is_ready());

        tracker.on_row_committed(&row(9));
        assert!(tracker.is_ready());

        let cursor = tracker.take_cursor().unwrap();
        assert_eq!(cursor.rows_in_interval, 4);

        tracker.on_row_committed(&row(9));
        let cursor = tracker.take_cursor().unwrap();
        assert_eq!(cursor.rows_in_interval, 1);
        assert_eq!(cursor.rows_total, 5);
    }

    #[test]
    fn test_identical_json_and_uuid_values_are_unchanged() {
        let mut tracker = RestoreTracker::new(&RestoreConfig::on_column("id"), 0);
        let json = |v: &str| {
            RowData::from_pairs("t", [("id", Value::Json(serde_json::json!(v)))])
        };

        tracker.on_row_committed(&json("same"));
        tracker.on_row_committed(&json("same"));
        assert!(!tracker.is_ready());

        tracker.on_row_committed(&json("next"));
        assert!(tracker.is_ready());

        let mut tracker = RestoreTracker::new(&RestoreConfig::on_column("id"), 0);
        let id = uuid::Uuid::from_u128(7);
        for _ in 0..2 {
            tracker.on_row_committed(&RowData::from_pairs("t", [("id", Value::Uuid(id))]));
        }
        assert!(!tracker.is_ready());
    }

    #[test]
    fn test_ready_after_interval() {
        let config = RestoreConfig::on_column("id").with_interval(Duration::from_millis(5));
        let mut tracker = RestoreTracker::new(&config, 0);

        tracker.on_row_committed(&row(1));
        std::thread::sleep(Duration::from_millis(10));
        assert!(tracker.is_ready());
    }

    #[test]
    fn test_disabled_tracker_only_counts() {
        let mut tracker = RestoreTracker::disabled();
        tracker.on_row_committed(&row(1));
        tracker.on_row_committed(&row(2));

        assert!(!tracker.is_ready());
        assert_eq!(tracker.rows_total(), 2);
        assert!(tracker.take_cursor().is_none());
    }

    #[test]
    fn test_checkpoint_bookkeeping() {
        let mut tracker = RestoreTracker::new(&RestoreConfig::on_column("id"), 0);
        tracker.complete(4);
        tracker.abort(5);
        assert_eq!(tracker.last_completed(), Some(4));
    }
}
