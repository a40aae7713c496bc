//! The flush engine of an open sink: binds rows through the compiled
//! statement and owns the commit/rollback boundary.

use crate::{
    batch::PendingBatch, error::SinkError, metrics::SinkMetrics, restore::RestoreTracker,
};
use connectors::sql::base::{
    coercion::{CoercionError, FieldCoercer},
    connection::SqlConnection,
    error::DbError,
};
use model::{checkpoint::cursor::RestoreCursor, core::value::Value, records::row::RowData};
use planner::query::template::CompiledStatement;
use std::time::Instant;
use tracing::{debug, error, info, warn};

pub struct ActiveSink {
    pub(crate) conn: Box<dyn SqlConnection>,
    pub(crate) table: String,
    pub(crate) statement: CompiledStatement,
    /// Write-column index bound to each placeholder.
    pub(crate) positions: Vec<usize>,
    pub(crate) coercer: FieldCoercer,
    pub(crate) pending: PendingBatch,
    pub(crate) restore: RestoreTracker,
    pub(crate) post_sql: Vec<String>,
    pub(crate) metrics: SinkMetrics,
    pub(crate) first_row_logged: bool,
}

impl ActiveSink {
    /// Coerces `row` and orders its values by placeholder.
    fn bind(&self, row: &RowData) -> Result<Vec<Value>, CoercionError> {
        let values = self.coercer.coerce_row(row)?;
        Ok(self
            .positions
            .iter()
            .map(|&index| values.get(index).cloned().unwrap_or(Value::Null))
            .collect())
    }

    fn log_first_row(&mut self, row: &RowData) {
        if !self.first_row_logged {
            self.first_row_logged = true;
            debug!(table = %self.table, row = %row.to_json(), "First row received");
        }
    }

    /// Rolls back the open transaction. A failed rollback is logged; the
    /// error that caused it is what the caller reports.
    async fn rollback(&mut self) {
        self.metrics.increment_rollbacks(1);
        if let Err(e) = self.conn.rollback().await {
            warn!(table = %self.table, error = %e, "Rollback failed");
        }
    }

    pub async fn write_single(&mut self, row: RowData) -> Result<(), SinkError> {
        // Keep commit order equal to arrival order.
        self.flush().await?;
        self.log_first_row(&row);

        let params = match self.bind(&row) {
            Ok(params) => params,
            Err(e) => {
                self.metrics.increment_failures(1);
                return Err(SinkError::RecordWrite {
                    column_index: Some(e.column_index()),
                    row: Box::new(row),
                    source: Box::new(e),
                });
            }
        };

        let result = match self.conn.execute_params(&self.statement.sql, &params).await {
            Ok(_) => self.conn.commit().await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                self.restore.on_row_committed(&row);
                self.metrics.increment_rows(1);
                Ok(())
            }
            Err(e) => {
                self.rollback().await;
                self.metrics.increment_failures(1);
                if e.is_connection_closed() {
                    error!(table = %self.table, error = %e, "Connection lost while writing row");
                    return Err(SinkError::ConnectionLost(e));
                }
                warn!(table = %self.table, row = %row, error = %e, "Row write rolled back");
                Err(SinkError::RecordWrite {
                    row: Box::new(row),
                    column_index: None,
                    source: Box::new(e),
                })
            }
        }
    }

    pub async fn write(&mut self, row: RowData) -> Result<(), SinkError> {
        self.log_first_row(&row);
        self.pending.push(row);
        if self.pending.is_full() {
            self.flush().await?;
        }
        Ok(())
    }

    pub async fn write_batch(&mut self, rows: Vec<RowData>) -> Result<(), SinkError> {
        if let Some(first) = rows.first() {
            self.log_first_row(first);
        }
        self.pending.extend(rows);
        self.flush().await?;
        Ok(())
    }

    /// Executes every pending row as one transaction. The pending batch is
    /// empty afterwards whether or not the flush succeeded.
    pub async fn flush(&mut self) -> Result<usize, SinkError> {
        if self.pending.is_empty() {
            return Ok(0);
        }

        let start = Instant::now();
        let rows = self.pending.take();
        let batch_size = rows.len();

        let bound: Result<Vec<Vec<Value>>, (usize, CoercionError)> = rows
            .iter()
            .enumerate()
            .map(|(i, row)| self.bind(row).map_err(|e| (i, e)))
            .collect();
        let params = match bound {
            Ok(params) => params,
            Err((i, e)) => {
                self.metrics.increment_failures(1);
                error!(
                    table = %self.table,
                    batch_size,
                    row = %rows[i],
                    error = %e,
                    "Batch discarded: row could not be bound"
                );
                return Err(batch_error(rows, Box::new(e)));
            }
        };

        let result = match self.conn.execute_batch(&self.statement.sql, &params).await {
            Ok(_) => self.conn.commit().await,
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            self.rollback().await;
            self.metrics.increment_failures(1);
            return Err(self.classify_batch_failure(rows, e));
        }

        for row in &rows {
            self.restore.on_row_committed(row);
        }
        self.metrics.increment_rows(batch_size as u64);
        self.metrics.increment_batches(1);

        let duration = start.elapsed();
        let rows_per_sec = batch_size as f64 / duration.as_secs_f64().max(f64::EPSILON);
        info!(
            table = %self.table,
            rows = batch_size,
            duration_ms = duration.as_millis(),
            rows_per_sec = %format!("{:.2}", rows_per_sec),
            "Batch committed"
        );

        Ok(batch_size)
    }

    fn classify_batch_failure(&self, rows: Vec<RowData>, e: DbError) -> SinkError {
        if e.is_connection_closed() {
            error!(
                table = %self.table,
                batch_size = rows.len(),
                error = %e,
                "Connection lost while flushing batch"
            );
            return SinkError::ConnectionLost(e);
        }

        let first_row = rows.first().map(RowData::to_json).unwrap_or_default();
        warn!(
            table = %self.table,
            batch_size = rows.len(),
            first_row = %first_row,
            error = %e,
            "Batch rolled back; pending rows discarded"
        );
        batch_error(rows, Box::new(e))
    }

    /// Flushes if a checkpoint is due and returns the cursor to persist.
    pub async fn snapshot(&mut self) -> Result<Option<RestoreCursor>, SinkError> {
        if !self.restore.is_enabled() {
            return Ok(None);
        }
        if self.restore.rows_in_interval() == 0 && self.pending.is_empty() {
            return Ok(None);
        }
        if !self.restore.is_ready() {
            debug!(
                table = %self.table,
                rows = self.restore.rows_in_interval(),
                pending = self.pending.len(),
                "Checkpoint not ready"
            );
            return Ok(None);
        }

        if let Err(e) = self.flush().await {
            error!(table = %self.table, error = %e, "Checkpoint flush failed");
            return Err(SinkError::CheckpointFlush {
                source: Box::new(e),
            });
        }

        let cursor = self.restore.take_cursor();
        if let Some(cursor) = &cursor {
            self.metrics.increment_checkpoints(1);
            info!(
                table = %self.table,
                value = %cursor.value,
                rows = cursor.rows_in_interval,
                total = cursor.rows_total,
                "Checkpoint cursor ready"
            );
        }
        Ok(cursor)
    }

    /// Flushes the remaining rows, then runs post statements and commits
    /// them when any are configured.
    pub async fn finish(&mut self) -> Result<(), SinkError> {
        self.flush().await?;
        if self.post_sql.is_empty() {
            return Ok(());
        }

        let mut result = Ok(());
        for sql in &self.post_sql {
            result = self.conn.execute(sql).await;
            if result.is_err() {
                break;
            }
        }
        if result.is_ok() {
            result = self.conn.commit().await;
        }

        if let Err(e) = result {
            self.rollback().await;
            self.metrics.increment_failures(1);
            if e.is_connection_closed() {
                return Err(SinkError::ConnectionLost(e));
            }
            return Err(SinkError::Finish {
                table: self.table.clone(),
                source: e,
            });
        }
        debug!(table = %self.table, statements = self.post_sql.len(), "Post statements committed");
        Ok(())
    }

    /// Drops buffered rows without committing them.
    pub async fn discard(&mut self) {
        let discarded = self.pending.len();
        self.pending.clear();
        if discarded > 0 {
            warn!(table = %self.table, rows = discarded, "Task is not running; pending rows discarded");
        }
        self.rollback().await;
    }

    pub async fn release(&mut self) {
        if let Err(e) = self.conn.close().await {
            warn!(table = %self.table, error = %e, "Failed to close connection");
        }
    }
}

fn batch_error(rows: Vec<RowData>, source: Box<dyn std::error::Error + Send + Sync>) -> SinkError {
    let batch_size = rows.len();
    let first_row = rows
        .into_iter()
        .next()
        .unwrap_or_else(|| RowData::new("", Vec::new()));
    SinkError::BatchWrite {
        batch_size,
        first_row: Box::new(first_row),
        source,
    }
}
