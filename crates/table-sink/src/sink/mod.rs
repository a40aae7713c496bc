use crate::error::SinkError;
use async_trait::async_trait;
use model::{checkpoint::cursor::RestoreCursor, records::row::RowData};

pub mod table;
pub mod writer;

/// A row sink driven by a streaming task and its checkpoint authority.
///
/// Calls on one instance are serialized; a sink is opened once and closed
/// once, after which every call fails with [`SinkError::Closed`].
#[async_trait]
pub trait OutputSink: Send + Sync {
    async fn open(&self, partition_index: usize, partition_count: usize) -> Result<(), SinkError>;

    /// Writes and commits exactly one row.
    async fn write_single(&self, row: RowData) -> Result<(), SinkError>;

    /// Buffers one row, flushing once the configured batch size is reached.
    async fn write(&self, row: RowData) -> Result<(), SinkError>;

    /// Buffers `rows` and flushes everything pending as one transaction.
    async fn write_batch(&self, rows: Vec<RowData>) -> Result<(), SinkError>;

    /// Returns the cursor the checkpoint authority should persist, or `None`
    /// when there is no new resumable position.
    async fn snapshot(&self) -> Result<Option<RestoreCursor>, SinkError>;

    async fn notify_checkpoint_complete(&self, checkpoint_id: i64) -> Result<(), SinkError>;

    async fn notify_checkpoint_aborted(&self, checkpoint_id: i64) -> Result<(), SinkError>;

    async fn close(&self) -> Result<(), SinkError>;
}
