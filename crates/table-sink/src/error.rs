use connectors::sql::base::error::DbError;
use model::records::row::RowData;
use planner::query::template::TemplateError;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Invalid sink configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Write mode {mode} is not supported by {dialect}")]
    UnsupportedMode { mode: String, dialect: String },

    #[error("Schema discovery failed for table '{table}': {source}")]
    SchemaDiscovery {
        table: String,
        #[source]
        source: DbError,
    },

    #[error("Failed to open sink for table '{table}': {source}")]
    Open {
        table: String,
        #[source]
        source: BoxError,
    },

    #[error("Connection lost: {0}")]
    ConnectionLost(#[source] DbError),

    #[error("Failed to write row {row}{}: {source}", column_suffix(.column_index))]
    RecordWrite {
        row: Box<RowData>,
        column_index: Option<usize>,
        #[source]
        source: BoxError,
    },

    #[error("Failed to write batch of {batch_size} rows (first row {first_row}): {source}")]
    BatchWrite {
        batch_size: usize,
        first_row: Box<RowData>,
        #[source]
        source: BoxError,
    },

    #[error("Checkpoint flush failed: {source}")]
    CheckpointFlush {
        #[source]
        source: BoxError,
    },

    #[error("Failed to finish writes to table '{table}': {source}")]
    Finish {
        table: String,
        #[source]
        source: DbError,
    },

    #[error("Sink is already open")]
    AlreadyOpen,

    #[error("Sink is not open")]
    NotOpen,

    #[error("Sink is closed")]
    Closed,
}

impl SinkError {
    /// Fatal errors end the sink's useful life; the caller should fail the
    /// task instead of feeding more rows.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            SinkError::RecordWrite { .. } | SinkError::BatchWrite { .. }
        )
    }

    pub(crate) fn open(table: &str, source: impl Into<BoxError>) -> Self {
        SinkError::Open {
            table: table.to_string(),
            source: source.into(),
        }
    }
}

impl From<TemplateError> for SinkError {
    fn from(err: TemplateError) -> Self {
        match err {
            TemplateError::UnsupportedMode { mode, dialect } => SinkError::UnsupportedMode {
                mode: mode.to_string(),
                dialect,
            },
            other => SinkError::InvalidConfiguration(other.to_string()),
        }
    }
}

fn column_suffix(column_index: &Option<usize>) -> String {
    match column_index {
        Some(index) => format!(" at column {index}"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::core::value::Value;
    use planner::query::template::WriteMode;

    #[test]
    fn test_record_write_message_names_row_and_column() {
        let row = RowData::from_pairs("users", [("id", Value::Int(7))]);
        let err = SinkError::RecordWrite {
            row: Box::new(row),
            column_index: Some(1),
            source: "bad date".into(),
        };

        assert_eq!(
            err.to_string(),
            "Failed to write row users(id=7) at column 1: bad date"
        );
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_template_errors_map_to_kinds() {
        let err: SinkError = TemplateError::UnsupportedMode {
            mode: WriteMode::Replace,
            dialect: "PostgreSQL".to_string(),
        }
        .into();
        assert!(matches!(err, SinkError::UnsupportedMode { .. }));

        let err: SinkError = TemplateError::InvalidMode("merge".into()).into();
        assert!(matches!(err, SinkError::InvalidConfiguration(_)));
        assert!(err.is_fatal());
    }
}
