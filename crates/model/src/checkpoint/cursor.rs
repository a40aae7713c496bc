use crate::core::value::Value;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Resumable position handed to the checkpoint authority.
///
/// `value` is the restore-column value of the last committed row. The
/// authority persists the cursor; on restart the source resumes after it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RestoreCursor {
    pub value: Value,
    /// Rows committed since the previous cursor was emitted.
    pub rows_in_interval: u64,
    /// Rows committed since the sink was opened.
    pub rows_total: u64,
    pub taken_at: DateTime<Utc>,
}

impl RestoreCursor {
    pub fn new(value: Value, rows_in_interval: u64, rows_total: u64) -> Self {
        Self {
            value,
            rows_in_interval,
            rows_total,
            taken_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_serializes_for_the_authority() {
        let cursor = RestoreCursor::new(Value::Int(42), 10, 30);
        let json = serde_json::to_string(&cursor).unwrap();
        let back: RestoreCursor = serde_json::from_str(&json).unwrap();

        assert_eq!(back, cursor);
        assert_eq!(back.value, Value::Int(42));
    }
}
