use model::records::row::RowData;

/// Rows buffered since the last flush, owned by the flush engine.
#[derive(Debug)]
pub struct PendingBatch {
    rows: Vec<RowData>,
    capacity: usize,
}

impl PendingBatch {
    pub fn new(capacity: usize) -> Self {
        Self {
            rows: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, row: RowData) {
        self.rows.push(row);
    }

    pub fn extend(&mut self, rows: impl IntoIterator<Item = RowData>) {
        self.rows.extend(rows);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// True once the batch holds at least `capacity` rows.
    pub fn is_full(&self) -> bool {
        self.rows.len() >= self.capacity
    }

    pub fn first(&self) -> Option<&RowData> {
        self.rows.first()
    }

    /// Empties the batch and hands its rows to the caller.
    pub fn take(&mut self) -> Vec<RowData> {
        std::mem::replace(&mut self.rows, Vec::with_capacity(self.capacity))
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::core::value::Value;

    fn row(id: i64) -> RowData {
        RowData::from_pairs("t", [("id", Value::Int(id))])
    }

    #[test]
    fn test_fills_and_drains() {
        let mut batch = PendingBatch::new(2);
        assert!(batch.is_empty());

        batch.push(row(1));
        assert!(!batch.is_full());
        batch.extend([row(2), row(3)]);
        assert!(batch.is_full());
        assert_eq!(batch.first(), Some(&row(1)));

        let rows = batch.take();
        assert_eq!(rows.len(), 3);
        assert!(batch.is_empty());

        batch.push(row(4));
        batch.clear();
        assert_eq!(batch.len(), 0);
    }
}
