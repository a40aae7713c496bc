use crate::sql::base::{
    connection::SqlConnection,
    error::DbError,
    metadata::{column::ColumnSpec, index::UniqueKeys},
};
use planner::query::ast::common::TableRef;
use tracing::debug;

/// Reads table shape from the store catalog. Never touches table data.
pub struct SchemaResolver<'a> {
    conn: &'a mut dyn SqlConnection,
}

impl<'a> SchemaResolver<'a> {
    pub fn new(conn: &'a mut dyn SqlConnection) -> Self {
        Self { conn }
    }

    /// Every column of `table` with its declared type, in ordinal order.
    pub async fn resolve_full_columns(&mut self, table: &TableRef) -> Result<Vec<ColumnSpec>, DbError> {
        let columns = self.conn.table_columns(table).await?;
        if columns.is_empty() {
            return Err(DbError::Metadata(format!(
                "table '{}' not found or has no columns",
                display_table(table)
            )));
        }

        debug!(table = %display_table(table), columns = columns.len(), "Resolved table columns");
        Ok(columns)
    }

    /// Unique and primary key constraints of `table`, keyed by index name.
    pub async fn resolve_unique_keys(&mut self, table: &TableRef) -> Result<UniqueKeys, DbError> {
        let rows = self.conn.unique_index_columns(table).await?;
        let keys = UniqueKeys::from_columns(rows);

        debug!(
            table = %display_table(table),
            indexes = keys.len(),
            primary = ?keys.primary,
            "Resolved unique keys"
        );
        Ok(keys)
    }
}

pub fn display_table(table: &TableRef) -> String {
    match &table.schema {
        Some(schema) => format!("{schema}.{}", table.name),
        None => table.name.clone(),
    }
}
