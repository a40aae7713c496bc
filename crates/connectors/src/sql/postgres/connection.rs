use crate::sql::{
    base::{
        connection::{Credentials, DatabaseKind, SqlConnection},
        error::{ConnectorError, DbError},
        metadata::{column::ColumnSpec, index::IndexColumn},
    },
    postgres::{params::PgParamStore, utils::connect_client},
};
use async_trait::async_trait;
use model::core::value::Value;
use planner::query::ast::common::TableRef;
use std::collections::HashMap;
use tokio_postgres::{Client, Statement};
use tracing::debug;

const QUERY_TABLE_COLUMNS_SQL: &str = include_str!("sql/table_columns.sql");
const QUERY_UNIQUE_INDEXES_SQL: &str = include_str!("sql/unique_indexes.sql");

/// A Postgres session. With auto-commit off, the first statement after a
/// commit or rollback opens a new transaction.
pub struct PgConnection {
    client: Client,
    auto_commit: bool,
    in_transaction: bool,
    statements: HashMap<String, Statement>,
}

impl PgConnection {
    pub async fn connect(url: &str, credentials: &Credentials) -> Result<Self, ConnectorError> {
        let client = connect_client(url, credentials).await?;
        Ok(Self::from_client(client))
    }

    pub fn from_client(client: Client) -> Self {
        Self {
            client,
            auto_commit: true,
            in_transaction: false,
            statements: HashMap::new(),
        }
    }

    async fn ensure_transaction(&mut self) -> Result<(), DbError> {
        if !self.auto_commit && !self.in_transaction {
            self.client.batch_execute("BEGIN").await?;
            self.in_transaction = true;
        }
        Ok(())
    }

    async fn prepared(&mut self, sql: &str) -> Result<Statement, DbError> {
        if let Some(statement) = self.statements.get(sql) {
            return Ok(statement.clone());
        }
        let statement = self.client.prepare(sql).await?;
        self.statements.insert(sql.to_string(), statement.clone());
        Ok(statement)
    }

    async fn end_transaction(&mut self, command: &str) -> Result<(), DbError> {
        if !self.in_transaction {
            return Ok(());
        }
        // Ended either way: a failed COMMIT leaves no open transaction.
        self.in_transaction = false;
        self.client.batch_execute(command).await?;
        Ok(())
    }
}

#[async_trait]
impl SqlConnection for PgConnection {
    fn kind(&self) -> DatabaseKind {
        DatabaseKind::Postgres
    }

    async fn set_auto_commit(&mut self, enabled: bool) -> Result<(), DbError> {
        if enabled && self.in_transaction {
            self.end_transaction("COMMIT").await?;
        }
        self.auto_commit = enabled;
        Ok(())
    }

    async fn execute(&mut self, sql: &str) -> Result<(), DbError> {
        self.ensure_transaction().await?;
        self.client.batch_execute(sql).await?;
        Ok(())
    }

    async fn execute_params(&mut self, sql: &str, params: &[Value]) -> Result<u64, DbError> {
        self.ensure_transaction().await?;
        let statement = self.prepared(sql).await?;
        let bindings = PgParamStore::from_values(params);
        let affected = self.client.execute(&statement, &bindings.as_refs()).await?;
        Ok(affected)
    }

    async fn execute_batch(&mut self, sql: &str, rows: &[Vec<Value>]) -> Result<u64, DbError> {
        if rows.is_empty() {
            return Ok(0);
        }

        self.ensure_transaction().await?;
        let statement = self.prepared(sql).await?;
        let mut affected = 0;
        for row in rows {
            let bindings = PgParamStore::from_values(row);
            affected += self.client.execute(&statement, &bindings.as_refs()).await?;
        }

        debug!(rows = rows.len(), affected, "Postgres batch executed");
        Ok(affected)
    }

    async fn commit(&mut self) -> Result<(), DbError> {
        self.end_transaction("COMMIT").await
    }

    async fn rollback(&mut self) -> Result<(), DbError> {
        self.end_transaction("ROLLBACK").await
    }

    async fn close(&mut self) -> Result<(), DbError> {
        if self.in_transaction && !self.client.is_closed() {
            self.end_transaction("ROLLBACK").await?;
        }
        self.statements.clear();
        Ok(())
    }

    async fn table_columns(&mut self, table: &TableRef) -> Result<Vec<ColumnSpec>, DbError> {
        let rows = self
            .client
            .query(QUERY_TABLE_COLUMNS_SQL, &[&table.name, &table.schema])
            .await?;

        rows.iter()
            .map(|row| -> Result<ColumnSpec, DbError> {
                Ok(ColumnSpec {
                    name: row.try_get("column_name")?,
                    type_name: row.try_get("data_type")?,
                })
            })
            .collect()
    }

    async fn unique_index_columns(
        &mut self,
        table: &TableRef,
    ) -> Result<Vec<IndexColumn>, DbError> {
        let rows = self
            .client
            .query(QUERY_UNIQUE_INDEXES_SQL, &[&table.name, &table.schema])
            .await?;

        rows.iter()
            .map(|row| -> Result<IndexColumn, DbError> {
                Ok(IndexColumn {
                    index_name: row.try_get("index_name")?,
                    is_primary: row.try_get("is_primary")?,
                    column: row.try_get("column_name")?,
                    position: row.try_get("position")?,
                })
            })
            .collect()
    }
}
