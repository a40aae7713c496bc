use crate::sql::{
    base::{
        connection::{Credentials, DatabaseKind, SqlConnection},
        error::{ConnectorError, DbError},
        metadata::{column::ColumnSpec, index::IndexColumn},
    },
    mysql::params::MySqlParamStore,
};
use async_trait::async_trait;
use model::core::value::Value;
use mysql_async::{Conn, Opts, OptsBuilder, prelude::Queryable};
use planner::query::ast::common::TableRef;
use tracing::debug;

const QUERY_TABLE_COLUMNS_SQL: &str = include_str!("sql/table_columns.sql");
const QUERY_UNIQUE_INDEXES_SQL: &str = include_str!("sql/unique_indexes.sql");
const PRIMARY_INDEX_NAME: &str = "PRIMARY";

/// A MySQL session. Auto-commit is a server-side session setting, so
/// transactions span statements naturally once it is off.
pub struct MySqlConnection {
    conn: Option<Conn>,
}

impl MySqlConnection {
    pub async fn connect(url: &str, credentials: &Credentials) -> Result<Self, ConnectorError> {
        let opts = Opts::from_url(url).map_err(|e| ConnectorError::InvalidUrl(e.to_string()))?;
        let mut builder = OptsBuilder::from_opts(opts);
        if let Some(user) = &credentials.username {
            builder = builder.user(Some(user));
        }
        if let Some(password) = &credentials.password {
            builder = builder.pass(Some(password));
        }

        let conn = Conn::new(builder).await?;
        Ok(Self { conn: Some(conn) })
    }

    fn conn(&mut self) -> Result<&mut Conn, DbError> {
        self.conn
            .as_mut()
            .ok_or_else(|| DbError::ConnectionClosed("MySQL connection already closed".into()))
    }
}

#[async_trait]
impl SqlConnection for MySqlConnection {
    fn kind(&self) -> DatabaseKind {
        DatabaseKind::MySql
    }

    async fn set_auto_commit(&mut self, enabled: bool) -> Result<(), DbError> {
        let sql = if enabled {
            "SET autocommit = 1"
        } else {
            "SET autocommit = 0"
        };
        self.conn()?.query_drop(sql).await?;
        Ok(())
    }

    async fn execute(&mut self, sql: &str) -> Result<(), DbError> {
        self.conn()?.query_drop(sql).await?;
        Ok(())
    }

    async fn execute_params(&mut self, sql: &str, params: &[Value]) -> Result<u64, DbError> {
        let bindings = MySqlParamStore::from_values(params);
        let conn = self.conn()?;
        conn.exec_drop(sql, bindings.params()).await?;
        Ok(conn.affected_rows())
    }

    async fn execute_batch(&mut self, sql: &str, rows: &[Vec<Value>]) -> Result<u64, DbError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let conn = self.conn()?;
        let mut affected = 0;
        for row in rows {
            let bindings = MySqlParamStore::from_values(row);
            conn.exec_drop(sql, bindings.params()).await?;
            affected += conn.affected_rows();
        }

        debug!(rows = rows.len(), affected, "MySQL batch executed");
        Ok(affected)
    }

    async fn commit(&mut self) -> Result<(), DbError> {
        self.conn()?.query_drop("COMMIT").await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DbError> {
        self.conn()?.query_drop("ROLLBACK").await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DbError> {
        if let Some(conn) = self.conn.take() {
            conn.disconnect().await?;
        }
        Ok(())
    }

    async fn table_columns(&mut self, table: &TableRef) -> Result<Vec<ColumnSpec>, DbError> {
        let rows: Vec<(String, Option<String>)> = self
            .conn()?
            .exec(
                QUERY_TABLE_COLUMNS_SQL,
                (table.name.clone(), table.schema.clone()),
            )
            .await?;

        Ok(rows
            .into_iter()
            .map(|(name, type_name)| ColumnSpec { name, type_name })
            .collect())
    }

    async fn unique_index_columns(
        &mut self,
        table: &TableRef,
    ) -> Result<Vec<IndexColumn>, DbError> {
        let rows: Vec<(String, Option<String>, i64)> = self
            .conn()?
            .exec(
                QUERY_UNIQUE_INDEXES_SQL,
                (table.name.clone(), table.schema.clone()),
            )
            .await?;

        Ok(rows
            .into_iter()
            .map(|(index_name, column, position)| IndexColumn {
                is_primary: index_name.eq_ignore_ascii_case(PRIMARY_INDEX_NAME),
                index_name,
                column,
                position,
            })
            .collect())
    }
}
