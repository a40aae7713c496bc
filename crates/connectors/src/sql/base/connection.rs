use crate::sql::base::{
    error::{ConnectorError, DbError},
    metadata::{column::ColumnSpec, index::IndexColumn},
};
use async_trait::async_trait;
use model::core::value::Value;
use planner::query::{
    ast::common::TableRef,
    dialect::{self, Dialect},
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    #[serde(alias = "postgresql", alias = "pg")]
    Postgres,
    #[serde(alias = "mariadb")]
    MySql,
}

impl DatabaseKind {
    pub fn dialect(&self) -> &'static dyn Dialect {
        match self {
            DatabaseKind::Postgres => &dialect::Postgres,
            DatabaseKind::MySql => &dialect::MySql,
        }
    }
}

impl FromStr for DatabaseKind {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(DatabaseKind::Postgres),
            "mysql" | "mariadb" => Ok(DatabaseKind::MySql),
            other => Err(ConnectorError::UnsupportedKind(other.to_string())),
        }
    }
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseKind::Postgres => write!(f, "postgres"),
            DatabaseKind::MySql => write!(f, "mysql"),
        }
    }
}

/// Login overrides applied on top of whatever the URL carries.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Credentials {
    pub fn new(username: Option<String>, password: Option<String>) -> Self {
        Self { username, password }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// A single session against the target store.
///
/// Implementations keep auto-commit off once [`SqlConnection::set_auto_commit`]
/// disables it: every statement joins the open transaction until
/// [`SqlConnection::commit`] or [`SqlConnection::rollback`] ends it.
#[async_trait]
pub trait SqlConnection: Send {
    fn kind(&self) -> DatabaseKind;

    fn dialect(&self) -> &'static dyn Dialect {
        self.kind().dialect()
    }

    async fn set_auto_commit(&mut self, enabled: bool) -> Result<(), DbError>;

    /// Runs a statement without parameters.
    async fn execute(&mut self, sql: &str) -> Result<(), DbError>;

    /// Runs one parameterized statement and returns the affected row count.
    async fn execute_params(&mut self, sql: &str, params: &[Value]) -> Result<u64, DbError>;

    /// Runs the same statement once per parameter set. Stops at the first
    /// failure; the caller decides whether to roll back.
    async fn execute_batch(&mut self, sql: &str, rows: &[Vec<Value>]) -> Result<u64, DbError>;

    async fn commit(&mut self) -> Result<(), DbError>;

    async fn rollback(&mut self) -> Result<(), DbError>;

    async fn close(&mut self) -> Result<(), DbError>;

    /// Columns of `table` ordered by ordinal position.
    async fn table_columns(&mut self, table: &TableRef) -> Result<Vec<ColumnSpec>, DbError>;

    /// Catalog rows for every unique or primary index of `table`.
    async fn unique_index_columns(&mut self, table: &TableRef)
    -> Result<Vec<IndexColumn>, DbError>;
}

/// Opens sessions for a sink.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn connect(
        &self,
        kind: DatabaseKind,
        url: &str,
        credentials: &Credentials,
    ) -> Result<Box<dyn SqlConnection>, ConnectorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("PostgreSQL".parse::<DatabaseKind>().unwrap(), DatabaseKind::Postgres);
        assert_eq!("mariadb".parse::<DatabaseKind>().unwrap(), DatabaseKind::MySql);
        assert!("oracle".parse::<DatabaseKind>().is_err());
        assert_eq!(DatabaseKind::MySql.dialect().name(), "MySQL");
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials::new(Some("app".into()), Some("s3cret".into()));
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("app"));
        assert!(!rendered.contains("s3cret"));
    }
}
