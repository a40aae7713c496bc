use crate::error::SinkError;
use connectors::sql::base::{
    connection::{Credentials, DatabaseKind},
    metadata::column::ColumnSpec,
};
use planner::query::{ast::common::TableRef, template::WriteMode};
use serde::Deserialize;
use std::{collections::HashSet, time::Duration};

const DEFAULT_BATCH_SIZE: usize = 1024;
const DEFAULT_MAX_ROWS_PER_CHECKPOINT: u64 = 10_000;

/// Configuration of one table sink, already loaded by the caller.
#[derive(Clone, Debug, Deserialize)]
pub struct SinkConfig {
    pub kind: DatabaseKind,

    pub url: String,

    #[serde(flatten)]
    pub credentials: Credentials,

    pub table: String,

    /// Optional schema qualifier for `table`.
    #[serde(default)]
    pub schema: Option<String>,

    /// `insert`, `replace` or `update`; validated when the sink is built.
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Columns written by the sink, in row field order. Empty means every
    /// column of the table.
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,

    /// Every column of the table. Discovered at open when absent.
    #[serde(default)]
    pub full_columns: Option<Vec<ColumnSpec>>,

    /// Conflict keys for `update`. Discovered at open when absent.
    #[serde(default)]
    pub update_keys: Option<Vec<String>>,

    /// When false, an upsert never overwrites a stored value with NULL.
    #[serde(default)]
    pub all_replace: bool,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Statements run once after connecting.
    #[serde(default)]
    pub pre_sql: Vec<String>,

    /// Statements run once before a clean close commits.
    #[serde(default)]
    pub post_sql: Vec<String>,

    #[serde(default)]
    pub restore: RestoreConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RestoreConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Write column whose value marks resumable progress.
    #[serde(default)]
    pub column: Option<String>,

    #[serde(default = "default_max_rows_per_checkpoint")]
    pub max_rows_per_checkpoint: u64,

    /// Wall-clock bound between checkpoints, in milliseconds.
    #[serde(default)]
    pub checkpoint_interval_ms: Option<u64>,
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            column: None,
            max_rows_per_checkpoint: DEFAULT_MAX_ROWS_PER_CHECKPOINT,
            checkpoint_interval_ms: None,
        }
    }
}

impl RestoreConfig {
    pub fn on_column(column: &str) -> Self {
        Self {
            enabled: true,
            column: Some(column.to_string()),
            ..Default::default()
        }
    }

    pub fn with_max_rows(mut self, max_rows: u64) -> Self {
        self.max_rows_per_checkpoint = max_rows;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.checkpoint_interval_ms = Some(interval.as_millis() as u64);
        self
    }

    pub fn checkpoint_interval(&self) -> Option<Duration> {
        self.checkpoint_interval_ms.map(Duration::from_millis)
    }
}

fn default_mode() -> String {
    "insert".to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_max_rows_per_checkpoint() -> u64 {
    DEFAULT_MAX_ROWS_PER_CHECKPOINT
}

impl SinkConfig {
    pub fn new(kind: DatabaseKind, url: &str, table: &str) -> Self {
        Self {
            kind,
            url: url.to_string(),
            credentials: Credentials::default(),
            table: table.to_string(),
            schema: None,
            mode: default_mode(),
            columns: Vec::new(),
            full_columns: None,
            update_keys: None,
            all_replace: false,
            batch_size: DEFAULT_BATCH_SIZE,
            pre_sql: Vec::new(),
            post_sql: Vec::new(),
            restore: RestoreConfig::default(),
        }
    }

    pub fn with_mode(mut self, mode: &str) -> Self {
        self.mode = mode.to_string();
        self
    }

    pub fn with_schema(mut self, schema: &str) -> Self {
        self.schema = Some(schema.to_string());
        self
    }

    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.credentials = Credentials::new(Some(username.to_string()), Some(password.to_string()));
        self
    }

    pub fn with_columns(mut self, columns: Vec<ColumnSpec>) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_full_columns(mut self, columns: Vec<ColumnSpec>) -> Self {
        self.full_columns = Some(columns);
        self
    }

    pub fn with_update_keys(mut self, keys: &[&str]) -> Self {
        self.update_keys = Some(keys.iter().map(|k| k.to_string()).collect());
        self
    }

    pub fn with_all_replace(mut self, all_replace: bool) -> Self {
        self.all_replace = all_replace;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_pre_sql(mut self, statements: &[&str]) -> Self {
        self.pre_sql = statements.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_post_sql(mut self, statements: &[&str]) -> Self {
        self.post_sql = statements.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_restore(mut self, restore: RestoreConfig) -> Self {
        self.restore = restore;
        self
    }

    pub fn write_mode(&self) -> Result<WriteMode, SinkError> {
        Ok(self.mode.parse::<WriteMode>()?)
    }

    pub fn table_ref(&self) -> TableRef {
        TableRef {
            schema: self.schema.clone(),
            name: self.table.clone(),
        }
    }

    /// Checks everything that can be checked without a connection.
    pub fn validate(&self) -> Result<WriteMode, SinkError> {
        let mode = self.write_mode()?;

        if self.url.trim().is_empty() {
            return Err(SinkError::InvalidConfiguration("url is required".into()));
        }
        if self.table.trim().is_empty() {
            return Err(SinkError::InvalidConfiguration("table is required".into()));
        }
        if self.batch_size == 0 {
            return Err(SinkError::InvalidConfiguration(
                "batch_size must be greater than zero".into(),
            ));
        }

        let mut seen = HashSet::new();
        for column in &self.columns {
            if column.name.trim().is_empty() {
                return Err(SinkError::InvalidConfiguration(
                    "column names must not be empty".into(),
                ));
            }
            if !seen.insert(column.name.to_ascii_lowercase()) {
                return Err(SinkError::InvalidConfiguration(format!(
                    "column '{}' is listed twice",
                    column.name
                )));
            }
        }

        if let Some(keys) = &self.update_keys
            && mode == WriteMode::Update
            && keys.is_empty()
        {
            return Err(SinkError::InvalidConfiguration(
                "update mode requires at least one update key".into(),
            ));
        }

        if self.restore.enabled {
            if self.restore.column.is_none() {
                return Err(SinkError::InvalidConfiguration(
                    "restore is enabled but no restore column is set".into(),
                ));
            }
            if self.restore.max_rows_per_checkpoint == 0 {
                return Err(SinkError::InvalidConfiguration(
                    "max_rows_per_checkpoint must be greater than zero".into(),
                ));
            }
        }

        Ok(mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_with_defaults() {
        let config: SinkConfig = serde_json::from_str(
            r#"{
                "kind": "postgresql",
                "url": "postgres://localhost/app",
                "username": "writer",
                "password": "secret",
                "table": "users",
                "columns": [{"name": "id", "type": "INT"}, {"name": "name"}],
                "restore": {"enabled": true, "column": "id"}
            }"#,
        )
        .unwrap();

        assert_eq!(config.kind, DatabaseKind::Postgres);
        assert_eq!(config.credentials.username.as_deref(), Some("writer"));
        assert_eq!(config.mode, "insert");
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.columns[0], ColumnSpec::typed("id", "INT"));
        assert_eq!(config.columns[1], ColumnSpec::new("name"));
        assert_eq!(config.restore.max_rows_per_checkpoint, DEFAULT_MAX_ROWS_PER_CHECKPOINT);
        assert_eq!(config.validate().unwrap(), WriteMode::Insert);
    }

    #[test]
    fn test_validate_rejects_bad_mode() {
        let config = SinkConfig::new(DatabaseKind::MySql, "mysql://localhost/app", "users")
            .with_mode("merge");
        assert!(matches!(
            config.validate(),
            Err(SinkError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_validate_rejects_incomplete_settings() {
        let base = SinkConfig::new(DatabaseKind::MySql, "mysql://localhost/app", "users");

        assert!(base.clone().with_batch_size(0).validate().is_err());
        assert!(
            base.clone()
                .with_mode("update")
                .with_update_keys(&[])
                .validate()
                .is_err()
        );
        assert!(
            base.clone()
                .with_columns(vec![ColumnSpec::new("id"), ColumnSpec::new("ID")])
                .validate()
                .is_err()
        );

        let mut restore = RestoreConfig::on_column("id");
        restore.column = None;
        assert!(base.clone().with_restore(restore).validate().is_err());

        // Keys may be discovered later.
        assert!(base.with_mode("update").validate().is_ok());
    }
}
