use super::{OutputSink, writer::ActiveSink};
use crate::{
    batch::PendingBatch,
    config::SinkConfig,
    error::SinkError,
    metrics::SinkMetrics,
    restore::RestoreTracker,
    task::TaskStateProvider,
};
use async_trait::async_trait;
use connectors::sql::base::{
    coercion::{FieldCoercer, TypeVocabulary},
    connection::{ConnectionFactory, SqlConnection},
    metadata::column::ColumnSpec,
    schema::{SchemaResolver, display_table},
};
use model::{checkpoint::cursor::RestoreCursor, records::row::RowData};
use planner::query::template::{CompiledStatement, StatementCompiler, WriteMode, WriteTarget};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

enum SinkState {
    Created,
    Ready(Box<ActiveSink>),
    Closed,
}

impl SinkState {
    fn active(&mut self) -> Result<&mut ActiveSink, SinkError> {
        match self {
            SinkState::Ready(active) => Ok(active),
            SinkState::Created => Err(SinkError::NotOpen),
            SinkState::Closed => Err(SinkError::Closed),
        }
    }
}

/// What open resolves before the first row arrives.
struct WritePlan {
    statement: CompiledStatement,
    positions: Vec<usize>,
    coercer: FieldCoercer,
    restore: RestoreTracker,
}

/// Writes rows into one relational table over a single connection.
pub struct TableSink {
    config: SinkConfig,
    compiler: StatementCompiler,
    factory: Arc<dyn ConnectionFactory>,
    task_state: Arc<dyn TaskStateProvider>,
    vocabulary: Option<TypeVocabulary>,
    metrics: SinkMetrics,
    state: Mutex<SinkState>,
}

impl TableSink {
    /// Validates `config` and checks the write mode against the configured
    /// dialect. No connection is made until [`OutputSink::open`].
    pub fn new(
        config: SinkConfig,
        factory: Arc<dyn ConnectionFactory>,
        task_state: Arc<dyn TaskStateProvider>,
    ) -> Result<Self, SinkError> {
        let mode = config.validate()?;
        let dialect = config.kind.dialect();
        if mode == WriteMode::Replace && !dialect.supports_replace() {
            return Err(SinkError::UnsupportedMode {
                mode: mode.to_string(),
                dialect: dialect.name(),
            });
        }

        Ok(Self {
            config,
            compiler: StatementCompiler::new(mode),
            factory,
            task_state,
            vocabulary: None,
            metrics: SinkMetrics::new(),
            state: Mutex::new(SinkState::Created),
        })
    }

    /// Overrides the type vocabulary used by field coercion.
    pub fn with_vocabulary(mut self, vocabulary: TypeVocabulary) -> Self {
        self.vocabulary = Some(vocabulary);
        self
    }

    pub fn mode(&self) -> WriteMode {
        self.compiler.mode()
    }

    pub fn metrics(&self) -> SinkMetrics {
        self.metrics.clone()
    }

    fn table_name(&self) -> String {
        display_table(&self.config.table_ref())
    }

    async fn prepare(&self, conn: &mut dyn SqlConnection) -> Result<WritePlan, SinkError> {
        let table = self.table_name();

        conn.set_auto_commit(false)
            .await
            .map_err(|e| SinkError::open(&table, e))?;

        if !self.config.pre_sql.is_empty() {
            for sql in &self.config.pre_sql {
                debug!(table = %table, sql = %sql, "Running pre statement");
                conn.execute(sql)
                    .await
                    .map_err(|e| SinkError::open(&table, e))?;
            }
            conn.commit()
                .await
                .map_err(|e| SinkError::open(&table, e))?;
        }

        let columns = self.resolve_write_columns(conn).await?;
        let names = ColumnSpec::names(&columns);
        let update_keys = self.resolve_update_keys(conn).await?;

        let target = WriteTarget {
            table: self.config.table_ref(),
            columns: names.clone(),
            update_keys,
            all_replace: self.config.all_replace,
        };
        let statement = self.compiler.compile(conn.dialect(), &target)?;
        let positions = statement.param_positions(&names).ok_or_else(|| {
            SinkError::InvalidConfiguration(format!(
                "statement for '{table}' binds a column that is not written"
            ))
        })?;

        let restore = self.restore_tracker(&names)?;
        let vocabulary = self
            .vocabulary
            .clone()
            .unwrap_or_else(|| TypeVocabulary::for_kind(conn.kind()));

        Ok(WritePlan {
            statement,
            positions,
            coercer: FieldCoercer::new(vocabulary, &columns),
            restore,
        })
    }

    /// Write columns with their declared types. Catalog columns are read
    /// only when the configuration leaves a name or a type unknown.
    async fn resolve_write_columns(
        &self,
        conn: &mut dyn SqlConnection,
    ) -> Result<Vec<ColumnSpec>, SinkError> {
        let configured = &self.config.columns;
        let needs_discovery = configured.is_empty() || configured.iter().any(|c| c.type_name.is_none());

        let full = match &self.config.full_columns {
            Some(full) => full.clone(),
            None if needs_discovery => {
                let table_ref = self.config.table_ref();
                SchemaResolver::new(conn)
                    .resolve_full_columns(&table_ref)
                    .await
                    .map_err(|source| SinkError::SchemaDiscovery {
                        table: display_table(&table_ref),
                        source,
                    })?
            }
            None => configured.clone(),
        };

        if configured.is_empty() {
            return Ok(full);
        }

        Ok(configured
            .iter()
            .map(|column| match &column.type_name {
                Some(_) => column.clone(),
                None => ColumnSpec {
                    name: column.name.clone(),
                    type_name: full
                        .iter()
                        .find(|c| c.name.eq_ignore_ascii_case(&column.name))
                        .and_then(|c| c.type_name.clone()),
                },
            })
            .collect())
    }

    async fn resolve_update_keys(
        &self,
        conn: &mut dyn SqlConnection,
    ) -> Result<Vec<String>, SinkError> {
        let mode = self.compiler.mode();
        if mode == WriteMode::Insert {
            return Ok(Vec::new());
        }
        if let Some(keys) = &self.config.update_keys {
            return Ok(keys.clone());
        }

        let table_ref = self.config.table_ref();
        let table = display_table(&table_ref);
        let discovered = SchemaResolver::new(conn)
            .resolve_unique_keys(&table_ref)
            .await;

        match (mode, discovered) {
            (WriteMode::Update, Ok(keys)) => match keys.preferred() {
                Some(preferred) => {
                    info!(table = %table, keys = ?preferred, "Using discovered update keys");
                    Ok(preferred.to_vec())
                }
                None => Err(SinkError::InvalidConfiguration(format!(
                    "update mode needs a unique key, but table '{table}' has none"
                ))),
            },
            (WriteMode::Update, Err(source)) => Err(SinkError::SchemaDiscovery { table, source }),
            // REPLACE resolves conflicts itself; the keys are only reported.
            (_, Ok(keys)) => {
                debug!(table = %table, keys = ?keys.preferred(), "Replace conflicts on unique keys");
                Ok(Vec::new())
            }
            (_, Err(e)) => {
                warn!(table = %table, error = %e, "Could not read unique keys");
                Ok(Vec::new())
            }
        }
    }

    fn restore_tracker(&self, columns: &[String]) -> Result<RestoreTracker, SinkError> {
        let restore = &self.config.restore;
        if !restore.enabled {
            return Ok(RestoreTracker::disabled());
        }

        let column = restore.column.as_deref().unwrap_or_default();
        let index = columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .ok_or_else(|| {
                SinkError::InvalidConfiguration(format!(
                    "restore column '{column}' is not a write column"
                ))
            })?;
        Ok(RestoreTracker::new(restore, index))
    }
}

#[async_trait]
impl OutputSink for TableSink {
    async fn open(&self, partition_index: usize, partition_count: usize) -> Result<(), SinkError> {
        let mut state = self.state.lock().await;
        match *state {
            SinkState::Created => {}
            SinkState::Ready(_) => return Err(SinkError::AlreadyOpen),
            SinkState::Closed => return Err(SinkError::Closed),
        }

        let table = self.table_name();
        info!(
            table = %table,
            kind = %self.config.kind,
            mode = %self.compiler.mode(),
            partition_index,
            partition_count,
            "Opening table sink"
        );

        let mut conn = self
            .factory
            .connect(self.config.kind, &self.config.url, &self.config.credentials)
            .await
            .map_err(|e| SinkError::open(&table, e))?;

        let plan = match self.prepare(conn.as_mut()).await {
            Ok(plan) => plan,
            Err(e) => {
                error!(table = %table, error = %e, "Failed to open table sink");
                if let Err(close_err) = conn.close().await {
                    warn!(table = %table, error = %close_err, "Failed to close connection");
                }
                return Err(e);
            }
        };

        info!(
            table = %table,
            sql = %plan.statement.sql,
            params = ?plan.statement.params,
            "Statement compiled"
        );

        *state = SinkState::Ready(Box::new(ActiveSink {
            conn,
            table,
            statement: plan.statement,
            positions: plan.positions,
            coercer: plan.coercer,
            pending: PendingBatch::new(self.config.batch_size),
            restore: plan.restore,
            post_sql: self.config.post_sql.clone(),
            metrics: self.metrics.clone(),
            first_row_logged: false,
        }));
        Ok(())
    }

    async fn write_single(&self, row: RowData) -> Result<(), SinkError> {
        let mut state = self.state.lock().await;
        state.active()?.write_single(row).await
    }

    async fn write(&self, row: RowData) -> Result<(), SinkError> {
        let mut state = self.state.lock().await;
        state.active()?.write(row).await
    }

    async fn write_batch(&self, rows: Vec<RowData>) -> Result<(), SinkError> {
        let mut state = self.state.lock().await;
        state.active()?.write_batch(rows).await
    }

    async fn snapshot(&self) -> Result<Option<RestoreCursor>, SinkError> {
        let mut state = self.state.lock().await;
        state.active()?.snapshot().await
    }

    async fn notify_checkpoint_complete(&self, checkpoint_id: i64) -> Result<(), SinkError> {
        let mut state = self.state.lock().await;
        state.active()?.restore.complete(checkpoint_id);
        Ok(())
    }

    async fn notify_checkpoint_aborted(&self, checkpoint_id: i64) -> Result<(), SinkError> {
        let mut state = self.state.lock().await;
        state.active()?.restore.abort(checkpoint_id);
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        let mut state = self.state.lock().await;
        let mut active = match std::mem::replace(&mut *state, SinkState::Closed) {
            SinkState::Ready(active) => active,
            SinkState::Created | SinkState::Closed => return Ok(()),
        };

        let task_state = self.task_state.state();
        let result = if self.task_state.is_running() {
            active.finish().await
        } else {
            info!(table = %active.table, state = ?task_state, "Skipping commit on close");
            active.discard().await;
            Ok(())
        };
        active.release().await;

        match &result {
            Ok(()) => info!(table = %active.table, metrics = ?self.metrics.snapshot(), "Table sink closed"),
            Err(e) => error!(table = %active.table, error = %e, "Table sink closed with error"),
        }
        result
    }
}
