//! Compiles the single parameterized write statement a sink binds every row
//! against.

use crate::query::{
    ast::{
        common::TableRef,
        expr::{Expr, FunctionCall},
        insert::ConflictAssignment,
    },
    builder::insert::InsertBuilder,
    dialect::Dialect,
    renderer::{Render, Renderer},
};
use std::{fmt, str::FromStr};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Unknown write mode: {0}")]
    InvalidMode(String),

    #[error("Write mode {mode} is not supported by {dialect}")]
    UnsupportedMode { mode: WriteMode, dialect: String },

    #[error("Write mode {0} requires at least one update key column")]
    MissingUpdateKeys(WriteMode),

    #[error("No write columns configured for table '{0}'")]
    NoColumns(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteMode {
    Insert,
    Replace,
    /// Upsert keyed on the update-key columns.
    Update,
}

impl WriteMode {
    pub fn template(&self) -> Box<dyn StatementTemplate> {
        match self {
            WriteMode::Insert => Box::new(InsertTemplate),
            WriteMode::Replace => Box::new(ReplaceTemplate),
            WriteMode::Update => Box::new(UpsertTemplate),
        }
    }
}

impl FromStr for WriteMode {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "insert" => Ok(WriteMode::Insert),
            "replace" => Ok(WriteMode::Replace),
            "update" | "upsert" => Ok(WriteMode::Update),
            _ => Err(TemplateError::InvalidMode(s.to_string())),
        }
    }
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteMode::Insert => write!(f, "INSERT"),
            WriteMode::Replace => write!(f, "REPLACE"),
            WriteMode::Update => write!(f, "UPDATE"),
        }
    }
}

/// Everything a template needs to know about the target.
#[derive(Debug, Clone, Default)]
pub struct WriteTarget {
    pub table: TableRef,
    pub columns: Vec<String>,
    pub update_keys: Vec<String>,
    /// When false, an upsert keeps the stored value of a non-key column
    /// whenever the incoming value is NULL.
    pub all_replace: bool,
}

/// The statement text plus the write column bound to each placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledStatement {
    pub mode: WriteMode,
    pub sql: String,
    pub params: Vec<String>,
}

impl CompiledStatement {
    /// Maps each placeholder to the position of its column in `columns`.
    /// Returns `None` if a placeholder names a column that is not written.
    pub fn param_positions(&self, columns: &[String]) -> Option<Vec<usize>> {
        self.params
            .iter()
            .map(|param| {
                columns
                    .iter()
                    .position(|c| c.eq_ignore_ascii_case(param))
            })
            .collect()
    }
}

pub trait StatementTemplate: Send + Sync {
    fn mode(&self) -> WriteMode;

    fn compile(
        &self,
        dialect: &dyn Dialect,
        target: &WriteTarget,
    ) -> Result<CompiledStatement, TemplateError>;
}

pub struct InsertTemplate;

impl StatementTemplate for InsertTemplate {
    fn mode(&self) -> WriteMode {
        WriteMode::Insert
    }

    fn compile(
        &self,
        dialect: &dyn Dialect,
        target: &WriteTarget,
    ) -> Result<CompiledStatement, TemplateError> {
        ensure_columns(target)?;
        let ast = InsertBuilder::new(target.table.clone())
            .param_columns(&target.columns)
            .build();
        Ok(render(self.mode(), dialect, &ast))
    }
}

pub struct ReplaceTemplate;

impl StatementTemplate for ReplaceTemplate {
    fn mode(&self) -> WriteMode {
        WriteMode::Replace
    }

    fn compile(
        &self,
        dialect: &dyn Dialect,
        target: &WriteTarget,
    ) -> Result<CompiledStatement, TemplateError> {
        if !dialect.supports_replace() {
            return Err(TemplateError::UnsupportedMode {
                mode: self.mode(),
                dialect: dialect.name(),
            });
        }
        ensure_columns(target)?;
        let ast = InsertBuilder::new(target.table.clone())
            .replace()
            .param_columns(&target.columns)
            .build();
        Ok(render(self.mode(), dialect, &ast))
    }
}

pub struct UpsertTemplate;

impl StatementTemplate for UpsertTemplate {
    fn mode(&self) -> WriteMode {
        WriteMode::Update
    }

    fn compile(
        &self,
        dialect: &dyn Dialect,
        target: &WriteTarget,
    ) -> Result<CompiledStatement, TemplateError> {
        ensure_columns(target)?;
        if target.update_keys.is_empty() {
            return Err(TemplateError::MissingUpdateKeys(self.mode()));
        }

        // Keys take the spelling of the write column they name.
        let keys: Vec<String> = target
            .update_keys
            .iter()
            .map(|key| {
                target
                    .columns
                    .iter()
                    .find(|col| col.eq_ignore_ascii_case(key))
                    .unwrap_or(key)
                    .clone()
            })
            .collect();

        let assignments: Vec<ConflictAssignment> = target
            .columns
            .iter()
            .filter(|col| !keys.iter().any(|key| key == *col))
            .map(|col| ConflictAssignment {
                column: col.clone(),
                value: upsert_value(dialect, target, col),
            })
            .collect();

        let builder = InsertBuilder::new(target.table.clone()).param_columns(&target.columns);
        // Every written column is a key: nothing left to update.
        let ast = if assignments.is_empty() {
            builder.on_conflict_do_nothing(&keys).build()
        } else {
            builder.on_conflict_update(&keys, assignments).build()
        };
        Ok(render(self.mode(), dialect, &ast))
    }
}

/// Holds the template for one write mode; built before any connection work
/// so a bad mode fails fast.
pub struct StatementCompiler {
    template: Box<dyn StatementTemplate>,
}

impl StatementCompiler {
    pub fn new(mode: WriteMode) -> Self {
        Self {
            template: mode.template(),
        }
    }

    pub fn from_mode_str(mode: &str) -> Result<Self, TemplateError> {
        Ok(Self::new(mode.parse()?))
    }

    pub fn mode(&self) -> WriteMode {
        self.template.mode()
    }

    pub fn compile(
        &self,
        dialect: &dyn Dialect,
        target: &WriteTarget,
    ) -> Result<CompiledStatement, TemplateError> {
        self.template.compile(dialect, target)
    }
}

fn upsert_value(dialect: &dyn Dialect, target: &WriteTarget, column: &str) -> Expr {
    let incoming = dialect.incoming_column(column);
    if target.all_replace {
        return incoming;
    }

    Expr::FunctionCall(FunctionCall {
        name: "COALESCE".to_string(),
        args: vec![incoming, dialect.existing_column(&target.table, column)],
    })
}

fn ensure_columns(target: &WriteTarget) -> Result<(), TemplateError> {
    if target.columns.is_empty() {
        return Err(TemplateError::NoColumns(target.table.name.clone()));
    }
    Ok(())
}

fn render<T: Render>(mode: WriteMode, dialect: &dyn Dialect, ast: &T) -> CompiledStatement {
    let mut renderer = Renderer::new(dialect);
    ast.render(&mut renderer);
    let (sql, params) = renderer.finish();
    CompiledStatement { mode, sql, params }
}
