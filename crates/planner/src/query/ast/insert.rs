//! Defines the AST for single-row INSERT / REPLACE statements.

use crate::query::ast::{common::TableRef, expr::Expr};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InsertVerb {
    #[default]
    Insert,
    /// Store-native `REPLACE INTO`.
    Replace,
}

/// Represents a complete single-row write statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Insert {
    pub verb: InsertVerb,
    pub table: TableRef,
    pub columns: Vec<String>,
    /// One expression per column, normally a bind placeholder.
    pub values: Vec<Expr>,
    /// Optional conflict handling clause (upsert).
    pub on_conflict: Option<OnConflict>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OnConflict {
    pub columns: Vec<String>,
    pub action: ConflictAction,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConflictAction {
    DoNothing,
    DoUpdate {
        assignments: Vec<ConflictAssignment>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConflictAssignment {
    pub column: String,
    pub value: Expr,
}
