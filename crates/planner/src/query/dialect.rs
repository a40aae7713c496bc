//! Defines the `Dialect` trait for database-specific SQL syntax.

use crate::query::{
    ast::{
        common::TableRef,
        expr::{Expr, FunctionCall, Ident},
    },
    ident,
};

/// How a dialect spells "insert, or update on key conflict".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertStyle {
    /// `INSERT ... ON CONFLICT (keys) DO UPDATE SET ...`
    OnConflict,
    /// `INSERT ... ON DUPLICATE KEY UPDATE ...`
    OnDuplicateKey,
}

pub trait Dialect: Send + Sync {
    /// Wraps an identifier (like a table or column name) in the correct
    /// quotation marks for the dialect.
    ///
    /// - PostgreSQL uses double quotes: `"my_column"`
    /// - MySQL uses backticks: `` `my_column` ``
    fn quote_identifier(&self, ident: &str) -> String;

    /// Returns the placeholder for a parameterized query.
    ///
    /// - PostgreSQL uses `$1`, `$2`, etc.
    /// - MySQL uses `?`
    fn get_placeholder(&self, index: usize) -> String;

    /// Returns the name of the dialect (e.g., "PostgreSQL", "MySQL").
    fn name(&self) -> String;

    /// Whether the store has a native `REPLACE INTO`.
    fn supports_replace(&self) -> bool;

    fn upsert_style(&self) -> UpsertStyle;

    /// Expression reading the incoming (rejected) value of `column` inside
    /// an upsert's update clause.
    fn incoming_column(&self, column: &str) -> Expr;

    /// Expression reading the value already stored in `column` inside an
    /// upsert's update clause.
    fn existing_column(&self, table: &TableRef, column: &str) -> Expr;
}

#[derive(Debug, Clone)]
pub struct Postgres;

impl Dialect for Postgres {
    fn quote_identifier(&self, ident: &str) -> String {
        format!(r#""{}""#, ident.replace('"', "\"\""))
    }

    fn get_placeholder(&self, index: usize) -> String {
        // PostgreSQL uses $1, $2, etc.
        format!("${}", index + 1)
    }

    fn name(&self) -> String {
        "PostgreSQL".into()
    }

    fn supports_replace(&self) -> bool {
        false
    }

    fn upsert_style(&self) -> UpsertStyle {
        UpsertStyle::OnConflict
    }

    fn incoming_column(&self, column: &str) -> Expr {
        Expr::Literal(format!("EXCLUDED.{}", self.quote_identifier(column)))
    }

    fn existing_column(&self, table: &TableRef, column: &str) -> Expr {
        Expr::Identifier(Ident {
            qualifier: Some(table.name.clone()),
            name: column.to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct MySql;

impl Dialect for MySql {
    fn quote_identifier(&self, ident: &str) -> String {
        format!("`{}`", ident.replace('`', "``"))
    }

    fn get_placeholder(&self, _index: usize) -> String {
        // MySQL uses ?
        "?".into()
    }

    fn name(&self) -> String {
        "MySQL".into()
    }

    fn supports_replace(&self) -> bool {
        true
    }

    fn upsert_style(&self) -> UpsertStyle {
        UpsertStyle::OnDuplicateKey
    }

    fn incoming_column(&self, column: &str) -> Expr {
        Expr::FunctionCall(FunctionCall {
            name: "VALUES".to_string(),
            args: vec![ident(column)],
        })
    }

    fn existing_column(&self, _table: &TableRef, column: &str) -> Expr {
        ident(column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier_escapes_quotes() {
        assert_eq!(Postgres.quote_identifier("na\"me"), r#""na""me""#);
        assert_eq!(MySql.quote_identifier("na`me"), "`na``me`");
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(Postgres.get_placeholder(0), "$1");
        assert_eq!(Postgres.get_placeholder(9), "$10");
        assert_eq!(MySql.get_placeholder(3), "?");
    }
}
