//! Defines the core rendering trait and context for converting AST to SQL.

use crate::query::{ast::common::TableRef, dialect::Dialect};

pub mod expr;
pub mod insert;

/// A trait for any AST node that can be rendered into a SQL string.
pub trait Render {
    fn render(&self, renderer: &mut Renderer);
}

/// A context that holds the state during the rendering process.
///
/// It accumulates the SQL string and the ordered list of columns bound to
/// each placeholder, and provides access to the dialect for syntax details.
pub struct Renderer<'a> {
    pub sql: String,
    pub params: Vec<String>,
    pub dialect: &'a dyn Dialect,
}

impl<'a> Renderer<'a> {
    pub fn new(dialect: &'a dyn Dialect) -> Self {
        Self {
            sql: String::new(),
            params: Vec::new(),
            dialect,
        }
    }

    /// Consumes the renderer and returns the final SQL string and the
    /// column bound to each placeholder, in placeholder order.
    pub fn finish(self) -> (String, Vec<String>) {
        (self.sql, self.params)
    }

    pub fn add_param(&mut self, column: &str) {
        self.params.push(column.to_string());
        let placeholder = self.dialect.get_placeholder(self.params.len() - 1);
        self.sql.push_str(&placeholder);
    }

    pub fn render_table_ref(&mut self, table: &TableRef) {
        if let Some(schema) = &table.schema {
            self.sql.push_str(&self.dialect.quote_identifier(schema));
            self.sql.push('.');
        }
        self.sql.push_str(&self.dialect.quote_identifier(&table.name));
    }

    pub fn push_quoted_list(&mut self, names: &[String]) {
        let quoted: Vec<String> = names
            .iter()
            .map(|c| self.dialect.quote_identifier(c))
            .collect();
        self.sql.push_str(&quoted.join(", "));
    }
}
