//! Defines common, reusable AST nodes for building SQL statements.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableRef {
    pub schema: Option<String>,
    pub name: String,
}
