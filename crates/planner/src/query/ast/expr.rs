//! Defines the AST for SQL expressions used by write statements.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// A column or table identifier, e.g., `users` or `users.id`.
    Identifier(Ident),

    /// A bind placeholder for the named write column.
    Param(String),

    /// Raw SQL emitted verbatim, e.g. `EXCLUDED."name"`.
    Literal(String),

    /// A function call, e.g., `COALESCE(a, b)`.
    FunctionCall(FunctionCall),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub qualifier: Option<String>, // e.g., the 'users' in 'users.id'
    pub name: String,              // e.g., the 'id' in 'users.id'
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<Expr>,
}
