use crate::query::ast::expr::{Expr, Ident};

pub mod ast;
pub mod builder;
pub mod dialect;
pub mod macros;
pub mod renderer;
pub mod template;

pub fn ident(name: &str) -> Expr {
    Expr::Identifier(Ident {
        qualifier: None,
        name: name.to_string(),
    })
}

pub fn param(column: &str) -> Expr {
    Expr::Param(column.to_string())
}
