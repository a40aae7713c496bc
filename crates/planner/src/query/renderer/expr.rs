use crate::query::{
    ast::expr::{Expr, FunctionCall, Ident},
    renderer::{Render, Renderer},
};

impl Render for Expr {
    fn render(&self, r: &mut Renderer) {
        match self {
            Expr::Identifier(ident) => ident.render(r),
            Expr::Param(column) => r.add_param(column),
            Expr::Literal(sql) => r.sql.push_str(sql),
            Expr::FunctionCall(func) => func.render(r),
        }
    }
}

impl Render for Ident {
    fn render(&self, r: &mut Renderer) {
        if let Some(qualifier) = &self.qualifier {
            r.sql.push_str(&r.dialect.quote_identifier(qualifier));
            r.sql.push('.');
        }
        r.sql.push_str(&r.dialect.quote_identifier(&self.name));
    }
}

impl Render for FunctionCall {
    fn render(&self, r: &mut Renderer) {
        r.sql.push_str(&self.name);
        r.sql.push('(');
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                r.sql.push_str(", ");
            }
            arg.render(r);
        }
        r.sql.push(')');
    }
}
