use crate::query::{
    ast::insert::{ConflictAction, Insert, InsertVerb, OnConflict},
    dialect::UpsertStyle,
    renderer::{Render, Renderer},
};

impl Render for Insert {
    fn render(&self, r: &mut Renderer) {
        // 1. INSERT INTO / REPLACE INTO table (...)
        match self.verb {
            InsertVerb::Insert => r.sql.push_str("INSERT INTO "),
            InsertVerb::Replace => r.sql.push_str("REPLACE INTO "),
        }
        r.render_table_ref(&self.table);
        r.sql.push_str(" (");
        r.push_quoted_list(&self.columns);
        r.sql.push(')');

        // 2. VALUES (...)
        r.sql.push_str(" VALUES (");
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                r.sql.push_str(", ");
            }
            value.render(r);
        }
        r.sql.push(')');

        // 3. Conflict handling
        if let Some(on_conflict) = &self.on_conflict {
            match r.dialect.upsert_style() {
                UpsertStyle::OnConflict => render_on_conflict(on_conflict, r),
                UpsertStyle::OnDuplicateKey => render_on_duplicate_key(on_conflict, r),
            }
        }
    }
}

fn render_on_conflict(on_conflict: &OnConflict, r: &mut Renderer) {
    if on_conflict.columns.is_empty() {
        return;
    }

    r.sql.push_str(" ON CONFLICT (");
    r.push_quoted_list(&on_conflict.columns);
    r.sql.push(')');

    match &on_conflict.action {
        ConflictAction::DoUpdate { assignments } if !assignments.is_empty() => {
            r.sql.push_str(" DO UPDATE SET ");
            render_assignments(on_conflict, r);
        }
        _ => r.sql.push_str(" DO NOTHING"),
    }
}

fn render_on_duplicate_key(on_conflict: &OnConflict, r: &mut Renderer) {
    match &on_conflict.action {
        ConflictAction::DoUpdate { assignments } if !assignments.is_empty() => {
            r.sql.push_str(" ON DUPLICATE KEY UPDATE ");
            render_assignments(on_conflict, r);
        }
        _ => {
            // MySQL has no DO NOTHING; a self-assignment keeps the stored row.
            if let Some(first) = on_conflict.columns.first() {
                let quoted = r.dialect.quote_identifier(first);
                r.sql.push_str(" ON DUPLICATE KEY UPDATE ");
                r.sql.push_str(&format!("{quoted} = {quoted}"));
            }
        }
    }
}

fn render_assignments(on_conflict: &OnConflict, r: &mut Renderer) {
    let ConflictAction::DoUpdate { assignments } = &on_conflict.action else {
        return;
    };

    for (i, assignment) in assignments.iter().enumerate() {
        if i > 0 {
            r.sql.push_str(", ");
        }
        r.sql
            .push_str(&r.dialect.quote_identifier(&assignment.column));
        r.sql.push_str(" = ");
        assignment.value.render(r);
    }
}
