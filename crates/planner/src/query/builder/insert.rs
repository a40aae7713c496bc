use crate::query::{
    ast::{
        common::TableRef,
        insert::{ConflictAction, ConflictAssignment, Insert, InsertVerb, OnConflict},
    },
    param,
};

#[derive(Debug, Clone)]
pub struct InsertBuilder {
    ast: Insert,
}

impl InsertBuilder {
    pub fn new(table: TableRef) -> Self {
        Self {
            ast: Insert {
                table,
                ..Default::default()
            },
        }
    }

    pub fn replace(mut self) -> Self {
        self.ast.verb = InsertVerb::Replace;
        self
    }

    /// Sets the target columns and binds one placeholder per column.
    pub fn param_columns(mut self, columns: &[String]) -> Self {
        self.ast.columns = columns.to_vec();
        self.ast.values = columns.iter().map(|c| param(c)).collect();
        self
    }

    pub fn on_conflict_update(
        mut self,
        keys: &[String],
        assignments: Vec<ConflictAssignment>,
    ) -> Self {
        self.ast.on_conflict = Some(OnConflict {
            columns: keys.to_vec(),
            action: ConflictAction::DoUpdate { assignments },
        });
        self
    }

    pub fn on_conflict_do_nothing(mut self, keys: &[String]) -> Self {
        self.ast.on_conflict = Some(OnConflict {
            columns: keys.to_vec(),
            action: ConflictAction::DoNothing,
        });
        self
    }

    pub fn build(self) -> Insert {
        self.ast
    }
}
