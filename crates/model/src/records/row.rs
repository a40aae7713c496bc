use crate::core::value::{FieldValue, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single typed row headed for the target table.
///
/// Fields are positional: field `i` is bound to write column `i`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RowData {
    pub entity: String,
    pub field_values: Vec<FieldValue>,
}

impl RowData {
    pub fn new(entity: &str, field_values: Vec<FieldValue>) -> Self {
        RowData {
            entity: entity.to_string(),
            field_values,
        }
    }

    /// Builds a row from `(name, value)` pairs.
    pub fn from_pairs<I, S>(entity: &str, pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: AsRef<str>,
    {
        let field_values = pairs
            .into_iter()
            .map(|(name, value)| FieldValue::new(name.as_ref(), value))
            .collect();
        RowData::new(entity, field_values)
    }

    pub fn arity(&self) -> usize {
        self.field_values.len()
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.field_values
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(field))
    }

    pub fn get_value(&self, field: &str) -> Value {
        self.get(field)
            .map(|f| f.value.clone())
            .unwrap_or(Value::Null)
    }

    /// Positional access; out-of-range positions read as NULL.
    pub fn value_at(&self, index: usize) -> &Value {
        const NULL: &Value = &Value::Null;
        self.field_values
            .get(index)
            .map(|f| &f.value)
            .unwrap_or(NULL)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"))
    }
}

impl fmt::Display for RowData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.entity)?;
        for (i, field) in self.field_values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", field.name, field.value)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_and_named_access() {
        let row = RowData::from_pairs(
            "users",
            [("id", Value::Int(1)), ("Name", Value::String("a".into()))],
        );

        assert_eq!(row.arity(), 2);
        assert_eq!(row.value_at(0), &Value::Int(1));
        assert_eq!(row.value_at(5), &Value::Null);
        assert_eq!(row.get_value("name"), Value::String("a".into()));
        assert_eq!(row.get_value("missing"), Value::Null);
    }

    #[test]
    fn test_display_renders_fields() {
        let row = RowData::from_pairs("users", [("id", Value::Int(7)), ("name", Value::Null)]);
        assert_eq!(row.to_string(), "users(id=7, name=NULL)");
    }
}
