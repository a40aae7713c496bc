use serde::{Deserialize, Serialize};

/// A target column: its name and, when known, the store's declared type name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(default, rename = "type")]
    pub type_name: Option<String>,
}

impl ColumnSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            type_name: None,
        }
    }

    pub fn typed(name: &str, type_name: &str) -> Self {
        Self {
            name: name.to_string(),
            type_name: Some(type_name.to_string()),
        }
    }

    pub fn names(columns: &[ColumnSpec]) -> Vec<String> {
        columns.iter().map(|c| c.name.clone()).collect()
    }
}
