use std::collections::BTreeMap;

/// One column of a unique index as reported by the store catalog.
///
/// `column` is `None` for expression entries that do not map to a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexColumn {
    pub index_name: String,
    pub is_primary: bool,
    pub column: Option<String>,
    pub position: i64,
}

/// Unique and primary key constraints of a table, keyed by index name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniqueKeys {
    pub by_name: BTreeMap<String, Vec<String>>,
    pub primary: Option<String>,
}

impl UniqueKeys {
    /// Groups catalog rows into ordered column lists.
    ///
    /// An index is dropped when it has no columns or any entry is not a plain
    /// column.
    pub fn from_columns(mut rows: Vec<IndexColumn>) -> Self {
        rows.sort_by(|a, b| {
            a.index_name
                .cmp(&b.index_name)
                .then(a.position.cmp(&b.position))
        });

        let mut grouped: BTreeMap<String, (bool, Vec<Option<String>>)> = BTreeMap::new();
        for row in rows {
            let entry = grouped
                .entry(row.index_name)
                .or_insert((row.is_primary, Vec::new()));
            entry.0 |= row.is_primary;
            entry.1.push(row.column);
        }

        let mut keys = UniqueKeys::default();
        for (name, (is_primary, columns)) in grouped {
            if columns.is_empty() || columns.iter().any(Option::is_none) {
                continue;
            }
            if is_primary && keys.primary.is_none() {
                keys.primary = Some(name.clone());
            }
            keys.by_name
                .insert(name, columns.into_iter().flatten().collect());
        }
        keys
    }

    pub fn get(&self, index_name: &str) -> Option<&[String]> {
        self.by_name.get(index_name).map(Vec::as_slice)
    }

    /// The key an upsert should conflict on: the primary key when present,
    /// otherwise the first unique index by name.
    pub fn preferred(&self) -> Option<&[String]> {
        self.primary
            .as_deref()
            .and_then(|name| self.get(name))
            .or_else(|| self.by_name.values().next().map(Vec::as_slice))
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(index: &str, primary: bool, column: Option<&str>, position: i64) -> IndexColumn {
        IndexColumn {
            index_name: index.to_string(),
            is_primary: primary,
            column: column.map(str::to_string),
            position,
        }
    }

    #[test]
    fn test_groups_and_orders_columns() {
        let keys = UniqueKeys::from_columns(vec![
            col("uk_email", false, Some("tenant"), 2),
            col("uk_email", false, Some("email"), 1),
            col("users_pkey", true, Some("id"), 1),
        ]);

        assert_eq!(keys.len(), 2);
        assert_eq!(
            keys.get("uk_email"),
            Some(&["email".to_string(), "tenant".to_string()][..])
        );
        assert_eq!(keys.preferred(), Some(&["id".to_string()][..]));
    }

    #[test]
    fn test_drops_expression_indexes() {
        let keys = UniqueKeys::from_columns(vec![
            col("uk_lower_email", false, None, 1),
            col("uk_name", false, Some("name"), 1),
        ]);

        assert_eq!(keys.len(), 1);
        assert!(keys.get("uk_lower_email").is_none());
        // No primary key: first unique index by name wins.
        assert_eq!(keys.preferred(), Some(&["name".to_string()][..]));
    }

    #[test]
    fn test_drops_partial_expression_indexes() {
        let keys = UniqueKeys::from_columns(vec![
            col("uk_tenant_lower_email", false, Some("tenant"), 1),
            col("uk_tenant_lower_email", false, None, 2),
            col("users_pkey", true, Some("id"), 1),
        ]);

        assert_eq!(keys.len(), 1);
        assert!(keys.get("uk_tenant_lower_email").is_none());
        assert_eq!(keys.preferred(), Some(&["id".to_string()][..]));
    }

    #[test]
    fn test_empty_catalog() {
        let keys = UniqueKeys::from_columns(Vec::new());
        assert!(keys.is_empty());
        assert_eq!(keys.preferred(), None);
    }
}
