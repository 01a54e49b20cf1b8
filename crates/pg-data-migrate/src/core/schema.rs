//! Catalog metadata types: table names, foreign-key edges and sequence bindings.
//!
//! Everything here is computed fresh from the catalogs on every run and never
//! persisted.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Name of a table.
///
/// Tables of the working schema carry their bare name. Tables of any other
/// schema are rendered `schema.table`, so a cross-schema reference can never
/// be mistaken for a discovered table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableName(String);

impl TableName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TableName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for TableName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Borrow<str> for TableName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A foreign-key constraint as a child → parent edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyEdge {
    /// Table holding the constraint (the referencing side).
    pub child: TableName,

    /// Referenced table.
    pub parent: TableName,

    /// Constraint name, unique per child table.
    pub constraint_name: String,

    /// Clause as returned by `pg_get_constraintdef`, e.g.
    /// `FOREIGN KEY (customer_id) REFERENCES customers(id) ON DELETE CASCADE`.
    pub definition: String,
}

impl ForeignKeyEdge {
    pub fn is_self_reference(&self) -> bool {
        self.child == self.parent
    }
}

/// A sequence owned by (or backing the identity of) a table column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceBinding {
    /// Sequence name within the working schema.
    pub sequence_name: String,

    /// Table whose column draws from the sequence.
    pub owner_table: TableName,

    /// Column whose maximum drives the restart value.
    pub owner_column: String,
}

/// What the target catalog says about one table before rows are written to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetTable {
    /// `GENERATED ALWAYS AS (...) STORED` columns. The server computes them,
    /// so they are never written.
    pub generated_columns: Vec<String>,

    /// A non-partial unique index or primary key exists. Without one,
    /// `ON CONFLICT DO NOTHING` has nothing to conflict on.
    pub has_unique_key: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name_ordering_is_lexicographic() {
        let mut names = vec![
            TableName::from("orders"),
            TableName::from("customers"),
            TableName::from("order_items"),
        ];
        names.sort();
        let rendered: Vec<&str> = names.iter().map(TableName::as_str).collect();
        assert_eq!(rendered, vec!["customers", "order_items", "orders"]);
    }

    #[test]
    fn test_table_name_serializes_as_plain_string() {
        let json = serde_json::to_string(&TableName::from("orders")).unwrap();
        assert_eq!(json, "\"orders\"");
    }

    #[test]
    fn test_self_reference_detection() {
        let edge = ForeignKeyEdge {
            child: "employees".into(),
            parent: "employees".into(),
            constraint_name: "employees_manager_id_fkey".into(),
            definition: "FOREIGN KEY (manager_id) REFERENCES employees(id)".into(),
        };
        assert!(edge.is_self_reference());
    }
}
