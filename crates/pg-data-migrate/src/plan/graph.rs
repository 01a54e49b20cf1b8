//! Dependency graph: which tables must be populated before which.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::core::schema::{ForeignKeyEdge, TableName};

/// Child table → the set of parent tables it references.
///
/// Every discovered table has an entry, possibly empty.
pub type DependencyGraph = BTreeMap<TableName, BTreeSet<TableName>>;

/// Build the graph from the discovered tables and foreign-key edges.
///
/// Self-references and edges touching a table outside `tables` (for example
/// a parent in another schema) do not constrain the order and are dropped.
/// Several constraints between the same pair collapse into one edge.
pub fn build_graph(tables: &[TableName], edges: &[ForeignKeyEdge]) -> DependencyGraph {
    let mut graph: DependencyGraph = tables
        .iter()
        .map(|t| (t.clone(), BTreeSet::new()))
        .collect();

    for edge in edges {
        if edge.is_self_reference() {
            continue;
        }
        if !graph.contains_key(&edge.parent) {
            debug!(
                "Ignoring {} for ordering: parent {} is not a migrated table",
                edge.constraint_name, edge.parent
            );
            continue;
        }
        match graph.get_mut(&edge.child) {
            Some(parents) => {
                parents.insert(edge.parent.clone());
            }
            None => debug!(
                "Ignoring {} for ordering: child {} is not a migrated table",
                edge.constraint_name, edge.child
            ),
        }
    }

    graph
}
