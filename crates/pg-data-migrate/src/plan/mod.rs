//! Migration planning: dependency graph and copy order.

pub mod graph;
pub mod sort;

pub use graph::{build_graph, DependencyGraph};
pub use sort::{topological_sort, Cycle, MigrationPlan};

use tracing::info;

use crate::introspect::SchemaSnapshot;

/// Build the copy order for an introspected schema.
pub fn plan(snapshot: &SchemaSnapshot) -> MigrationPlan {
    let graph = build_graph(&snapshot.tables, &snapshot.foreign_keys);
    let plan = topological_sort(&snapshot.tables, &graph);
    info!(
        "Planned {} tables ({} cycle(s) broken)",
        plan.len(),
        plan.cycles.len()
    );
    plan
}
