//! Topological ordering that tolerates cycles.

use std::collections::{btree_set, BTreeSet, HashMap};
use std::fmt;

use serde::Serialize;
use tracing::warn;

use super::graph::DependencyGraph;
use crate::core::schema::TableName;

/// A dependency cycle, as the chain of tables from the re-entered table back
/// to itself: `[a, b, a]` means `a` references `b` and `b` references `a`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Cycle(pub Vec<TableName>);

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(TableName::as_str).collect();
        f.write_str(&names.join(" -> "))
    }
}

/// Copy order for one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationPlan {
    /// Every discovered table exactly once, parents before children where possible.
    pub order: Vec<TableName>,
    /// Cycles broken to produce `order`.
    pub cycles: Vec<Cycle>,
}

impl MigrationPlan {
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn position(&self, table: &str) -> Option<usize> {
        self.order.iter().position(|t| t.as_str() == table)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Order `tables` so that every table comes after the tables it references.
///
/// Depth-first, post-order, on an explicit stack. Roots are taken in the order
/// of `tables`, parents in the graph's set order, so the result is
/// deterministic. Reaching a table that is still in progress means a cycle:
/// the edge is treated as broken, the cycle recorded, and the walk goes on.
pub fn topological_sort(tables: &[TableName], graph: &DependencyGraph) -> MigrationPlan {
    let no_parents = BTreeSet::new();
    let parents_of = |table: &TableName| graph.get(table).unwrap_or(&no_parents).iter();

    let mut marks: HashMap<&TableName, Mark> =
        tables.iter().map(|t| (t, Mark::Unvisited)).collect();
    let mut order = Vec::with_capacity(tables.len());
    let mut cycles = Vec::new();

    for root in tables {
        if marks.get(root) != Some(&Mark::Unvisited) {
            continue;
        }
        marks.insert(root, Mark::InProgress);
        let mut stack: Vec<(&TableName, btree_set::Iter<'_, TableName>)> =
            vec![(root, parents_of(root))];

        while let Some((node, parents)) = stack.last_mut() {
            match parents.next() {
                Some(parent) => match marks.get(parent).copied() {
                    Some(Mark::Unvisited) => {
                        marks.insert(parent, Mark::InProgress);
                        stack.push((parent, parents_of(parent)));
                    }
                    Some(Mark::InProgress) => {
                        let cycle = cycle_through(&stack, parent);
                        warn!("Dependency cycle detected: {} (edge ignored for ordering)", cycle);
                        cycles.push(cycle);
                    }
                    Some(Mark::Done) | None => {}
                },
                None => {
                    let done = *node;
                    marks.insert(done, Mark::Done);
                    order.push(done.clone());
                    stack.pop();
                }
            }
        }
    }

    MigrationPlan { order, cycles }
}

fn cycle_through(
    stack: &[(&TableName, btree_set::Iter<'_, TableName>)],
    reentered: &TableName,
) -> Cycle {
    let start = stack
        .iter()
        .position(|(table, _)| *table == reentered)
        .unwrap_or(0);
    let mut path: Vec<TableName> = stack[start..]
        .iter()
        .map(|(table, _)| (*table).clone())
        .collect();
    path.push(reentered.clone());
    Cycle(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::ForeignKeyEdge;
    use crate::plan::graph::build_graph;

    fn names(list: &[&str]) -> Vec<TableName> {
        list.iter().map(|t| TableName::from(*t)).collect()
    }

    fn edges(list: &[(&str, &str)]) -> Vec<ForeignKeyEdge> {
        list.iter()
            .enumerate()
            .map(|(i, (child, parent))| ForeignKeyEdge {
                child: (*child).into(),
                parent: (*parent).into(),
                constraint_name: format!("fk_{}", i),
                definition: String::new(),
            })
            .collect()
    }

    fn sort(tables: &[&str], deps: &[(&str, &str)]) -> MigrationPlan {
        let tables = names(tables);
        let graph = build_graph(&tables, &edges(deps));
        topological_sort(&tables, &graph)
    }

    fn assert_permutation(plan: &MigrationPlan, tables: &[&str]) {
        let mut got: Vec<&str> = plan.order.iter().map(TableName::as_str).collect();
        let mut want = tables.to_vec();
        got.sort();
        want.sort();
        assert_eq!(got, want);
    }

    #[test]
    fn test_parents_before_children() {
        let tables = ["order_items", "orders", "products", "customers", "categories"];
        let deps = [
            ("order_items", "orders"),
            ("order_items", "products"),
            ("orders", "customers"),
            ("products", "categories"),
        ];
        let plan = sort(&tables, &deps);

        assert_permutation(&plan, &tables);
        assert!(plan.cycles.is_empty());
        for (child, parent) in deps {
            assert!(
                plan.position(parent) < plan.position(child),
                "{} must precede {}",
                parent,
                child
            );
        }
    }

    #[test]
    fn test_deterministic_tie_breaking() {
        let plan = sort(&["c", "a", "b"], &[]);
        let order: Vec<&str> = plan.order.iter().map(TableName::as_str).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_two_table_cycle() {
        let plan = sort(&["a", "b"], &[("a", "b"), ("b", "a")]);

        assert_permutation(&plan, &["a", "b"]);
        assert_eq!(plan.cycles.len(), 1);
        assert_eq!(plan.cycles[0].to_string(), "a -> b -> a");
        let order: Vec<&str> = plan.order.iter().map(TableName::as_str).collect();
        assert_eq!(order, vec!["b", "a"]);
    }

    #[test]
    fn test_three_table_cycle_with_dependent() {
        let tables = ["x", "y", "z", "w"];
        let plan = sort(&tables, &[("x", "y"), ("y", "z"), ("z", "x"), ("w", "x")]);

        assert_permutation(&plan, &tables);
        assert_eq!(plan.cycles.len(), 1);
        assert_eq!(plan.cycles[0].0.len(), 4);
        assert!(plan.position("x") < plan.position("w"));
    }

    #[test]
    fn test_deep_chain_does_not_recurse() {
        let tables: Vec<String> = (0..10_000).map(|i| format!("t{:05}", i)).collect();
        let table_refs: Vec<&str> = tables.iter().map(String::as_str).collect();
        let deps: Vec<(&str, &str)> = table_refs.windows(2).map(|w| (w[0], w[1])).collect();

        let plan = sort(&table_refs, &deps);
        assert_eq!(plan.len(), 10_000);
        assert_eq!(plan.order[0].as_str(), "t09999");
        assert_eq!(plan.order[9_999].as_str(), "t00000");
    }

    #[test]
    fn test_empty_input() {
        let plan = sort(&[], &[]);
        assert!(plan.is_empty());
        assert!(plan.cycles.is_empty());
    }
}
