//! Schema introspection of the source store.

use serde::Serialize;
use tracing::{debug, info};

use crate::core::schema::{ForeignKeyEdge, TableName};
use crate::core::traits::SourceStore;
use crate::error::{MigrateError, Result};

/// Tables and foreign keys of the source working schema.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchemaSnapshot {
    /// Base tables, ordered by name.
    pub tables: Vec<TableName>,
    /// Foreign keys whose child is a working-schema table, self-references excluded.
    pub foreign_keys: Vec<ForeignKeyEdge>,
}

/// Read the table list and foreign-key edges from the source catalog.
///
/// Any catalog failure is returned as [`MigrateError::Introspection`]; without
/// a complete picture of the schema no safe order can be built.
pub async fn introspect(source: &dyn SourceStore) -> Result<SchemaSnapshot> {
    let mut tables = source
        .list_tables()
        .await
        .map_err(|e| MigrateError::Introspection(format!("listing tables: {}", e)))?;
    tables.sort();
    tables.dedup();

    let foreign_keys: Vec<ForeignKeyEdge> = source
        .list_foreign_keys()
        .await
        .map_err(|e| MigrateError::Introspection(format!("listing foreign keys: {}", e)))?
        .into_iter()
        .filter(|edge| {
            if edge.is_self_reference() {
                debug!(
                    "Ignoring self-reference {} on {} for ordering",
                    edge.constraint_name, edge.child
                );
                false
            } else {
                true
            }
        })
        .collect();

    info!(
        "Found {} tables and {} foreign key relationships",
        tables.len(),
        foreign_keys.len()
    );

    Ok(SchemaSnapshot {
        tables,
        foreign_keys,
    })
}
