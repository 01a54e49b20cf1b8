//! Source side of [`PgStore`]: catalog reads and full-table scans.

use async_trait::async_trait;
use tracing::debug;

use super::{catalog, PgStore};
use crate::core::schema::{ForeignKeyEdge, TableName};
use crate::core::traits::SourceStore;
use crate::core::value::{CellValue, RowSet};
use crate::error::{MigrateError, Result};

#[async_trait]
impl SourceStore for PgStore {
    async fn list_tables(&self) -> Result<Vec<TableName>> {
        let client = self.client("listing tables").await?;
        let rows = client.query(catalog::LIST_TABLES, &[&self.schema]).await?;
        let tables: Vec<TableName> = rows
            .iter()
            .map(|row| TableName::new(row.get::<_, String>(0)))
            .collect();
        debug!("{}: {} base tables in {}", self.endpoint, tables.len(), self.schema);
        Ok(tables)
    }

    async fn list_foreign_keys(&self) -> Result<Vec<ForeignKeyEdge>> {
        load_foreign_keys(self).await
    }

    async fn read_rows(&self, table: &TableName) -> Result<RowSet> {
        let client = self.client("reading rows").await?;
        let sql = catalog::select_all_sql(&self.schema, table.as_str())?;
        let rows = client.query(&sql, &[]).await?;

        let Some(first) = rows.first() else {
            return Ok(RowSet::default());
        };
        let columns: Vec<String> = first
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let mut values = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut cells = Vec::with_capacity(columns.len());
            for idx in 0..columns.len() {
                let cell: CellValue = row.try_get(idx).map_err(|e| {
                    MigrateError::transfer(
                        table.as_str(),
                        format!("reading column {}: {}", columns[idx], e),
                    )
                })?;
                cells.push(cell);
            }
            values.push(cells);
        }

        debug!("{}: read {} rows from {}", self.endpoint, values.len(), table);
        Ok(RowSet::new(columns, values))
    }
}

/// Shared by source introspection and target constraint capture.
pub(super) async fn load_foreign_keys(store: &PgStore) -> Result<Vec<ForeignKeyEdge>> {
    let client = store.client("listing foreign keys").await?;
    let rows = client
        .query(catalog::LIST_FOREIGN_KEYS, &[&store.schema])
        .await?;

    let edges: Vec<ForeignKeyEdge> = rows
        .iter()
        .map(|row| ForeignKeyEdge {
            constraint_name: row.get(0),
            child: TableName::new(row.get::<_, String>(1)),
            parent: TableName::new(row.get::<_, String>(2)),
            definition: row.get(3),
        })
        .collect();

    debug!(
        "{}: {} foreign keys in {}",
        store.endpoint,
        edges.len(),
        store.schema
    );
    Ok(edges)
}
