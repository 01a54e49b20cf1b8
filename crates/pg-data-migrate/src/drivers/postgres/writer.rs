//! Target side of [`PgStore`]: constraint DDL, conflict-tolerant inserts and
//! sequence maintenance.

use async_trait::async_trait;
use tokio_postgres::types::ToSql;
use tracing::debug;

use super::reader::load_foreign_keys;
use super::{catalog, PgStore};
use crate::core::schema::{ForeignKeyEdge, SequenceBinding, TableName, TargetTable};
use crate::core::traits::TargetStore;
use crate::core::value::CellValue;
use crate::error::{describe_pg_error, MigrateError, Result};

#[async_trait]
impl TargetStore for PgStore {
    async fn capture_foreign_keys(&self) -> Result<Vec<ForeignKeyEdge>> {
        load_foreign_keys(self).await
    }

    async fn drop_constraint(&self, constraint: &ForeignKeyEdge) -> Result<()> {
        let client = self.client("dropping constraint").await?;
        let sql = catalog::drop_constraint_sql(
            &self.schema,
            constraint.child.as_str(),
            &constraint.constraint_name,
        )?;
        client
            .batch_execute(&sql)
            .await
            .map_err(|e| {
                MigrateError::constraint(&constraint.constraint_name, describe_pg_error(&e))
            })?;
        debug!("{}", sql);
        Ok(())
    }

    async fn add_constraint(&self, constraint: &ForeignKeyEdge) -> Result<()> {
        let client = self.client("adding constraint").await?;
        let sql = catalog::add_constraint_sql(
            &self.schema,
            constraint.child.as_str(),
            &constraint.constraint_name,
            &constraint.definition,
        )?;
        client
            .batch_execute(&sql)
            .await
            .map_err(|e| {
                MigrateError::constraint(&constraint.constraint_name, describe_pg_error(&e))
            })?;
        debug!("{}", sql);
        Ok(())
    }

    async fn describe_table(&self, table: &TableName) -> Result<TargetTable> {
        let client = self.client("describing table").await?;
        let name = table.as_str();

        let generated_columns: Vec<String> = client
            .query(catalog::LIST_GENERATED_COLUMNS, &[&self.schema, &name])
            .await?
            .iter()
            .map(|row| row.get(0))
            .collect();
        let has_unique_key: bool = client
            .query_one(catalog::HAS_UNIQUE_KEY, &[&self.schema, &name])
            .await?
            .get(0);

        debug!(
            "{}: generated columns {:?}, unique key: {}",
            table, generated_columns, has_unique_key
        );
        Ok(TargetTable {
            generated_columns,
            has_unique_key,
        })
    }

    async fn insert_ignoring_conflicts(
        &self,
        table: &TableName,
        columns: &[String],
        rows: &[Vec<CellValue>],
    ) -> Result<u64> {
        if rows.is_empty() || columns.is_empty() {
            return Ok(0);
        }

        let client = self.client("inserting rows").await?;
        let per_statement = catalog::rows_per_statement(columns.len());
        let mut inserted = 0u64;

        for chunk in rows.chunks(per_statement) {
            let sql = catalog::insert_sql(&self.schema, table.as_str(), columns, chunk.len())?;
            let stmt = client.prepare_cached(&sql).await?;

            let mut params: Vec<&(dyn ToSql + Sync)> = Vec::with_capacity(chunk.len() * columns.len());
            for row in chunk {
                if row.len() != columns.len() {
                    return Err(MigrateError::transfer(
                        table.as_str(),
                        format!("row has {} values for {} columns", row.len(), columns.len()),
                    ));
                }
                params.extend(row.iter().map(|v| v as &(dyn ToSql + Sync)));
            }

            inserted += client.execute(&stmt, &params).await?;
        }

        Ok(inserted)
    }

    async fn sequence_bindings(&self) -> Result<Vec<SequenceBinding>> {
        let client = self.client("listing sequences").await?;
        let rows = client
            .query(catalog::LIST_SEQUENCE_BINDINGS, &[&self.schema])
            .await?;
        Ok(rows
            .iter()
            .map(|row| SequenceBinding {
                sequence_name: row.get(0),
                owner_table: TableName::new(row.get::<_, String>(1)),
                owner_column: row.get(2),
            })
            .collect())
    }

    async fn max_value(&self, table: &TableName, column: &str) -> Result<Option<i64>> {
        let client = self.client("reading column maximum").await?;
        let sql = catalog::max_value_sql(&self.schema, table.as_str(), column)?;
        let row = client.query_one(&sql, &[]).await?;
        Ok(row.get::<_, Option<i64>>(0))
    }

    async fn restart_sequence(&self, sequence: &str, next: i64) -> Result<()> {
        let client = self.client("restarting sequence").await?;
        let sql = catalog::restart_sequence_sql(&self.schema, sequence, next)?;
        client
            .batch_execute(&sql)
            .await
            .map_err(|e| MigrateError::sequence(sequence, describe_pg_error(&e)))?;
        debug!("{}", sql);
        Ok(())
    }
}
