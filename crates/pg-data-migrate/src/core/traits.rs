//! Store abstractions used by the migration engine.
//!
//! - [`Store`]: what both sides share (identity, liveness, row counts)
//! - [`SourceStore`]: catalog reads and full-table scans on the source
//! - [`TargetStore`]: constraint DDL, conflict-tolerant inserts and sequence
//!   maintenance on the target
//!
//! Every component receives its store as a trait object, so the engine runs
//! unchanged against PostgreSQL or an in-memory double. All table arguments
//! are names within the store's working schema.

use async_trait::async_trait;

use crate::error::Result;

use super::schema::{ForeignKeyEdge, SequenceBinding, TableName, TargetTable};
use super::value::{CellValue, RowSet};

/// Behaviour shared by source and target stores.
#[async_trait]
pub trait Store: Send + Sync {
    /// Endpoint label for logs (never contains credentials).
    fn endpoint(&self) -> &str;

    /// Round-trip a trivial statement.
    async fn ping(&self) -> Result<()>;

    /// Exact number of rows currently in a table.
    async fn row_count(&self, table: &TableName) -> Result<i64>;

    /// Release the underlying connection.
    async fn close(&self);
}

/// Read side of a migration.
#[async_trait]
pub trait SourceStore: Store {
    /// Base tables of the working schema, ordered by name.
    async fn list_tables(&self) -> Result<Vec<TableName>>;

    /// Foreign keys whose child table is in the working schema.
    ///
    /// Parents outside the working schema are rendered `schema.table`.
    async fn list_foreign_keys(&self) -> Result<Vec<ForeignKeyEdge>>;

    /// Every row of a table. Columns come from the first row returned.
    async fn read_rows(&self, table: &TableName) -> Result<RowSet>;
}

/// Write side of a migration.
#[async_trait]
pub trait TargetStore: Store {
    /// All foreign keys on working-schema tables with their full definitions,
    /// ordered by table then constraint name. Self-references included.
    async fn capture_foreign_keys(&self) -> Result<Vec<ForeignKeyEdge>>;

    /// Drop a constraint if it exists. A missing constraint is not an error.
    async fn drop_constraint(&self, constraint: &ForeignKeyEdge) -> Result<()>;

    /// Re-create a constraint from its captured definition.
    async fn add_constraint(&self, constraint: &ForeignKeyEdge) -> Result<()>;

    /// Generated columns and unique-key presence of a working-schema table.
    async fn describe_table(&self, table: &TableName) -> Result<TargetTable>;

    /// Insert rows, silently skipping any that conflict with existing data.
    ///
    /// Returns the number of rows actually inserted.
    async fn insert_ignoring_conflicts(
        &self,
        table: &TableName,
        columns: &[String],
        rows: &[Vec<CellValue>],
    ) -> Result<u64>;

    /// Sequences owned by or backing identity columns of working-schema tables.
    async fn sequence_bindings(&self) -> Result<Vec<SequenceBinding>>;

    /// Largest value of an integer column, `None` for an empty table.
    async fn max_value(&self, table: &TableName, column: &str) -> Result<Option<i64>>;

    /// Make the next `nextval` of a sequence return `next`.
    async fn restart_sequence(&self, sequence: &str, next: i64) -> Result<()>;
}
