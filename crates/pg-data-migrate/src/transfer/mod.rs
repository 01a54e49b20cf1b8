//! Batched, conflict-tolerant table copy.
//!
//! A table is read from the source in full, split into fixed-size batches and
//! written to the target one batch after another with `ON CONFLICT DO
//! NOTHING`, so re-running a copy never duplicates rows. Target tables without
//! a unique key cannot ignore conflicts; they are only written while empty.
//! Stored generated columns are left out of every insert. A failing table is
//! reported in its [`CopyResult`]; it never aborts the run.

use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::core::schema::TableName;
use crate::core::traits::{SourceStore, Store, TargetStore};
use crate::core::value::RowSet;

/// How a table's copy ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyStatus {
    /// All batches were applied.
    Copied,
    /// The source table had no rows.
    Empty,
    /// Reading or writing failed; see `error`.
    Failed,
    /// Never attempted because the run was cancelled.
    Skipped,
    /// Target has no unique key and already held rows, so inserting again
    /// would duplicate them. Left untouched.
    Unkeyed,
}

/// Per-table copy statistics.
#[derive(Debug, Clone, Serialize)]
pub struct CopyResult {
    pub table: TableName,

    /// Rows read from the source.
    pub rows_discovered: u64,

    /// Rows the target actually accepted.
    pub rows_inserted: u64,

    /// Rows ignored because they conflicted with existing target rows.
    pub rows_skipped: u64,

    /// Batches applied successfully.
    pub batches: u64,

    pub status: CopyStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub duration_ms: u64,
}

impl CopyResult {
    fn new(table: &TableName, status: CopyStatus) -> Self {
        Self {
            table: table.clone(),
            rows_discovered: 0,
            rows_inserted: 0,
            rows_skipped: 0,
            batches: 0,
            status,
            error: None,
            duration_ms: 0,
        }
    }

    /// Result for a table the run never reached.
    pub fn skipped(table: &TableName) -> Self {
        Self::new(table, CopyStatus::Skipped)
    }

    pub fn is_failed(&self) -> bool {
        self.status == CopyStatus::Failed
    }

    pub fn has_data(&self) -> bool {
        self.rows_discovered > 0
    }
}

/// Copies tables from a source store into a target store.
pub struct BatchCopier<'a> {
    source: &'a dyn SourceStore,
    target: &'a dyn TargetStore,
    batch_size: usize,
}

impl<'a> BatchCopier<'a> {
    pub fn new(source: &'a dyn SourceStore, target: &'a dyn TargetStore, batch_size: usize) -> Self {
        Self {
            source,
            target,
            batch_size: batch_size.max(1),
        }
    }

    /// Copy one table. Errors end up in the returned result.
    pub async fn copy_table(&self, table: &TableName) -> CopyResult {
        let started = Instant::now();
        let mut result = CopyResult::new(table, CopyStatus::Copied);

        if let Err(message) = self.copy_into(table, &mut result).await {
            error!("{}: ERROR - {}", table, message);
            result.status = CopyStatus::Failed;
            result.error = Some(message);
        }

        result.duration_ms = started.elapsed().as_millis() as u64;
        result
    }

    async fn copy_into(
        &self,
        table: &TableName,
        result: &mut CopyResult,
    ) -> std::result::Result<(), String> {
        let rows = self
            .source
            .read_rows(table)
            .await
            .map_err(|e| format!("reading source rows: {}", e))?;

        result.rows_discovered = rows.len() as u64;
        if rows.is_empty() {
            info!("{}: 0 rows (skipped)", table);
            result.status = CopyStatus::Empty;
            return Ok(());
        }

        let layout = self
            .target
            .describe_table(table)
            .await
            .map_err(|e| format!("describing target table: {}", e))?;

        if !layout.has_unique_key {
            let existing = self
                .target
                .row_count(table)
                .await
                .map_err(|e| format!("counting target rows: {}", e))?;
            if existing > 0 {
                warn!(
                    "{}: target has no unique key and already holds {} rows, not copying",
                    table, existing
                );
                result.status = CopyStatus::Unkeyed;
                result.rows_skipped = result.rows_discovered;
                return Ok(());
            }
        }

        if !layout.generated_columns.is_empty() {
            debug!(
                "{}: leaving generated columns to the server: {}",
                table,
                layout.generated_columns.join(", ")
            );
        }
        let rows = rows.without_columns(&layout.generated_columns);

        self.write_batches(table, &rows, result).await?;
        if result.rows_skipped > 0 {
            info!(
                "{}: {} rows copied ({} already present)",
                table, result.rows_inserted, result.rows_skipped
            );
        } else {
            info!("{}: {} rows copied", table, result.rows_inserted);
        }
        Ok(())
    }

    async fn write_batches(
        &self,
        table: &TableName,
        rows: &RowSet,
        result: &mut CopyResult,
    ) -> std::result::Result<(), String> {
        for batch in rows.batches(self.batch_size) {
            match self
                .target
                .insert_ignoring_conflicts(table, &rows.columns, batch.rows)
                .await
            {
                Ok(inserted) => {
                    let offered = batch.len() as u64;
                    result.rows_inserted += inserted;
                    result.rows_skipped += offered.saturating_sub(inserted);
                    result.batches += 1;
                    debug!(
                        "{}: batch {} inserted {}/{} rows",
                        table, batch.index, inserted, offered
                    );
                }
                Err(e) => {
                    if let Some(first) = batch.rows.first() {
                        error!(
                            "{}: batch {} failed, first row: {}",
                            table,
                            batch.index,
                            rows.preview_row(first)
                        );
                    }
                    return Err(format!("batch {}: {}", batch.index, e));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{ForeignKeyEdge, SequenceBinding, TargetTable};
    use crate::core::value::CellValue;
    use crate::error::{MigrateError, Result};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    struct Fixture {
        tables: BTreeMap<String, RowSet>,
        /// Target rows by table. Deduplicated on the first column unless the
        /// layout says there is no unique key.
        target: Mutex<BTreeMap<String, Vec<Vec<CellValue>>>>,
        layout: TargetTable,
        calls: Mutex<Vec<usize>>,
        inserted_columns: Mutex<Vec<String>>,
        fail_on_batch: Option<usize>,
    }

    impl Fixture {
        fn new(table: &str, ids: std::ops::Range<i32>) -> Self {
            let rows = ids
                .map(|i| vec![CellValue::int4(i), CellValue::text(&format!("row {}", i))])
                .collect();
            let mut tables = BTreeMap::new();
            tables.insert(
                table.to_string(),
                RowSet::new(vec!["id".into(), "label".into()], rows),
            );
            Self {
                tables,
                target: Mutex::new(BTreeMap::new()),
                layout: TargetTable {
                    generated_columns: Vec::new(),
                    has_unique_key: true,
                },
                calls: Mutex::new(Vec::new()),
                inserted_columns: Mutex::new(Vec::new()),
                fail_on_batch: None,
            }
        }

        fn target_rows(&self, table: &str) -> usize {
            self.target.lock().unwrap().get(table).map_or(0, Vec::len)
        }
    }

    #[async_trait]
    impl Store for Fixture {
        fn endpoint(&self) -> &str {
            "fixture"
        }
        async fn ping(&self) -> Result<()> {
            Ok(())
        }
        async fn row_count(&self, table: &TableName) -> Result<i64> {
            Ok(self.target_rows(table.as_str()) as i64)
        }
        async fn close(&self) {}
    }

    #[async_trait]
    impl SourceStore for Fixture {
        async fn list_tables(&self) -> Result<Vec<TableName>> {
            Ok(self.tables.keys().map(|t| TableName::from(t.as_str())).collect())
        }
        async fn list_foreign_keys(&self) -> Result<Vec<ForeignKeyEdge>> {
            Ok(Vec::new())
        }
        async fn read_rows(&self, table: &TableName) -> Result<RowSet> {
            self.tables
                .get(table.as_str())
                .cloned()
                .ok_or_else(|| MigrateError::transfer(table.as_str(), "relation does not exist"))
        }
    }

    #[async_trait]
    impl TargetStore for Fixture {
        async fn capture_foreign_keys(&self) -> Result<Vec<ForeignKeyEdge>> {
            Ok(Vec::new())
        }
        async fn drop_constraint(&self, _constraint: &ForeignKeyEdge) -> Result<()> {
            Ok(())
        }
        async fn add_constraint(&self, _constraint: &ForeignKeyEdge) -> Result<()> {
            Ok(())
        }
        async fn describe_table(&self, _table: &TableName) -> Result<TargetTable> {
            Ok(self.layout.clone())
        }
        async fn insert_ignoring_conflicts(
            &self,
            table: &TableName,
            columns: &[String],
            rows: &[Vec<CellValue>],
        ) -> Result<u64> {
            *self.inserted_columns.lock().unwrap() = columns.to_vec();
            let call = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(rows.len());
                calls.len() - 1
            };
            if self.fail_on_batch == Some(call) {
                return Err(MigrateError::transfer(table.as_str(), "value too long"));
            }
            let mut target = self.target.lock().unwrap();
            let stored = target.entry(table.as_str().to_string()).or_default();
            let mut inserted = 0;
            for row in rows {
                let duplicate = self.layout.has_unique_key
                    && stored.iter().any(|existing| existing[0] == row[0]);
                if !duplicate {
                    stored.push(row.clone());
                    inserted += 1;
                }
            }
            Ok(inserted)
        }
        async fn sequence_bindings(&self) -> Result<Vec<SequenceBinding>> {
            Ok(Vec::new())
        }
        async fn max_value(&self, _table: &TableName, _column: &str) -> Result<Option<i64>> {
            Ok(None)
        }
        async fn restart_sequence(&self, _sequence: &str, _next: i64) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_copies_in_batches() {
        let fx = Fixture::new("events", 0..250);
        let copier = BatchCopier::new(&fx, &fx, 100);

        let result = copier.copy_table(&"events".into()).await;
        assert_eq!(result.status, CopyStatus::Copied);
        assert_eq!(result.rows_discovered, 250);
        assert_eq!(result.rows_inserted, 250);
        assert_eq!(result.batches, 3);
        assert_eq!(*fx.calls.lock().unwrap(), vec![100, 100, 50]);
    }

    #[tokio::test]
    async fn test_second_copy_is_idempotent() {
        let fx = Fixture::new("events", 1..51);
        let copier = BatchCopier::new(&fx, &fx, 100);

        copier.copy_table(&"events".into()).await;
        let again = copier.copy_table(&"events".into()).await;

        assert_eq!(again.status, CopyStatus::Copied);
        assert_eq!(again.rows_inserted, 0);
        assert_eq!(again.rows_skipped, 50);
        assert_eq!(fx.target_rows("events"), 50);
    }

    #[tokio::test]
    async fn test_empty_table() {
        let fx = Fixture::new("audit_log", 0..0);
        let copier = BatchCopier::new(&fx, &fx, 100);

        let result = copier.copy_table(&"audit_log".into()).await;
        assert_eq!(result.status, CopyStatus::Empty);
        assert_eq!(result.rows_discovered, 0);
        assert!(result.error.is_none());
        assert!(fx.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failing_batch_stops_table() {
        let mut fx = Fixture::new("events", 0..300);
        fx.fail_on_batch = Some(1);
        let copier = BatchCopier::new(&fx, &fx, 100);

        let result = copier.copy_table(&"events".into()).await;
        assert!(result.is_failed());
        assert_eq!(result.batches, 1);
        assert_eq!(result.rows_inserted, 100);
        assert!(result.error.as_deref().unwrap().starts_with("batch 1:"));
        assert_eq!(fx.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unreadable_table_fails() {
        let fx = Fixture::new("events", 0..1);
        let copier = BatchCopier::new(&fx, &fx, 100);

        let result = copier.copy_table(&"missing".into()).await;
        assert!(result.is_failed());
        assert!(result.error.unwrap().contains("relation does not exist"));
    }

    #[tokio::test]
    async fn test_unkeyed_table_is_copied_once() {
        let mut fx = Fixture::new("logs", 1..3);
        fx.layout.has_unique_key = false;
        let copier = BatchCopier::new(&fx, &fx, 100);

        let first = copier.copy_table(&"logs".into()).await;
        assert_eq!(first.status, CopyStatus::Copied);
        assert_eq!(first.rows_inserted, 2);

        let second = copier.copy_table(&"logs".into()).await;
        assert_eq!(second.status, CopyStatus::Unkeyed);
        assert_eq!(second.rows_inserted, 0);
        assert_eq!(second.rows_skipped, 2);
        assert!(second.error.is_none());
        assert_eq!(fx.target_rows("logs"), 2);
        assert_eq!(fx.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_generated_columns_are_not_written() {
        let mut fx = Fixture::new("items", 1..3);
        fx.layout.generated_columns = vec!["label".into()];
        let copier = BatchCopier::new(&fx, &fx, 100);

        let result = copier.copy_table(&"items".into()).await;
        assert_eq!(result.status, CopyStatus::Copied);
        assert_eq!(result.rows_inserted, 2);
        assert_eq!(*fx.inserted_columns.lock().unwrap(), vec!["id".to_string()]);
        assert!(fx.target.lock().unwrap()["items"].iter().all(|row| row.len() == 1));
    }
}
