//! Run report and its summary output.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::constraints::ConstraintReport;
use crate::core::schema::TableName;
use crate::error::Result;
use crate::plan::Cycle;
use crate::sequences::SequenceOutcome;
use crate::transfer::{CopyResult, CopyStatus};

/// Final state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every table, constraint and sequence succeeded.
    Completed,
    /// The run finished but some items failed; see the report.
    CompletedWithErrors,
    /// Cancelled between tables; constraints and sequences were still handled.
    Cancelled,
    /// Planned only, nothing written.
    DryRun,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Completed => "completed",
            RunStatus::CompletedWithErrors => "completed with errors",
            RunStatus::Cancelled => "cancelled",
            RunStatus::DryRun => "dry run",
        };
        f.write_str(s)
    }
}

/// Everything a run did, for logs, JSON output and audit.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    /// Unique run identifier.
    pub run_id: String,

    pub status: RunStatus,

    pub started_at: DateTime<Utc>,

    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    pub tables_discovered: usize,

    /// Copy order.
    pub plan: Vec<TableName>,

    /// Dependency cycles broken while planning.
    pub cycles: Vec<Cycle>,

    /// Per-table results in copy order.
    pub tables: Vec<CopyResult>,

    /// Tables that had at least one source row.
    pub tables_with_data: usize,

    /// Rows inserted across all tables.
    pub total_rows: u64,

    pub failed_tables: Vec<TableName>,

    pub constraints: ConstraintReport,

    pub sequences: SequenceOutcome,
}

impl MigrationReport {
    pub(crate) fn new(run_id: String, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            status: RunStatus::Completed,
            started_at,
            completed_at: started_at,
            duration_seconds: 0.0,
            tables_discovered: 0,
            plan: Vec::new(),
            cycles: Vec::new(),
            tables: Vec::new(),
            tables_with_data: 0,
            total_rows: 0,
            failed_tables: Vec::new(),
            constraints: ConstraintReport::default(),
            sequences: SequenceOutcome::default(),
        }
    }

    /// Fill in totals and status once every phase has run.
    pub(crate) fn finish(&mut self, cancelled: bool, dry_run: bool) {
        self.completed_at = Utc::now();
        self.duration_seconds =
            (self.completed_at - self.started_at).num_milliseconds() as f64 / 1000.0;
        self.tables_with_data = self.tables.iter().filter(|t| t.has_data()).count();
        self.total_rows = self.tables.iter().map(|t| t.rows_inserted).sum();
        self.failed_tables = self
            .tables
            .iter()
            .filter(|t| t.is_failed())
            .map(|t| t.table.clone())
            .collect();

        self.status = if dry_run {
            RunStatus::DryRun
        } else if cancelled {
            RunStatus::Cancelled
        } else if self.has_errors() {
            RunStatus::CompletedWithErrors
        } else {
            RunStatus::Completed
        };
    }

    /// Whether any table, constraint or sequence failed.
    pub fn has_errors(&self) -> bool {
        !self.failed_tables.is_empty()
            || !self.constraints.failures.is_empty()
            || !self.sequences.failures.is_empty()
            || self.sequences.discovery_error.is_some()
    }

    /// Log the end-of-run summary block.
    pub fn log_summary(&self) {
        info!(
            "Migration {}: {} of {} tables had data, {} rows copied in {:.1}s",
            self.status,
            self.tables_with_data,
            self.tables_discovered,
            self.total_rows,
            self.duration_seconds
        );
        info!(
            "Constraints: {}/{} restored ({} captured, {} dropped)",
            self.constraints.restored,
            self.constraints.restore_attempted,
            self.constraints.captured,
            self.constraints.dropped
        );
        info!(
            "Sequences: {} reconciled, {} failed",
            self.sequences.reconciled.len(),
            self.sequences.failures.len()
        );
        for cycle in &self.cycles {
            warn!("Cycle: {}", cycle);
        }
        if !self.failed_tables.is_empty() {
            let names: Vec<&str> = self.failed_tables.iter().map(TableName::as_str).collect();
            warn!("Failed tables: {}", names.join(", "));
        }
        let unkeyed: Vec<&str> = self
            .tables
            .iter()
            .filter(|t| t.status == CopyStatus::Unkeyed)
            .map(|t| t.table.as_str())
            .collect();
        if !unkeyed.is_empty() {
            warn!(
                "Not copied (no unique key, target already populated): {}",
                unkeyed.join(", ")
            );
        }
        for failure in &self.constraints.failures {
            warn!(
                "Constraint {} on {} ({:?}): {}",
                failure.constraint, failure.table, failure.action, failure.message
            );
        }
    }

    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Row-count comparison of one table.
#[derive(Debug, Clone, Serialize)]
pub struct TableValidation {
    pub table: TableName,
    pub source_rows: i64,
    /// `None` when the target table could not be counted.
    pub target_rows: Option<i64>,
    pub matches: bool,
}

/// Row-count comparison across every source table.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub tables: Vec<TableValidation>,
}

impl ValidationReport {
    pub fn mismatches(&self) -> usize {
        self.tables.iter().filter(|t| !t.matches).count()
    }

    pub fn all_match(&self) -> bool {
        self.mismatches() == 0
    }
}

/// Connectivity of both sides.
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResult {
    pub source_endpoint: String,
    pub source_connected: bool,
    pub source_latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_error: Option<String>,
    pub target_endpoint: String,
    pub target_connected: bool,
    pub target_latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_error: Option<String>,
    pub healthy: bool,
}
