//! Migration orchestrator - main workflow coordinator.

mod report;

pub use report::{
    HealthCheckResult, MigrationReport, RunStatus, TableValidation, ValidationReport,
};

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{Config, DatabaseConfig};
use crate::constraints::{capture_foreign_keys, drop_constraints, restore_constraints};
use crate::core::traits::{SourceStore, Store, TargetStore};
use crate::drivers::PgStore;
use crate::error::Result;
use crate::introspect::introspect;
use crate::plan::{self, MigrationPlan};
use crate::sequences::reconcile_sequences;
use crate::transfer::{BatchCopier, CopyResult};

/// Pipeline phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connect,
    Introspect,
    Plan,
    DropConstraints,
    CopyAll,
    RestoreConstraints,
    ReconcileSequences,
    Report,
}

impl Phase {
    pub fn number(self) -> u8 {
        match self {
            Phase::Connect => 1,
            Phase::Introspect => 2,
            Phase::Plan => 3,
            Phase::DropConstraints => 4,
            Phase::CopyAll => 5,
            Phase::RestoreConstraints => 6,
            Phase::ReconcileSequences => 7,
            Phase::Report => 8,
        }
    }

    fn log(self) {
        info!("Phase {}: {}", self.number(), self);
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Connect => "Connecting to source and target",
            Phase::Introspect => "Introspecting source schema",
            Phase::Plan => "Planning copy order",
            Phase::DropConstraints => "Suspending target foreign keys",
            Phase::CopyAll => "Copying tables",
            Phase::RestoreConstraints => "Restoring target foreign keys",
            Phase::ReconcileSequences => "Reconciling sequences",
            Phase::Report => "Reporting",
        };
        f.write_str(s)
    }
}

/// Migration orchestrator.
///
/// Owns one store per side for the whole run; both are closed when `run`
/// or `dry_run` returns, whether it succeeded or not.
pub struct Orchestrator {
    config: Config,
    source: Arc<dyn SourceStore>,
    target: Arc<dyn TargetStore>,
}

impl Orchestrator {
    /// Validate the configuration and open both connections.
    ///
    /// Nothing on the target is touched until both sides answer.
    pub async fn connect(config: Config) -> Result<Self> {
        config.validate()?;
        Phase::Connect.log();

        let timeout = Duration::from_secs(config.migration.connect_timeout_secs);
        let source = PgStore::connect(&config.source, timeout).await?;
        let target = match PgStore::connect(&config.target, timeout).await {
            Ok(target) => target,
            Err(e) => {
                source.close().await;
                return Err(e);
            }
        };

        Ok(Self::with_stores(config, Arc::new(source), Arc::new(target)))
    }

    /// Build an orchestrator over already-connected stores.
    pub fn with_stores(
        config: Config,
        source: Arc<dyn SourceStore>,
        target: Arc<dyn TargetStore>,
    ) -> Self {
        Self {
            config,
            source,
            target,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the full pipeline.
    ///
    /// Only introspection and constraint capture can fail the run; table,
    /// constraint and sequence failures are collected in the report.
    /// Cancellation is honoured between tables.
    pub async fn run(self, cancel: CancellationToken) -> Result<MigrationReport> {
        let result = self.execute(&cancel).await;
        self.close().await;
        result
    }

    /// Introspect and plan only. The target is not written.
    pub async fn dry_run(self) -> Result<MigrationReport> {
        let mut report = MigrationReport::new(uuid::Uuid::new_v4().to_string(), Utc::now());
        let result = self.plan().await;
        self.close().await;

        let plan = result?;
        report.tables_discovered = plan.len();
        report.plan = plan.order;
        report.cycles = plan.cycles;
        report.tables = report.plan.iter().map(CopyResult::skipped).collect();
        report.finish(false, true);
        Ok(report)
    }

    /// Introspect the source and compute the copy order.
    pub async fn plan(&self) -> Result<MigrationPlan> {
        Phase::Introspect.log();
        let snapshot = introspect(self.source.as_ref()).await?;

        Phase::Plan.log();
        Ok(plan::plan(&snapshot))
    }

    async fn execute(&self, cancel: &CancellationToken) -> Result<MigrationReport> {
        let mut report = MigrationReport::new(uuid::Uuid::new_v4().to_string(), Utc::now());
        info!(
            "Starting migration run {}: {} -> {}",
            report.run_id,
            self.source.endpoint(),
            self.target.endpoint()
        );

        let plan = self.plan().await?;
        report.tables_discovered = plan.len();
        report.plan = plan.order.clone();
        report.cycles = plan.cycles.clone();

        let migration = &self.config.migration;
        let dropped = if migration.drop_foreign_keys {
            Phase::DropConstraints.log();
            let captured = capture_foreign_keys(self.target.as_ref()).await?;
            let (dropped, failures) = drop_constraints(self.target.as_ref(), &captured).await;
            report.constraints.captured = captured.len();
            report.constraints.dropped = dropped.len();
            report.constraints.failures.extend(failures);
            dropped
        } else {
            info!("Keeping target foreign keys in place");
            Vec::new()
        };

        Phase::CopyAll.log();
        let cancelled = self.copy_all(&plan, cancel, &mut report).await;

        if migration.drop_foreign_keys {
            Phase::RestoreConstraints.log();
            let (restored, failures) = restore_constraints(self.target.as_ref(), &dropped).await;
            report.constraints.restore_attempted = dropped.len();
            report.constraints.restored = restored;
            report.constraints.failures.extend(failures);
        }

        if migration.reset_sequences {
            Phase::ReconcileSequences.log();
            report.sequences = reconcile_sequences(self.target.as_ref()).await;
        } else {
            info!("Sequence reconciliation disabled");
        }

        Phase::Report.log();
        report.finish(cancelled, false);
        report.log_summary();
        Ok(report)
    }

    /// Copy tables in plan order. Returns whether the run was cancelled.
    async fn copy_all(
        &self,
        plan: &MigrationPlan,
        cancel: &CancellationToken,
        report: &mut MigrationReport,
    ) -> bool {
        let copier = BatchCopier::new(
            self.source.as_ref(),
            self.target.as_ref(),
            self.config.migration.batch_size,
        );

        let mut cancelled = false;
        for (i, table) in plan.order.iter().enumerate() {
            if !cancelled && cancel.is_cancelled() {
                warn!(
                    "Cancellation requested, skipping {} remaining tables",
                    plan.len() - i
                );
                cancelled = true;
            }
            if cancelled {
                report.tables.push(CopyResult::skipped(table));
                continue;
            }
            report.tables.push(copier.copy_table(table).await);
        }
        cancelled
    }

    /// Compare row counts of every source table against the target.
    pub async fn validate(&self) -> Result<ValidationReport> {
        let snapshot = introspect(self.source.as_ref()).await?;
        let mut report = ValidationReport::default();

        for table in &snapshot.tables {
            let source_rows = self.source.row_count(table).await?;
            let target_rows = match self.target.row_count(table).await {
                Ok(count) => Some(count),
                Err(e) => {
                    warn!("{}: could not count target rows: {}", table, e);
                    None
                }
            };

            let matches = target_rows == Some(source_rows);
            if matches {
                info!("{}: {} rows (match)", table, source_rows);
            } else {
                warn!(
                    "{}: source={} target={} (MISMATCH)",
                    table,
                    source_rows,
                    target_rows.map_or_else(|| "?".to_string(), |n| n.to_string())
                );
            }

            report.tables.push(TableValidation {
                table: table.clone(),
                source_rows,
                target_rows,
                matches,
            });
        }

        Ok(report)
    }

    /// Connect to each side independently and time a round trip.
    pub async fn health_check(config: &Config) -> Result<HealthCheckResult> {
        config.validate()?;
        let timeout = Duration::from_secs(config.migration.connect_timeout_secs);

        let (source_latency_ms, source_error) = probe(&config.source, timeout).await;
        let (target_latency_ms, target_error) = probe(&config.target, timeout).await;

        Ok(HealthCheckResult {
            source_endpoint: config.source.endpoint(),
            source_connected: source_error.is_none(),
            source_latency_ms,
            target_endpoint: config.target.endpoint(),
            target_connected: target_error.is_none(),
            target_latency_ms,
            healthy: source_error.is_none() && target_error.is_none(),
            source_error,
            target_error,
        })
    }

    /// Release both connections.
    pub async fn close(&self) {
        self.source.close().await;
        self.target.close().await;
    }
}

async fn probe(db: &DatabaseConfig, timeout: Duration) -> (u64, Option<String>) {
    let started = Instant::now();
    let outcome = match PgStore::connect(db, timeout).await {
        Ok(store) => {
            let ping = store.ping().await;
            store.close().await;
            ping
        }
        Err(e) => Err(e),
    };
    let latency = started.elapsed().as_millis() as u64;
    (latency, outcome.err().map(|e| e.to_string()))
}
