//! # pg-data-migrate
//!
//! Dependency-aware bulk data copy between two PostgreSQL databases that
//! share a schema.
//!
//! The target schema must already exist. A run:
//!
//! - **Introspects** the source schema's tables and foreign keys
//! - **Orders** tables parents-first, breaking dependency cycles
//! - **Suspends** target foreign keys, copying them back verbatim afterwards
//! - **Copies** rows in batches with `ON CONFLICT DO NOTHING`, so re-runs are
//!   safe
//! - **Reconciles** sequences past the largest copied key
//!
//! ## Example
//!
//! ```rust,no_run
//! use pg_data_migrate::{Config, Orchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> pg_data_migrate::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let orchestrator = Orchestrator::connect(config).await?;
//!     let report = orchestrator.run(CancellationToken::new()).await?;
//!     println!("Copied {} rows", report.total_rows);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod constraints;
pub mod core;
pub mod drivers;
pub mod error;
pub mod introspect;
pub mod orchestrator;
pub mod plan;
pub mod sequences;
pub mod transfer;

// Re-exports for convenient access
pub use config::{Config, DatabaseConfig, MigrationConfig};
pub use crate::core::{
    CellValue, ForeignKeyEdge, RowSet, SequenceBinding, SourceStore, Store, TableName,
    TargetStore, TargetTable,
};
pub use drivers::{PgStore, SslMode};
pub use error::{MigrateError, Result};
pub use orchestrator::{
    HealthCheckResult, MigrationReport, Orchestrator, Phase, RunStatus, ValidationReport,
};
pub use plan::{Cycle, MigrationPlan};
pub use transfer::{BatchCopier, CopyResult, CopyStatus};
