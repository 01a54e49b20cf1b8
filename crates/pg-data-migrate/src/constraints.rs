//! Foreign-key suspension on the target.
//!
//! Definitions are captured verbatim from the target catalog before anything
//! is dropped, then replayed unchanged once the copy is done. Drops and
//! restores are per-constraint: one failure is recorded and the rest proceed.

use serde::Serialize;
use tracing::{info, warn};

use crate::core::schema::{ForeignKeyEdge, TableName};
use crate::core::traits::TargetStore;
use crate::error::{MigrateError, Result};

/// Which step a constraint failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintAction {
    Drop,
    Restore,
}

/// One constraint that could not be dropped or restored.
#[derive(Debug, Clone, Serialize)]
pub struct ConstraintFailure {
    pub constraint: String,
    pub table: TableName,
    pub action: ConstraintAction,
    pub message: String,
}

/// Outcome of suspending and restoring foreign keys for one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConstraintReport {
    /// Constraints found on the target before the copy.
    pub captured: usize,
    pub dropped: usize,
    pub restore_attempted: usize,
    pub restored: usize,
    pub failures: Vec<ConstraintFailure>,
}

impl ConstraintReport {
    pub fn restore_failures(&self) -> usize {
        self.failures
            .iter()
            .filter(|f| f.action == ConstraintAction::Restore)
            .count()
    }
}

/// Every foreign key on the target working schema, with its full definition.
///
/// Self-referencing keys are included; they are suspended like any other.
pub async fn capture_foreign_keys(target: &dyn TargetStore) -> Result<Vec<ForeignKeyEdge>> {
    let constraints = target.capture_foreign_keys().await.map_err(|e| {
        MigrateError::Introspection(format!("capturing target foreign keys: {}", e))
    })?;
    info!("Captured {} foreign key definitions", constraints.len());
    Ok(constraints)
}

/// Drop each constraint if it exists. Returns the constraints that were
/// dropped and the failures, both in input order.
///
/// Only the dropped ones should be restored; a constraint whose drop failed
/// is still in place.
pub async fn drop_constraints(
    target: &dyn TargetStore,
    constraints: &[ForeignKeyEdge],
) -> (Vec<ForeignKeyEdge>, Vec<ConstraintFailure>) {
    let mut dropped = Vec::with_capacity(constraints.len());
    let mut failures = Vec::new();

    for constraint in constraints {
        match target.drop_constraint(constraint).await {
            Ok(()) => dropped.push(constraint.clone()),
            Err(e) => {
                warn!(
                    "Failed to drop {} on {}: {}",
                    constraint.constraint_name, constraint.child, e
                );
                failures.push(failure(constraint, ConstraintAction::Drop, &e));
            }
        }
    }

    info!("Dropped {}/{} foreign keys", dropped.len(), constraints.len());
    (dropped, failures)
}

/// Re-create each constraint from its captured definition, in captured order.
/// Returns how many were restored and the failures.
pub async fn restore_constraints(
    target: &dyn TargetStore,
    constraints: &[ForeignKeyEdge],
) -> (usize, Vec<ConstraintFailure>) {
    let mut restored = 0;
    let mut failures = Vec::new();

    for constraint in constraints {
        match target.add_constraint(constraint).await {
            Ok(()) => restored += 1,
            Err(e) => {
                warn!(
                    "Failed to restore {} on {}: {}",
                    constraint.constraint_name, constraint.child, e
                );
                failures.push(failure(constraint, ConstraintAction::Restore, &e));
            }
        }
    }

    info!("Restored {}/{} foreign keys", restored, constraints.len());
    (restored, failures)
}

fn failure(
    constraint: &ForeignKeyEdge,
    action: ConstraintAction,
    error: &MigrateError,
) -> ConstraintFailure {
    ConstraintFailure {
        constraint: constraint.constraint_name.clone(),
        table: constraint.child.clone(),
        action,
        message: error.to_string(),
    }
}
