//! Sequence reconciliation after a bulk copy.
//!
//! Copied rows carry their original keys, so the target's sequences still sit
//! at their provisioning value. Each sequence bound to a working-schema column
//! is restarted just past the largest copied key.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::schema::{SequenceBinding, TableName};
use crate::core::traits::TargetStore;

/// A sequence that was restarted.
#[derive(Debug, Clone, Serialize)]
pub struct SequenceReset {
    pub sequence: String,
    pub table: TableName,
    pub column: String,
    /// Value the next `nextval` returns.
    pub next_value: i64,
}

/// A sequence that could not be reconciled.
#[derive(Debug, Clone, Serialize)]
pub struct SequenceFailure {
    pub sequence: String,
    pub message: String,
}

/// Outcome of reconciling every bound sequence.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SequenceOutcome {
    pub reconciled: Vec<SequenceReset>,
    pub failures: Vec<SequenceFailure>,
    /// Set when the bindings themselves could not be read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discovery_error: Option<String>,
}

/// Restart value for a column whose current maximum is `max`.
///
/// `max + 1`, or `1` for an empty table. Never below 1, the default minimum
/// of an ascending sequence.
pub fn next_value(max: Option<i64>) -> i64 {
    max.map_or(1, |m| m.saturating_add(1).max(1))
}

/// Restart every sequence bound to a working-schema column of the target.
///
/// Failures are logged and recorded per sequence; the remaining sequences are
/// still processed.
pub async fn reconcile_sequences(target: &dyn TargetStore) -> SequenceOutcome {
    let mut outcome = SequenceOutcome::default();

    let bindings = match target.sequence_bindings().await {
        Ok(bindings) => bindings,
        Err(e) => {
            warn!("Could not discover sequences: {}", e);
            outcome.discovery_error = Some(e.to_string());
            return outcome;
        }
    };
    debug!("Found {} bound sequences", bindings.len());

    for binding in &bindings {
        match reconcile_one(target, binding).await {
            Ok(reset) => {
                debug!(
                    "{}: restarted at {} ({}.{})",
                    reset.sequence, reset.next_value, reset.table, reset.column
                );
                outcome.reconciled.push(reset);
            }
            Err(message) => {
                warn!("Failed to reconcile sequence {}: {}", binding.sequence_name, message);
                outcome.failures.push(SequenceFailure {
                    sequence: binding.sequence_name.clone(),
                    message,
                });
            }
        }
    }

    info!(
        "Reconciled {}/{} sequences",
        outcome.reconciled.len(),
        bindings.len()
    );
    outcome
}

async fn reconcile_one(
    target: &dyn TargetStore,
    binding: &SequenceBinding,
) -> std::result::Result<SequenceReset, String> {
    let max = target
        .max_value(&binding.owner_table, &binding.owner_column)
        .await
        .map_err(|e| format!("reading max({}): {}", binding.owner_column, e))?;
    let next = next_value(max);
    target
        .restart_sequence(&binding.sequence_name, next)
        .await
        .map_err(|e| e.to_string())?;

    Ok(SequenceReset {
        sequence: binding.sequence_name.clone(),
        table: binding.owner_table.clone(),
        column: binding.owner_column.clone(),
        next_value: next,
    })
}
