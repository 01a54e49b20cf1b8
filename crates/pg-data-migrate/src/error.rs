//! Error type shared by every stage of a run.

use thiserror::Error;

/// Everything that can go wrong during a run.
///
/// Only [`is_fatal`](MigrateError::is_fatal) errors stop the pipeline; the
/// rest are recorded against the table, constraint or sequence they hit.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Bad or inconsistent configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A store could not be reached at all.
    #[error("Connection to {endpoint} failed: {message}")]
    Connection { endpoint: String, message: String },

    /// A pooled connection could not be obtained.
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Catalog metadata could not be read; no safe plan can be built.
    #[error("Schema introspection failed: {0}")]
    Introspection(String),

    /// Statement rejected by the server.
    #[error("Database error: {}", describe_pg_error(.0))]
    Database(#[from] tokio_postgres::Error),

    /// Reading or writing one table's rows failed.
    #[error("Transfer failed for table {table}: {message}")]
    Transfer { table: String, message: String },

    /// A foreign-key constraint could not be dropped or restored
    #[error("Constraint {name} failed: {message}")]
    Constraint { name: String, message: String },

    /// A sequence could not be inspected or restarted
    #[error("Sequence {name} failed: {message}")]
    Sequence { name: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Stopped by SIGINT or SIGTERM.
    #[error("Migration cancelled")]
    Cancelled,
}

impl MigrateError {
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        MigrateError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    pub fn connection(endpoint: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Connection {
            endpoint: endpoint.into(),
            message: message.to_string(),
        }
    }

    pub fn transfer(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Transfer {
            table: table.into(),
            message: message.into(),
        }
    }

    pub fn constraint(name: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Constraint {
            name: name.into(),
            message: message.to_string(),
        }
    }

    pub fn sequence(name: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Sequence {
            name: name.into(),
            message: message.to_string(),
        }
    }

    /// Whether this error means the run cannot continue at all.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MigrateError::Config(_)
                | MigrateError::Connection { .. }
                | MigrateError::Pool { .. }
                | MigrateError::Introspection(_)
        )
    }

    /// Process exit code for this error.
    ///
    /// - 2: configuration
    /// - 3: connection or pool
    /// - 4: introspection
    /// - 130: cancelled
    /// - 1: anything else
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) => 2,
            MigrateError::Connection { .. } | MigrateError::Pool { .. } => 3,
            MigrateError::Introspection(_) => 4,
            MigrateError::Cancelled => 130,
            _ => 1,
        }
    }

    /// Message plus every `source()` below it, one per line.
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Server-side reason for a driver error.
///
/// tokio-postgres displays every server error as `db error`; the SQLSTATE,
/// message and detail live in the attached `DbError`.
pub fn describe_pg_error(e: &tokio_postgres::Error) -> String {
    if let Some(db) = e.as_db_error() {
        let mut message = format!("{}: {}", db.code().code(), db.message());
        if let Some(detail) = db.detail() {
            message.push_str(&format!(" ({})", detail));
        }
        return message;
    }
    match std::error::Error::source(e) {
        Some(cause) => format!("{}: {}", e, cause),
        None => e.to_string(),
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MigrateError>;
