//! Configuration validation.

use super::{Config, DatabaseConfig};
use crate::core::identifier::validate_identifier;
use crate::drivers::tls::SslMode;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    validate_endpoint("source", &config.source)?;
    validate_endpoint("target", &config.target)?;

    // Cannot migrate into the same database
    if config.source.identity() == config.target.identity()
        && config.source.schema == config.target.schema
    {
        return Err(MigrateError::Config(
            "source and target cannot be the same database".into(),
        ));
    }

    if config.migration.batch_size == 0 {
        return Err(MigrateError::Config(
            "migration.batch_size must be at least 1".into(),
        ));
    }
    if config.migration.connect_timeout_secs == 0 {
        return Err(MigrateError::Config(
            "migration.connect_timeout_secs must be at least 1".into(),
        ));
    }

    Ok(())
}

fn validate_endpoint(side: &str, db: &DatabaseConfig) -> Result<()> {
    match &db.url {
        Some(url) if url.trim().is_empty() => {
            return Err(MigrateError::Config(format!("{side}.url is empty")));
        }
        Some(_) => {}
        None => {
            if db.host.is_empty() {
                return Err(MigrateError::Config(format!(
                    "{side}.host is required (or set {side}.url)"
                )));
            }
            if db.database.is_empty() {
                return Err(MigrateError::Config(format!("{side}.database is required")));
            }
            if db.user.is_empty() {
                return Err(MigrateError::Config(format!("{side}.user is required")));
            }
        }
    }

    if let Some(mode) = &db.ssl_mode {
        SslMode::parse(mode).map_err(|e| MigrateError::Config(format!("{side}.ssl_mode: {e}")))?;
    }

    validate_identifier(&db.schema)
        .map_err(|e| MigrateError::Config(format!("{side}.schema: {e}")))?;

    Ok(())
}
