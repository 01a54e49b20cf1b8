//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::drivers::tls::SslMode;
use crate::error::{MigrateError, Result};
use std::path::Path;
use std::time::Duration;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

impl DatabaseConfig {
    /// Build a tokio-postgres connection config.
    pub fn pg_config(&self, connect_timeout: Duration) -> Result<tokio_postgres::Config> {
        let mut pg = match &self.url {
            Some(url) => url.parse::<tokio_postgres::Config>().map_err(|e| {
                MigrateError::Config(format!("invalid connection URL {}: {}", redact_url(url), e))
            })?,
            None => {
                let mut pg = tokio_postgres::Config::new();
                pg.host(&self.host)
                    .port(self.port)
                    .dbname(&self.database)
                    .user(&self.user)
                    .password(&self.password);
                pg
            }
        };
        pg.application_name("pg-data-migrate");
        pg.connect_timeout(connect_timeout);
        Ok(pg)
    }

    /// Effective SSL mode: explicit setting, then the URL's `sslmode`, then `prefer`.
    pub fn effective_ssl_mode(&self, pg: &tokio_postgres::Config) -> Result<SslMode> {
        match &self.ssl_mode {
            Some(mode) => SslMode::parse(mode),
            None if self.url.is_some() => Ok(SslMode::from_pg(pg.get_ssl_mode())),
            None => Ok(SslMode::Prefer),
        }
    }
}
