//! PostgreSQL store.
//!
//! [`PgStore`] implements both [`SourceStore`](crate::core::SourceStore)
//! (in `reader`) and [`TargetStore`](crate::core::TargetStore) (in `writer`)
//! over a single pooled connection.

pub mod catalog;
mod reader;
mod writer;

use std::time::Duration;

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, PoolError, RecyclingMethod};
use tracing::{debug, info, warn};

use crate::config::DatabaseConfig;
use crate::core::schema::TableName;
use crate::core::traits::Store;
use crate::drivers::tls::{SslMode, TlsBuilder};
use crate::error::{describe_pg_error, MigrateError, Result};

/// One side of a migration: a connection to a PostgreSQL database, scoped to
/// a working schema.
pub struct PgStore {
    pool: Pool,
    schema: String,
    endpoint: String,
}

impl PgStore {
    /// Connect and verify the connection with a round trip.
    ///
    /// The pool holds at most one connection; nothing else shares it.
    pub async fn connect(config: &DatabaseConfig, connect_timeout: Duration) -> Result<Self> {
        let endpoint = config.endpoint();
        let mut pg_config = config.pg_config(connect_timeout)?;
        let ssl_mode = config.effective_ssl_mode(&pg_config)?;
        pg_config.ssl_mode(ssl_mode.to_pg());

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let manager = match TlsBuilder::new(ssl_mode).build()? {
            None => {
                if ssl_mode == SslMode::Disable {
                    warn!("{}: TLS is disabled, credentials travel in plaintext", endpoint);
                }
                Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config)
            }
            Some(tls) => Manager::from_config(pg_config, tls, mgr_config),
        };

        let pool = Pool::builder(manager)
            .max_size(1)
            .build()
            .map_err(|e| MigrateError::pool(e, format!("creating pool for {}", endpoint)))?;

        let store = Self {
            pool,
            schema: config.schema.clone(),
            endpoint,
        };

        let client = store
            .pool
            .get()
            .await
            .map_err(|e| MigrateError::connection(&store.endpoint, describe_pool_error(&e)))?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| MigrateError::connection(&store.endpoint, describe_pg_error(&e)))?;
        drop(client);

        info!("Connected to {} (schema {})", store.endpoint, store.schema);
        Ok(store)
    }

    /// Working schema this store reads from or writes to.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    async fn client(&self, context: &str) -> Result<Object> {
        self.pool
            .get()
            .await
            .map_err(|e| {
                MigrateError::pool(
                    describe_pool_error(&e),
                    format!("{} on {}", context, self.endpoint),
                )
            })
    }
}

fn describe_pool_error(e: &PoolError) -> String {
    match e {
        PoolError::Backend(pg) => describe_pg_error(pg),
        other => other.to_string(),
    }
}

#[async_trait]
impl Store for PgStore {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn ping(&self) -> Result<()> {
        let client = self.client("health check").await?;
        client.simple_query("SELECT 1").await?;
        Ok(())
    }

    async fn row_count(&self, table: &TableName) -> Result<i64> {
        let client = self.client("counting rows").await?;
        let sql = catalog::count_sql(&self.schema, table.as_str())?;
        let row = client.query_one(&sql, &[]).await?;
        Ok(row.get::<_, i64>(0))
    }

    async fn close(&self) {
        self.pool.close();
        debug!("Closed connection to {}", self.endpoint);
    }
}
