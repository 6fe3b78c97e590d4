// crates/stowage-store-postgres/src/backend.rs
// ============================================================================
// Module: Postgres Connection Backend
// Description: Lifecycle hooks binding the relational engine to the manager.
// Purpose: Build pools, provision the schema, and release pools off-thread.
// Dependencies: postgres, r2d2, stowage-core
// ============================================================================

//! ## Overview
//! [`PostgresBackend`] owns the validated configuration and the SQL derived
//! from it. Pools are released on a dedicated thread, since tearing down
//! pooled clients blocks on their background connection tasks.

use std::sync::Arc;
use std::thread;

use postgres_types::Type;
use stowage_core::BackendKind;
use stowage_core::ConnectionBackend;
use stowage_core::ErrorKind;
use stowage_core::StorageError;

use crate::config::PostgresStoreConfig;
use crate::native::postgres_error;
use crate::pool::PostgresPool;
use crate::runner::Runner;
use crate::schema::PostgresSchema;

/// Relational-engine connection backend.
#[derive(Debug, Clone)]
pub struct PostgresBackend {
    /// Store configuration.
    config: PostgresStoreConfig,
    /// Validated schema and statement text.
    schema: PostgresSchema,
}

impl PostgresBackend {
    /// Validates the configuration and derives the schema.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` [`StorageError`] for an invalid configuration.
    pub fn new(config: PostgresStoreConfig) -> Result<Self, StorageError> {
        config.validate()?;
        let schema = PostgresSchema::new(config.schema_ident()?);
        Ok(Self {
            config,
            schema,
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &PostgresStoreConfig {
        &self.config
    }

    /// Returns the schema.
    #[must_use]
    pub const fn schema(&self) -> &PostgresSchema {
        &self.schema
    }
}

impl ConnectionBackend for PostgresBackend {
    type Pool = PostgresPool;

    fn kind(&self) -> BackendKind {
        BackendKind::Postgres
    }

    fn schema_name(&self) -> &str {
        self.schema.schema().as_str()
    }

    fn connect(&self) -> Result<Self::Pool, StorageError> {
        let pool = PostgresPool::build(&self.config)?;
        // Verify the server is reachable; r2d2 opens nothing eagerly when
        // min_idle is zero.
        let mut client = pool.get()?;
        client.simple_query("SELECT 1").map_err(postgres_error)?;
        drop(client);
        Ok(pool)
    }

    fn provision(&self, pool: &Self::Pool) -> Result<(), StorageError> {
        let mut client = pool.get()?;
        self.schema.provision(&mut client, self.config.prepared_statements)
    }

    fn purge_expired(
        &self,
        pool: &Self::Pool,
        now_ms: i64,
        limit: u32,
    ) -> Result<u64, StorageError> {
        let mut client = pool.get()?;
        let limit = i64::from(limit);
        Runner::new(&mut client, self.config.prepared_statements).count(
            &self.schema.sql.purge_expired,
            &[(&now_ms, Type::INT8), (&limit, Type::INT8)],
        )
    }

    fn close_pool(&self, pool: Self::Pool) -> Result<(), StorageError> {
        thread::Builder::new()
            .name("stowage-postgres-close".to_string())
            .spawn(move || drop(pool))
            .map(|_| ())
            .map_err(|err| {
                StorageError::new(ErrorKind::IoError, BackendKind::Postgres, "pool release failed")
                    .with_cause(Arc::new(err))
            })
    }
}
