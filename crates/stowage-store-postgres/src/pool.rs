// crates/stowage-store-postgres/src/pool.rs
// ============================================================================
// Module: Postgres Pool
// Description: Plain and TLS r2d2 pools behind one type.
// Purpose: Let the adapter check out a `postgres::Client` without caring
//          which transport the pool negotiated.
// Dependencies: native-tls, postgres, postgres-native-tls, r2d2, r2d2_postgres
// ============================================================================

//! ## Overview
//! r2d2 pools are generic over the TLS connector, so a runtime TLS switch
//! needs one pool type per connector. [`PostgresPool`] wraps both and hands
//! out a [`PooledClient`] that dereferences to `postgres::Client`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::ops::Deref;
use std::ops::DerefMut;
use std::sync::Arc;
use std::time::Duration;

use native_tls::TlsConnector;
use postgres::Client;
use postgres::NoTls;
use postgres_native_tls::MakeTlsConnector;
use r2d2::Pool;
use r2d2::PooledConnection;
use r2d2_postgres::PostgresConnectionManager;
use stowage_core::BackendKind;
use stowage_core::PoolObserver;
use stowage_core::StorageError;
use stowage_core::pool_error;

use crate::config::PostgresStoreConfig;

// ============================================================================
// SECTION: Pool
// ============================================================================

/// Connection pool over either transport.
pub enum PostgresPool {
    /// Unencrypted connections.
    Plain(Pool<PostgresConnectionManager<NoTls>>),
    /// TLS connections verified against the platform trust store.
    Tls(Pool<PostgresConnectionManager<MakeTlsConnector>>),
}

/// Checked-out client from a [`PostgresPool`].
pub enum PooledClient {
    /// Client from the plain pool.
    Plain(PooledConnection<PostgresConnectionManager<NoTls>>),
    /// Client from the TLS pool.
    Tls(PooledConnection<PostgresConnectionManager<MakeTlsConnector>>),
}

impl PostgresPool {
    /// Builds the pool; no connection is opened unless `pool_min_idle > 0`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] for invalid settings, TLS setup failures, or
    /// a failed eager connection.
    pub fn build(config: &PostgresStoreConfig) -> Result<Self, StorageError> {
        let client_config = config.client_config()?;
        if config.tls_enabled {
            let connector = TlsConnector::builder().build().map_err(|err| {
                StorageError::connection(BackendKind::Postgres, "tls connector setup failed")
                    .with_cause(Arc::new(err))
            })?;
            let manager =
                PostgresConnectionManager::new(client_config, MakeTlsConnector::new(connector));
            Ok(Self::Tls(builder(config).build(manager).map_err(map_pool_error)?))
        } else {
            let manager = PostgresConnectionManager::new(client_config, NoTls);
            Ok(Self::Plain(builder(config).build(manager).map_err(map_pool_error)?))
        }
    }

    /// Checks out a client.
    ///
    /// # Errors
    ///
    /// Returns a `Timeout` [`StorageError`] when no connection frees up in
    /// time.
    pub fn get(&self) -> Result<PooledClient, StorageError> {
        match self {
            Self::Plain(pool) => pool.get().map(PooledClient::Plain).map_err(map_pool_error),
            Self::Tls(pool) => pool.get().map(PooledClient::Tls).map_err(map_pool_error),
        }
    }
}

impl Deref for PooledClient {
    type Target = Client;

    fn deref(&self) -> &Client {
        match self {
            Self::Plain(client) => client,
            Self::Tls(client) => client,
        }
    }
}

impl DerefMut for PooledClient {
    fn deref_mut(&mut self) -> &mut Client {
        match self {
            Self::Plain(client) => client,
            Self::Tls(client) => client,
        }
    }
}

/// Returns a pool builder with the configured limits and observers.
fn builder<M: r2d2::ManageConnection>(config: &PostgresStoreConfig) -> r2d2::Builder<M>
where
    M::Error: std::fmt::Display,
{
    let observer = PoolObserver::new(BackendKind::Postgres);
    Pool::builder()
        .max_size(config.pool_max_size)
        .min_idle(Some(config.pool_min_idle))
        .connection_timeout(Duration::from_millis(config.connect_timeout_ms))
        .idle_timeout(Some(Duration::from_millis(config.idle_timeout_ms)))
        .error_handler(Box::new(observer))
        .event_handler(Box::new(observer))
}

/// Maps an r2d2 failure for this backend.
fn map_pool_error(err: r2d2::Error) -> StorageError {
    pool_error(err, BackendKind::Postgres)
}
