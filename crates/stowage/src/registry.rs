// crates/stowage/src/registry.rs
// ============================================================================
// Module: Store Registry
// Description: Configuration-keyed cache of backend stores.
// Purpose: Enforce one connection manager per effective configuration.
// Dependencies: stowage-config, stowage-core, store crates, tracing
// ============================================================================

//! ## Overview
//! [`StoreRegistry::resolve`] validates a configuration, fingerprints it,
//! and returns the cached store for that fingerprint or builds one. Building
//! a store performs no I/O (each manager connects on first use), so the
//! registry lock is never held across a network or file operation.
//!
//! # Invariants
//! - At most one manager exists per fingerprint while it is registered.
//! - Evicted managers are closed after they leave the map; callers still
//!   holding the store see `Connection` errors from then on.
//! - Dropping the registry does not close anything: each manager closes
//!   when its last handle is dropped.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use stowage_config::StorageBackend;
use stowage_config::StorageConfig;
use stowage_core::SharedStore;
use stowage_core::StorageError;
use stowage_store_memory::MemoryStore;
use stowage_store_postgres::PostgresStore;
use stowage_store_sqlite::SqliteStore;
use tracing::debug;
use tracing::info;

use crate::fingerprint::ConfigFingerprint;
use crate::fingerprint::fingerprint;

// ============================================================================
// SECTION: Entries
// ============================================================================

/// Concrete store kept by the registry.
enum RegisteredStore {
    /// File engine.
    Sqlite(SqliteStore),
    /// Relational engine.
    Postgres(PostgresStore),
    /// Cache engine.
    Memory(MemoryStore),
}

impl RegisteredStore {
    /// Builds the store selected by `config` without connecting.
    fn build(config: &StorageConfig) -> Result<Self, StorageError> {
        let options = config.manager_options();
        Ok(match config.backend {
            StorageBackend::Sqlite => Self::Sqlite(SqliteStore::new(config.sqlite.clone(), options)?),
            StorageBackend::Postgres => {
                Self::Postgres(PostgresStore::new(config.postgres.clone(), options)?)
            }
            StorageBackend::Memory => Self::Memory(MemoryStore::new(&config.memory, options)?),
        })
    }

    /// Returns a type-erased handle.
    fn shared(&self) -> SharedStore {
        match self {
            Self::Sqlite(store) => Arc::new(store.clone()),
            Self::Postgres(store) => Arc::new(store.clone()),
            Self::Memory(store) => Arc::new(store.clone()),
        }
    }

    /// Closes the underlying manager.
    fn close(&self) {
        match self {
            Self::Sqlite(store) => store.close(),
            Self::Postgres(store) => store.close(),
            Self::Memory(store) => store.close(),
        }
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Cache of stores keyed by configuration fingerprint.
#[derive(Default)]
pub struct StoreRegistry {
    /// Registered stores.
    stores: Mutex<HashMap<ConfigFingerprint, RegisteredStore>>,
}

impl StoreRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the store for `config`, building it on first request.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` [`StorageError`] for an invalid configuration,
    /// or a `Serialization` error when it cannot be fingerprinted.
    pub fn resolve(&self, config: &StorageConfig) -> Result<SharedStore, StorageError> {
        config.validate()?;
        let key = fingerprint(config)?;
        let mut stores = self.lock();
        if let Some(existing) = stores.get(&key) {
            return Ok(existing.shared());
        }
        let store = RegisteredStore::build(config)?;
        let shared = store.shared();
        debug!(
            target: "storage",
            backend = %config.backend.kind(),
            fingerprint = %key,
            "store registered"
        );
        stores.insert(key, store);
        Ok(shared)
    }

    /// Returns whether a store is registered for `config`.
    ///
    /// # Errors
    ///
    /// Returns a `Serialization` [`StorageError`] when the configuration
    /// cannot be fingerprinted.
    pub fn contains(&self, config: &StorageConfig) -> Result<bool, StorageError> {
        let key = fingerprint(config)?;
        Ok(self.lock().contains_key(&key))
    }

    /// Removes and closes the store for `config`, returning whether one was
    /// registered.
    ///
    /// # Errors
    ///
    /// Returns a `Serialization` [`StorageError`] when the configuration
    /// cannot be fingerprinted.
    pub fn evict(&self, config: &StorageConfig) -> Result<bool, StorageError> {
        let key = fingerprint(config)?;
        let removed = self.lock().remove(&key);
        Ok(removed.is_some_and(|store| {
            store.close();
            info!(target: "storage", fingerprint = %key, "store evicted");
            true
        }))
    }

    /// Closes and removes every registered store.
    pub fn close_all(&self) {
        let drained: Vec<RegisteredStore> = self.lock().drain().map(|(_, store)| store).collect();
        for store in &drained {
            store.close();
        }
        if !drained.is_empty() {
            info!(target: "storage", closed = drained.len(), "store registry closed");
        }
    }

    /// Returns the number of registered stores.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true when no store is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Locks the map, recovering from poisoning.
    fn lock(&self) -> MutexGuard<'_, HashMap<ConfigFingerprint, RegisteredStore>> {
        self.stores.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
