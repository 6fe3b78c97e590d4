// crates/stowage-store-memory/src/store.rs
// ============================================================================
// Module: Memory Store Adapter
// Description: Store contract over the in-process keyspace.
// Purpose: Offer the cache engine through the same surface as the
//          persistent engines.
// Dependencies: stowage-core
// ============================================================================

//! ## Overview
//! [`MemoryStore`] routes each [`Store`] call to the [`Keyspace`] owned by its
//! connection manager. Unlike the relational engines, a key holds either a
//! value or a list: `set` replaces a list stored under the same key, and list
//! operations against a live value fail with `WRONGTYPE`.

use std::sync::Arc;

use stowage_core::BackendKind;
use stowage_core::ConnectionManager;
use stowage_core::Entry;
use stowage_core::ListEntry;
use stowage_core::ManagerOptions;
use stowage_core::SetOptions;
use stowage_core::StorageError;
use stowage_core::Store;
use stowage_core::unix_millis;
use stowage_core::validate_key;
use stowage_core::validate_namespace;

use crate::config::MemoryStoreConfig;
use crate::keyspace::Keyspace;
use crate::keyspace::MemoryBackend;

/// In-process [`Store`].
#[derive(Clone)]
pub struct MemoryStore {
    /// Shared connection manager.
    manager: Arc<ConnectionManager<MemoryBackend>>,
}

impl MemoryStore {
    /// Creates a store; the keyspace is allocated on first use.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` [`StorageError`] for an invalid configuration.
    pub fn new(config: &MemoryStoreConfig, options: ManagerOptions) -> Result<Self, StorageError> {
        options.validate(BackendKind::Memory)?;
        let backend = MemoryBackend::new(config)?;
        Ok(Self::from_manager(Arc::new(ConnectionManager::new(backend, options))))
    }

    /// Wraps an existing manager.
    #[must_use]
    pub const fn from_manager(manager: Arc<ConnectionManager<MemoryBackend>>) -> Self {
        Self {
            manager,
        }
    }

    /// Returns the connection manager.
    #[must_use]
    pub const fn manager(&self) -> &Arc<ConnectionManager<MemoryBackend>> {
        &self.manager
    }

    /// Closes the manager and drops every key.
    pub fn close(&self) {
        self.manager.close();
    }

    /// Runs `f` against the keyspace and the default namespace.
    fn with_keyspace<T>(
        &self,
        f: impl FnOnce(&Keyspace, &str) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let handle = self.manager.get_connection()?;
        handle.with_pool(|keyspace| f(keyspace, handle.namespace()))
    }
}

impl Store for MemoryStore {
    fn backend(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn get_entry(&self, key: &str) -> Result<Option<Entry>, StorageError> {
        validate_key(key, BackendKind::Memory)?;
        self.with_keyspace(|keyspace, _| keyspace.get(key, unix_millis()))
    }

    fn set(&self, key: &str, value: &[u8], options: &SetOptions) -> Result<(), StorageError> {
        validate_key(key, BackendKind::Memory)?;
        if let Some(namespace) = &options.namespace {
            validate_namespace(namespace, BackendKind::Memory)?;
        }
        let now = unix_millis();
        let expires_at = options.expires_at(now, BackendKind::Memory)?;
        self.with_keyspace(|keyspace, default_namespace| {
            let entry = Entry {
                key: key.to_string(),
                value: value.to_vec(),
                expires_at,
                namespace: options.namespace_or(default_namespace).to_string(),
                metadata: options.metadata.clone(),
                created_at: now,
                updated_at: now,
            };
            keyspace.set(entry, now)
        })
    }

    fn delete(&self, key: &str) -> Result<bool, StorageError> {
        validate_key(key, BackendKind::Memory)?;
        self.with_keyspace(|keyspace, _| Ok(keyspace.delete(key)))
    }

    fn keys(&self, namespace: &str, limit: usize) -> Result<Vec<String>, StorageError> {
        validate_namespace(namespace, BackendKind::Memory)?;
        self.with_keyspace(|keyspace, _| Ok(keyspace.keys(namespace, limit, unix_millis())))
    }

    fn list_append(
        &self,
        key: &str,
        value: &[u8],
        namespace: Option<&str>,
    ) -> Result<u64, StorageError> {
        validate_key(key, BackendKind::Memory)?;
        if let Some(namespace) = namespace {
            validate_namespace(namespace, BackendKind::Memory)?;
        }
        self.with_keyspace(|keyspace, default_namespace| {
            keyspace.list_append(key, value, namespace.unwrap_or(default_namespace), unix_millis())
        })
    }

    fn list_read(&self, key: &str) -> Result<Vec<ListEntry>, StorageError> {
        validate_key(key, BackendKind::Memory)?;
        self.with_keyspace(|keyspace, _| keyspace.list_read(key, unix_millis()))
    }

    fn list_len(&self, key: &str) -> Result<u64, StorageError> {
        validate_key(key, BackendKind::Memory)?;
        self.with_keyspace(|keyspace, _| keyspace.list_len(key, unix_millis()))
    }

    fn list_clear(&self, key: &str) -> Result<u64, StorageError> {
        validate_key(key, BackendKind::Memory)?;
        self.with_keyspace(|keyspace, _| keyspace.list_clear(key, unix_millis()))
    }

    fn purge_expired(&self) -> Result<u64, StorageError> {
        self.manager.purge_expired()
    }

    fn readiness(&self) -> Result<(), StorageError> {
        self.with_keyspace(|_, _| Ok(()))
    }
}
