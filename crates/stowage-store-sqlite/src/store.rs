// crates/stowage-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Store Adapter
// Description: Store contract over pooled SQLite connections.
// Purpose: Persist key-value entries and ordered lists in a local file.
// Dependencies: r2d2, rusqlite, serde_json, stowage-core
// ============================================================================

//! ## Overview
//! [`SqliteStore`] translates each [`Store`] operation into one statement
//! against a pooled connection. Expired rows are filtered in SQL, so a row
//! awaiting the next sweep is never returned. List appends compute
//! `MAX(position) + 1` inside a single `INSERT ... SELECT`, which `SQLite`
//! runs under the database write lock; the `(key, position)` primary key
//! turns any lost race into a retryable `Conflict`.
//!
//! Key-value rows and list rows live in separate tables, so `set` leaves a
//! list under the same key untouched.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::params;
use serde_json::Value;
use stowage_core::BackendKind;
use stowage_core::ConnectionManager;
use stowage_core::Entry;
use stowage_core::ListEntry;
use stowage_core::ManagerOptions;
use stowage_core::NativeError;
use stowage_core::SetOptions;
use stowage_core::StorageError;
use stowage_core::Store;
use stowage_core::map_error;
use stowage_core::pool_error;
use stowage_core::position_from_db;
use stowage_core::unix_millis;
use stowage_core::validate_key;
use stowage_core::validate_namespace;

use crate::backend::SqliteBackend;
use crate::config::SqliteStoreConfig;
use crate::native::sqlite_error;
use crate::schema::SqliteStatements;

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed [`Store`].
#[derive(Clone)]
pub struct SqliteStore {
    /// Shared connection manager.
    manager: Arc<ConnectionManager<SqliteBackend>>,
}

impl SqliteStore {
    /// Creates a store; the database is opened on first use.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` [`StorageError`] for an invalid configuration.
    pub fn new(config: SqliteStoreConfig, options: ManagerOptions) -> Result<Self, StorageError> {
        options.validate(BackendKind::Sqlite)?;
        let backend = SqliteBackend::new(config)?;
        Ok(Self::from_manager(Arc::new(ConnectionManager::new(backend, options))))
    }

    /// Wraps an existing manager.
    #[must_use]
    pub const fn from_manager(manager: Arc<ConnectionManager<SqliteBackend>>) -> Self {
        Self {
            manager,
        }
    }

    /// Returns the connection manager.
    #[must_use]
    pub const fn manager(&self) -> &Arc<ConnectionManager<SqliteBackend>> {
        &self.manager
    }

    /// Closes the underlying manager.
    pub fn close(&self) {
        self.manager.close();
    }

    /// Runs `f` with a pooled connection, the statements, and the default
    /// namespace.
    fn with_connection<T>(
        &self,
        f: impl FnOnce(&Connection, &SqliteStatements, &str) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let handle = self.manager.get_connection()?;
        let sql = &self.manager.backend().schema().sql;
        handle.with_pool(|pool| {
            let connection = pool.get().map_err(|err| pool_error(err, BackendKind::Sqlite))?;
            f(&connection, sql, handle.namespace())
        })
    }
}

impl Store for SqliteStore {
    fn backend(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn get_entry(&self, key: &str) -> Result<Option<Entry>, StorageError> {
        validate_key(key, BackendKind::Sqlite)?;
        self.with_connection(|connection, sql, _| {
            let row = connection
                .prepare_cached(&sql.get_entry)
                .and_then(|mut stmt| {
                    stmt.query_row(params![key, unix_millis()], read_entry_row).optional()
                })
                .map_err(sqlite_error)?;
            row.map(EntryRow::into_entry).transpose()
        })
    }

    fn set(&self, key: &str, value: &[u8], options: &SetOptions) -> Result<(), StorageError> {
        validate_key(key, BackendKind::Sqlite)?;
        if let Some(namespace) = &options.namespace {
            validate_namespace(namespace, BackendKind::Sqlite)?;
        }
        let metadata = options.metadata.as_ref().map(encode_metadata).transpose()?;
        self.with_connection(|connection, sql, default_namespace| {
            let now = unix_millis();
            let expires_at = options.expires_at(now, BackendKind::Sqlite)?;
            let namespace = options.namespace_or(default_namespace);
            connection
                .prepare_cached(&sql.upsert)
                .and_then(|mut stmt| {
                    stmt.execute(params![key, value, namespace, expires_at, metadata, now])
                })
                .map_err(sqlite_error)?;
            Ok(())
        })
    }

    fn delete(&self, key: &str) -> Result<bool, StorageError> {
        validate_key(key, BackendKind::Sqlite)?;
        self.with_connection(|connection, sql, _| {
            let deleted = connection
                .prepare_cached(&sql.delete)
                .and_then(|mut stmt| stmt.execute(params![key]))
                .map_err(sqlite_error)?;
            Ok(deleted > 0)
        })
    }

    fn keys(&self, namespace: &str, limit: usize) -> Result<Vec<String>, StorageError> {
        validate_namespace(namespace, BackendKind::Sqlite)?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_connection(|connection, sql, _| {
            connection
                .prepare_cached(&sql.keys)
                .and_then(|mut stmt| {
                    stmt.query_map(params![namespace, unix_millis(), limit], |row| row.get(0))?
                        .collect::<Result<Vec<String>, _>>()
                })
                .map_err(sqlite_error)
        })
    }

    fn list_append(
        &self,
        key: &str,
        value: &[u8],
        namespace: Option<&str>,
    ) -> Result<u64, StorageError> {
        validate_key(key, BackendKind::Sqlite)?;
        if let Some(namespace) = namespace {
            validate_namespace(namespace, BackendKind::Sqlite)?;
        }
        self.with_connection(|connection, sql, default_namespace| {
            let namespace = namespace.unwrap_or(default_namespace);
            let position: i64 = connection
                .prepare_cached(&sql.list_append)
                .and_then(|mut stmt| {
                    stmt.query_row(params![key, value, namespace, unix_millis()], |row| row.get(0))
                })
                .map_err(sqlite_error)?;
            position_from_db(position, BackendKind::Sqlite)
        })
    }

    fn list_read(&self, key: &str) -> Result<Vec<ListEntry>, StorageError> {
        validate_key(key, BackendKind::Sqlite)?;
        self.with_connection(|connection, sql, _| {
            let rows = connection
                .prepare_cached(&sql.list_read)
                .and_then(|mut stmt| {
                    stmt.query_map(params![key], |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
                    })?
                    .collect::<Result<Vec<(String, i64, Vec<u8>, String, i64)>, _>>()
                })
                .map_err(sqlite_error)?;
            rows.into_iter()
                .map(|(key, position, value, namespace, created_at)| {
                    Ok(ListEntry {
                        key,
                        position: position_from_db(position, BackendKind::Sqlite)?,
                        value,
                        namespace,
                        created_at,
                    })
                })
                .collect()
        })
    }

    fn list_len(&self, key: &str) -> Result<u64, StorageError> {
        validate_key(key, BackendKind::Sqlite)?;
        self.with_connection(|connection, sql, _| {
            let count: i64 = connection
                .prepare_cached(&sql.list_len)
                .and_then(|mut stmt| stmt.query_row(params![key], |row| row.get(0)))
                .map_err(sqlite_error)?;
            position_from_db(count, BackendKind::Sqlite)
        })
    }

    fn list_clear(&self, key: &str) -> Result<u64, StorageError> {
        validate_key(key, BackendKind::Sqlite)?;
        self.with_connection(|connection, sql, _| {
            let deleted = connection
                .prepare_cached(&sql.list_clear)
                .and_then(|mut stmt| stmt.execute(params![key]))
                .map_err(sqlite_error)?;
            Ok(u64::try_from(deleted).unwrap_or(u64::MAX))
        })
    }

    fn purge_expired(&self) -> Result<u64, StorageError> {
        self.manager.purge_expired()
    }

    fn readiness(&self) -> Result<(), StorageError> {
        self.with_connection(|connection, _, _| {
            connection
                .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                .map_err(sqlite_error)?;
            Ok(())
        })
    }
}

// ============================================================================
// SECTION: Row Decoding
// ============================================================================

/// Raw key-value row before metadata decoding.
struct EntryRow {
    /// Entry key.
    key: String,
    /// Stored value.
    value: Vec<u8>,
    /// Namespace.
    namespace: String,
    /// Expiry (unix ms).
    expires_at: Option<i64>,
    /// Metadata JSON text.
    metadata: Option<String>,
    /// Creation time (unix ms).
    created_at: i64,
    /// Update time (unix ms).
    updated_at: i64,
}

impl EntryRow {
    /// Decodes metadata and builds the public entry.
    fn into_entry(self) -> Result<Entry, StorageError> {
        let metadata = self.metadata.as_deref().map(decode_metadata).transpose()?;
        Ok(Entry {
            key: self.key,
            value: self.value,
            expires_at: self.expires_at,
            namespace: self.namespace,
            metadata,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Reads one key-value row.
fn read_entry_row(row: &Row<'_>) -> Result<EntryRow, rusqlite::Error> {
    Ok(EntryRow {
        key: row.get(0)?,
        value: row.get(1)?,
        namespace: row.get(2)?,
        expires_at: row.get(3)?,
        metadata: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Encodes metadata as JSON text.
fn encode_metadata(metadata: &Value) -> Result<String, StorageError> {
    serde_json::to_string(metadata).map_err(serde_error)
}

/// Decodes stored metadata JSON text.
fn decode_metadata(metadata: &str) -> Result<Value, StorageError> {
    serde_json::from_str(metadata).map_err(serde_error)
}

/// Maps JSON failures to `Serialization`.
fn serde_error(err: serde_json::Error) -> StorageError {
    map_error(NativeError::from_error(err).with_code("SERDE"), BackendKind::Sqlite)
}
