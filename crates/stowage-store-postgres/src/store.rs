// crates/stowage-store-postgres/src/store.rs
// ============================================================================
// Module: Postgres Store Adapter
// Description: Store contract over pooled Postgres clients.
// Purpose: Persist key-value entries and ordered lists in a shared database.
// Dependencies: postgres, postgres-types, serde_json, stowage-core
// ============================================================================

//! ## Overview
//! [`PostgresStore`] runs each [`Store`] operation as one statement on a
//! pooled client, in the statement mode the configuration selects.
//!
//! List appends compute the next position inside a single
//! `INSERT ... SELECT`. Two concurrent appends under `READ COMMITTED` can
//! pick the same position; the loser fails on the `(key, position)` primary
//! key and surfaces as a retryable `Conflict`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use postgres::Row;
use postgres_types::Type;
use serde_json::Value;
use stowage_core::BackendKind;
use stowage_core::ConnectionManager;
use stowage_core::Entry;
use stowage_core::ListEntry;
use stowage_core::ManagerOptions;
use stowage_core::SetOptions;
use stowage_core::StorageError;
use stowage_core::Store;
use stowage_core::position_from_db;
use stowage_core::unix_millis;
use stowage_core::validate_key;
use stowage_core::validate_namespace;

use crate::backend::PostgresBackend;
use crate::config::PostgresStoreConfig;
use crate::native::postgres_error;
use crate::runner::Runner;
use crate::runner::first_i64;
use crate::schema::PostgresStatements;

// ============================================================================
// SECTION: Store
// ============================================================================

/// Postgres-backed [`Store`].
#[derive(Clone)]
pub struct PostgresStore {
    /// Shared connection manager.
    manager: Arc<ConnectionManager<PostgresBackend>>,
}

impl PostgresStore {
    /// Creates a store; no connection is attempted until first use.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` [`StorageError`] for an invalid configuration.
    pub fn new(
        config: PostgresStoreConfig,
        options: ManagerOptions,
    ) -> Result<Self, StorageError> {
        options.validate(BackendKind::Postgres)?;
        let backend = PostgresBackend::new(config)?;
        Ok(Self::from_manager(Arc::new(ConnectionManager::new(backend, options))))
    }

    /// Wraps an existing manager.
    #[must_use]
    pub const fn from_manager(manager: Arc<ConnectionManager<PostgresBackend>>) -> Self {
        Self {
            manager,
        }
    }

    /// Returns the connection manager.
    #[must_use]
    pub const fn manager(&self) -> &Arc<ConnectionManager<PostgresBackend>> {
        &self.manager
    }

    /// Closes the underlying manager.
    pub fn close(&self) {
        self.manager.close();
    }

    /// Runs `f` with a checked-out client, a statement runner, and the
    /// default namespace.
    fn with_client<T>(
        &self,
        f: impl FnOnce(&mut Runner<'_>, &PostgresStatements, &str) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let handle = self.manager.get_connection()?;
        let backend = self.manager.backend();
        let prepared = backend.config().prepared_statements;
        let sql = &backend.schema().sql;
        handle.with_pool(|pool| {
            let mut client = pool.get()?;
            let mut runner = Runner::new(&mut client, prepared);
            f(&mut runner, sql, handle.namespace())
        })
    }
}

impl Store for PostgresStore {
    fn backend(&self) -> BackendKind {
        BackendKind::Postgres
    }

    fn get_entry(&self, key: &str) -> Result<Option<Entry>, StorageError> {
        validate_key(key, BackendKind::Postgres)?;
        self.with_client(|runner, sql, _| {
            let now = unix_millis();
            let rows =
                runner.query(&sql.get_entry, &[(&key, Type::TEXT), (&now, Type::INT8)])?;
            rows.first().map(read_entry).transpose()
        })
    }

    fn set(&self, key: &str, value: &[u8], options: &SetOptions) -> Result<(), StorageError> {
        validate_key(key, BackendKind::Postgres)?;
        if let Some(namespace) = &options.namespace {
            validate_namespace(namespace, BackendKind::Postgres)?;
        }
        self.with_client(|runner, sql, default_namespace| {
            let now = unix_millis();
            let expires_at = options.expires_at(now, BackendKind::Postgres)?;
            let namespace = options.namespace_or(default_namespace);
            runner.query(
                &sql.upsert,
                &[
                    (&key, Type::TEXT),
                    (&value, Type::BYTEA),
                    (&namespace, Type::TEXT),
                    (&expires_at, Type::INT8),
                    (&options.metadata, Type::JSONB),
                    (&now, Type::INT8),
                ],
            )?;
            Ok(())
        })
    }

    fn delete(&self, key: &str) -> Result<bool, StorageError> {
        validate_key(key, BackendKind::Postgres)?;
        self.with_client(|runner, sql, _| {
            let removed = runner.count(&sql.delete, &[(&key, Type::TEXT)])?;
            Ok(removed > 0)
        })
    }

    fn keys(&self, namespace: &str, limit: usize) -> Result<Vec<String>, StorageError> {
        validate_namespace(namespace, BackendKind::Postgres)?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_client(|runner, sql, _| {
            let now = unix_millis();
            let rows = runner.query(
                &sql.keys,
                &[(&namespace, Type::TEXT), (&now, Type::INT8), (&limit, Type::INT8)],
            )?;
            rows.iter().map(|row| row.try_get(0).map_err(postgres_error)).collect()
        })
    }

    fn list_append(
        &self,
        key: &str,
        value: &[u8],
        namespace: Option<&str>,
    ) -> Result<u64, StorageError> {
        validate_key(key, BackendKind::Postgres)?;
        if let Some(namespace) = namespace {
            validate_namespace(namespace, BackendKind::Postgres)?;
        }
        self.with_client(|runner, sql, default_namespace| {
            let namespace = namespace.unwrap_or(default_namespace);
            let now = unix_millis();
            let rows = runner.query(
                &sql.list_append,
                &[
                    (&key, Type::TEXT),
                    (&value, Type::BYTEA),
                    (&namespace, Type::TEXT),
                    (&now, Type::INT8),
                ],
            )?;
            let position = first_i64(&rows)?;
            position_from_db(position, BackendKind::Postgres)
        })
    }

    fn list_read(&self, key: &str) -> Result<Vec<ListEntry>, StorageError> {
        validate_key(key, BackendKind::Postgres)?;
        self.with_client(|runner, sql, _| {
            let rows = runner.query(&sql.list_read, &[(&key, Type::TEXT)])?;
            rows.iter().map(read_list_entry).collect()
        })
    }

    fn list_len(&self, key: &str) -> Result<u64, StorageError> {
        validate_key(key, BackendKind::Postgres)?;
        self.with_client(|runner, sql, _| runner.count(&sql.list_len, &[(&key, Type::TEXT)]))
    }

    fn list_clear(&self, key: &str) -> Result<u64, StorageError> {
        validate_key(key, BackendKind::Postgres)?;
        self.with_client(|runner, sql, _| runner.count(&sql.list_clear, &[(&key, Type::TEXT)]))
    }

    fn purge_expired(&self) -> Result<u64, StorageError> {
        self.manager.purge_expired()
    }

    fn readiness(&self) -> Result<(), StorageError> {
        self.with_client(|runner, _, _| {
            runner.client.simple_query("SELECT 1").map_err(postgres_error)?;
            Ok(())
        })
    }
}

// ============================================================================
// SECTION: Row Decoding
// ============================================================================

/// Decodes one key-value row.
fn read_entry(row: &Row) -> Result<Entry, StorageError> {
    let metadata: Option<Value> = row.try_get(4).map_err(postgres_error)?;
    Ok(Entry {
        key: row.try_get(0).map_err(postgres_error)?,
        value: row.try_get(1).map_err(postgres_error)?,
        namespace: row.try_get(2).map_err(postgres_error)?,
        expires_at: row.try_get(3).map_err(postgres_error)?,
        metadata,
        created_at: row.try_get(5).map_err(postgres_error)?,
        updated_at: row.try_get(6).map_err(postgres_error)?,
    })
}

/// Decodes one list row.
fn read_list_entry(row: &Row) -> Result<ListEntry, StorageError> {
    let position: i64 = row.try_get(1).map_err(postgres_error)?;
    Ok(ListEntry {
        key: row.try_get(0).map_err(postgres_error)?,
        position: position_from_db(position, BackendKind::Postgres)?,
        value: row.try_get(2).map_err(postgres_error)?,
        namespace: row.try_get(3).map_err(postgres_error)?,
        created_at: row.try_get(4).map_err(postgres_error)?,
    })
}
