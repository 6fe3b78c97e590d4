// crates/stowage-store-sqlite/src/backend.rs
// ============================================================================
// Module: SQLite Connection Backend
// Description: r2d2 pool construction and lifecycle hooks for SQLite.
// Purpose: Plug the file engine into the generic connection manager.
// Dependencies: r2d2, r2d2_sqlite, rusqlite, stowage-core, tracing
// ============================================================================

//! ## Overview
//! [`SqliteBackend`] builds an r2d2 pool of `SQLite` connections. Every new
//! connection receives the busy timeout, journal mode, and sync pragmas
//! before it is handed out, so no checkout ever sees an unconfigured
//! connection.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io;
use std::path::Path;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use stowage_core::BackendKind;
use stowage_core::ConnectionBackend;
use stowage_core::NativeError;
use stowage_core::PoolObserver;
use stowage_core::StorageError;
use stowage_core::map_error;
use stowage_core::pool_error;
use tracing::warn;

use crate::config::SqliteStoreConfig;
use crate::native::sqlite_error;
use crate::schema::SqliteSchema;

/// Pool of `SQLite` connections.
pub type SqlitePool = Pool<SqliteConnectionManager>;

// ============================================================================
// SECTION: Backend
// ============================================================================

/// File-engine connection backend.
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    /// Store configuration.
    config: SqliteStoreConfig,
    /// Validated schema and statement text.
    schema: SqliteSchema,
}

impl SqliteBackend {
    /// Validates the configuration and derives the schema.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` [`StorageError`] for an invalid configuration.
    pub fn new(config: SqliteStoreConfig) -> Result<Self, StorageError> {
        config.validate()?;
        let schema = SqliteSchema::new(config.table_prefix()?)?;
        Ok(Self {
            config,
            schema,
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &SqliteStoreConfig {
        &self.config
    }

    /// Returns the schema.
    #[must_use]
    pub const fn schema(&self) -> &SqliteSchema {
        &self.schema
    }

    /// Builds the connection manager with per-connection pragmas.
    fn connection_manager(&self) -> SqliteConnectionManager {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
        let config = self.config.clone();
        SqliteConnectionManager::file(&self.config.path)
            .with_flags(flags)
            .with_init(move |connection| apply_pragmas(connection, &config))
    }
}

impl ConnectionBackend for SqliteBackend {
    type Pool = SqlitePool;

    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn schema_name(&self) -> &str {
        self.schema.prefix().as_str()
    }

    fn connect(&self) -> Result<Self::Pool, StorageError> {
        ensure_parent_dir(&self.config.path)?;
        let observer = PoolObserver::new(BackendKind::Sqlite);
        Pool::builder()
            .max_size(self.config.pool_max_size)
            .min_idle(Some(1))
            .connection_timeout(Duration::from_millis(self.config.connect_timeout_ms))
            .idle_timeout(Some(Duration::from_millis(self.config.idle_timeout_ms)))
            .error_handler(Box::new(observer))
            .event_handler(Box::new(observer))
            .build(self.connection_manager())
            .map_err(|err| pool_error(err, BackendKind::Sqlite))
    }

    fn provision(&self, pool: &Self::Pool) -> Result<(), StorageError> {
        let mut connection = pool.get().map_err(|err| pool_error(err, BackendKind::Sqlite))?;
        self.schema.provision(&mut connection)
    }

    fn purge_expired(
        &self,
        pool: &Self::Pool,
        now_ms: i64,
        limit: u32,
    ) -> Result<u64, StorageError> {
        let connection = pool.get().map_err(|err| pool_error(err, BackendKind::Sqlite))?;
        self.schema.purge_expired(&connection, now_ms, limit)
    }

    fn close_pool(&self, pool: Self::Pool) -> Result<(), StorageError> {
        let connection = pool.get().map_err(|err| pool_error(err, BackendKind::Sqlite))?;
        let checkpoint = connection
            .execute_batch("PRAGMA wal_checkpoint(PASSIVE);")
            .map_err(sqlite_error);
        drop(connection);
        drop(pool);
        if let Err(err) = &checkpoint {
            warn!(
                target: "storage",
                backend = %BackendKind::Sqlite,
                path = %self.config.path.display(),
                kind = %err.kind(),
                "wal checkpoint failed on close"
            );
        }
        checkpoint
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Applies the configured pragmas to a fresh connection.
fn apply_pragmas(
    connection: &mut Connection,
    config: &SqliteStoreConfig,
) -> Result<(), rusqlite::Error> {
    connection.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))?;
    Ok(())
}

/// Ensures the parent directory for the database exists.
fn ensure_parent_dir(path: &Path) -> Result<(), StorageError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent).map_err(io_error)
        }
        _ => Ok(()),
    }
}

/// Maps filesystem errors through the generic errno codes.
fn io_error(err: io::Error) -> StorageError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => "EACCES",
        io::ErrorKind::ReadOnlyFilesystem => "EROFS",
        io::ErrorKind::StorageFull => "ENOSPC",
        _ => "EIO",
    };
    map_error(NativeError::from_error(err).with_code(code), BackendKind::Sqlite)
}

#[cfg(test)]
#[allow(clippy::expect_used, reason = "Unit tests use expect for setup clarity.")]
mod tests {
    use std::io;

    use stowage_core::ConnectionBackend;
    use stowage_core::ErrorKind;
    use tempfile::TempDir;

    use super::SqliteBackend;
    use super::io_error;
    use crate::config::SqliteStoreConfig;

    #[test]
    fn close_pool_checkpoints_a_provisioned_database() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("close.db");
        let backend = SqliteBackend::new(SqliteStoreConfig::for_path(&path)).expect("backend");
        let pool = backend.connect().expect("connect");
        backend.provision(&pool).expect("provision");
        assert!(backend.close_pool(pool).is_ok());
        assert!(path.exists());
    }

    #[test]
    fn permission_denied_maps_to_read_only() {
        let mapped = io_error(io::Error::from(io::ErrorKind::PermissionDenied));
        assert_eq!(mapped.kind(), ErrorKind::ReadOnly);
        assert_eq!(mapped.code(), Some("EACCES"));
    }

    #[test]
    fn other_io_failures_map_to_io_error() {
        let mapped = io_error(io::Error::other("disk on fire"));
        assert_eq!(mapped.kind(), ErrorKind::IoError);
        assert!(mapped.retryable());
    }
}
