// crates/stowage-store-sqlite/src/schema.rs
// ============================================================================
// Module: SQLite Schema Provisioner
// Description: Table layout, DDL, and statement text for the file engine.
// Purpose: Interpolate validated identifiers exactly once, then reuse the
//          resulting SQL for every operation.
// Dependencies: rusqlite, stowage-core
// ============================================================================

//! ## Overview
//! Table and index names derive from a [`SchemaIdent`] prefix. Identifiers
//! cannot be bound as parameters, so they are validated by [`SchemaIdent`]
//! and quoted before being embedded; every value travels as a bound
//! parameter. Provisioning uses `IF NOT EXISTS` throughout and may run any
//! number of times.

// ============================================================================
// SECTION: Imports
// ============================================================================

use rusqlite::Connection;
use stowage_core::BackendKind;
use stowage_core::SchemaIdent;
use stowage_core::StorageError;

use crate::native::sqlite_error;

// ============================================================================
// SECTION: Schema
// ============================================================================

/// Validated table names plus the SQL built from them.
#[derive(Debug, Clone)]
pub struct SqliteSchema {
    /// Table prefix.
    prefix: SchemaIdent,
    /// Provisioning script.
    ddl: String,
    /// Statement text keyed by operation.
    pub(crate) sql: SqliteStatements,
}

/// Statement text for each store operation.
#[derive(Debug, Clone)]
pub(crate) struct SqliteStatements {
    /// Live entry lookup.
    pub(crate) get_entry: String,
    /// Value upsert.
    pub(crate) upsert: String,
    /// Value delete.
    pub(crate) delete: String,
    /// Live key listing.
    pub(crate) keys: String,
    /// List append returning the assigned position.
    pub(crate) list_append: String,
    /// Ordered list read.
    pub(crate) list_read: String,
    /// List length.
    pub(crate) list_len: String,
    /// List delete.
    pub(crate) list_clear: String,
    /// Bounded expiry delete.
    pub(crate) purge_expired: String,
}

impl SqliteSchema {
    /// Builds table names and SQL for a prefix.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` [`StorageError`] when a derived name is invalid.
    pub fn new(prefix: SchemaIdent) -> Result<Self, StorageError> {
        let backend = BackendKind::Sqlite;
        let kv = prefix.suffixed("kv", backend)?.quoted();
        let list = prefix.suffixed("list", backend)?.quoted();
        let kv_namespace_idx = prefix.suffixed("kv_namespace_idx", backend)?.quoted();
        let kv_expires_idx = prefix.suffixed("kv_expires_idx", backend)?.quoted();
        let list_namespace_idx = prefix.suffixed("list_namespace_idx", backend)?.quoted();
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {kv} (
                key TEXT PRIMARY KEY NOT NULL,
                value BLOB NOT NULL,
                namespace TEXT NOT NULL,
                expires_at INTEGER,
                metadata TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS {kv_namespace_idx} ON {kv} (namespace, key);
            CREATE INDEX IF NOT EXISTS {kv_expires_idx} ON {kv} (expires_at)
                WHERE expires_at IS NOT NULL;
            CREATE TABLE IF NOT EXISTS {list} (
                key TEXT NOT NULL,
                position INTEGER NOT NULL,
                value BLOB NOT NULL,
                namespace TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (key, position)
            );
            CREATE INDEX IF NOT EXISTS {list_namespace_idx} ON {list} (namespace);"
        );
        let sql = SqliteStatements {
            get_entry: format!(
                "SELECT key, value, namespace, expires_at, metadata, created_at, updated_at \
                 FROM {kv} WHERE key = ?1 AND (expires_at IS NULL OR expires_at > ?2)"
            ),
            upsert: format!(
                "INSERT INTO {kv} (key, value, namespace, expires_at, metadata, created_at, \
                 updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6) ON CONFLICT(key) DO UPDATE SET \
                 value = excluded.value, namespace = excluded.namespace, expires_at = \
                 excluded.expires_at, metadata = excluded.metadata, created_at = CASE WHEN \
                 expires_at IS NOT NULL AND expires_at <= excluded.updated_at THEN \
                 excluded.created_at ELSE created_at END, updated_at = excluded.updated_at"
            ),
            delete: format!("DELETE FROM {kv} WHERE key = ?1"),
            keys: format!(
                "SELECT key FROM {kv} WHERE namespace = ?1 AND (expires_at IS NULL OR \
                 expires_at > ?2) ORDER BY key ASC LIMIT ?3"
            ),
            list_append: format!(
                "INSERT INTO {list} (key, position, value, namespace, created_at) SELECT ?1, \
                 COALESCE(MAX(position) + 1, 0), ?2, ?3, ?4 FROM {list} WHERE key = ?1 \
                 RETURNING position"
            ),
            list_read: format!(
                "SELECT key, position, value, namespace, created_at FROM {list} WHERE key = ?1 \
                 ORDER BY position ASC"
            ),
            list_len: format!("SELECT COUNT(*) FROM {list} WHERE key = ?1"),
            list_clear: format!("DELETE FROM {list} WHERE key = ?1"),
            purge_expired: format!(
                "DELETE FROM {kv} WHERE key IN (SELECT key FROM {kv} WHERE expires_at IS NOT \
                 NULL AND expires_at < ?1 ORDER BY expires_at ASC LIMIT ?2)"
            ),
        };
        Ok(Self {
            prefix,
            ddl,
            sql,
        })
    }

    /// Returns the table prefix.
    #[must_use]
    pub const fn prefix(&self) -> &SchemaIdent {
        &self.prefix
    }

    /// Creates every table and index (idempotent).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the DDL fails.
    pub fn provision(&self, connection: &mut Connection) -> Result<(), StorageError> {
        let tx = connection.transaction().map_err(sqlite_error)?;
        tx.execute_batch(&self.ddl).map_err(sqlite_error)?;
        tx.commit().map_err(sqlite_error)
    }

    /// Deletes at most `limit` rows that expired before `now_ms`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the delete fails.
    pub fn purge_expired(
        &self,
        connection: &Connection,
        now_ms: i64,
        limit: u32,
    ) -> Result<u64, StorageError> {
        let deleted = connection
            .prepare_cached(&self.sql.purge_expired)
            .and_then(|mut stmt| stmt.execute(rusqlite::params![now_ms, i64::from(limit)]))
            .map_err(sqlite_error)?;
        Ok(u64::try_from(deleted).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, reason = "Unit tests use expect for setup clarity.")]
mod tests {
    use rusqlite::Connection;
    use stowage_core::BackendKind;
    use stowage_core::SchemaIdent;

    use super::SqliteSchema;

    fn schema(prefix: &str) -> SqliteSchema {
        let prefix = SchemaIdent::parse(prefix, BackendKind::Sqlite).expect("prefix");
        SqliteSchema::new(prefix).expect("schema")
    }

    #[test]
    fn provisioning_twice_creates_each_structure_once() {
        let schema = schema("twice");
        let mut connection = Connection::open_in_memory().expect("open");
        schema.provision(&mut connection).expect("first provision");
        schema.provision(&mut connection).expect("second provision");
        let count: i64 = connection
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name LIKE 'twice_%'",
                [],
                |row| row.get(0),
            )
            .expect("count");
        assert_eq!(count, 5);
    }

    #[test]
    fn expiry_index_is_partial() {
        let schema = schema("partial");
        let mut connection = Connection::open_in_memory().expect("open");
        schema.provision(&mut connection).expect("provision");
        let sql: String = connection
            .query_row(
                "SELECT sql FROM sqlite_master WHERE name = 'partial_kv_expires_idx'",
                [],
                |row| row.get(0),
            )
            .expect("index sql");
        assert!(sql.contains("WHERE expires_at IS NOT NULL"));
    }

    #[test]
    fn prefixes_are_canonicalized() {
        let schema = schema("  Tenant_A ");
        assert_eq!(schema.prefix().as_str(), "tenant_a");
        assert!(schema.sql.delete.contains("\"tenant_a_kv\""));
    }

    #[test]
    fn purge_respects_the_batch_limit() {
        let schema = schema("bounded");
        let mut connection = Connection::open_in_memory().expect("open");
        schema.provision(&mut connection).expect("provision");
        for index in 0 .. 5 {
            connection
                .execute(
                    "INSERT INTO bounded_kv (key, value, namespace, expires_at, created_at, \
                     updated_at) VALUES (?1, x'00', 'default', 10, 0, 0)",
                    [format!("k{index}")],
                )
                .expect("insert");
        }
        assert_eq!(schema.purge_expired(&connection, 100, 3).expect("purge"), 3);
        assert_eq!(schema.purge_expired(&connection, 100, 3).expect("purge"), 2);
        assert_eq!(schema.purge_expired(&connection, 100, 3).expect("purge"), 0);
    }
}
