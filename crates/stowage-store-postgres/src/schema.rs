// crates/stowage-store-postgres/src/schema.rs
// ============================================================================
// Module: Postgres Schema Provisioner
// Description: Schema DDL and statement text for the relational engine.
// Purpose: Embed the validated schema name once and provision tables
//          idempotently under an advisory lock.
// Dependencies: postgres, stowage-core
// ============================================================================

//! ## Overview
//! The schema name is the only identifier interpolated into SQL. It is
//! canonicalized by [`SchemaIdent`] and quoted; every value is a bound
//! parameter. Provisioning runs in one transaction that first takes a
//! transaction-scoped advisory lock keyed by the schema name, so processes
//! provisioning the same schema concurrently do not race on the catalog.

// ============================================================================
// SECTION: Imports
// ============================================================================

use postgres::Client;
use postgres_types::Type;
use stowage_core::SchemaIdent;
use stowage_core::StorageError;

use crate::native::postgres_error;
use crate::runner::query_in_transaction;

/// Transaction-scoped lock serializing provisioning of one schema.
const ADVISORY_LOCK_SQL: &str = "SELECT pg_advisory_xact_lock(hashtext($1))";

// ============================================================================
// SECTION: Schema
// ============================================================================

/// Validated schema plus the SQL built from it.
#[derive(Debug, Clone)]
pub struct PostgresSchema {
    /// Schema identifier.
    schema: SchemaIdent,
    /// Provisioning script.
    ddl: String,
    /// Statement text keyed by operation.
    pub(crate) sql: PostgresStatements,
}

/// Statement text for each store operation.
#[derive(Debug, Clone)]
pub(crate) struct PostgresStatements {
    /// Live entry lookup.
    pub(crate) get_entry: String,
    /// Value upsert.
    pub(crate) upsert: String,
    /// Value delete, returning the removed count.
    pub(crate) delete: String,
    /// Live key listing.
    pub(crate) keys: String,
    /// List append returning the assigned position.
    pub(crate) list_append: String,
    /// Ordered list read.
    pub(crate) list_read: String,
    /// List length.
    pub(crate) list_len: String,
    /// List delete, returning the removed count.
    pub(crate) list_clear: String,
    /// Bounded expiry delete, returning the removed count.
    pub(crate) purge_expired: String,
}

impl PostgresSchema {
    /// Builds the SQL for a schema.
    #[must_use]
    pub fn new(schema: SchemaIdent) -> Self {
        let quoted = schema.quoted();
        let kv = format!("{quoted}.\"kv\"");
        let list = format!("{quoted}.\"list\"");
        let ddl = format!(
            "CREATE SCHEMA IF NOT EXISTS {quoted};
            CREATE TABLE IF NOT EXISTS {kv} (
                key TEXT PRIMARY KEY,
                value BYTEA NOT NULL,
                namespace TEXT NOT NULL,
                expires_at BIGINT,
                metadata JSONB,
                created_at BIGINT NOT NULL,
                updated_at BIGINT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS kv_namespace_idx ON {kv} (namespace, key);
            CREATE INDEX IF NOT EXISTS kv_expires_idx ON {kv} (expires_at)
                WHERE expires_at IS NOT NULL;
            CREATE TABLE IF NOT EXISTS {list} (
                key TEXT NOT NULL,
                position BIGINT NOT NULL,
                value BYTEA NOT NULL,
                namespace TEXT NOT NULL,
                created_at BIGINT NOT NULL,
                PRIMARY KEY (key, position)
            );
            CREATE INDEX IF NOT EXISTS list_namespace_idx ON {list} (namespace);"
        );
        let sql = PostgresStatements {
            get_entry: format!(
                "SELECT key, value, namespace, expires_at, metadata, created_at, updated_at \
                 FROM {kv} WHERE key = $1 AND (expires_at IS NULL OR expires_at > $2)"
            ),
            upsert: format!(
                "INSERT INTO {kv} AS existing (key, value, namespace, expires_at, metadata, \
                 created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $6) ON CONFLICT (key) \
                 DO UPDATE SET value = EXCLUDED.value, namespace = EXCLUDED.namespace, \
                 expires_at = EXCLUDED.expires_at, metadata = EXCLUDED.metadata, created_at = \
                 CASE WHEN existing.expires_at IS NOT NULL AND existing.expires_at <= \
                 EXCLUDED.updated_at THEN EXCLUDED.created_at ELSE existing.created_at END, \
                 updated_at = EXCLUDED.updated_at"
            ),
            delete: format!(
                "WITH removed AS (DELETE FROM {kv} WHERE key = $1 RETURNING 1) SELECT COUNT(*) \
                 FROM removed"
            ),
            keys: format!(
                "SELECT key FROM {kv} WHERE namespace = $1 AND (expires_at IS NULL OR expires_at \
                 > $2) ORDER BY key ASC LIMIT $3"
            ),
            list_append: format!(
                "INSERT INTO {list} (key, position, value, namespace, created_at) SELECT \
                 $1::text, COALESCE(MAX(position) + 1, 0), $2::bytea, $3::text, $4::bigint FROM \
                 {list} WHERE key = $1::text RETURNING position"
            ),
            list_read: format!(
                "SELECT key, position, value, namespace, created_at FROM {list} WHERE key = $1 \
                 ORDER BY position ASC"
            ),
            list_len: format!("SELECT COUNT(*) FROM {list} WHERE key = $1"),
            list_clear: format!(
                "WITH removed AS (DELETE FROM {list} WHERE key = $1 RETURNING 1) SELECT COUNT(*) \
                 FROM removed"
            ),
            purge_expired: format!(
                "WITH removed AS (DELETE FROM {kv} WHERE key IN (SELECT key FROM {kv} WHERE \
                 expires_at IS NOT NULL AND expires_at < $1 ORDER BY expires_at ASC LIMIT $2) \
                 RETURNING 1) SELECT COUNT(*) FROM removed"
            ),
        };
        Self {
            schema,
            ddl,
            sql,
        }
    }

    /// Returns the schema identifier.
    #[must_use]
    pub const fn schema(&self) -> &SchemaIdent {
        &self.schema
    }

    /// Returns the provisioning script.
    #[must_use]
    pub fn ddl(&self) -> &str {
        &self.ddl
    }

    /// Creates the schema, tables, and indexes (idempotent).
    ///
    /// The advisory lock statement honors `prepared`; the DDL itself runs
    /// over the simple query protocol.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the DDL fails.
    pub fn provision(&self, client: &mut Client, prepared: bool) -> Result<(), StorageError> {
        let mut tx = client.transaction().map_err(postgres_error)?;
        let lock_key = format!("stowage:{}", self.schema.as_str());
        query_in_transaction(&mut tx, prepared, ADVISORY_LOCK_SQL, &[(&lock_key, Type::TEXT)])?;
        tx.batch_execute(&self.ddl).map_err(postgres_error)?;
        tx.commit().map_err(postgres_error)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, reason = "Unit tests use expect for setup clarity.")]
mod tests {
    use stowage_core::BackendKind;
    use stowage_core::SchemaIdent;

    use super::PostgresSchema;

    fn schema(raw: &str) -> PostgresSchema {
        PostgresSchema::new(SchemaIdent::parse(raw, BackendKind::Postgres).expect("schema"))
    }

    #[test]
    fn tables_are_schema_qualified_and_quoted() {
        let schema = schema("Tenant_A");
        assert!(schema.ddl().starts_with("CREATE SCHEMA IF NOT EXISTS \"tenant_a\";"));
        assert!(schema.sql.get_entry.contains("FROM \"tenant_a\".\"kv\""));
        assert!(schema.sql.list_read.contains("FROM \"tenant_a\".\"list\""));
    }

    #[test]
    fn every_structure_is_created_conditionally() {
        let schema = schema("stowage");
        let statements: Vec<&str> =
            schema.ddl().split(';').map(str::trim).filter(|s| !s.is_empty()).collect();
        assert_eq!(statements.len(), 6);
        assert!(statements.iter().all(|statement| statement.contains("IF NOT EXISTS")));
        assert!(schema.ddl().contains("WHERE expires_at IS NOT NULL"));
    }

    #[test]
    fn upsert_resets_created_at_only_for_expired_rows() {
        let upsert = schema("stowage").sql.upsert;
        assert!(upsert.contains("INSERT INTO \"stowage\".\"kv\" AS existing"));
        assert!(upsert.contains(
            "WHEN existing.expires_at IS NOT NULL AND existing.expires_at <= EXCLUDED.updated_at \
             THEN EXCLUDED.created_at ELSE existing.created_at END"
        ));
    }

    #[test]
    fn injection_attempts_never_reach_sql() {
        for raw in ["x\"; DROP SCHEMA public; --", "a b", "1abc", ""] {
            assert!(SchemaIdent::parse(raw, BackendKind::Postgres).is_err(), "{raw}");
        }
    }
}
