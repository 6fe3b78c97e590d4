// crates/stowage-store-sqlite/src/config.rs
// ============================================================================
// Module: SQLite Store Configuration
// Description: Pool, pragma, and table-prefix settings for the file engine.
// Purpose: Give every SQLite tunable an explicit, documented default.
// Dependencies: serde, stowage-core
// ============================================================================

//! ## Overview
//! [`SqliteStoreConfig`] is deserialized from the `[storage.sqlite]` table.
//! Every field has a named default; [`SqliteStoreConfig::validate`] rejects
//! zero sizes and timeouts, unsafe paths, and invalid table prefixes before a
//! pool is ever built.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use stowage_core::BackendKind;
use stowage_core::SchemaIdent;
use stowage_core::StorageError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default database file.
pub const DEFAULT_SQLITE_PATH: &str = "data/stowage.db";
/// Default table prefix.
pub const DEFAULT_TABLE_PREFIX: &str = "stowage";
/// Default maximum pooled connections.
pub const DEFAULT_POOL_MAX_SIZE: u32 = 8;
/// Default pool checkout timeout (ms).
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 2_000;
/// Default idle connection lifetime (ms).
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 300_000;
/// Default busy timeout (ms).
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Special filename `SQLite` treats as a private in-memory database.
const IN_MEMORY_PATH: &str = ":memory:";
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Pragmas
// ============================================================================

/// `SQLite` journal mode.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteJournalMode {
    /// Write-ahead log; readers do not block the writer.
    #[default]
    Wal,
    /// Rollback journal deleted at commit.
    Delete,
}

impl SqliteJournalMode {
    /// Returns the pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` synchronous mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Sync on every commit.
    #[default]
    Full,
    /// Sync at checkpoints only.
    Normal,
}

impl SqliteSyncMode {
    /// Returns the pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

// ============================================================================
// SECTION: Config
// ============================================================================

/// Configuration for the `SQLite` store.
///
/// # Invariants
/// - `path` names a file on disk, never a directory or an in-memory database.
/// - `table_prefix` satisfies the schema identifier rules.
/// - Sizes and timeouts are greater than zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SqliteStoreConfig {
    /// Database file path.
    #[serde(default = "default_path")]
    pub path: PathBuf,
    /// Prefix for the key-value and list tables.
    #[serde(default = "default_table_prefix")]
    pub table_prefix: String,
    /// Maximum pooled connections.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
    /// Pool checkout timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Idle connection lifetime in milliseconds.
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// Synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for SqliteStoreConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            table_prefix: default_table_prefix(),
            pool_max_size: DEFAULT_POOL_MAX_SIZE,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteJournalMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl SqliteStoreConfig {
    /// Creates a config for `path` with every other field defaulted.
    #[must_use]
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` [`StorageError`] describing the first problem.
    pub fn validate(&self) -> Result<(), StorageError> {
        validate_store_path(&self.path)?;
        self.table_prefix()?;
        let checks = [
            (self.pool_max_size == 0, "pool_max_size"),
            (self.connect_timeout_ms == 0, "connect_timeout_ms"),
            (self.idle_timeout_ms == 0, "idle_timeout_ms"),
            (self.busy_timeout_ms == 0, "busy_timeout_ms"),
        ];
        if let Some((_, field)) = checks.iter().find(|(invalid, _)| *invalid) {
            return Err(StorageError::validation(
                BackendKind::Sqlite,
                format!("sqlite {field} must be greater than zero"),
            ));
        }
        Ok(())
    }

    /// Returns the validated table prefix.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` [`StorageError`] for an invalid prefix.
    pub fn table_prefix(&self) -> Result<SchemaIdent, StorageError> {
        SchemaIdent::parse(&self.table_prefix, BackendKind::Sqlite)
    }
}

/// Returns the default database path.
fn default_path() -> PathBuf {
    PathBuf::from(DEFAULT_SQLITE_PATH)
}

/// Returns the default table prefix.
fn default_table_prefix() -> String {
    DEFAULT_TABLE_PREFIX.to_string()
}

/// Returns the default pool size.
const fn default_pool_max_size() -> u32 {
    DEFAULT_POOL_MAX_SIZE
}

/// Returns the default checkout timeout.
const fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

/// Returns the default idle timeout.
const fn default_idle_timeout_ms() -> u64 {
    DEFAULT_IDLE_TIMEOUT_MS
}

/// Returns the default busy timeout.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), StorageError> {
    let invalid = |message: &str| StorageError::validation(BackendKind::Sqlite, message);
    if path.as_os_str().is_empty() {
        return Err(invalid("sqlite path must not be empty"));
    }
    if path.as_os_str().len() > MAX_TOTAL_PATH_LENGTH {
        return Err(invalid("sqlite path exceeds length limit"));
    }
    if path.components().any(|component| component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH)
    {
        return Err(invalid("sqlite path contains an overlong component"));
    }
    if is_in_memory(path) {
        return Err(invalid("sqlite path must name a file; in-memory databases are not pooled"));
    }
    if path.is_dir() {
        return Err(invalid("sqlite path must be a file, not a directory"));
    }
    Ok(())
}

/// Returns true for paths `SQLite` opens as a private in-memory database.
///
/// Each pooled connection would get its own empty database, so only the
/// connection that provisioned the schema would see the tables.
fn is_in_memory(path: &Path) -> bool {
    path.to_str().is_some_and(|raw| {
        raw == IN_MEMORY_PATH || (raw.starts_with("file:") && raw.contains("mode=memory"))
    })
}
