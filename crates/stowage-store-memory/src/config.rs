// crates/stowage-store-memory/src/config.rs
// ============================================================================
// Module: Memory Store Configuration
// Description: Keyspace name and capacity for the cache engine.
// Purpose: Keep the cache engine's limits explicit.
// Dependencies: serde, stowage-core
// ============================================================================

//! ## Overview
//! Keyspace name and capacity for the cache engine.

use serde::Deserialize;
use serde::Serialize;
use stowage_core::BackendKind;
use stowage_core::SchemaIdent;
use stowage_core::StorageError;

/// Default keyspace name.
pub const DEFAULT_KEYSPACE_NAME: &str = "default";
/// Default maximum number of keys.
pub const DEFAULT_MAX_ENTRIES: usize = 100_000;

/// Configuration for the in-process cache engine.
///
/// # Invariants
/// - `name` satisfies the schema identifier rules.
/// - `max_entries` is greater than zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryStoreConfig {
    /// Keyspace name.
    #[serde(default = "default_name")]
    pub name: String,
    /// Maximum number of keys (values and lists together).
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl MemoryStoreConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` [`StorageError`] for a bad name or zero capacity.
    pub fn validate(&self) -> Result<(), StorageError> {
        self.keyspace_name()?;
        if self.max_entries == 0 {
            return Err(StorageError::validation(
                BackendKind::Memory,
                "memory max_entries must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Returns the validated keyspace name.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` [`StorageError`] for an invalid name.
    pub fn keyspace_name(&self) -> Result<SchemaIdent, StorageError> {
        SchemaIdent::parse(&self.name, BackendKind::Memory)
    }
}

/// Returns the default keyspace name.
fn default_name() -> String {
    DEFAULT_KEYSPACE_NAME.to_string()
}

/// Returns the default capacity.
const fn default_max_entries() -> usize {
    DEFAULT_MAX_ENTRIES
}
