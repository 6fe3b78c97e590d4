// crates/stowage-core/src/store.rs
// ============================================================================
// Module: Stowage Store Contract
// Description: Uniform key-value and ordered-list contract for all backends.
// Purpose: Let callers persist state without knowing which engine is active.
// Dependencies: crate::{error, model}
// ============================================================================

//! ## Overview
//! [`Store`] is the only surface callers see. Implementations must never
//! return logically expired entries, must translate every native failure
//! through [`crate::map_error`], and must be safe to call from many threads at
//! once. Absence is reported as `Ok(None)` so callers can tell it apart from a
//! transient failure; [`Store::fetch`] is available for callers that prefer a
//! `NotFound` error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use crate::error::BackendKind;
use crate::error::StorageError;
use crate::model::Entry;
use crate::model::ListEntry;
use crate::model::SetOptions;

// ============================================================================
// SECTION: Store Trait
// ============================================================================

/// Backend-agnostic key-value and ordered-list store.
pub trait Store: Send + Sync {
    /// Returns the backend discriminator.
    fn backend(&self) -> BackendKind;

    /// Loads a live value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.get_entry(key)?.map(|entry| entry.value))
    }

    /// Loads a live entry with metadata and timestamps.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the backend cannot be read.
    fn get_entry(&self, key: &str) -> Result<Option<Entry>, StorageError>;

    /// Loads a live value, reporting absence as a `NotFound` error.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] of kind `NotFound` when the key is absent or
    /// expired, or any backend failure.
    fn fetch(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.get(key)?.ok_or_else(|| StorageError::not_found(self.backend(), key))
    }

    /// Upserts a value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when validation or the write fails.
    fn set(&self, key: &str, value: &[u8], options: &SetOptions) -> Result<(), StorageError>;

    /// Deletes a value, returning whether a row existed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the delete fails.
    fn delete(&self, key: &str) -> Result<bool, StorageError>;

    /// Returns whether a live value exists.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the backend cannot be read.
    fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.get_entry(key)?.is_some())
    }

    /// Lists live keys in a namespace, ascending, up to `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the backend cannot be read.
    fn keys(&self, namespace: &str, limit: usize) -> Result<Vec<String>, StorageError>;

    /// Appends to an ordered list, returning the assigned position.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`]; a `Conflict` means another writer claimed the
    /// same position and the append may be retried.
    fn list_append(
        &self,
        key: &str,
        value: &[u8],
        namespace: Option<&str>,
    ) -> Result<u64, StorageError>;

    /// Reads an ordered list by ascending position.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the backend cannot be read.
    fn list_read(&self, key: &str) -> Result<Vec<ListEntry>, StorageError>;

    /// Returns the number of entries in a list.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the backend cannot be read.
    fn list_len(&self, key: &str) -> Result<u64, StorageError>;

    /// Removes every entry of a list, returning the removed count.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the delete fails.
    fn list_clear(&self, key: &str) -> Result<u64, StorageError>;

    /// Runs one bounded expiry sweep, returning the number of purged entries.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the sweep fails.
    fn purge_expired(&self) -> Result<u64, StorageError>;

    /// Reports store readiness for liveness/readiness probes.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the store is unavailable.
    fn readiness(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Shared, type-erased store handle.
pub type SharedStore = Arc<dyn Store>;
