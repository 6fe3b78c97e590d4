// crates/stowage-core/src/model.rs
// ============================================================================
// Module: Stowage Data Model
// Description: Entry, list entry, and write option types shared by backends.
// Purpose: Define the persisted shapes every store adapter reads and writes.
// Dependencies: serde, serde_json, crate::error
// ============================================================================

//! ## Overview
//! Values are opaque bytes. Timestamps are unix epoch milliseconds. An entry
//! whose `expires_at` lies in the past is logically deleted even while it is
//! still physically present.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::error::BackendKind;
use crate::error::StorageError;

// ============================================================================
// SECTION: Entries
// ============================================================================

/// Key-value entry.
///
/// # Invariants
/// - `key` is unique within a backend's storage scope.
/// - `expires_at <= now` means the entry is logically deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Entry key.
    pub key: String,
    /// Opaque serialized value.
    pub value: Vec<u8>,
    /// Absolute expiry (unix ms).
    pub expires_at: Option<i64>,
    /// Namespace the entry belongs to.
    pub namespace: String,
    /// Optional caller metadata.
    pub metadata: Option<Value>,
    /// Creation time (unix ms).
    pub created_at: i64,
    /// Last update time (unix ms).
    pub updated_at: i64,
}

impl Entry {
    /// Returns true when the entry is expired at `now_ms`.
    #[must_use]
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now_ms)
    }
}

/// Ordered-list entry.
///
/// # Invariants
/// - `(key, position)` is unique.
/// - Appends assign `max(position) + 1`, or `0` for an empty list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEntry {
    /// List key.
    pub key: String,
    /// Position within the list.
    pub position: u64,
    /// Opaque serialized value.
    pub value: Vec<u8>,
    /// Namespace the entry belongs to.
    pub namespace: String,
    /// Creation time (unix ms).
    pub created_at: i64,
}

// ============================================================================
// SECTION: Write Options
// ============================================================================

/// Options accepted by `set`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetOptions {
    /// Relative time-to-live.
    pub ttl: Option<Duration>,
    /// Namespace override (store default when `None`).
    pub namespace: Option<String>,
    /// Caller metadata stored alongside the value.
    pub metadata: Option<Value>,
}

impl SetOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the time-to-live.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Sets the namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Sets the metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Computes the absolute expiry for a write made at `now_ms`.
    ///
    /// Sub-millisecond TTLs round up to one millisecond.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` [`StorageError`] for a zero or overflowing TTL.
    pub fn expires_at(&self, now_ms: i64, backend: BackendKind) -> Result<Option<i64>, StorageError> {
        let Some(ttl) = self.ttl else {
            return Ok(None);
        };
        if ttl.is_zero() {
            return Err(StorageError::validation(backend, "ttl must be greater than zero"));
        }
        let millis = ttl.as_millis().max(1);
        let millis = i64::try_from(millis)
            .map_err(|_| StorageError::validation(backend, "ttl too large"))?;
        now_ms
            .checked_add(millis)
            .map(Some)
            .ok_or_else(|| StorageError::validation(backend, "ttl too large"))
    }

    /// Returns the namespace to store under.
    #[must_use]
    pub fn namespace_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.namespace.as_deref().unwrap_or(default)
    }
}

// ============================================================================
// SECTION: Time
// ============================================================================

/// Returns the current unix epoch in milliseconds.
#[must_use]
pub fn unix_millis() -> i64 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}

/// Converts a stored list position into its public form.
///
/// # Errors
///
/// Returns a `Corrupted` [`StorageError`] for negative stored positions.
pub fn position_from_db(position: i64, backend: BackendKind) -> Result<u64, StorageError> {
    u64::try_from(position).map_err(|_| {
        StorageError::new(
            crate::error::ErrorKind::Corrupted,
            backend,
            format!("negative list position stored: {position}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::Entry;
    use super::SetOptions;
    use super::position_from_db;
    use crate::error::BackendKind;
    use crate::error::ErrorKind;

    #[test]
    fn ttl_is_converted_to_absolute_expiry() {
        let options = SetOptions::new().with_ttl(Duration::from_secs(2));
        assert_eq!(options.expires_at(1_000, BackendKind::Generic).ok(), Some(Some(3_000)));
        assert_eq!(SetOptions::new().expires_at(1_000, BackendKind::Generic).ok(), Some(None));
    }

    #[test]
    fn sub_millisecond_ttl_rounds_up() {
        let options = SetOptions::new().with_ttl(Duration::from_micros(10));
        assert_eq!(options.expires_at(5, BackendKind::Generic).ok(), Some(Some(6)));
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let options = SetOptions::new().with_ttl(Duration::ZERO);
        let err = options.expires_at(5, BackendKind::Generic).err().map(|err| err.kind());
        assert_eq!(err, Some(ErrorKind::Validation));
    }

    #[test]
    fn expiry_boundary_counts_as_expired() {
        let entry = Entry {
            key: "k".to_string(),
            value: vec![1],
            expires_at: Some(10),
            namespace: "default".to_string(),
            metadata: None,
            created_at: 0,
            updated_at: 0,
        };
        assert!(!entry.is_expired_at(9));
        assert!(entry.is_expired_at(10));
    }

    #[test]
    fn negative_positions_are_corruption() {
        let err = position_from_db(-1, BackendKind::Sqlite).err().map(|err| err.kind());
        assert_eq!(err, Some(ErrorKind::Corrupted));
        assert_eq!(position_from_db(3, BackendKind::Sqlite).ok(), Some(3));
    }
}
