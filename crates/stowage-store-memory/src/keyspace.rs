// crates/stowage-store-memory/src/keyspace.rs
// ============================================================================
// Module: Memory Keyspace
// Description: Sharded in-process keyspace and its connection backend.
// Purpose: Hold values and ordered lists in one keyspace with per-key
//          atomic updates.
// Dependencies: dashmap, stowage-core
// ============================================================================

//! ## Overview
//! A [`Keyspace`] maps each key to exactly one [`Slot`]: a value or an
//! ordered list. Writes take the shard lock for their key only, so list
//! appends are serialized per key without a global lock. Operations that
//! expect one slot kind and find the other fail with the `WRONGTYPE` code,
//! which maps to `Validation`.
//!
//! Capacity is checked before the shard lock is taken, so concurrent inserts
//! of new keys may overshoot `max_entries` by at most the number of writers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;
use stowage_core::BackendKind;
use stowage_core::ConnectionBackend;
use stowage_core::Entry;
use stowage_core::ListEntry;
use stowage_core::NativeError;
use stowage_core::SchemaIdent;
use stowage_core::StorageError;
use stowage_core::map_error;

use crate::config::MemoryStoreConfig;

// ============================================================================
// SECTION: Slots
// ============================================================================

/// Contents of one key.
#[derive(Debug, Clone)]
pub enum Slot {
    /// Key-value entry.
    Value(Entry),
    /// Ordered list, ascending by position.
    List(Vec<ListEntry>),
}

impl Slot {
    /// Returns true when the slot is a value that expired at `now_ms`.
    fn is_expired_value(&self, now_ms: i64) -> bool {
        matches!(self, Self::Value(entry) if entry.is_expired_at(now_ms))
    }
}

/// Builds the error for an operation against the wrong slot kind.
fn wrong_type(key: &str) -> StorageError {
    map_error(
        NativeError::new(format!("WRONGTYPE key {key} holds the wrong kind of value"))
            .with_code("WRONGTYPE"),
        BackendKind::Memory,
    )
}

// ============================================================================
// SECTION: Keyspace
// ============================================================================

/// Sharded keyspace.
#[derive(Debug)]
pub struct Keyspace {
    /// Slots by key.
    slots: DashMap<String, Slot>,
    /// Maximum number of keys.
    max_entries: usize,
}

impl Keyspace {
    /// Creates an empty keyspace.
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        Self {
            slots: DashMap::new(),
            max_entries,
        }
    }

    /// Returns the number of keys, including expired values not yet purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true when no key is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Rejects a new key once the keyspace is full.
    fn ensure_capacity(&self, key: &str) -> Result<(), StorageError> {
        if self.slots.len() >= self.max_entries && !self.slots.contains_key(key) {
            return Err(map_error(
                NativeError::new(format!("OOM keyspace holds {} keys", self.max_entries))
                    .with_code("OOM"),
                BackendKind::Memory,
            ));
        }
        Ok(())
    }

    /// Returns a live value entry.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` [`StorageError`] when the key holds a list.
    pub fn get(&self, key: &str, now_ms: i64) -> Result<Option<Entry>, StorageError> {
        match self.slots.get(key).as_deref() {
            None => Ok(None),
            Some(Slot::Value(entry)) if entry.is_expired_at(now_ms) => Ok(None),
            Some(Slot::Value(entry)) => Ok(Some(entry.clone())),
            Some(Slot::List(_)) => Err(wrong_type(key)),
        }
    }

    /// Stores a value, replacing whatever the key held.
    ///
    /// `created_at` survives overwrites of a live value.
    ///
    /// # Errors
    ///
    /// Returns a `QuotaExceeded` [`StorageError`] when the keyspace is full.
    pub fn set(&self, mut entry: Entry, now_ms: i64) -> Result<(), StorageError> {
        self.ensure_capacity(&entry.key)?;
        match self.slots.entry(entry.key.clone()) {
            MapEntry::Occupied(mut occupied) => {
                if let Slot::Value(previous) = occupied.get()
                    && !previous.is_expired_at(now_ms)
                {
                    entry.created_at = previous.created_at;
                }
                occupied.insert(Slot::Value(entry));
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(Slot::Value(entry));
            }
        }
        Ok(())
    }

    /// Removes a key of either kind, returning whether it existed.
    pub fn delete(&self, key: &str) -> bool {
        self.slots.remove(key).is_some()
    }

    /// Lists live value keys in a namespace, ascending.
    #[must_use]
    pub fn keys(&self, namespace: &str, limit: usize, now_ms: i64) -> Vec<String> {
        let mut keys: Vec<String> = self
            .slots
            .iter()
            .filter_map(|item| match item.value() {
                Slot::Value(entry)
                    if entry.namespace == namespace && !entry.is_expired_at(now_ms) =>
                {
                    Some(item.key().clone())
                }
                _ => None,
            })
            .collect();
        keys.sort_unstable();
        keys.truncate(limit);
        keys
    }

    /// Appends to a list, returning the assigned position.
    ///
    /// An expired value under the key is replaced by a new list.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` [`StorageError`] when the key holds a live
    /// value, or `QuotaExceeded` when the keyspace is full.
    pub fn list_append(
        &self,
        key: &str,
        value: &[u8],
        namespace: &str,
        now_ms: i64,
    ) -> Result<u64, StorageError> {
        self.ensure_capacity(key)?;
        let mut slot = self.slots.entry(key.to_string()).or_insert_with(|| Slot::List(Vec::new()));
        if slot.is_expired_value(now_ms) {
            *slot = Slot::List(Vec::new());
        }
        let Slot::List(items) = &mut *slot else {
            return Err(wrong_type(key));
        };
        let position = items.last().map_or(0, |last| last.position + 1);
        items.push(ListEntry {
            key: key.to_string(),
            position,
            value: value.to_vec(),
            namespace: namespace.to_string(),
            created_at: now_ms,
        });
        Ok(position)
    }

    /// Reads a list by ascending position.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` [`StorageError`] when the key holds a live value.
    pub fn list_read(&self, key: &str, now_ms: i64) -> Result<Vec<ListEntry>, StorageError> {
        match self.slots.get(key).as_deref() {
            None => Ok(Vec::new()),
            Some(Slot::List(items)) => Ok(items.clone()),
            Some(slot) if slot.is_expired_value(now_ms) => Ok(Vec::new()),
            Some(Slot::Value(_)) => Err(wrong_type(key)),
        }
    }

    /// Returns the length of a list.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` [`StorageError`] when the key holds a live value.
    pub fn list_len(&self, key: &str, now_ms: i64) -> Result<u64, StorageError> {
        match self.slots.get(key).as_deref() {
            None => Ok(0),
            Some(Slot::List(items)) => Ok(u64::try_from(items.len()).unwrap_or(u64::MAX)),
            Some(slot) if slot.is_expired_value(now_ms) => Ok(0),
            Some(Slot::Value(_)) => Err(wrong_type(key)),
        }
    }

    /// Removes a list, returning the number of removed items.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` [`StorageError`] when the key holds a live value.
    pub fn list_clear(&self, key: &str, now_ms: i64) -> Result<u64, StorageError> {
        let removed = self.slots.remove_if(key, |_, slot| matches!(slot, Slot::List(_)));
        match removed {
            Some((_, Slot::List(items))) => Ok(u64::try_from(items.len()).unwrap_or(u64::MAX)),
            Some((_, Slot::Value(_))) | None => match self.slots.get(key).as_deref() {
                Some(slot) if !slot.is_expired_value(now_ms) => Err(wrong_type(key)),
                _ => Ok(0),
            },
        }
    }

    /// Removes at most `limit` values that expired before `now_ms`.
    pub fn purge_expired(&self, now_ms: i64, limit: u32) -> u64 {
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        let expired: Vec<String> = self
            .slots
            .iter()
            .filter(|item| {
                matches!(item.value(), Slot::Value(entry)
                    if entry.expires_at.is_some_and(|expires_at| expires_at < now_ms))
            })
            .take(limit)
            .map(|item| item.key().clone())
            .collect();
        let removed = expired
            .iter()
            .filter(|key| {
                self.slots
                    .remove_if(key.as_str(), |_, slot| {
                        matches!(slot, Slot::Value(entry)
                            if entry.expires_at.is_some_and(|expires_at| expires_at < now_ms))
                    })
                    .is_some()
            })
            .count();
        u64::try_from(removed).unwrap_or(u64::MAX)
    }

    /// Drops every key.
    pub fn clear(&self) {
        self.slots.clear();
    }
}

// ============================================================================
// SECTION: Backend
// ============================================================================

/// Cache-engine connection backend.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    /// Validated keyspace name.
    name: SchemaIdent,
    /// Keyspace capacity.
    max_entries: usize,
}

impl MemoryBackend {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` [`StorageError`] for an invalid configuration.
    pub fn new(config: &MemoryStoreConfig) -> Result<Self, StorageError> {
        config.validate()?;
        Ok(Self {
            name: config.keyspace_name()?,
            max_entries: config.max_entries,
        })
    }
}

impl ConnectionBackend for MemoryBackend {
    type Pool = Keyspace;

    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn schema_name(&self) -> &str {
        self.name.as_str()
    }

    fn connect(&self) -> Result<Self::Pool, StorageError> {
        Ok(Keyspace::new(self.max_entries))
    }

    fn provision(&self, _pool: &Self::Pool) -> Result<(), StorageError> {
        Ok(())
    }

    fn purge_expired(
        &self,
        pool: &Self::Pool,
        now_ms: i64,
        limit: u32,
    ) -> Result<u64, StorageError> {
        Ok(pool.purge_expired(now_ms, limit))
    }

    fn close_pool(&self, pool: Self::Pool) -> Result<(), StorageError> {
        pool.clear();
        Ok(())
    }
}
