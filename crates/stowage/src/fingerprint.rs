// crates/stowage/src/fingerprint.rs
// ============================================================================
// Module: Configuration Fingerprint
// Description: Canonical digest of the settings that shape a store.
// Purpose: Key the registry so equal configurations share one manager.
// Dependencies: serde, serde_jcs, sha2, stowage-config
// ============================================================================

//! ## Overview
//! The fingerprint is the lowercase hex SHA-256 of the RFC 8785 canonical
//! JSON of the effective configuration: the backend discriminator, the
//! manager options, and the selected engine section. Sections for engines
//! that are not selected are excluded, so editing them never splits a pool.
//! The `SQLite` path is hashed with `.` components removed.

use std::fmt;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use stowage_config::StorageBackend;
use stowage_config::StorageConfig;
use stowage_core::StorageError;
use stowage_store_memory::MemoryStoreConfig;
use stowage_store_postgres::PostgresStoreConfig;
use stowage_store_sqlite::SqliteStoreConfig;

/// Hex-encoded SHA-256 fingerprint of an effective configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigFingerprint(String);

impl ConfigFingerprint {
    /// Returns the hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Settings that determine the identity of a store.
#[derive(Serialize)]
struct EffectiveConfig<'a> {
    /// Selected backend.
    backend: StorageBackend,
    /// Default namespace.
    namespace: &'a str,
    /// Sweep interval (ms).
    cleanup_interval_ms: u64,
    /// Sweep batch size.
    cleanup_batch_limit: u32,
    /// Sweep toggle.
    cleanup_enabled: bool,
    /// Selected engine section.
    engine: EngineSection<'a>,
}

/// Engine section for the selected backend.
#[derive(Serialize)]
#[serde(untagged)]
enum EngineSection<'a> {
    /// File engine.
    Sqlite(&'a SqliteStoreConfig),
    /// Relational engine.
    Postgres(&'a PostgresStoreConfig),
    /// Cache engine.
    Memory(&'a MemoryStoreConfig),
}

/// Computes the fingerprint of a configuration.
///
/// # Errors
///
/// Returns a `Serialization` [`StorageError`] when the configuration cannot
/// be canonicalized (for example, a non-UTF-8 database path).
pub fn fingerprint(config: &StorageConfig) -> Result<ConfigFingerprint, StorageError> {
    let sqlite = SqliteStoreConfig {
        path: normalize_path(&config.sqlite.path),
        ..config.sqlite.clone()
    };
    let engine = match config.backend {
        StorageBackend::Sqlite => EngineSection::Sqlite(&sqlite),
        StorageBackend::Postgres => EngineSection::Postgres(&config.postgres),
        StorageBackend::Memory => EngineSection::Memory(&config.memory),
    };
    let effective = EffectiveConfig {
        backend: config.backend,
        namespace: &config.namespace,
        cleanup_interval_ms: config.cleanup_interval_ms,
        cleanup_batch_limit: config.cleanup_batch_limit,
        cleanup_enabled: config.cleanup_enabled,
        engine,
    };
    let bytes = serde_jcs::to_vec(&effective).map_err(|err| {
        StorageError::serialization(config.backend.kind(), "config canonicalization failed")
            .with_cause(Arc::new(err))
    })?;
    let digest = Sha256::digest(&bytes);
    Ok(ConfigFingerprint(hex_encode(&digest)))
}

/// Drops `.` components so spellings of one file share a fingerprint.
fn normalize_path(path: &Path) -> PathBuf {
    path.components().filter(|component| *component != Component::CurDir).collect()
}

/// Encodes bytes as lowercase hex.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(char::from(HEX[usize::from(byte >> 4)]));
        out.push(char::from(HEX[usize::from(byte & 0x0f)]));
    }
    out
}
