// crates/stowage-config/src/config.rs
// ============================================================================
// Module: Stowage Configuration
// Description: Storage configuration loading and validation.
// Purpose: Strict, fail-closed parsing of the `[storage]` table with hard
//          input limits.
// Dependencies: serde, stowage-core, toml
// ============================================================================

//! ## Overview
//! Configuration is read from a TOML file (or string) whose `[storage]` table
//! selects a backend and carries one optional section per engine. Omitted
//! fields take the documented defaults exported by each store crate; unknown
//! fields are rejected. Only the section named by `backend` is validated,
//! since the others are never used to build a store.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use stowage_core::BackendKind;
use stowage_core::DEFAULT_CLEANUP_BATCH_LIMIT;
use stowage_core::DEFAULT_CLEANUP_INTERVAL_MS;
use stowage_core::DEFAULT_NAMESPACE;
use stowage_core::ManagerOptions;
use stowage_core::StorageError;
use stowage_store_memory::MemoryStoreConfig;
use stowage_store_postgres::PostgresStoreConfig;
use stowage_store_sqlite::SqliteStoreConfig;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is given.
const DEFAULT_CONFIG_NAME: &str = "stowage.toml";
/// Environment variable naming the default config path.
pub(crate) const CONFIG_ENV_VAR: &str = "STOWAGE_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 256 * 1024;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Model
// ============================================================================

/// Backend discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Embedded file engine.
    #[default]
    Sqlite,
    /// Networked relational engine.
    Postgres,
    /// In-process cache engine.
    Memory,
}

impl StorageBackend {
    /// Returns the backend kind used in errors and logs.
    #[must_use]
    pub const fn kind(self) -> BackendKind {
        match self {
            Self::Sqlite => BackendKind::Sqlite,
            Self::Postgres => BackendKind::Postgres,
            Self::Memory => BackendKind::Memory,
        }
    }
}

/// Storage configuration (`[storage]` table).
///
/// # Invariants
/// - After [`StorageConfig::validate`], the manager options and the section
///   selected by `backend` are valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Selected backend.
    #[serde(default)]
    pub backend: StorageBackend,
    /// Namespace applied to writes without an explicit namespace.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Interval between expiry sweeps in milliseconds.
    #[serde(default = "default_cleanup_interval_ms")]
    pub cleanup_interval_ms: u64,
    /// Maximum entries removed per sweep.
    #[serde(default = "default_cleanup_batch_limit")]
    pub cleanup_batch_limit: u32,
    /// Whether the periodic sweep runs.
    #[serde(default = "default_cleanup_enabled")]
    pub cleanup_enabled: bool,
    /// File engine settings.
    #[serde(default)]
    pub sqlite: SqliteStoreConfig,
    /// Relational engine settings.
    #[serde(default)]
    pub postgres: PostgresStoreConfig,
    /// Cache engine settings.
    #[serde(default)]
    pub memory: MemoryStoreConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            namespace: default_namespace(),
            cleanup_interval_ms: DEFAULT_CLEANUP_INTERVAL_MS,
            cleanup_batch_limit: DEFAULT_CLEANUP_BATCH_LIMIT,
            cleanup_enabled: true,
            sqlite: SqliteStoreConfig::default(),
            postgres: PostgresStoreConfig::default(),
            memory: MemoryStoreConfig::default(),
        }
    }
}

/// Top-level document wrapper.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigDocument {
    /// The `[storage]` table.
    #[serde(default)]
    storage: StorageConfig,
}

impl StorageConfig {
    /// Returns a default configuration for the given backend.
    #[must_use]
    pub fn for_backend(backend: StorageBackend) -> Self {
        Self {
            backend,
            ..Self::default()
        }
    }

    /// Loads configuration from disk.
    ///
    /// With no path, `STOWAGE_CONFIG` is consulted, then `stowage.toml` in the
    /// working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when reading, parsing, or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        if content.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config exceeds size limit".to_string()));
        }
        let document: ConfigDocument =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        let config = document.storage;
        config.validate()?;
        Ok(config)
    }

    /// Validates the manager options and the selected backend section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.manager_options().validate(self.backend.kind())?;
        match self.backend {
            StorageBackend::Sqlite => self.sqlite.validate()?,
            StorageBackend::Postgres => self.postgres.validate()?,
            StorageBackend::Memory => self.memory.validate()?,
        }
        Ok(())
    }

    /// Returns the manager options described by this configuration.
    #[must_use]
    pub fn manager_options(&self) -> ManagerOptions {
        ManagerOptions {
            namespace: self.namespace.clone(),
            cleanup_interval: Duration::from_millis(self.cleanup_interval_ms),
            cleanup_batch_limit: self.cleanup_batch_limit,
            cleanup_enabled: self.cleanup_enabled,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<StorageError> for ConfigError {
    fn from(err: StorageError) -> Self {
        Self::Invalid(err.message().to_string())
    }
}

impl From<ConfigError> for StorageError {
    fn from(err: ConfigError) -> Self {
        Self::validation(BackendKind::Generic, err.to_string())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the default namespace.
fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

/// Returns the default cleanup interval.
const fn default_cleanup_interval_ms() -> u64 {
    DEFAULT_CLEANUP_INTERVAL_MS
}

/// Returns the default cleanup batch limit.
const fn default_cleanup_batch_limit() -> u32 {
    DEFAULT_CLEANUP_BATCH_LIMIT
}

/// Returns the default cleanup toggle.
const fn default_cleanup_enabled() -> bool {
    true
}

/// Resolves the config path from the argument or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    if path.as_os_str().len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    if path.components().any(|component| component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH)
    {
        return Err(ConfigError::Invalid("config path component too long".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests;
