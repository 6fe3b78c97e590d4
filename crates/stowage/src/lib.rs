// crates/stowage/src/lib.rs
// ============================================================================
// Module: Stowage Facade
// Description: Backend selection and shared-manager registry.
// Purpose: Give callers one store interface regardless of the configured
//          engine.
// Dependencies: stowage-config, stowage-core, store crates
// ============================================================================

//! ## Overview
//! Callers describe storage with a [`StorageConfig`] and ask a
//! [`StoreRegistry`] for a [`SharedStore`]. The registry builds the matching
//! engine on first request and hands the same manager back for every later
//! request whose configuration has the same [`ConfigFingerprint`], so each
//! configuration owns exactly one pool. The registry is an ordinary value;
//! callers decide how long it lives and when entries are evicted.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod fingerprint;
pub mod registry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use fingerprint::ConfigFingerprint;
pub use fingerprint::fingerprint;
pub use registry::StoreRegistry;
pub use stowage_config::ConfigError;
pub use stowage_config::StorageBackend;
pub use stowage_config::StorageConfig;
pub use stowage_core::BackendKind;
pub use stowage_core::Entry;
pub use stowage_core::ErrorKind;
pub use stowage_core::ListEntry;
pub use stowage_core::SetOptions;
pub use stowage_core::SharedStore;
pub use stowage_core::StorageError;
pub use stowage_core::Store;
pub use stowage_core::is_retryable;
