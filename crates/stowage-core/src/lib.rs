// crates/stowage-core/src/lib.rs
// ============================================================================
// Module: Stowage Core Library
// Description: Public API surface for the Stowage storage core.
// Purpose: Expose the error taxonomy, data model, store contract, and
//          connection lifecycle shared by every backend crate.
// Dependencies: crate::{cleanup, error, identifier, manager, model, pool, store}
// ============================================================================

//! ## Overview
//! Stowage is a backend-agnostic persistence facade offering key-value and
//! ordered-list semantics over interchangeable engines. This crate holds the
//! pieces every engine shares: the canonical [`StorageError`] and its
//! [`map_error`] translator, the [`Store`] contract, identifier validation,
//! and the [`ConnectionManager`] that owns each backend's pool.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod cleanup;
pub mod error;
pub mod identifier;
pub mod manager;
pub mod model;
pub mod pool;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use cleanup::CleanupTask;
pub use cleanup::SweepControl;
pub use error::BackendKind;
pub use error::ErrorInput;
pub use error::ErrorKind;
pub use error::NativeError;
pub use error::SharedCause;
pub use error::StorageError;
pub use error::is_retryable;
pub use error::map_error;
pub use identifier::SchemaIdent;
pub use identifier::validate_key;
pub use identifier::validate_namespace;
pub use manager::ConnectionBackend;
pub use manager::ConnectionHandle;
pub use manager::ConnectionManager;
pub use manager::DEFAULT_CLEANUP_BATCH_LIMIT;
pub use manager::DEFAULT_CLEANUP_INTERVAL_MS;
pub use manager::DEFAULT_NAMESPACE;
pub use manager::ManagerOptions;
pub use manager::ManagerState;
pub use model::Entry;
pub use model::ListEntry;
pub use model::SetOptions;
pub use model::position_from_db;
pub use model::unix_millis;
pub use pool::POOL_TIMEOUT_CODE;
pub use pool::PoolObserver;
pub use pool::pool_error;
pub use store::SharedStore;
pub use store::Store;
