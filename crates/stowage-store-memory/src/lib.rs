// crates/stowage-store-memory/src/lib.rs
// ============================================================================
// Module: Stowage Memory Store
// Description: Cache-engine backend for Stowage.
// Purpose: In-process keyspace behind the Stowage store contract.
// Dependencies: dashmap, stowage-core
// ============================================================================

//! ## Overview
//! The cache engine keeps entries in a sharded in-process map owned by a
//! [`stowage_core::ConnectionManager`]. It shares the manager lifecycle,
//! expiry sweep, and error taxonomy with the persistent engines, which makes
//! it the default choice for tests and single-process deployments.

pub mod config;
pub mod keyspace;
pub mod store;

pub use config::MemoryStoreConfig;
pub use keyspace::Keyspace;
pub use keyspace::MemoryBackend;
pub use keyspace::Slot;
pub use store::MemoryStore;
