// crates/stowage-store-sqlite/src/lib.rs
// ============================================================================
// Module: Stowage SQLite Store
// Description: File-engine backend for Stowage.
// Purpose: Pooled SQLite persistence behind the Stowage store contract.
// Dependencies: r2d2, r2d2_sqlite, rusqlite, stowage-core
// ============================================================================

//! ## Overview
//! This crate provides the file engine: an r2d2 pool of `SQLite`
//! connections owned by a [`stowage_core::ConnectionManager`], a schema
//! provisioner that validates the table prefix before embedding it in DDL,
//! and [`SqliteStore`], the [`stowage_core::Store`] implementation.

pub mod backend;
pub mod config;
pub mod native;
pub mod schema;
pub mod store;

pub use backend::SqliteBackend;
pub use backend::SqlitePool;
pub use config::SqliteJournalMode;
pub use config::SqliteStoreConfig;
pub use config::SqliteSyncMode;
pub use native::sqlite_error;
pub use schema::SqliteSchema;
pub use store::SqliteStore;
