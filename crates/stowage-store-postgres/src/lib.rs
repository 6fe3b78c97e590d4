// crates/stowage-store-postgres/src/lib.rs
// ============================================================================
// Module: Stowage Postgres Store
// Description: Relational-engine backend for Stowage.
// Purpose: Pooled Postgres persistence behind the Stowage store contract.
// Dependencies: postgres, r2d2_postgres, postgres-native-tls, stowage-core
// ============================================================================

//! ## Overview
//! The relational engine keeps entries in a dedicated schema on a shared
//! Postgres server. Pools are built lazily by the
//! [`stowage_core::ConnectionManager`], optionally over TLS, and every
//! session carries a server-side statement timeout.
//!
//! Live-database tests are gated behind the `postgres-live-tests` feature
//! and the `STOWAGE_POSTGRES_URL` environment variable.

pub mod backend;
pub mod config;
pub mod native;
pub mod pool;
mod runner;
pub mod schema;
pub mod store;

pub use backend::PostgresBackend;
pub use config::PostgresStoreConfig;
pub use native::postgres_error;
pub use pool::PooledClient;
pub use pool::PostgresPool;
pub use schema::PostgresSchema;
pub use store::PostgresStore;
