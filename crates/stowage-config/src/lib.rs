// crates/stowage-config/src/lib.rs
// ============================================================================
// Module: Stowage Config Library
// Description: Canonical storage configuration model and validation.
// Purpose: Single source of truth for the `[storage]` table semantics.
// Dependencies: serde, stowage-core, toml
// ============================================================================

//! ## Overview
//! `stowage-config` parses the `[storage]` table of a TOML document into a
//! [`StorageConfig`], fills explicit defaults for every omitted field, and
//! validates the section selected by the backend discriminator.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::ConfigError;
pub use config::StorageBackend;
pub use config::StorageConfig;
