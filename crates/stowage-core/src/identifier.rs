// crates/stowage-core/src/identifier.rs
// ============================================================================
// Module: Stowage Identifiers
// Description: Validation for structural identifiers, keys, and namespaces.
// Purpose: Make identifier interpolation into DDL safe by construction.
// Dependencies: crate::error
// ============================================================================

//! ## Overview
//! Backends cannot bind table or schema names as parameters, so any schema or
//! table prefix reaches the engine through string interpolation. A
//! [`SchemaIdent`] can only be built from input that is canonicalized to
//! lowercase and restricted to `[a-z_][a-z0-9_]*`, which makes quoting it
//! always safe. Keys and namespaces are bound as parameters and only need
//! length and content limits.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use crate::error::BackendKind;
use crate::error::StorageError;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum length of a structural identifier (Postgres `NAMEDATALEN - 1`).
pub const MAX_IDENTIFIER_LENGTH: usize = 63;
/// Maximum length of an entry key in bytes.
pub const MAX_KEY_LENGTH: usize = 1024;
/// Maximum length of a namespace in bytes.
pub const MAX_NAMESPACE_LENGTH: usize = 255;

// ============================================================================
// SECTION: Schema Identifiers
// ============================================================================

/// Validated structural identifier (schema name or table prefix).
///
/// # Invariants
/// - Non-empty, at most [`MAX_IDENTIFIER_LENGTH`] bytes.
/// - Matches `[a-z_][a-z0-9_]*` after ASCII lowercasing and trimming.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaIdent(String);

impl SchemaIdent {
    /// Canonicalizes and validates a raw identifier.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] of kind `Validation` when the identifier is
    /// empty, too long, or contains characters outside `[a-z0-9_]`.
    pub fn parse(raw: &str, backend: BackendKind) -> Result<Self, StorageError> {
        let canonical = raw.trim().to_ascii_lowercase();
        if canonical.is_empty() {
            return Err(StorageError::validation(backend, "identifier must not be empty"));
        }
        if canonical.len() > MAX_IDENTIFIER_LENGTH {
            return Err(StorageError::validation(
                backend,
                format!("identifier exceeds {MAX_IDENTIFIER_LENGTH} bytes"),
            ));
        }
        let mut chars = canonical.chars();
        let leading_ok = chars.next().is_some_and(|c| c == '_' || c.is_ascii_lowercase());
        let rest_ok = chars.all(|c| c == '_' || c.is_ascii_lowercase() || c.is_ascii_digit());
        if !leading_ok || !rest_ok {
            return Err(StorageError::validation(
                backend,
                "identifier must match [a-z_][a-z0-9_]*",
            ));
        }
        Ok(Self(canonical))
    }

    /// Returns the canonical identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the identifier wrapped in double quotes for DDL/DML.
    #[must_use]
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }

    /// Returns a derived identifier `<self>_<suffix>`.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] when the combined identifier is invalid.
    pub fn suffixed(&self, suffix: &str, backend: BackendKind) -> Result<Self, StorageError> {
        Self::parse(&format!("{}_{suffix}", self.0), backend)
    }
}

impl fmt::Display for SchemaIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// SECTION: Keys and Namespaces
// ============================================================================

/// Validates an entry or list key.
///
/// # Errors
///
/// Returns a `Validation` [`StorageError`] for empty, oversized, or
/// NUL-containing keys.
pub fn validate_key(key: &str, backend: BackendKind) -> Result<(), StorageError> {
    if key.is_empty() {
        return Err(StorageError::validation(backend, "key must not be empty"));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(StorageError::validation(
            backend,
            format!("key exceeds {MAX_KEY_LENGTH} bytes"),
        ));
    }
    if key.contains('\0') {
        return Err(StorageError::validation(backend, "key must not contain NUL"));
    }
    Ok(())
}

/// Validates a namespace value.
///
/// # Errors
///
/// Returns a `Validation` [`StorageError`] for empty, oversized, or
/// NUL-containing namespaces.
pub fn validate_namespace(namespace: &str, backend: BackendKind) -> Result<(), StorageError> {
    if namespace.is_empty() {
        return Err(StorageError::validation(backend, "namespace must not be empty"));
    }
    if namespace.len() > MAX_NAMESPACE_LENGTH {
        return Err(StorageError::validation(
            backend,
            format!("namespace exceeds {MAX_NAMESPACE_LENGTH} bytes"),
        ));
    }
    if namespace.contains('\0') {
        return Err(StorageError::validation(backend, "namespace must not contain NUL"));
    }
    Ok(())
}
