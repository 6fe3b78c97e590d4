// crates/stowage-core/src/error.rs
// ============================================================================
// Module: Stowage Error Taxonomy
// Description: Canonical storage error kinds and native error translation.
// Purpose: Give every backend one error contract with explicit retry hints.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Every backend failure is translated into a single [`StorageError`] the
//! moment it crosses an adapter boundary. Translation is a pure function of a
//! [`NativeError`] descriptor and a [`BackendKind`] discriminator, driven by
//! fixed code lookup tables. Canonical errors pass through [`map_error`]
//! unchanged so repeated mapping never double-wraps.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Error Kinds
// ============================================================================

/// Canonical storage error kinds.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Each kind carries a fixed default retry hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Backend unreachable or connection dropped.
    Connection,
    /// Operation exceeded a connect or command deadline.
    Timeout,
    /// Caller supplied invalid input.
    Validation,
    /// Value or metadata could not be encoded or decoded.
    Serialization,
    /// Requested entry does not exist.
    NotFound,
    /// Concurrent write collided with another writer.
    Conflict,
    /// Backend ran out of a bounded resource.
    QuotaExceeded,
    /// Backend refuses writes.
    ReadOnly,
    /// Underlying I/O failure.
    IoError,
    /// Stored data failed integrity checks.
    Corrupted,
    /// No translation rule matched.
    Unknown,
}

impl ErrorKind {
    /// Returns the default retry hint for the kind.
    #[must_use]
    pub const fn default_retryable(self) -> bool {
        match self {
            Self::Connection
            | Self::Timeout
            | Self::Conflict
            | Self::IoError
            | Self::QuotaExceeded => true,
            Self::Validation
            | Self::Serialization
            | Self::NotFound
            | Self::ReadOnly
            | Self::Corrupted
            | Self::Unknown => false,
        }
    }

    /// Returns a stable label for the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connection => "connection",
            Self::Timeout => "timeout",
            Self::Validation => "validation",
            Self::Serialization => "serialization",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::QuotaExceeded => "quota_exceeded",
            Self::ReadOnly => "read_only",
            Self::IoError => "io_error",
            Self::Corrupted => "corrupted",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Backend Discriminator
// ============================================================================

/// Backend discriminator used to select a native code table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Embedded file engine (`SQLite`).
    Sqlite,
    /// Relational network engine (Postgres).
    Postgres,
    /// In-process cache engine.
    Memory,
    /// Backend-neutral failures (pool, OS, serialization).
    Generic,
}

impl BackendKind {
    /// Returns a stable label for the backend.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
            Self::Memory => "memory",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Canonical Error
// ============================================================================

/// Shared, type-erased cause attached to a canonical error.
pub type SharedCause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Canonical storage error returned by every store operation.
///
/// # Invariants
/// - Built once at the adapter boundary and never mutated afterwards.
/// - `retryable` defaults to [`ErrorKind::default_retryable`] unless a lookup
///   rule overrides it.
#[derive(Debug, Clone, Error)]
#[error("{backend} storage {kind} error: {message}")]
pub struct StorageError {
    /// Canonical error kind.
    kind: ErrorKind,
    /// Human-readable message (never contains stored values).
    message: String,
    /// Whether a retry may succeed.
    retryable: bool,
    /// Backend that produced the error.
    backend: BackendKind,
    /// Native error code when one was reported.
    code: Option<String>,
    /// Wrapped native error.
    #[source]
    cause: Option<SharedCause>,
}

impl StorageError {
    /// Creates a canonical error with the kind's default retry hint.
    #[must_use]
    pub fn new(kind: ErrorKind, backend: BackendKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable: kind.default_retryable(),
            backend,
            code: None,
            cause: None,
        }
    }

    /// Creates a [`ErrorKind::NotFound`] error for a key.
    #[must_use]
    pub fn not_found(backend: BackendKind, key: &str) -> Self {
        Self::new(ErrorKind::NotFound, backend, format!("key not found: {key}"))
    }

    /// Creates a [`ErrorKind::Validation`] error.
    #[must_use]
    pub fn validation(backend: BackendKind, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, backend, message)
    }

    /// Creates a [`ErrorKind::Connection`] error.
    #[must_use]
    pub fn connection(backend: BackendKind, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connection, backend, message)
    }

    /// Creates a [`ErrorKind::Serialization`] error.
    #[must_use]
    pub fn serialization(backend: BackendKind, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Serialization, backend, message)
    }

    /// Attaches a wrapped cause while the error is being built.
    #[must_use]
    pub fn with_cause(mut self, cause: SharedCause) -> Self {
        self.cause = Some(cause);
        self
    }

    /// Returns the canonical kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the retry hint.
    #[must_use]
    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    /// Returns the backend that raised the error.
    #[must_use]
    pub const fn backend(&self) -> BackendKind {
        self.backend
    }

    /// Returns the native code, when present.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// Returns the wrapped cause, when present.
    #[must_use]
    pub fn cause(&self) -> Option<&SharedCause> {
        self.cause.as_ref()
    }

    /// Returns true when the error reports an absent entry.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }
}

impl PartialEq for StorageError {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.message == other.message
            && self.retryable == other.retryable
            && self.backend == other.backend
            && self.code == other.code
            && self.cause.as_ref().map(ToString::to_string)
                == other.cause.as_ref().map(ToString::to_string)
    }
}

// ============================================================================
// SECTION: Native Errors
// ============================================================================

/// Backend-native error descriptor handed to [`map_error`].
///
/// Adapter crates flatten their driver errors into this shape so the mapper
/// stays free of driver dependencies.
#[derive(Debug, Clone)]
pub struct NativeError {
    /// Native code (`SQLITE_BUSY`, SQLSTATE `23505`, `ECONNREFUSED`, ...).
    code: Option<String>,
    /// Native message.
    message: String,
    /// Original driver error.
    cause: Option<SharedCause>,
}

impl NativeError {
    /// Creates a native error descriptor without a code.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            cause: None,
        }
    }

    /// Wraps a driver error, using its display text as the message.
    #[must_use]
    pub fn from_error<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            code: None,
            message: error.to_string(),
            cause: Some(Arc::new(error)),
        }
    }

    /// Sets the native code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Returns the native code, when present.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// Returns the native message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Input accepted by [`map_error`].
#[derive(Debug, Clone)]
pub enum ErrorInput {
    /// Already-canonical error (returned unchanged).
    Canonical(StorageError),
    /// Native error awaiting translation.
    Native(NativeError),
}

impl From<StorageError> for ErrorInput {
    fn from(error: StorageError) -> Self {
        Self::Canonical(error)
    }
}

impl From<NativeError> for ErrorInput {
    fn from(error: NativeError) -> Self {
        Self::Native(error)
    }
}

// ============================================================================
// SECTION: Lookup Tables
// ============================================================================

/// Native code translation rule.
#[derive(Debug, Clone, Copy)]
struct CodeRule {
    /// Native code matched exactly.
    code: &'static str,
    /// Canonical kind produced.
    kind: ErrorKind,
    /// Retry hint produced.
    retryable: bool,
}

/// Builds a rule using the kind's default retry hint.
const fn rule(code: &'static str, kind: ErrorKind) -> CodeRule {
    CodeRule {
        code,
        kind,
        retryable: kind.default_retryable(),
    }
}

/// Builds a rule with an explicit retry hint.
const fn rule_with(code: &'static str, kind: ErrorKind, retryable: bool) -> CodeRule {
    CodeRule {
        code,
        kind,
        retryable,
    }
}

/// `SQLite` result code rules.
const SQLITE_RULES: &[CodeRule] = &[
    rule("SQLITE_BUSY", ErrorKind::Conflict),
    rule("SQLITE_LOCKED", ErrorKind::Conflict),
    rule("SQLITE_CONSTRAINT_PRIMARYKEY", ErrorKind::Conflict),
    rule("SQLITE_CONSTRAINT_UNIQUE", ErrorKind::Conflict),
    rule("SQLITE_CONSTRAINT", ErrorKind::Validation),
    rule_with("SQLITE_FULL", ErrorKind::QuotaExceeded, false),
    rule("SQLITE_NOMEM", ErrorKind::QuotaExceeded),
    rule("SQLITE_READONLY", ErrorKind::ReadOnly),
    rule("SQLITE_PERM", ErrorKind::ReadOnly),
    rule("SQLITE_AUTH", ErrorKind::ReadOnly),
    rule("SQLITE_CORRUPT", ErrorKind::Corrupted),
    rule("SQLITE_NOTADB", ErrorKind::Corrupted),
    rule("SQLITE_IOERR", ErrorKind::IoError),
    rule("SQLITE_CANTOPEN", ErrorKind::Connection),
    rule("SQLITE_TOOBIG", ErrorKind::Validation),
    rule("SQLITE_MISMATCH", ErrorKind::Validation),
    rule("SQLITE_RANGE", ErrorKind::Validation),
];

/// Postgres SQLSTATE rules.
const POSTGRES_RULES: &[CodeRule] = &[
    rule("23505", ErrorKind::Conflict),
    rule("40001", ErrorKind::Conflict),
    rule("40P01", ErrorKind::Conflict),
    rule("55P03", ErrorKind::Conflict),
    rule("23502", ErrorKind::Validation),
    rule("23503", ErrorKind::Validation),
    rule("23514", ErrorKind::Validation),
    rule("22001", ErrorKind::Validation),
    rule("22P02", ErrorKind::Validation),
    rule("42601", ErrorKind::Validation),
    rule("42P01", ErrorKind::Validation),
    rule("57014", ErrorKind::Timeout),
    rule("53300", ErrorKind::QuotaExceeded),
    rule("53200", ErrorKind::QuotaExceeded),
    rule_with("53100", ErrorKind::QuotaExceeded, false),
    rule("08000", ErrorKind::Connection),
    rule("08001", ErrorKind::Connection),
    rule("08003", ErrorKind::Connection),
    rule("08004", ErrorKind::Connection),
    rule("08006", ErrorKind::Connection),
    rule("57P01", ErrorKind::Connection),
    rule("57P03", ErrorKind::Connection),
    rule("25006", ErrorKind::ReadOnly),
    rule("XX001", ErrorKind::Corrupted),
    rule("XX002", ErrorKind::Corrupted),
    rule("58030", ErrorKind::IoError),
];

/// Cache engine rules.
const MEMORY_RULES: &[CodeRule] = &[
    rule("ECONNREFUSED", ErrorKind::Connection),
    rule("CLOSED", ErrorKind::Connection),
    rule("LOADING", ErrorKind::Connection),
    rule("ETIMEDOUT", ErrorKind::Timeout),
    rule("OOM", ErrorKind::QuotaExceeded),
    rule("READONLY", ErrorKind::ReadOnly),
    rule("WRONGTYPE", ErrorKind::Validation),
    rule("BUSY", ErrorKind::Conflict),
];

/// Backend-neutral rules consulted after the backend table.
const GENERIC_RULES: &[CodeRule] = &[
    rule("POOL_TIMEOUT", ErrorKind::Timeout),
    rule("ETIMEDOUT", ErrorKind::Timeout),
    rule("POOL_CLOSED", ErrorKind::Connection),
    rule("ECONNREFUSED", ErrorKind::Connection),
    rule("ECONNRESET", ErrorKind::Connection),
    rule_with("ENOSPC", ErrorKind::QuotaExceeded, false),
    rule("EACCES", ErrorKind::ReadOnly),
    rule("EROFS", ErrorKind::ReadOnly),
    rule("EIO", ErrorKind::IoError),
    rule("SERDE", ErrorKind::Serialization),
];

/// Returns the backend-specific rule table.
const fn rules_for(backend: BackendKind) -> &'static [CodeRule] {
    match backend {
        BackendKind::Sqlite => SQLITE_RULES,
        BackendKind::Postgres => POSTGRES_RULES,
        BackendKind::Memory => MEMORY_RULES,
        BackendKind::Generic => GENERIC_RULES,
    }
}

/// Finds the first rule matching `code` in the backend table, then the
/// generic table.
fn lookup(backend: BackendKind, code: &str) -> Option<CodeRule> {
    rules_for(backend)
        .iter()
        .chain(GENERIC_RULES.iter())
        .find(|rule| rule.code == code)
        .copied()
}

// ============================================================================
// SECTION: Mapping
// ============================================================================

/// Translates an error into the canonical taxonomy.
///
/// Canonical inputs are returned unchanged. Native inputs are matched against
/// the backend's code table and then the generic table; unmatched codes map to
/// [`ErrorKind::Unknown`] with `retryable = false`.
#[must_use]
pub fn map_error(input: impl Into<ErrorInput>, backend: BackendKind) -> StorageError {
    match input.into() {
        ErrorInput::Canonical(error) => error,
        ErrorInput::Native(native) => {
            let matched = native.code.as_deref().and_then(|code| lookup(backend, code));
            let (kind, retryable) =
                matched.map_or((ErrorKind::Unknown, false), |rule| (rule.kind, rule.retryable));
            StorageError {
                kind,
                message: native.message,
                retryable,
                backend,
                code: native.code,
                cause: native.cause,
            }
        }
    }
}

/// Keywords that mark an uncategorized error as transient.
const RETRYABLE_KEYWORDS: [&str; 5] = ["timeout", "connection", "lock", "busy", "temporary"];

/// Returns whether an error is worth retrying.
///
/// Canonical errors report their `retryable` flag; anything else falls back to
/// a keyword scan of the message.
#[must_use]
pub fn is_retryable(error: &(dyn std::error::Error + 'static)) -> bool {
    if let Some(storage) = error.downcast_ref::<StorageError>() {
        return storage.retryable;
    }
    let message = error.to_string().to_ascii_lowercase();
    RETRYABLE_KEYWORDS.iter().any(|keyword| message.contains(keyword))
}
