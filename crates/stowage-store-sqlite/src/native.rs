// crates/stowage-store-sqlite/src/native.rs
// ============================================================================
// Module: SQLite Native Errors
// Description: rusqlite error flattening for the canonical mapper.
// Purpose: Keep rusqlite error types from crossing the adapter boundary.
// Dependencies: rusqlite, stowage-core
// ============================================================================

//! ## Overview
//! `SQLite` failures carry a primary result code and an extended code. The
//! extended code is consulted first so primary-key and unique violations
//! (which signal a lost append race) are told apart from other constraint
//! failures.

use rusqlite::ErrorCode;
use stowage_core::BackendKind;
use stowage_core::NativeError;
use stowage_core::StorageError;
use stowage_core::map_error;

/// `SQLITE_CONSTRAINT_PRIMARYKEY` extended result code.
const SQLITE_CONSTRAINT_PRIMARYKEY: i32 = 1555;
/// `SQLITE_CONSTRAINT_UNIQUE` extended result code.
const SQLITE_CONSTRAINT_UNIQUE: i32 = 2067;

/// Converts a rusqlite error into a canonical [`StorageError`].
#[must_use]
pub fn sqlite_error(err: rusqlite::Error) -> StorageError {
    let code = native_code(&err);
    let native = NativeError::from_error(err);
    let native = match code {
        Some(code) => native.with_code(code),
        None => native,
    };
    map_error(native, BackendKind::Sqlite)
}

/// Returns the `SQLITE_*` name for a rusqlite error, when it has one.
fn native_code(err: &rusqlite::Error) -> Option<&'static str> {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => match failure.extended_code {
            SQLITE_CONSTRAINT_PRIMARYKEY => Some("SQLITE_CONSTRAINT_PRIMARYKEY"),
            SQLITE_CONSTRAINT_UNIQUE => Some("SQLITE_CONSTRAINT_UNIQUE"),
            _ => primary_code_name(failure.code),
        },
        rusqlite::Error::InvalidColumnType(..)
        | rusqlite::Error::FromSqlConversionFailure(..)
        | rusqlite::Error::IntegralValueOutOfRange(..) => Some("SQLITE_MISMATCH"),
        _ => None,
    }
}

/// Maps a primary result code to its `SQLITE_*` name.
const fn primary_code_name(code: ErrorCode) -> Option<&'static str> {
    match code {
        ErrorCode::DatabaseBusy => Some("SQLITE_BUSY"),
        ErrorCode::DatabaseLocked => Some("SQLITE_LOCKED"),
        ErrorCode::ConstraintViolation => Some("SQLITE_CONSTRAINT"),
        ErrorCode::DiskFull => Some("SQLITE_FULL"),
        ErrorCode::OutOfMemory => Some("SQLITE_NOMEM"),
        ErrorCode::ReadOnly => Some("SQLITE_READONLY"),
        ErrorCode::PermissionDenied => Some("SQLITE_PERM"),
        ErrorCode::AuthorizationForStatementDenied => Some("SQLITE_AUTH"),
        ErrorCode::DatabaseCorrupt => Some("SQLITE_CORRUPT"),
        ErrorCode::NotADatabase => Some("SQLITE_NOTADB"),
        ErrorCode::SystemIoFailure => Some("SQLITE_IOERR"),
        ErrorCode::CannotOpen => Some("SQLITE_CANTOPEN"),
        ErrorCode::TooBig => Some("SQLITE_TOOBIG"),
        ErrorCode::TypeMismatch => Some("SQLITE_MISMATCH"),
        ErrorCode::ParameterOutOfRange => Some("SQLITE_RANGE"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use rusqlite::ErrorCode;
    use rusqlite::ffi;
    use stowage_core::ErrorKind;

    use super::sqlite_error;

    fn failure(code: ErrorCode, extended_code: i32) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(
            ffi::Error {
                code,
                extended_code,
            },
            None,
        )
    }

    #[test]
    fn primary_key_violation_is_a_retryable_conflict() {
        let mapped = sqlite_error(failure(ErrorCode::ConstraintViolation, 1555));
        assert_eq!(mapped.kind(), ErrorKind::Conflict);
        assert!(mapped.retryable());
        assert_eq!(mapped.code(), Some("SQLITE_CONSTRAINT_PRIMARYKEY"));
    }

    #[test]
    fn not_null_violation_is_validation() {
        let mapped = sqlite_error(failure(ErrorCode::ConstraintViolation, 1299));
        assert_eq!(mapped.kind(), ErrorKind::Validation);
        assert!(!mapped.retryable());
    }

    #[test]
    fn busy_is_retryable() {
        let mapped = sqlite_error(failure(ErrorCode::DatabaseBusy, 5));
        assert_eq!(mapped.kind(), ErrorKind::Conflict);
        assert!(mapped.retryable());
    }

    #[test]
    fn disk_full_is_not_retryable() {
        let mapped = sqlite_error(failure(ErrorCode::DiskFull, 13));
        assert_eq!(mapped.kind(), ErrorKind::QuotaExceeded);
        assert!(!mapped.retryable());
    }

    #[test]
    fn uncoded_errors_are_unknown() {
        let mapped = sqlite_error(rusqlite::Error::QueryReturnedNoRows);
        assert_eq!(mapped.kind(), ErrorKind::Unknown);
        assert!(mapped.cause().is_some());
    }
}
