// crates/stowage-store-postgres/src/native.rs
// ============================================================================
// Module: Postgres Native Errors
// Description: postgres error flattening for the canonical mapper.
// Purpose: Keep driver error types from crossing the adapter boundary.
// Dependencies: postgres, stowage-core
// ============================================================================

//! ## Overview
//! Server errors carry a SQLSTATE, which is passed through as the native code.
//! Client-side failures have none; a closed connection is reported as
//! SQLSTATE `08003`, and socket errors fall back to their errno name so the
//! generic table can classify them.

use std::error::Error as _;
use std::io;

use stowage_core::BackendKind;
use stowage_core::NativeError;
use stowage_core::StorageError;
use stowage_core::map_error;

/// SQLSTATE reported for operations on a closed connection.
const CONNECTION_DOES_NOT_EXIST: &str = "08003";

/// Converts a postgres error into a canonical [`StorageError`].
#[must_use]
pub fn postgres_error(err: postgres::Error) -> StorageError {
    let code = native_code(&err);
    let native = NativeError::from_error(err);
    let native = match code {
        Some(code) => native.with_code(code),
        None => native,
    };
    map_error(native, BackendKind::Postgres)
}

/// Returns the native code for a postgres error, when it has one.
fn native_code(err: &postgres::Error) -> Option<String> {
    if let Some(state) = err.code() {
        return Some(state.code().to_string());
    }
    if err.is_closed() {
        return Some(CONNECTION_DOES_NOT_EXIST.to_string());
    }
    err.source()
        .and_then(|source| source.downcast_ref::<io::Error>())
        .map(|io_err| errno_name(io_err.kind()).to_string())
}

/// Maps socket error kinds to errno names understood by the generic table.
pub(crate) const fn errno_name(kind: io::ErrorKind) -> &'static str {
    match kind {
        io::ErrorKind::ConnectionRefused => "ECONNREFUSED",
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => "ETIMEDOUT",
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof
        | io::ErrorKind::NotConnected => "ECONNRESET",
        io::ErrorKind::PermissionDenied => "EACCES",
        _ => "EIO",
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use stowage_core::BackendKind;
    use stowage_core::ErrorKind;
    use stowage_core::NativeError;
    use stowage_core::map_error;

    use super::errno_name;

    fn classify(kind: io::ErrorKind) -> ErrorKind {
        map_error(NativeError::new("socket").with_code(errno_name(kind)), BackendKind::Postgres)
            .kind()
    }

    #[test]
    fn socket_failures_classify_as_transient() {
        assert_eq!(classify(io::ErrorKind::ConnectionRefused), ErrorKind::Connection);
        assert_eq!(classify(io::ErrorKind::ConnectionReset), ErrorKind::Connection);
        assert_eq!(classify(io::ErrorKind::TimedOut), ErrorKind::Timeout);
        assert_eq!(classify(io::ErrorKind::Other), ErrorKind::IoError);
    }

    #[test]
    fn closed_connection_state_is_a_connection_error() {
        let mapped =
            map_error(NativeError::new("closed").with_code("08003"), BackendKind::Postgres);
        assert_eq!(mapped.kind(), ErrorKind::Connection);
        assert!(mapped.retryable());
    }
}
