// crates/stowage-core/src/pool.rs
// ============================================================================
// Module: Stowage Pool Observers
// Description: r2d2 event and error hooks shared by pooled backends.
// Purpose: Emit pool lifecycle events through tracing and translate pool
//          failures into native error descriptors.
// Dependencies: r2d2, tracing, crate::error
// ============================================================================

//! ## Overview
//! Pooled backends register a [`PoolObserver`] as both the r2d2 event handler
//! and error handler. Connect, checkout, and release events are debug-level;
//! checkout timeouts are warnings; connection errors raised inside the pool
//! are errors. [`pool_error`] turns an `r2d2::Error` (which only ever means a
//! checkout timed out) into a [`NativeError`] carrying the generic
//! `POOL_TIMEOUT` code.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Display;

use r2d2::HandleError;
use r2d2::HandleEvent;
use r2d2::event::AcquireEvent;
use r2d2::event::CheckinEvent;
use r2d2::event::CheckoutEvent;
use r2d2::event::ReleaseEvent;
use r2d2::event::TimeoutEvent;
use tracing::debug;
use tracing::error;
use tracing::warn;

use crate::error::BackendKind;
use crate::error::NativeError;
use crate::error::StorageError;
use crate::error::map_error;

// ============================================================================
// SECTION: Observer
// ============================================================================

/// Native code used for pool checkout timeouts.
pub const POOL_TIMEOUT_CODE: &str = "POOL_TIMEOUT";

/// Logs r2d2 pool events for one backend.
#[derive(Debug, Clone, Copy)]
pub struct PoolObserver {
    /// Backend the pool serves.
    backend: BackendKind,
}

impl PoolObserver {
    /// Creates an observer for a backend.
    #[must_use]
    pub const fn new(backend: BackendKind) -> Self {
        Self {
            backend,
        }
    }
}

impl HandleEvent for PoolObserver {
    fn handle_acquire(&self, event: AcquireEvent) {
        debug!(
            target: "storage",
            backend = %self.backend,
            connection = event.connection_id(),
            "pool connection opened"
        );
    }

    fn handle_release(&self, event: ReleaseEvent) {
        debug!(
            target: "storage",
            backend = %self.backend,
            connection = event.connection_id(),
            age_ms = u64::try_from(event.age().as_millis()).unwrap_or(u64::MAX),
            "pool connection released"
        );
    }

    fn handle_checkout(&self, event: CheckoutEvent) {
        debug!(
            target: "storage",
            backend = %self.backend,
            connection = event.connection_id(),
            wait_ms = u64::try_from(event.duration().as_millis()).unwrap_or(u64::MAX),
            "pool checkout"
        );
    }

    fn handle_timeout(&self, event: TimeoutEvent) {
        warn!(
            target: "storage",
            backend = %self.backend,
            timeout_ms = u64::try_from(event.timeout().as_millis()).unwrap_or(u64::MAX),
            "pool checkout timed out"
        );
    }

    fn handle_checkin(&self, event: CheckinEvent) {
        debug!(
            target: "storage",
            backend = %self.backend,
            connection = event.connection_id(),
            "pool checkin"
        );
    }
}

impl<E: Display> HandleError<E> for PoolObserver {
    fn handle_error(&self, err: E) {
        error!(target: "storage", backend = %self.backend, error = %err, "pool connection error");
    }
}

// ============================================================================
// SECTION: Error Conversion
// ============================================================================

/// Maps an r2d2 checkout failure to a canonical error.
#[must_use]
pub fn pool_error(err: r2d2::Error, backend: BackendKind) -> StorageError {
    map_error(NativeError::from_error(err).with_code(POOL_TIMEOUT_CODE), backend)
}

#[cfg(test)]
mod tests {
    use super::POOL_TIMEOUT_CODE;
    use crate::error::BackendKind;
    use crate::error::ErrorKind;
    use crate::error::NativeError;
    use crate::error::map_error;

    #[test]
    fn pool_timeout_code_maps_to_retryable_timeout() {
        let mapped = map_error(
            NativeError::new("timed out waiting for connection").with_code(POOL_TIMEOUT_CODE),
            BackendKind::Sqlite,
        );
        assert_eq!(mapped.kind(), ErrorKind::Timeout);
        assert!(mapped.retryable());
        assert_eq!(mapped.code(), Some(POOL_TIMEOUT_CODE));
    }
}
