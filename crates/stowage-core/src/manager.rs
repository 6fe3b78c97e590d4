// crates/stowage-core/src/manager.rs
// ============================================================================
// Module: Stowage Connection Manager
// Description: Lazy, serialized pool lifecycle with schema provisioning.
// Purpose: Guarantee one pool, one provisioning pass, and one cleanup task
//          per manager instance.
// Dependencies: tracing, crate::{cleanup, error, identifier, model}
// ============================================================================

//! ## Overview
//! A [`ConnectionManager`] is generic over a [`ConnectionBackend`] that knows
//! how to build a pool, provision its schema, purge expired rows, and close
//! the pool. The manager owns the resulting [`ConnectionHandle`] and hands out
//! shared references to it. Acquisition is serialized by a mutex so concurrent
//! first calls construct exactly one pool.
//!
//! State machine:
//! `Uninitialized -> Connecting -> Ready -> Closing -> Closed`, with
//! `Connecting -> Failed` on a connect or provisioning error. A failed manager
//! retries on the next acquisition; a closed manager stays closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::sync::Weak;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::cleanup::CleanupTask;
use crate::cleanup::SweepControl;
use crate::error::BackendKind;
use crate::error::StorageError;
use crate::identifier::validate_namespace;
use crate::model::unix_millis;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default expiry cleanup interval (5 minutes).
pub const DEFAULT_CLEANUP_INTERVAL_MS: u64 = 300_000;
/// Default maximum rows removed by one cleanup sweep.
pub const DEFAULT_CLEANUP_BATCH_LIMIT: u32 = 1_000;
/// Default namespace for entries written without an explicit namespace.
pub const DEFAULT_NAMESPACE: &str = "default";

// ============================================================================
// SECTION: Backend Contract
// ============================================================================

/// Backend-specific pool construction, provisioning, and teardown.
pub trait ConnectionBackend: Send + Sync + 'static {
    /// Pool type owned by the manager.
    type Pool: Send + Sync + 'static;

    /// Returns the backend discriminator.
    fn kind(&self) -> BackendKind;

    /// Returns the schema or table-prefix identifier the pool serves.
    fn schema_name(&self) -> &str;

    /// Builds the pool and registers pool-level observers.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the pool cannot be built.
    fn connect(&self) -> Result<Self::Pool, StorageError>;

    /// Creates every structure and index the store needs (idempotent).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when provisioning fails.
    fn provision(&self, pool: &Self::Pool) -> Result<(), StorageError>;

    /// Deletes at most `limit` entries whose expiry is before `now_ms`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the sweep fails.
    fn purge_expired(&self, pool: &Self::Pool, now_ms: i64, limit: u32)
    -> Result<u64, StorageError>;

    /// Releases the pool.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the pool's own shutdown fails.
    fn close_pool(&self, pool: Self::Pool) -> Result<(), StorageError>;
}

// ============================================================================
// SECTION: Options and State
// ============================================================================

/// Manager options shared by every backend.
///
/// # Invariants
/// - `cleanup_interval` and `cleanup_batch_limit` are greater than zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerOptions {
    /// Namespace applied to writes without an explicit namespace.
    pub namespace: String,
    /// Interval between expiry sweeps.
    pub cleanup_interval: Duration,
    /// Maximum entries removed per sweep.
    pub cleanup_batch_limit: u32,
    /// Whether the periodic sweep runs at all.
    pub cleanup_enabled: bool,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            cleanup_interval: Duration::from_millis(DEFAULT_CLEANUP_INTERVAL_MS),
            cleanup_batch_limit: DEFAULT_CLEANUP_BATCH_LIMIT,
            cleanup_enabled: true,
        }
    }
}

impl ManagerOptions {
    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` [`StorageError`] for zero intervals or limits or
    /// an invalid namespace.
    pub fn validate(&self, backend: BackendKind) -> Result<(), StorageError> {
        validate_namespace(&self.namespace, backend)?;
        if self.cleanup_interval.is_zero() {
            return Err(StorageError::validation(
                backend,
                "cleanup_interval must be greater than zero",
            ));
        }
        if self.cleanup_batch_limit == 0 {
            return Err(StorageError::validation(
                backend,
                "cleanup_batch_limit must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Connection manager lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    /// No pool has been requested yet.
    Uninitialized,
    /// Pool construction or provisioning is in progress.
    Connecting,
    /// Pool is provisioned and serving.
    Ready,
    /// Last acquisition failed; the next acquisition retries.
    Failed,
    /// Shutdown is in progress.
    Closing,
    /// Shutdown finished; acquisition is refused.
    Closed,
}

// ============================================================================
// SECTION: Connection Handle
// ============================================================================

/// Provisioned pool plus its identifiers and cleanup task.
///
/// # Invariants
/// - Owned by exactly one [`ConnectionManager`]; callers hold shared
///   references that stop working once the manager closes.
pub struct ConnectionHandle<P> {
    /// Pool slot; `None` after shutdown.
    pool: RwLock<Option<P>>,
    /// Backend discriminator.
    backend: BackendKind,
    /// Schema or table-prefix identifier.
    schema: String,
    /// Default namespace.
    namespace: String,
    /// Set once provisioning succeeded.
    initialized: AtomicBool,
    /// Periodic expiry cleanup task.
    cleanup: Mutex<Option<CleanupTask>>,
}

impl<P> ConnectionHandle<P> {
    /// Wraps a provisioned pool.
    fn new(pool: P, backend: BackendKind, schema: &str, namespace: &str) -> Self {
        Self {
            pool: RwLock::new(Some(pool)),
            backend,
            schema: schema.to_string(),
            namespace: namespace.to_string(),
            initialized: AtomicBool::new(false),
            cleanup: Mutex::new(None),
        }
    }

    /// Runs `f` against the pool.
    ///
    /// # Errors
    ///
    /// Returns a `Connection` [`StorageError`] after shutdown, or whatever
    /// `f` returns.
    pub fn with_pool<T>(
        &self,
        f: impl FnOnce(&P) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let guard = self.pool.read().unwrap_or_else(PoisonError::into_inner);
        let pool = guard
            .as_ref()
            .ok_or_else(|| StorageError::connection(self.backend, "connection pool closed"))?;
        f(pool)
    }

    /// Returns the backend discriminator.
    #[must_use]
    pub const fn backend(&self) -> BackendKind {
        self.backend
    }

    /// Returns the schema or table-prefix identifier.
    #[must_use]
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Returns the default namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns true once provisioning succeeded.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Returns true while the pool is present.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.pool.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Returns the cleanup sweep count, when a cleanup task runs.
    #[must_use]
    pub fn cleanup_sweeps(&self) -> Option<u64> {
        self.cleanup
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(CleanupTask::completed_sweeps)
    }

    /// Installs the cleanup task.
    fn install_cleanup(&self, task: CleanupTask) {
        *self.cleanup.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
    }

    /// Cancels the cleanup task if one runs.
    fn cancel_cleanup(&self) {
        let task = self.cleanup.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(task) = task {
            task.cancel();
        }
    }

    /// Removes the pool from the handle.
    fn take_pool(&self) -> Option<P> {
        self.pool.write().unwrap_or_else(PoisonError::into_inner).take()
    }
}

// ============================================================================
// SECTION: Connection Manager
// ============================================================================

/// Sole owner of one backend pool.
pub struct ConnectionManager<B: ConnectionBackend> {
    /// Backend implementation.
    backend: Arc<B>,
    /// Manager options.
    options: ManagerOptions,
    /// Acquisition lock and the handle it guards.
    slot: Mutex<Option<Arc<ConnectionHandle<B::Pool>>>>,
    /// Observable lifecycle state.
    state: Mutex<ManagerState>,
}

impl<B: ConnectionBackend> ConnectionManager<B> {
    /// Creates a manager; no connection is made until first acquisition.
    #[must_use]
    pub fn new(backend: B, options: ManagerOptions) -> Self {
        Self {
            backend: Arc::new(backend),
            options,
            slot: Mutex::new(None),
            state: Mutex::new(ManagerState::Uninitialized),
        }
    }

    /// Returns the backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the manager options.
    #[must_use]
    pub const fn options(&self) -> &ManagerOptions {
        &self.options
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> ManagerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records a lifecycle transition.
    fn set_state(&self, next: ManagerState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }

    /// Returns the shared handle, building and provisioning the pool on the
    /// first call.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the manager is closed or the pool cannot
    /// be built or provisioned.
    pub fn get_connection(&self) -> Result<Arc<ConnectionHandle<B::Pool>>, StorageError> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = slot.as_ref() {
            return Ok(Arc::clone(handle));
        }
        let kind = self.backend.kind();
        if matches!(self.state(), ManagerState::Closing | ManagerState::Closed) {
            return Err(StorageError::connection(kind, "connection manager closed"));
        }
        self.options.validate(kind)?;
        self.set_state(ManagerState::Connecting);
        let schema = self.backend.schema_name().to_string();
        debug!(target: "storage", backend = %kind, schema = %schema, "pool connecting");
        let pool = match self.backend.connect() {
            Ok(pool) => pool,
            Err(err) => {
                self.set_state(ManagerState::Failed);
                return Err(err);
            }
        };
        debug!(target: "storage", backend = %kind, schema = %schema, "schema init start");
        if let Err(err) = self.backend.provision(&pool) {
            self.set_state(ManagerState::Failed);
            self.release_pool(pool);
            return Err(err);
        }
        debug!(target: "storage", backend = %kind, schema = %schema, "schema init done");
        let handle = Arc::new(ConnectionHandle::new(pool, kind, &schema, &self.options.namespace));
        handle.initialized.store(true, Ordering::Release);
        if self.options.cleanup_enabled {
            match self.spawn_cleanup(&handle) {
                Ok(task) => handle.install_cleanup(task),
                Err(err) => {
                    self.set_state(ManagerState::Failed);
                    if let Some(pool) = handle.take_pool() {
                        self.release_pool(pool);
                    }
                    return Err(err);
                }
            }
        }
        *slot = Some(Arc::clone(&handle));
        self.set_state(ManagerState::Ready);
        drop(slot);
        info!(target: "storage", backend = %kind, schema = %schema, "connection manager ready");
        Ok(handle)
    }

    /// Returns true while a pool exists and the manager is not shutting down.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        let open = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| handle.is_open());
        open && self.state() == ManagerState::Ready
    }

    /// Runs one expiry sweep on demand.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when acquisition or the sweep fails.
    pub fn purge_expired(&self) -> Result<u64, StorageError> {
        let handle = self.get_connection()?;
        let limit = self.options.cleanup_batch_limit;
        handle.with_pool(|pool| self.backend.purge_expired(pool, unix_millis(), limit))
    }

    /// Shuts the manager down: cancels cleanup, then releases the pool.
    ///
    /// Idempotent. Pool close failures are logged, never returned.
    pub fn close(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(handle) = slot.take() else {
            self.set_state(ManagerState::Closed);
            return;
        };
        self.set_state(ManagerState::Closing);
        handle.cancel_cleanup();
        if let Some(pool) = handle.take_pool() {
            self.release_pool(pool);
        }
        self.set_state(ManagerState::Closed);
        drop(slot);
        info!(target: "storage", backend = %self.backend.kind(), "connection manager closed");
    }

    /// Closes a pool, logging rather than propagating failures.
    fn release_pool(&self, pool: B::Pool) {
        if let Err(err) = self.backend.close_pool(pool) {
            warn!(
                target: "storage",
                backend = %self.backend.kind(),
                error = %err,
                "pool close failed"
            );
        }
    }

    /// Starts the periodic expiry sweep for a handle.
    fn spawn_cleanup(
        &self,
        handle: &Arc<ConnectionHandle<B::Pool>>,
    ) -> Result<CleanupTask, StorageError> {
        let backend = Arc::clone(&self.backend);
        let weak: Weak<ConnectionHandle<B::Pool>> = Arc::downgrade(handle);
        let limit = self.options.cleanup_batch_limit;
        let kind = backend.kind();
        let name = format!("stowage-{kind}-cleanup");
        CleanupTask::spawn(&name, self.options.cleanup_interval, move || {
            let Some(handle) = weak.upgrade() else {
                return SweepControl::Stop;
            };
            match handle.with_pool(|pool| backend.purge_expired(pool, unix_millis(), limit)) {
                Ok(0) => {}
                Ok(deleted) => {
                    info!(target: "storage", backend = %kind, deleted, "expired entries purged");
                }
                Err(err) => {
                    warn!(target: "storage", backend = %kind, error = %err, "expiry sweep failed");
                }
            }
            SweepControl::Continue
        })
    }
}

impl<B: ConnectionBackend> Drop for ConnectionManager<B> {
    fn drop(&mut self) {
        self.close();
    }
}
