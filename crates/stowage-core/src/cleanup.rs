// crates/stowage-core/src/cleanup.rs
// ============================================================================
// Module: Stowage Expiry Cleanup Task
// Description: Cancellable periodic background task for expiry sweeps.
// Purpose: Physically remove expired entries on a fixed schedule.
// Dependencies: tracing, crate::error
// ============================================================================

//! ## Overview
//! A [`CleanupTask`] owns one named thread that wakes every `interval` and
//! runs a sweep closure. The schedule survives failed sweeps; only explicit
//! cancellation, a dropped task, or the sweep returning
//! [`SweepControl::Stop`] ends it. Cancellation consumes the task, so it can
//! happen at most once and a cancelled task cannot be restarted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::sync::mpsc::RecvTimeoutError;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::warn;

use crate::error::BackendKind;
use crate::error::ErrorKind;
use crate::error::StorageError;

// ============================================================================
// SECTION: Task
// ============================================================================

/// Result of one sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepControl {
    /// Keep the schedule running.
    Continue,
    /// End the schedule (owner is gone).
    Stop,
}

/// Periodic background cleanup task.
///
/// # Invariants
/// - At most one thread per task.
/// - Dropping the task signals the thread to stop without joining it.
#[derive(Debug)]
pub struct CleanupTask {
    /// Stop signal; dropping it also stops the thread.
    stop: Option<mpsc::Sender<()>>,
    /// Worker thread handle.
    join: Option<JoinHandle<()>>,
    /// Completed sweep counter.
    sweeps: Arc<AtomicU64>,
    /// Tick interval.
    interval: Duration,
}

impl CleanupTask {
    /// Spawns the cleanup thread.
    ///
    /// # Errors
    ///
    /// Returns an `IoError` [`StorageError`] when the thread cannot be spawned.
    pub fn spawn<F>(name: &str, interval: Duration, mut sweep: F) -> Result<Self, StorageError>
    where
        F: FnMut() -> SweepControl + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let sweeps = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&sweeps);
        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            let control = sweep();
                            counter.fetch_add(1, Ordering::AcqRel);
                            if control == SweepControl::Stop {
                                break;
                            }
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })
            .map_err(|err| {
                StorageError::new(
                    ErrorKind::IoError,
                    BackendKind::Generic,
                    format!("failed to spawn cleanup thread: {err}"),
                )
            })?;
        Ok(Self {
            stop: Some(stop_tx),
            join: Some(join),
            sweeps,
            interval,
        })
    }

    /// Returns the number of completed sweeps.
    #[must_use]
    pub fn completed_sweeps(&self) -> u64 {
        self.sweeps.load(Ordering::Acquire)
    }

    /// Returns the tick interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns true while the worker thread is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.join.as_ref().is_some_and(|join| !join.is_finished())
    }

    /// Stops the schedule and waits for an in-flight sweep to finish.
    ///
    /// Returns false when the worker thread had panicked; the panic is
    /// logged, not propagated.
    pub fn cancel(mut self) -> bool {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        let Some(join) = self.join.take() else {
            return true;
        };
        if join.thread().id() == thread::current().id() {
            return true;
        }
        let name = join.thread().name().unwrap_or("cleanup").to_string();
        if join.join().is_err() {
            warn!(target: "storage", thread = %name, "cleanup thread panicked");
            return false;
        }
        true
    }
}
