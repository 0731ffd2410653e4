//! Cooperative cancellation shared between the host and running compilers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Signal returned by [`CancellationFlag::check`] once the build was canceled.
///
/// Distinct from any failure: callers propagate it unchanged so the host can
/// tell "stopped on request" apart from "broke".
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("build canceled")]
pub struct Cancelled;

/// A cheaply clonable flag the host sets to request cancellation.
///
/// Compilers poll [`check`](Self::check) at convenient points; all clones
/// observe the same underlying flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    canceled: Arc<AtomicBool>,
}

impl CancellationFlag {
    /// Creates a flag in the not-canceled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Release);
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called on any clone.
    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }

    /// Check-point: returns `Err(Cancelled)` if cancellation was requested.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_canceled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}
