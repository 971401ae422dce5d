//! One-shot cancellation handles.
//!
//! Cancellation is a first-class protocol, not a silent drop. A
//! [`CancelHandle`] is an armed→fired latch around a closure that
//! attempts to abort in-flight work: the first call fires it, every
//! later call is a no-op, and calling it after the work completed is
//! safe. Handles are cheaply cloneable; all clones share the latch.

use crate::types::Reason;
use core::fmt;
use std::sync::{Arc, Mutex};

type CancelFn = Box<dyn FnOnce(Option<Reason>) + Send + 'static>;

/// An idempotent, one-shot cancellation latch.
#[derive(Clone)]
pub struct CancelHandle {
    slot: Arc<Mutex<Option<CancelFn>>>,
}

impl CancelHandle {
    /// Creates a handle around a cancellation attempt.
    ///
    /// The closure receives the reason supplied by the canceller, or
    /// `None` when cancellation was requested without one.
    #[must_use]
    pub fn new(cancel: impl FnOnce(Option<Reason>) + Send + 'static) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(Box::new(cancel)))),
        }
    }

    /// Requests cancellation without a reason.
    ///
    /// Returns true if this call fired the latch.
    pub fn cancel(&self) -> bool {
        self.fire(None)
    }

    /// Requests cancellation with a reason.
    ///
    /// Returns true if this call fired the latch.
    pub fn cancel_with(&self, reason: Reason) -> bool {
        self.fire(Some(reason))
    }

    /// Returns true if the latch has not fired yet.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.slot.lock().expect("lock poisoned").is_some()
    }

    fn fire(&self, reason: Option<Reason>) -> bool {
        // Take under the lock, call outside it: the cancellation body is
        // arbitrary user code and must not run while the latch is held.
        let cancel = self.slot.lock().expect("lock poisoned").take();
        match cancel {
            Some(cancel) => {
                cancel(reason);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("armed", &self.is_armed())
            .finish()
    }
}
