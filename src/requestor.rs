//! The requestor contract: one unit of work, one receiver call.
//!
//! A [`Requestor`] wraps a one-shot start function. Starting it hands
//! over a [`Receiver`] (a one-shot continuation consuming an
//! [`Outcome`]) and an opaque message, and may hand back a
//! [`CancelHandle`] for aborting the work in flight.
//!
//! The at-most-once receiver contract is structural: the receiver is a
//! consuming `FnOnce` box, so a requestor cannot invoke it twice. A
//! requestor that panics before invoking its receiver is treated as a
//! failure by the engine that launched it.

use crate::cancel::CancelHandle;
use crate::types::Outcome;
use core::fmt;

/// A one-shot continuation consuming the outcome of a requestor.
pub type Receiver<V> = Box<dyn FnOnce(Outcome<V>) + Send + 'static>;

type StartFn<T, V> = Box<dyn FnOnce(Receiver<V>, T) -> Option<CancelHandle> + Send + 'static>;

/// One unit of work: takes a receiver and a message, reports exactly
/// one outcome, and may return a cancellation handle.
///
/// `T` is the message type; `V` the value type. Leaf requestors and the
/// race/sequence/fallback composites use `V = T` so sequence can thread
/// one child's value into the next child's message; the parallel
/// composite produces a results vector instead.
pub struct Requestor<T, V = T> {
    start: StartFn<T, V>,
}

impl<T, V> Requestor<T, V> {
    /// Creates a requestor from its start function.
    ///
    /// The function must arrange for the receiver to be invoked exactly
    /// once, now or later, and may return a cancel handle for the
    /// in-flight work.
    #[must_use]
    pub fn new(start: impl FnOnce(Receiver<V>, T) -> Option<CancelHandle> + Send + 'static) -> Self {
        Self {
            start: Box::new(start),
        }
    }

    /// Starts the work. Consumes the requestor: one unit of work runs
    /// at most once.
    pub fn start(self, receiver: Receiver<V>, message: T) -> Option<CancelHandle> {
        (self.start)(receiver, message)
    }
}

impl<T: Send + 'static, V: Send + 'static> Requestor<T, V> {
    /// Lifts a plain function into a requestor that completes
    /// immediately with the function applied to its message.
    #[must_use]
    pub fn map(f: impl FnOnce(T) -> V + Send + 'static) -> Self {
        Self::new(move |receiver, message| {
            receiver(Outcome::Success(f(message)));
            None
        })
    }
}

impl<T, V> fmt::Debug for Requestor<T, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Requestor").finish_non_exhaustive()
    }
}
