//! Time-based requestors.
//!
//! The engine itself knows nothing about timers beyond its own time
//! limit; timed work is a collaborator that wraps itself as a
//! requestor. [`delay`] is that collaborator: it completes with a
//! fixed value after a virtual-clock duration and can be cancelled
//! while waiting.

use crate::cancel::CancelHandle;
use crate::requestor::Requestor;
use crate::runtime::Scheduler;
use crate::types::Outcome;
use std::time::Duration;

/// A requestor that succeeds with `value` once `duration` has elapsed
/// on the scheduler's virtual clock.
///
/// The returned cancellor disarms the timer, so a cancelled delay
/// never invokes its receiver. The incoming message is ignored.
#[must_use]
pub fn delay<T: Send + 'static>(
    scheduler: &Scheduler,
    duration: Duration,
    value: T,
) -> Requestor<T> {
    let scheduler = scheduler.clone();
    Requestor::new(move |receiver, _message| {
        let key = scheduler.schedule_after(duration, move || {
            receiver(Outcome::Success(value));
        });
        let sleeping = scheduler.clone();
        Some(CancelHandle::new(move |_reason| {
            sleeping.cancel_timer(key);
        }))
    })
}
