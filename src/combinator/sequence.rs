//! Sequence composition: one at a time, values threaded through.
//!
//! Children run strictly in order; each child's success value becomes
//! the next child's message, and the composite's value is the last
//! child's. The first failure fails the composite and later children
//! never start. This is the engine's throttle-1 threading mode; the
//! engine path exercised is the same one parallel drives.

use crate::cancel::CancelHandle;
use crate::requestor::Requestor;
use crate::run::{run, Action, CompletionLatch, Deadline, Directive, MessageMode, RunConfig};
use crate::runtime::Scheduler;
use crate::types::{FactoryName, Outcome, Reason};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Configuration for [`sequence`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceConfig {
    /// Composite time limit covering the whole chain; `None` (or zero)
    /// means no limit.
    pub time_limit: Option<Duration>,
}

impl SequenceConfig {
    /// Creates the default configuration: no limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the time limit.
    #[must_use]
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }
}

/// Composes requestors into a chain threading each success into the
/// next child's message.
///
/// An empty chain succeeds immediately with the initial message as its
/// value. Cancelling the composite cancels the child in flight.
pub fn sequence<T: Clone + Send + 'static>(
    scheduler: &Scheduler,
    requestors: Vec<Requestor<T>>,
    config: SequenceConfig,
) -> Requestor<T> {
    if requestors.is_empty() {
        return Requestor::new(|receiver, message| {
            receiver(Outcome::Success(message));
            None
        });
    }
    let total = requestors.len();
    let time_limit = config.time_limit;
    let scheduler = scheduler.clone();

    Requestor::new(move |receiver, message: T| {
        let latch = CompletionLatch::new(&scheduler, receiver);
        let pending = Arc::new(Mutex::new(total));

        let action: Action<T> = {
            let latch = Arc::clone(&latch);
            let pending = Arc::clone(&pending);
            Box::new(move |outcome, _index| match outcome {
                Outcome::Success(value) => {
                    let mut remaining = pending.lock().expect("lock poisoned");
                    *remaining -= 1;
                    if *remaining == 0 {
                        latch.resolve(Outcome::Success(value));
                        Directive::Done(Reason::cancelled(FactoryName::Sequence))
                    } else {
                        Directive::Continue
                    }
                }
                Outcome::Failure(reason) => {
                    latch.resolve(Outcome::Failure(reason.clone()));
                    Directive::Done(reason)
                }
            })
        };

        let deadline = match time_limit {
            None => Deadline::Unlimited,
            Some(limit) => {
                let latch = Arc::clone(&latch);
                Deadline::within(limit, move || {
                    let reason = Reason::timeout(FactoryName::Sequence, limit);
                    latch.resolve(Outcome::Failure(reason.clone()));
                    Directive::Done(reason)
                })
            }
        };

        let engine_cancel = run(
            &scheduler,
            RunConfig {
                factory: FactoryName::Sequence,
                requestors,
                initial_message: message,
                action,
                deadline,
                throttle: 1,
                message_mode: MessageMode::Thread,
            },
        );

        let composite_latch = Arc::clone(&latch);
        Some(CancelHandle::new(move |reason| {
            let reason = reason.unwrap_or_else(|| Reason::cancelled(FactoryName::Sequence));
            engine_cancel.cancel_with(reason.clone());
            composite_latch.resolve(Outcome::Failure(reason));
        }))
    })
}
