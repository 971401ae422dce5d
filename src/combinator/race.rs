//! Race composition: first success wins.
//!
//! All children run concurrently (subject to the throttle). The first
//! child to succeed decides the composite; its siblings are cancelled
//! with a race-lost reason and their eventual completions are dropped.
//! Failures merely shrink the field: the composite fails only when
//! every child has failed, with the last reason observed.

use crate::cancel::CancelHandle;
use crate::error::ConfigError;
use crate::requestor::Requestor;
use crate::run::{run, Action, CompletionLatch, Deadline, Directive, MessageMode, RunConfig};
use crate::runtime::Scheduler;
use crate::types::{FactoryName, Outcome, Reason};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Configuration for [`race`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RaceConfig {
    /// Composite time limit; `None` (or zero) means no limit.
    pub time_limit: Option<Duration>,
    /// In-flight cap; 0 means unbounded.
    pub throttle: usize,
}

impl RaceConfig {
    /// Creates the default configuration: no limit, unbounded throttle.
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

    /// Caps the number of in-flight children.
    #[must_use]
    pub fn with_throttle(mut self, throttle: usize) -> Self {
        self.throttle = throttle;
        self
    }
}

/// Composes requestors into one that succeeds with the first success.
///
/// Every child receives a clone of the initial message. An empty list
/// is a configuration error: a race nobody entered has no meaningful
/// outcome. A race of one behaves as that requestor.
pub fn race<T: Clone + Send + 'static>(
    scheduler: &Scheduler,
    requestors: Vec<Requestor<T>>,
    config: RaceConfig,
) -> Result<Requestor<T>, ConfigError> {
    first_success(
        scheduler,
        requestors,
        config.time_limit,
        config.throttle,
        FactoryName::Race,
    )
}

/// Shared first-success engine: `race` runs it wide, `fallback` runs
/// it with throttle 1.
pub(crate) fn first_success<T: Clone + Send + 'static>(
    scheduler: &Scheduler,
    requestors: Vec<Requestor<T>>,
    time_limit: Option<Duration>,
    throttle: usize,
    factory: FactoryName,
) -> Result<Requestor<T>, ConfigError> {
    if requestors.is_empty() {
        return Err(ConfigError::EmptyRequestorList { factory });
    }
    let total = requestors.len();
    let scheduler = scheduler.clone();

    Ok(Requestor::new(move |receiver, message: T| {
        let latch = CompletionLatch::new(&scheduler, receiver);
        let pending = Arc::new(Mutex::new(total));

        let action: Action<T> = {
            let latch = Arc::clone(&latch);
            let pending = Arc::clone(&pending);
            Box::new(move |outcome, _index| match outcome {
                Outcome::Success(value) => {
                    latch.resolve(Outcome::Success(value));
                    Directive::Done(Reason::race_lost(factory))
                }
                Outcome::Failure(reason) => {
                    let mut remaining = pending.lock().expect("lock poisoned");
                    *remaining -= 1;
                    if *remaining == 0 {
                        // The last failure observed is the composite's.
                        latch.resolve(Outcome::Failure(reason.clone()));
                        Directive::Done(reason)
                    } else {
                        Directive::Continue
                    }
                }
            })
        };

        let deadline = match time_limit {
            None => Deadline::Unlimited,
            Some(limit) => {
                let latch = Arc::clone(&latch);
                Deadline::within(limit, move || {
                    let reason = Reason::timeout(factory, limit);
                    latch.resolve(Outcome::Failure(reason.clone()));
                    Directive::Done(reason)
                })
            }
        };

        let engine_cancel = run(
            &scheduler,
            RunConfig {
                factory,
                requestors,
                initial_message: message,
                action,
                deadline,
                throttle,
                message_mode: MessageMode::Broadcast,
            },
        );

        let composite_latch = Arc::clone(&latch);
        Some(CancelHandle::new(move |reason| {
            let reason = reason.unwrap_or_else(|| Reason::cancelled(factory));
            engine_cancel.cancel_with(reason.clone());
            composite_latch.resolve(Outcome::Failure(reason));
        }))
    }))
}
