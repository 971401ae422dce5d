//! Parallel composition: run everything, keep every result.
//!
//! `parallel` splits its children into *necessities* (must succeed) and
//! *optionals* (tolerated either way) and produces the full per-child
//! results vector, index-aligned with the input. A failing necessity
//! fails the composite at once and cancels the rest; optionals interact
//! with the time limit according to [`TimeOption`].
//!
//! A child that never completed — a cancelled optional, or a throttled
//! child that was never launched — leaves `None` in its slot.

use crate::cancel::CancelHandle;
use crate::requestor::Requestor;
use crate::run::{run, Action, CompletionLatch, Deadline, Directive, MessageMode, RunConfig};
use crate::runtime::Scheduler;
use crate::types::{FactoryName, Outcome, Reason};
use std::mem;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How optionals share the composite's time limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeOption {
    /// Finish as soon as all necessities complete, cancelling any
    /// still-running optionals. Fail if the limit elapses first.
    #[default]
    SkipOptionalsIfTimeRemains,
    /// Necessities and optionals share the limit; optionals may keep
    /// running until it elapses.
    TryOptionalsIfTimeRemains,
    /// The limit applies only to optionals. Necessities run without
    /// one; once they finish (or the limit elapses), behave as
    /// [`Self::SkipOptionalsIfTimeRemains`].
    RequireNecessities,
}

/// Configuration for [`parallel`].
pub struct ParallelConfig<T> {
    /// Children whose failure is tolerated.
    pub optionals: Vec<Requestor<T>>,
    /// Composite time limit; `None` (or zero) means no limit.
    pub time_limit: Option<Duration>,
    /// Policy tying optionals to the time limit.
    pub time_option: TimeOption,
    /// In-flight cap across all children; 0 means unbounded.
    pub throttle: usize,
}

impl<T> ParallelConfig<T> {
    /// Creates the default configuration: no optionals, no limit,
    /// unbounded throttle.
    #[must_use]
    pub fn new() -> Self {
        Self {
            optionals: Vec::new(),
            time_limit: None,
            time_option: TimeOption::default(),
            throttle: 0,
        }
    }

    /// Adds optional children.
    #[must_use]
    pub fn with_optionals(mut self, optionals: Vec<Requestor<T>>) -> Self {
        self.optionals = optionals;
        self
    }

    /// Sets the time limit.
    #[must_use]
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    /// Sets the time option.
    #[must_use]
    pub fn with_time_option(mut self, time_option: TimeOption) -> Self {
        self.time_option = time_option;
        self
    }

    /// Caps the number of in-flight children.
    #[must_use]
    pub fn with_throttle(mut self, throttle: usize) -> Self {
        self.throttle = throttle;
        self
    }
}

impl<T> Default for ParallelConfig<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-child results of a parallel composite, index-aligned with the
/// input (necessities first, then optionals). `None` marks a child
/// that never completed.
pub type ParallelResults<T> = Vec<Option<Outcome<T>>>;

struct ParallelState<T> {
    results: ParallelResults<T>,
    pending: usize,
    pending_necessities: usize,
    time_option: TimeOption,
}

/// Composes necessities and optionals into a requestor that collects
/// every child's result.
///
/// Every child receives a clone of the initial message. With no
/// children at all, the composite succeeds immediately with an empty
/// vector. With only optionals, the time option is forced to
/// [`TimeOption::TryOptionalsIfTimeRemains`]; with only necessities it
/// is forced to [`TimeOption::SkipOptionalsIfTimeRemains`] (vacuous).
pub fn parallel<T: Clone + Send + 'static>(
    scheduler: &Scheduler,
    necessities: Vec<Requestor<T>>,
    config: ParallelConfig<T>,
) -> Requestor<T, ParallelResults<T>> {
    let ParallelConfig {
        optionals,
        time_limit,
        time_option,
        throttle,
    } = config;

    let necessity_count = necessities.len();
    let optional_count = optionals.len();
    let total = necessity_count + optional_count;
    if total == 0 {
        return Requestor::new(|receiver, _message| {
            receiver(Outcome::Success(Vec::new()));
            None
        });
    }

    let time_option = if necessity_count == 0 {
        TimeOption::TryOptionalsIfTimeRemains
    } else if optional_count == 0 {
        TimeOption::SkipOptionalsIfTimeRemains
    } else {
        time_option
    };

    let mut requestors = necessities;
    requestors.extend(optionals);
    let scheduler = scheduler.clone();

    Requestor::new(move |receiver, message: T| {
        let latch = CompletionLatch::new(&scheduler, receiver);
        let shared = Arc::new(Mutex::new(ParallelState {
            results: (0..total).map(|_| None).collect(),
            pending: total,
            pending_necessities: necessity_count,
            time_option,
        }));

        let action: Action<T> = {
            let latch = Arc::clone(&latch);
            let shared = Arc::clone(&shared);
            Box::new(move |outcome, index| {
                let mut state = shared.lock().expect("lock poisoned");
                state.pending -= 1;
                if index < necessity_count {
                    state.pending_necessities -= 1;
                    if let Outcome::Failure(reason) = &outcome {
                        let reason = reason.clone();
                        state.results[index] = Some(outcome);
                        latch.resolve(Outcome::Failure(reason.clone()));
                        return Directive::Done(reason);
                    }
                }
                state.results[index] = Some(outcome);
                let finished = state.pending == 0
                    || (state.pending_necessities == 0
                        && state.time_option == TimeOption::SkipOptionalsIfTimeRemains);
                if finished {
                    let results = mem::take(&mut state.results);
                    latch.resolve(Outcome::Success(results));
                    Directive::Done(Reason::cancelled(FactoryName::Parallel))
                } else {
                    Directive::Continue
                }
            })
        };

        let deadline = match time_limit {
            None => Deadline::Unlimited,
            Some(limit) => {
                let latch = Arc::clone(&latch);
                let shared = Arc::clone(&shared);
                Deadline::within(limit, move || {
                    let mut state = shared.lock().expect("lock poisoned");
                    let reason = Reason::timeout(FactoryName::Parallel, limit);
                    match state.time_option {
                        TimeOption::SkipOptionalsIfTimeRemains
                        | TimeOption::TryOptionalsIfTimeRemains => {
                            if state.pending_necessities == 0 {
                                let results = mem::take(&mut state.results);
                                latch.resolve(Outcome::Success(results));
                            } else {
                                latch.resolve(Outcome::Failure(reason.clone()));
                            }
                            Directive::Done(reason)
                        }
                        TimeOption::RequireNecessities => {
                            // The necessities' no-limit phase is over.
                            state.time_option = TimeOption::SkipOptionalsIfTimeRemains;
                            if state.pending_necessities == 0 {
                                let results = mem::take(&mut state.results);
                                latch.resolve(Outcome::Success(results));
                                Directive::Done(reason)
                            } else {
                                Directive::Continue
                            }
                        }
                    }
                })
            }
        };

        let engine_cancel = run(
            &scheduler,
            RunConfig {
                factory: FactoryName::Parallel,
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
            let reason = reason.unwrap_or_else(|| Reason::cancelled(FactoryName::Parallel));
            engine_cancel.cancel_with(reason.clone());
            composite_latch.resolve(Outcome::Failure(reason));
        }))
    })
}
