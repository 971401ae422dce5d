//! The run engine shared by all four composition operators.
//!
//! Given a list of child requestors, an initial message, an action,
//! and a typed deadline/throttle configuration, the engine launches
//! the children and routes each completion through the action. It is
//! the single source of truth for the hard guarantees:
//!
//! - **At-most-once per child.** A child's receiver is a consuming
//!   `FnOnce`; a per-child done flag additionally drops completions
//!   that arrive after cancellation, and the panic-after-receiver
//!   double.
//! - **Panic means fail.** A child that panics before invoking its
//!   receiver is caught at the launch boundary and reported as a
//!   failure completion attributed to its index.
//! - **Deferred launch.** Every child start goes through the
//!   scheduler's zero-delay queue: a fresh stack per start, and the
//!   action always observes a quiesced engine. Chains of purely
//!   synchronous children cannot recurse.
//! - **Throttle discipline.** At most `min(throttle, len)` children
//!   run initially; each completion releases one more launch.
//! - **Cancellation.** The engine's cancellor disarms the timer, fires
//!   every still-armed child cancellor in list order (panics from
//!   child cancellors are swallowed), and turns late completions into
//!   no-ops. It is idempotent.
//! - **One timer.** A configured time limit arms a single one-shot
//!   timer, fired at most once and disarmed on cancellation.
//!
//! The action decides policy by returning a [`Directive`]: `Continue`
//! to keep driving, or `Done(reason)` to shut the engine down and
//! cancel the still-pending children with that reason. Completion
//! handling (the action included) is one small critical section under
//! the engine's mutex, so completions are serialised even on a
//! parallel host.

use crate::cancel::CancelHandle;
use crate::requestor::{Receiver, Requestor};
use crate::runtime::{Scheduler, TimerKey};
use crate::types::{FactoryName, Outcome, PanicPayload, Reason};
use core::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, trace};

/// Per-completion policy callback: outcome and child index in, verdict out.
pub type Action<T> = Box<dyn FnMut(Outcome<T>, usize) -> Directive + Send + 'static>;

/// Timeout policy callback, invoked at most once when the limit elapses.
pub type TimeoutAction = Box<dyn FnOnce() -> Directive + Send + 'static>;

/// The action's verdict on a completion (or on a timer firing).
#[derive(Debug)]
pub enum Directive {
    /// Keep driving: launch the next child if one is waiting.
    Continue,
    /// Finish: shut the engine down, cancelling still-pending children
    /// with this reason.
    Done(Reason),
}

/// A time limit coupled with its timeout policy.
///
/// The pairing makes "limit without a handler" unrepresentable. A zero
/// limit means no limit, as does [`Deadline::Unlimited`].
pub enum Deadline {
    /// No time limit.
    Unlimited,
    /// Fire `on_timeout` once `limit` has elapsed.
    Within {
        /// How long the composite may run.
        limit: Duration,
        /// Policy to apply when the limit elapses.
        on_timeout: TimeoutAction,
    },
}

impl Deadline {
    /// Builds a deadline, normalising a zero limit to [`Self::Unlimited`].
    #[must_use]
    pub fn within(limit: Duration, on_timeout: impl FnOnce() -> Directive + Send + 'static) -> Self {
        if limit.is_zero() {
            Self::Unlimited
        } else {
            Self::Within {
                limit,
                on_timeout: Box::new(on_timeout),
            }
        }
    }

}

impl fmt::Debug for Deadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlimited => write!(f, "Deadline::Unlimited"),
            Self::Within { limit, .. } => write!(f, "Deadline::Within({limit:?})"),
        }
    }
}

/// What message each child receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageMode {
    /// Every child receives a clone of the initial message.
    Broadcast,
    /// Each child receives the previous child's success value; the
    /// first receives the initial message. Requires throttle 1.
    Thread,
}

/// Everything the engine needs to drive one composite.
pub struct RunConfig<T> {
    /// Operator tag for reasons and log events.
    pub factory: FactoryName,
    /// Children, launched in list order.
    pub requestors: Vec<Requestor<T>>,
    /// Message for the first (threading) or every (broadcast) child.
    pub initial_message: T,
    /// Per-completion policy.
    pub action: Action<T>,
    /// Time limit and its policy.
    pub deadline: Deadline,
    /// In-flight cap; 0 means unbounded.
    pub throttle: usize,
    /// Broadcast or thread the message.
    pub message_mode: MessageMode,
}

impl<T> fmt::Debug for RunConfig<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunConfig")
            .field("factory", &self.factory)
            .field("requestors", &self.requestors.len())
            .field("deadline", &self.deadline)
            .field("throttle", &self.throttle)
            .field("message_mode", &self.message_mode)
            .finish_non_exhaustive()
    }
}

/// Drives the children described by `config` on `scheduler`.
///
/// Returns the engine's cancellor. Launches are enqueued, not run:
/// nothing happens until the scheduler is driven.
pub fn run<T: Clone + Send + 'static>(scheduler: &Scheduler, config: RunConfig<T>) -> CancelHandle {
    let RunConfig {
        factory,
        requestors,
        initial_message,
        action,
        deadline,
        throttle,
        message_mode,
    } = config;

    let len = requestors.len();
    let engine = Arc::new(Engine {
        scheduler: scheduler.clone(),
        factory,
        state: Mutex::new(EngineState {
            live: true,
            requestors: requestors.into_iter().map(Some).collect(),
            cancels: (0..len).map(|_| None).collect(),
            done: vec![false; len],
            next: 0,
            carry: initial_message,
            message_mode,
            action: Some(action),
            on_timeout: None,
            timer: None,
        }),
    });

    if let Deadline::Within { limit, on_timeout } = deadline {
        let mut state = engine.state.lock().expect("lock poisoned");
        state.on_timeout = Some(on_timeout);
        let timer_engine = Arc::clone(&engine);
        state.timer = Some(
            engine
                .scheduler
                .schedule_after(limit, move || timer_engine.on_timer()),
        );
    }

    let initial = if throttle == 0 { len } else { throttle.min(len) };
    for _ in 0..initial {
        Engine::enqueue_launch(&engine);
    }

    let cancel_engine = Arc::clone(&engine);
    CancelHandle::new(move |reason| cancel_engine.cancel(reason))
}

struct Engine<T> {
    scheduler: Scheduler,
    factory: FactoryName,
    state: Mutex<EngineState<T>>,
}

struct EngineState<T> {
    live: bool,
    requestors: Vec<Option<Requestor<T>>>,
    cancels: Vec<Option<CancelHandle>>,
    done: Vec<bool>,
    next: usize,
    carry: T,
    message_mode: MessageMode,
    action: Option<Action<T>>,
    on_timeout: Option<TimeoutAction>,
    timer: Option<TimerKey>,
}

impl<T: Clone + Send + 'static> Engine<T> {
    fn enqueue_launch(self: &Arc<Self>) {
        let engine = Arc::clone(self);
        self.scheduler.enqueue(move || engine.launch_next());
    }

    /// Starts the next unlaunched child, if the engine is still live.
    fn launch_next(self: &Arc<Self>) {
        let (index, requestor, message) = {
            let mut state = self.state.lock().expect("lock poisoned");
            if !state.live || state.next >= state.requestors.len() {
                return;
            }
            let index = state.next;
            state.next += 1;
            let Some(requestor) = state.requestors[index].take() else {
                return;
            };
            (index, requestor, state.carry.clone())
        };

        trace!(factory = %self.factory, index, "launching child");
        let completion_engine = Arc::clone(self);
        let receiver: Receiver<T> =
            Box::new(move |outcome| completion_engine.complete(index, outcome));

        match catch_unwind(AssertUnwindSafe(move || requestor.start(receiver, message))) {
            Ok(Some(cancel)) => {
                let mut state = self.state.lock().expect("lock poisoned");
                if state.live && !state.done[index] {
                    state.cancels[index] = Some(cancel);
                } else if !state.live {
                    // The engine was cancelled while this child was
                    // starting; its cancellor missed the sweep.
                    drop(state);
                    let reason = Reason::cancelled(self.factory);
                    let result = catch_unwind(AssertUnwindSafe(|| cancel.cancel_with(reason)));
                    if result.is_err() {
                        trace!(factory = %self.factory, index, "child cancellor panicked");
                    }
                }
                // Otherwise the child completed synchronously and the
                // handle is stale.
            }
            Ok(None) => {}
            Err(payload) => {
                let payload = PanicPayload::from_any(payload);
                trace!(factory = %self.factory, index, message = payload.message(), "child panicked");
                self.complete(
                    index,
                    Outcome::Failure(Reason::child_panic(self.factory, index, payload)),
                );
            }
        }
    }

    /// Routes one child completion through the action.
    ///
    /// Late and duplicate deliveries are dropped here.
    fn complete(self: &Arc<Self>, index: usize, outcome: Outcome<T>) {
        let mut state = self.state.lock().expect("lock poisoned");
        if !state.live || state.done[index] {
            trace!(factory = %self.factory, index, "dropping late completion");
            return;
        }
        state.done[index] = true;
        state.cancels[index] = None;
        if state.message_mode == MessageMode::Thread {
            if let Outcome::Success(value) = &outcome {
                state.carry = value.clone();
            }
        }
        trace!(factory = %self.factory, index, success = outcome.is_success(), "child completed");

        let directive = match state.action.as_mut() {
            Some(action) => action(outcome, index),
            None => Directive::Continue,
        };
        self.apply(state, directive, true);
    }

    /// Applies a directive. `release_launch` is true only for child
    /// completions: a completion frees one throttle slot, a timer
    /// firing does not.
    fn apply(
        self: &Arc<Self>,
        state: MutexGuard<'_, EngineState<T>>,
        directive: Directive,
        release_launch: bool,
    ) {
        let mut state = state;
        match directive {
            Directive::Continue => {
                let more = release_launch && state.next < state.requestors.len();
                drop(state);
                if more {
                    self.enqueue_launch();
                }
            }
            Directive::Done(reason) => {
                let (cancels, timer) = shutdown(&mut state);
                drop(state);
                debug!(factory = %self.factory, %reason, "composite finished");
                self.settle(cancels, timer, &reason);
            }
        }
    }

    /// Engine cancellor: idempotent, fires child cancellors in list
    /// order, disarms the timer.
    fn cancel(self: &Arc<Self>, reason: Option<Reason>) {
        let mut state = self.state.lock().expect("lock poisoned");
        if !state.live {
            return;
        }
        let reason = reason.unwrap_or_else(|| Reason::cancelled(self.factory));
        let (cancels, timer) = shutdown(&mut state);
        drop(state);
        debug!(factory = %self.factory, %reason, "composite cancelled");
        self.settle(cancels, timer, &reason);
    }

    fn on_timer(self: &Arc<Self>) {
        let mut state = self.state.lock().expect("lock poisoned");
        if !state.live {
            return;
        }
        state.timer = None;
        let Some(on_timeout) = state.on_timeout.take() else {
            return;
        };
        trace!(factory = %self.factory, "time limit elapsed");
        let directive = on_timeout();
        self.apply(state, directive, false);
    }

    /// Disarms the timer and fires the collected child cancellors.
    /// Panics from child cancellors are swallowed: cancellation always
    /// completes.
    fn settle(&self, cancels: Vec<CancelHandle>, timer: Option<TimerKey>, reason: &Reason) {
        if let Some(key) = timer {
            self.scheduler.cancel_timer(key);
        }
        for cancel in cancels {
            let reason = reason.clone();
            let result = catch_unwind(AssertUnwindSafe(|| cancel.cancel_with(reason)));
            if result.is_err() {
                trace!(factory = %self.factory, "child cancellor panicked");
            }
        }
    }
}

/// Kills the engine under its lock, handing back what must be released
/// outside it: the still-armed child cancellors (in list order) and the
/// timer key.
fn shutdown<T>(state: &mut EngineState<T>) -> (Vec<CancelHandle>, Option<TimerKey>) {
    state.live = false;
    state.action = None;
    state.on_timeout = None;
    state.requestors.clear();
    let cancels = state.cancels.iter_mut().filter_map(Option::take).collect();
    (cancels, state.timer.take())
}

/// An atomic completion latch guarding a composite's receiver.
///
/// The first [`resolve`](Self::resolve) wins and enqueues the receiver
/// invocation on the scheduler; every later call is a no-op. Delivery
/// through the queue means child cancellors fire before the caller
/// observes the outcome, and a receiver that immediately cancels the
/// composite finds it already quiesced.
pub struct CompletionLatch<V> {
    scheduler: Scheduler,
    slot: Mutex<Option<Receiver<V>>>,
}

impl<V: Send + 'static> CompletionLatch<V> {
    /// Wraps a receiver in a latch bound to `scheduler`.
    #[must_use]
    pub fn new(scheduler: &Scheduler, receiver: Receiver<V>) -> Arc<Self> {
        Arc::new(Self {
            scheduler: scheduler.clone(),
            slot: Mutex::new(Some(receiver)),
        })
    }

    /// Delivers the composite outcome, if nothing was delivered yet.
    ///
    /// Returns true if this call won the latch.
    pub fn resolve(&self, outcome: Outcome<V>) -> bool {
        let receiver = self.slot.lock().expect("lock poisoned").take();
        match receiver {
            Some(receiver) => {
                self.scheduler.enqueue(move || receiver(outcome));
                true
            }
            None => false,
        }
    }

    /// Returns true if no outcome has been delivered yet.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.slot.lock().expect("lock poisoned").is_some()
    }
}

impl<V> fmt::Debug for CompletionLatch<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionLatch")
            .field("pending", &self.slot.lock().expect("lock poisoned").is_some())
            .finish()
    }
}
