//! Cooperative scheduler with a virtual clock.
//!
//! The scheduler is the host the composition engine runs on: a FIFO
//! queue of zero-delay jobs plus a timer heap on a virtual [`Time`]
//! clock. Nothing here blocks or sleeps. Jobs run one at a time, in
//! enqueue order; when the queue drains, the clock jumps to the next
//! live timer deadline and the due jobs are promoted to the queue.
//!
//! This gives deterministic timing: a test that races two requestors
//! with 100ms and 200ms delays observes completion at exactly the
//! 100ms virtual instant, every run.
//!
//! Handles are cheap clones sharing one state; jobs execute outside
//! the state lock so they are free to enqueue further work.

use super::timer::{TimerHeap, TimerKey};
use crate::types::Time;
use core::fmt;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::trace;

type Job = Box<dyn FnOnce() + Send + 'static>;

struct SchedulerState {
    ready: VecDeque<Job>,
    timers: TimerHeap,
    sleeping: HashMap<TimerKey, Job>,
    now: Time,
    next_key: u64,
}

/// A cooperative, virtual-time host for requestor composition.
#[derive(Clone)]
pub struct Scheduler {
    state: Arc<Mutex<SchedulerState>>,
}

impl Scheduler {
    /// Creates a scheduler with an empty queue at the epoch.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SchedulerState {
                ready: VecDeque::new(),
                timers: TimerHeap::new(),
                sleeping: HashMap::new(),
                now: Time::ZERO,
                next_key: 0,
            })),
        }
    }

    /// Returns the current virtual instant.
    #[must_use]
    pub fn now(&self) -> Time {
        self.state.lock().expect("lock poisoned").now
    }

    /// Enqueues a zero-delay job: it runs on a fresh stack the next
    /// time the scheduler is driven, after everything already queued.
    pub fn enqueue(&self, job: impl FnOnce() + Send + 'static) {
        self.state
            .lock()
            .expect("lock poisoned")
            .ready
            .push_back(Box::new(job));
    }

    /// Schedules a job to run `delay` after the current instant.
    ///
    /// Returns a key for [`cancel_timer`](Self::cancel_timer). A zero
    /// delay is an ordinary timer due immediately.
    pub fn schedule_after(&self, delay: Duration, job: impl FnOnce() + Send + 'static) -> TimerKey {
        let mut state = self.state.lock().expect("lock poisoned");
        let key = TimerKey(state.next_key);
        state.next_key += 1;
        let deadline = state.now + delay;
        state.timers.insert(key, deadline);
        state.sleeping.insert(key, Box::new(job));
        trace!(?key, %deadline, "timer armed");
        key
    }

    /// Disarms a timer. Returns true if the job had not yet run.
    ///
    /// The heap entry is abandoned in place and skipped when it
    /// surfaces.
    pub fn cancel_timer(&self, key: TimerKey) -> bool {
        let removed = self
            .state
            .lock()
            .expect("lock poisoned")
            .sleeping
            .remove(&key)
            .is_some();
        if removed {
            trace!(?key, "timer disarmed");
        }
        removed
    }

    /// Drives the scheduler until no work remains: runs queued jobs,
    /// advancing the virtual clock to each next live deadline as the
    /// queue drains.
    pub fn run_until_idle(&self) {
        while self.step(Time::MAX) {}
    }

    /// Drives the scheduler, but never advances the clock past
    /// `deadline`. On return the clock reads exactly `deadline` (or
    /// later, if it had already passed it).
    pub fn run_until(&self, deadline: Time) {
        while self.step(deadline) {}
        let mut state = self.state.lock().expect("lock poisoned");
        if state.now < deadline {
            state.now = deadline;
        }
    }

    /// Runs one ready job, or promotes the next batch of due timer
    /// jobs. Returns false when no work remains within `limit`.
    fn step(&self, limit: Time) -> bool {
        let job = self.state.lock().expect("lock poisoned").ready.pop_front();
        if let Some(job) = job {
            job();
            return true;
        }

        let mut state = self.state.lock().expect("lock poisoned");
        // Discard stale (cancelled) entries so the clock only chases
        // deadlines that still have a job behind them.
        let deadline = loop {
            let Some((key, deadline)) = state.timers.peek() else {
                return false;
            };
            if state.sleeping.contains_key(&key) {
                break deadline;
            }
            state.timers.pop();
        };
        if deadline > limit {
            return false;
        }
        if deadline > state.now {
            state.now = deadline;
        }
        let now = state.now;
        for key in state.timers.pop_due(now) {
            if let Some(job) = state.sleeping.remove(&key) {
                trace!(?key, %now, "timer fired");
                state.ready.push_back(job);
            }
        }
        true
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock().expect("lock poisoned");
        f.debug_struct("Scheduler")
            .field("now", &state.now)
            .field("ready", &state.ready.len())
            .field("sleeping", &state.sleeping.len())
            .finish()
    }
}
