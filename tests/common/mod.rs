//! Shared synthetic requestors and capture helpers for the
//! integration suites.
//!
//! Not every suite uses every helper.
#![allow(dead_code)]

use quartet::test_utils::init_test_logging;
use quartet::{CancelHandle, Outcome, Reason, Receiver, Requestor, Scheduler};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Call first in every test.
pub fn init_test(name: &str) {
    init_test_logging();
    tracing::info!(test = name, "TEST START");
}

/// A receiver that stores the outcome it was given, plus the virtual
/// instant (in milliseconds) at which it ran.
pub type CapturedOutcome<V> = Arc<Mutex<Option<(Outcome<V>, u64)>>>;

/// Builds a capturing receiver bound to the scheduler's clock.
pub fn capture<V: Send + 'static>(scheduler: &Scheduler) -> (Receiver<V>, CapturedOutcome<V>) {
    let slot: CapturedOutcome<V> = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&slot);
    let clock = scheduler.clone();
    let receiver: Receiver<V> = Box::new(move |outcome| {
        let mut guard = sink.lock().expect("lock poisoned");
        assert!(guard.is_none(), "composite receiver invoked twice");
        *guard = Some((outcome, clock.now().as_millis()));
    });
    (receiver, slot)
}

/// Reads a captured outcome, panicking if nothing was delivered.
pub fn delivered<V: Clone>(slot: &CapturedOutcome<V>) -> (Outcome<V>, u64) {
    slot.lock()
        .expect("lock poisoned")
        .clone()
        .expect("composite receiver never ran")
}

/// Returns true if nothing was delivered.
pub fn undelivered<V>(slot: &CapturedOutcome<V>) -> bool {
    slot.lock().expect("lock poisoned").is_none()
}

/// A requestor that fails immediately with the given excuse.
pub fn fail<T: Send + 'static>(excuse: &'static str) -> Requestor<T> {
    Requestor::new(move |receiver, _message| {
        receiver(Outcome::Failure(Reason::new(excuse)));
        None
    })
}

/// A requestor that panics during launch.
pub fn panics<T: Send + 'static>(message: &'static str) -> Requestor<T> {
    Requestor::new(move |_receiver: Receiver<T>, _message| panic!("{message}"))
}

/// A requestor that never completes and records whether its cancellor
/// fired.
pub fn never<T: Send + 'static>(cancelled: &Arc<AtomicUsize>) -> Requestor<T> {
    let cancelled = Arc::clone(cancelled);
    Requestor::new(move |_receiver: Receiver<T>, _message| {
        Some(CancelHandle::new(move |_reason| {
            cancelled.fetch_add(1, Ordering::SeqCst);
        }))
    })
}

/// Tracks how many children are in flight and the highest count seen.
#[derive(Debug, Default)]
pub struct InFlightGauge {
    current: AtomicUsize,
    high_water: AtomicUsize,
}

impl InFlightGauge {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn high_water(&self) -> usize {
        self.high_water.load(Ordering::SeqCst)
    }

    /// Wraps a delay-like child: in-flight while its timer is pending.
    pub fn tracked(
        self: &Arc<Self>,
        scheduler: &Scheduler,
        millis: u64,
        value: u64,
    ) -> Requestor<u64> {
        let gauge = Arc::clone(self);
        let scheduler = scheduler.clone();
        Requestor::new(move |receiver, _message| {
            let current = gauge.current.fetch_add(1, Ordering::SeqCst) + 1;
            gauge.high_water.fetch_max(current, Ordering::SeqCst);
            let key = scheduler.schedule_after(std::time::Duration::from_millis(millis), {
                let gauge = Arc::clone(&gauge);
                move || {
                    gauge.current.fetch_sub(1, Ordering::SeqCst);
                    receiver(Outcome::Success(value));
                }
            });
            let sleeping = scheduler.clone();
            Some(CancelHandle::new(move |_reason| {
                sleeping.cancel_timer(key);
                gauge.current.fetch_sub(1, Ordering::SeqCst);
            }))
        })
    }
}
