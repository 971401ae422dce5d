//! Quartet: cancel-correct composition of one-shot asynchronous
//! requestors.
//!
//! # Overview
//!
//! A *requestor* performs exactly one unit of work — synchronous or
//! asynchronous — and reports a single [`Outcome`] through a one-shot
//! receiver. Quartet combines requestors with four operators, each
//! returning a new requestor:
//!
//! - [`parallel`]: run everything concurrently, keep every result
//! - [`race`]: run concurrently, first success wins
//! - [`sequence`]: run one at a time, thread each value into the next
//! - [`fallback`]: run one at a time, first success wins
//!
//! All four share one [`run`] engine, which owns the hard guarantees:
//! the composite receiver fires exactly once; cancellation is an
//! idempotent latch that reaches every still-pending child; a time
//! limit is one one-shot timer, disarmed on cancellation; launches are
//! deferred through the scheduler so synchronous chains cannot
//! recurse; a throttle caps in-flight children.
//!
//! # Core Guarantees
//!
//! - **Exactly-once receivers**: receivers are consuming closures and
//!   composites are guarded by an atomic completion latch
//! - **Cancel-correctness**: losers and stragglers are cancelled with
//!   tagged reasons, never silently abandoned
//! - **Failure as values**: a [`Reason`] carries its factory tag, kind,
//!   evidence, and cause; panics are caught at the launch boundary
//! - **Deterministic testing**: the [`runtime`] scheduler drives
//!   everything on a virtual clock
//!
//! # Module Structure
//!
//! - [`types`]: outcomes, reasons, virtual timestamps
//! - [`requestor`]: the requestor/receiver contract
//! - [`cancel`]: one-shot cancellation handles
//! - [`runtime`]: cooperative scheduler and timer heap
//! - [`run`]: the shared engine driving all operators
//! - [`combinator`]: the four operators
//! - [`time`]: time-based requestors (delay)
//! - [`error`]: configuration errors
//! - [`test_utils`]: tracing setup for tests

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod cancel;
pub mod combinator;
pub mod error;
pub mod requestor;
pub mod run;
pub mod runtime;
pub mod test_utils;
pub mod time;
pub mod types;

// Re-exports for convenient access to core types
pub use cancel::CancelHandle;
pub use combinator::{
    fallback, parallel, race, sequence, FallbackConfig, ParallelConfig, ParallelResults,
    RaceConfig, SequenceConfig, TimeOption,
};
pub use error::ConfigError;
pub use requestor::{Receiver, Requestor};
pub use run::{
    run, Action, CompletionLatch, Deadline, Directive, MessageMode, RunConfig, TimeoutAction,
};
pub use runtime::{Scheduler, TimerKey};
pub use types::{Evidence, FactoryName, Outcome, PanicPayload, Reason, ReasonKind, Time};
