//! Fallback composition: try in order until one succeeds.
//!
//! The first-success engine with throttle 1: children run strictly in
//! input order, the first success wins, and later children are never
//! started. Unlike sequence, fallback broadcasts — every child gets
//! the same initial message. The composite fails only when every
//! child has failed.

use crate::error::ConfigError;
use crate::requestor::Requestor;
use crate::runtime::Scheduler;
use crate::types::FactoryName;
use std::time::Duration;

use super::race::first_success;

/// Configuration for [`fallback`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackConfig {
    /// Composite time limit covering the whole chain; `None` (or zero)
    /// means no limit.
    pub time_limit: Option<Duration>,
}

impl FallbackConfig {
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

/// Composes requestors into an ordered fallback chain.
///
/// An empty list is a configuration error; a fallback of one behaves
/// as that requestor.
pub fn fallback<T: Clone + Send + 'static>(
    scheduler: &Scheduler,
    requestors: Vec<Requestor<T>>,
    config: FallbackConfig,
) -> Result<Requestor<T>, ConfigError> {
    first_success(
        scheduler,
        requestors,
        config.time_limit,
        1,
        FactoryName::Fallback,
    )
}
