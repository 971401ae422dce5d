//! Configuration errors.
//!
//! Most of the classic misconfigurations — a wrong-shaped requestor, a
//! non-callable receiver, a negative time limit, an unknown time
//! option — are unrepresentable here: the types rule them out. What
//! remains surfaces synchronously at operator construction, before any
//! receiver could be involved.

use crate::types::FactoryName;
use thiserror::Error;

/// An error detected while constructing a composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A first-success operator was given nothing to run. A race (or
    /// fallback chain) nobody entered has no meaningful outcome.
    #[error("{factory} needs at least one requestor")]
    EmptyRequestorList {
        /// The operator that rejected its input.
        factory: FactoryName,
    },
}
