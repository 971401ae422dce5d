//! Structured failure reasons.
//!
//! Failure in quartet is a value, not an exception. A [`Reason`] records
//! which operator produced it, a typed [`ReasonKind`], a short human
//! excuse, optional typed [`Evidence`] (the offending child index or the
//! configured time limit), and an optional underlying cause. Reasons are
//! transported through receivers inside [`Outcome::Failure`].
//!
//! [`Outcome::Failure`]: super::outcome::Outcome

use core::fmt;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

/// Which composition operator produced a reason.
///
/// Carried only inside reasons, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FactoryName {
    /// The parallel operator.
    Parallel,
    /// The race operator.
    Race,
    /// The sequence operator.
    Sequence,
    /// The fallback operator.
    Fallback,
}

impl fmt::Display for FactoryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parallel => write!(f, "parallel"),
            Self::Race => write!(f, "race"),
            Self::Sequence => write!(f, "sequence"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// The kind of failure a reason describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReasonKind {
    /// A failure reported by a leaf requestor through its receiver.
    User,
    /// A child requestor panicked before invoking its receiver.
    ChildPanic,
    /// A composite's time limit elapsed.
    Timeout,
    /// The composite (or a child) was cancelled.
    Cancelled,
    /// A sibling completed first and won the race.
    RaceLost,
}

impl fmt::Display for ReasonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::ChildPanic => write!(f, "child panic"),
            Self::Timeout => write!(f, "timeout"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::RaceLost => write!(f, "race lost"),
        }
    }
}

/// Typed diagnostic payload attached to a reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evidence {
    /// Index of the offending child in the input list.
    ChildIndex(usize),
    /// The time limit that elapsed.
    TimeLimit(Duration),
}

impl fmt::Display for Evidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChildIndex(index) => write!(f, "child {index}"),
            Self::TimeLimit(limit) => write!(f, "limit {limit:?}"),
        }
    }
}

/// Payload from a caught child panic.
///
/// Wraps the panic value for safe transport as a reason's cause.
#[derive(Debug, Clone)]
pub struct PanicPayload {
    message: String,
}

impl PanicPayload {
    /// Creates a payload with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Extracts a message from a payload caught with `catch_unwind`.
    ///
    /// String and `&str` panics keep their message; anything else is
    /// recorded as opaque.
    #[must_use]
    pub fn from_any(payload: Box<dyn Any + Send>) -> Self {
        let message = match payload.downcast::<String>() {
            Ok(s) => *s,
            Err(payload) => match payload.downcast::<&'static str>() {
                Ok(s) => (*s).to_string(),
                Err(_) => String::from("opaque panic payload"),
            },
        };
        Self { message }
    }

    /// Returns the panic message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for PanicPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "panic: {}", self.message)
    }
}

impl std::error::Error for PanicPayload {}

/// A structured description of why something failed.
#[derive(Debug, Clone)]
pub struct Reason {
    kind: ReasonKind,
    factory: Option<FactoryName>,
    excuse: String,
    evidence: Option<Evidence>,
    cause: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Reason {
    /// Creates a user failure reason with the given excuse.
    ///
    /// This is the constructor leaf requestors use to report their own
    /// failures; it carries no factory tag.
    #[must_use]
    pub fn new(excuse: impl Into<String>) -> Self {
        Self {
            kind: ReasonKind::User,
            factory: None,
            excuse: excuse.into(),
            evidence: None,
            cause: None,
        }
    }

    /// Creates a timeout reason for an operator's elapsed time limit.
    #[must_use]
    pub fn timeout(factory: FactoryName, limit: Duration) -> Self {
        Self {
            kind: ReasonKind::Timeout,
            factory: Some(factory),
            excuse: String::from("time limit elapsed"),
            evidence: Some(Evidence::TimeLimit(limit)),
            cause: None,
        }
    }

    /// Creates a reason for a child that panicked during launch.
    #[must_use]
    pub fn child_panic(factory: FactoryName, index: usize, payload: PanicPayload) -> Self {
        Self {
            kind: ReasonKind::ChildPanic,
            factory: Some(factory),
            excuse: String::from("requestor panicked"),
            evidence: Some(Evidence::ChildIndex(index)),
            cause: Some(Arc::new(payload)),
        }
    }

    /// Creates the reason delivered to the losing siblings of a race.
    #[must_use]
    pub fn race_lost(factory: FactoryName) -> Self {
        Self {
            kind: ReasonKind::RaceLost,
            factory: Some(factory),
            excuse: String::from("a sibling completed first"),
            evidence: None,
            cause: None,
        }
    }

    /// Creates a default cancellation reason tagged with the factory.
    #[must_use]
    pub fn cancelled(factory: FactoryName) -> Self {
        Self {
            kind: ReasonKind::Cancelled,
            factory: Some(factory),
            excuse: String::from("cancelled"),
            evidence: None,
            cause: None,
        }
    }

    /// Attaches evidence to the reason.
    #[must_use]
    pub fn with_evidence(mut self, evidence: Evidence) -> Self {
        self.evidence = Some(evidence);
        self
    }

    /// Attaches an underlying cause to the reason.
    #[must_use]
    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// Returns the kind of this reason.
    #[must_use]
    pub const fn kind(&self) -> ReasonKind {
        self.kind
    }

    /// Returns the operator that produced this reason, if any.
    #[must_use]
    pub const fn factory(&self) -> Option<FactoryName> {
        self.factory
    }

    /// Returns the short human excuse.
    #[must_use]
    pub fn excuse(&self) -> &str {
        &self.excuse
    }

    /// Returns the attached evidence, if any.
    #[must_use]
    pub const fn evidence(&self) -> Option<Evidence> {
        self.evidence
    }

    /// Returns the underlying cause, if any.
    #[must_use]
    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync)> {
        self.cause.as_deref()
    }

    /// Returns true if this reason describes an elapsed time limit.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self.kind, ReasonKind::Timeout)
    }

    /// Returns true if this reason describes a cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self.kind, ReasonKind::Cancelled)
    }

    /// Returns true if this reason describes a lost race.
    #[must_use]
    pub const fn is_race_lost(&self) -> bool {
        matches!(self.kind, ReasonKind::RaceLost)
    }

    /// Returns true if this reason wraps a caught child panic.
    #[must_use]
    pub const fn is_child_panic(&self) -> bool {
        matches!(self.kind, ReasonKind::ChildPanic)
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(factory) = self.factory {
            write!(f, "{factory}: ")?;
        }
        write!(f, "{}", self.excuse)?;
        if let Some(evidence) = self.evidence {
            write!(f, " ({evidence})")?;
        }
        Ok(())
    }
}

impl std::error::Error for Reason {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.as_ref().map(|e| e.as_ref() as _)
    }
}
