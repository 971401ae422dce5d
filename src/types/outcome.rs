//! Two-valued outcome type for requestor completions.
//!
//! An [`Outcome`] is either `Success(value)` or `Failure(reason)` — the
//! two shapes are structurally distinct, so an absent value can never be
//! confused with a present value whose contents happen to be empty.
//! Cancellations, timeouts, and caught panics all arrive as `Failure`
//! with the distinction preserved in [`ReasonKind`].
//!
//! [`ReasonKind`]: super::reason::ReasonKind

use super::reason::Reason;
use core::fmt;

/// The result of one unit of work: a value or a reason.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    /// The work succeeded with a value.
    Success(T),
    /// The work failed; the reason says why.
    Failure(Reason),
}

impl<T> Outcome<T> {
    /// Returns true if this outcome is a success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns true if this outcome is a failure.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// Returns the success value, discarding a failure.
    #[must_use]
    pub fn success(self) -> Option<T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure(_) => None,
        }
    }

    /// Returns a reference to the success value, if any.
    #[must_use]
    pub const fn value(&self) -> Option<&T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure(_) => None,
        }
    }

    /// Returns a reference to the failure reason, if any.
    #[must_use]
    pub const fn reason(&self) -> Option<&Reason> {
        match self {
            Self::Success(_) => None,
            Self::Failure(reason) => Some(reason),
        }
    }

    /// Maps the success value, leaving failures untouched.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Self::Success(value) => Outcome::Success(f(value)),
            Self::Failure(reason) => Outcome::Failure(reason),
        }
    }

    /// Converts this outcome to a standard `Result`.
    pub fn into_result(self) -> Result<T, Reason> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(reason) => Err(reason),
        }
    }

    /// Returns the success value or panics.
    ///
    /// # Panics
    ///
    /// Panics if the outcome is a failure.
    #[track_caller]
    pub fn unwrap(self) -> T {
        match self {
            Self::Success(value) => value,
            Self::Failure(reason) => {
                panic!("called `Outcome::unwrap()` on a `Failure`: {reason}")
            }
        }
    }
}

impl<T> From<Result<T, Reason>> for Outcome<T> {
    fn from(result: Result<T, Reason>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(reason) => Self::Failure(reason),
        }
    }
}

impl<T: fmt::Display> fmt::Display for Outcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success(value) => write!(f, "success: {value}"),
            Self::Failure(reason) => write!(f, "failure: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicates() {
        let ok: Outcome<i32> = Outcome::Success(1);
        let bad: Outcome<i32> = Outcome::Failure(Reason::new("nope"));
        assert!(ok.is_success() && !ok.is_failure());
        assert!(bad.is_failure() && !bad.is_success());
    }

    #[test]
    fn empty_success_is_not_failure() {
        let empty: Outcome<Vec<u8>> = Outcome::Success(Vec::new());
        assert!(empty.is_success());
        assert_eq!(empty.success(), Some(Vec::new()));
    }

    #[test]
    fn map_preserves_failure() {
        let bad: Outcome<i32> = Outcome::Failure(Reason::new("nope"));
        let mapped = bad.map(|v| v * 2);
        assert_eq!(mapped.reason().map(Reason::excuse), Some("nope"));
    }

    #[test]
    fn round_trip_through_result() {
        let ok: Outcome<i32> = Outcome::Success(9);
        assert_eq!(Outcome::from(ok.into_result()).unwrap(), 9);
    }
}
