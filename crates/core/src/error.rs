//! # Error Types
//!
//! The observer protocol has exactly one recoverable failure: asking a
//! container to give back an observer it does not hold. Everything else
//! (an observer reporting `false` from a callback) is advisory and never
//! surfaces as an error.

use thiserror::Error;

use crate::observer::ObserverId;

/// Errors raised by [`crate::Observable`] operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ObserverError {
    /// The identity is not attached to this container, either because it
    /// was already detached or because it belongs to another subject.
    #[error("Observer {id} is not attached to this subject")]
    NotFound { id: ObserverId },
}
