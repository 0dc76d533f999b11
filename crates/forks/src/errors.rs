//! Errors for the `eft-forks` crate.

use alloc::string::String;
use thiserror::Error;

/// A [Result] type alias where the error is [ForkError].
pub type ForkResult<T> = Result<T, ForkError>;

/// An error type for fork lookups.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ForkError {
    /// The name does not match any fork or transition fork.
    #[error("Unknown fork: {0}")]
    UnknownFork(String),
}
