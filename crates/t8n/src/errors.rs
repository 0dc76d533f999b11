//! Errors of the transition tool adapter.

use std::path::PathBuf;
use thiserror::Error;

/// A [Result] type alias where the error is [T8nError].
pub type T8nResult<T> = Result<T, T8nError>;

/// An error invoking the transition tool.
#[derive(Error, Debug)]
pub enum T8nError {
    /// The tool could not be started.
    #[error("Failed to spawn transition tool {path}: {source}")]
    Spawn {
        /// The tool binary.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The tool exited with a failure status.
    #[error("Transition tool failed with exit code {code:?}: {stderr}")]
    Process {
        /// The exit code, if the process was not killed by a signal.
        code: Option<i32>,
        /// The standard error of the process.
        stderr: String,
    },
    /// The tool exited successfully but its output could not be parsed.
    #[error("Malformed transition tool output: {source}\n{stdout}")]
    MalformedOutput {
        /// The parse error.
        #[source]
        source: serde_json::Error,
        /// The leading part of the standard output of the process.
        stdout: String,
    },
    /// A value could not be serialized or parsed.
    #[error("Transition tool JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// The tool printed something other than the expected value.
    #[error("Unexpected transition tool output: {0:?}")]
    UnexpectedOutput(String),
    /// Reading or writing the scratch files failed.
    #[error("Transition tool I/O error: {0}")]
    Io(#[from] std::io::Error),
}
