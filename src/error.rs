//! Error types for path resolution, cache refreshes and shell commands.
//!
//! `ShellError` is `Clone` so that every caller joined on the same backend
//! refresh observes the identical outcome.

use std::time::Duration;

/// Library error type.
///
/// Resolution and validation errors never mutate state. Backend errors leave
/// the cached value in place; the caller decides whether stale data is good
/// enough (`cat`) or the failure is fatal (`update`, `set`).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShellError {
    /// Empty or syntactically unusable path
    #[error("Invalid path")]
    InvalidPath,

    /// Path has more segments than `MAX_PATH_DEPTH`
    #[error("Path too deep")]
    PathTooDeep,

    /// No node at this path (or an intermediate segment is a leaf)
    #[error("{0} does not exist or is not accessible")]
    PathNotFound(String),

    /// Tried to enter a leaf as if it were a container
    #[error("{0} is not a directory")]
    NotAContainer(String),

    /// Operation needs a leaf but the path names a container
    #[error("{0} is not an attribute")]
    NotALeaf(String),

    /// Attempted `set` on a read-only node
    #[error("{0} cannot be set. You can see all changeable entries with \"list -s\"")]
    NotSettable(String),

    /// Malformed value for `set`, or the backend rejected it
    #[error("{path} cannot be set: {reason}")]
    Validation {
        /// Target node
        path: String,
        /// Why the value was refused
        reason: String,
    },

    /// Backend call failed
    #[error("backend unavailable for {path}: {reason}")]
    BackendUnavailable {
        /// Node whose refresh or update failed
        path: String,
        /// Backend-provided reason
        reason: String,
    },

    /// Backend call exceeded the configured timeout
    #[error("backend timed out for {path} after {after:?}")]
    BackendTimeout {
        /// Node whose refresh or update timed out
        path: String,
        /// Configured timeout
        after: Duration,
    },

    /// Shell command not recognised
    #[error("Unknown syntax: {0}")]
    UnknownCommand(String),

    /// Wrong number of arguments for a shell command
    #[error("{}", argument_count_message(.expected_min, .expected_max, .received))]
    InvalidArgumentCount {
        /// Minimum expected arguments
        expected_min: usize,
        /// Maximum expected arguments
        expected_max: usize,
        /// Number of arguments received
        received: usize,
    },

    /// Local I/O failed (e.g. `save` could not write its file)
    #[error("I/O error: {0}")]
    Io(String),
}

impl ShellError {
    /// True for errors raised by the backend (as opposed to resolution or validation).
    pub fn is_backend(&self) -> bool {
        matches!(
            self,
            ShellError::BackendUnavailable { .. } | ShellError::BackendTimeout { .. }
        )
    }
}

impl From<std::io::Error> for ShellError {
    fn from(err: std::io::Error) -> Self {
        ShellError::Io(err.to_string())
    }
}

fn argument_count_message(min: &usize, max: &usize, received: &usize) -> String {
    if min == max {
        format!("Expected {} arguments, got {}", min, received)
    } else {
        format!("Expected {}-{} arguments, got {}", min, max, received)
    }
}
