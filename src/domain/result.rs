//! Task outcome types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Severity of a finished task's outcome.
///
/// Serialized with the exact variant names (`"Ok"`, `"Warning"`, `"Error"`,
/// `"Cancel"`), which is what the IDE client switches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// The operation succeeded.
    Ok,
    /// The operation succeeded with warnings.
    Warning,
    /// The operation failed.
    Error,
    /// The operation was cancelled before it finished.
    Cancel,
}

impl Severity {
    /// Returns `true` for [`Severity::Ok`] and [`Severity::Warning`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Ok | Self::Warning)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "Ok"),
            Self::Warning => write!(f, "Warning"),
            Self::Error => write!(f, "Error"),
            Self::Cancel => write!(f, "Cancel"),
        }
    }
}

/// The outcome of a finished task.
///
/// Set exactly once, by [`TaskService::complete`](crate::service::TaskService::complete).
/// `http_code` is advisory: it is the status the REST layer should answer
/// with when a client fetches the task's result.
///
/// # Examples
///
/// ```
/// use orion_tasks::{Severity, TaskResult};
///
/// let ok = TaskResult::ok();
/// assert_eq!(ok.severity, Severity::Ok);
/// assert_eq!(ok.http_code, 200);
///
/// let failed = TaskResult::error(500, "Clone failed", "remote hung up unexpectedly");
/// assert_eq!(failed.severity, Severity::Error);
/// assert_eq!(failed.detailed_message, "remote hung up unexpectedly");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskResult {
    /// Outcome severity.
    pub severity: Severity,
    /// Advisory HTTP status code.
    pub http_code: u16,
    /// Short, user-facing message.
    pub message: String,
    /// Longer diagnostic text (stack trace, git output, ...).
    pub detailed_message: String,
}

impl TaskResult {
    /// Creates a result from all of its parts.
    pub fn new(
        severity: Severity,
        http_code: u16,
        message: impl Into<String>,
        detailed_message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            http_code,
            message: message.into(),
            detailed_message: detailed_message.into(),
        }
    }

    /// A plain success with status 200 and message `"OK"`.
    pub fn ok() -> Self {
        Self::new(Severity::Ok, 200, "OK", "")
    }

    /// A success that carries a warning message.
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, 200, message, "")
    }

    /// A failure with the given advisory status code.
    pub fn error(
        http_code: u16,
        message: impl Into<String>,
        detailed_message: impl Into<String>,
    ) -> Self {
        Self::new(Severity::Error, http_code, message, detailed_message)
    }

    /// A cancellation.
    pub fn cancelled() -> Self {
        Self::new(Severity::Cancel, 200, "Cancelled", "")
    }
}
