//! Executor Error Types
//!
//! Every failure of one tool invocation falls into one of three classes. All
//! are fatal to the invocation and none is retried at this layer.

use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Result type alias for executor operations
pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Failure of a single tool invocation
///
/// `Display` output is meant for operator logs. Consumers only ever see the
/// [`FailureClass`].
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// Missing or malformed sandbox profile, or the profile could not be installed
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The tool exceeded its wall-clock budget and was terminated
    #[error("AI tool timed out after {0:?}")]
    Timeout(Duration),

    /// The tool could not be run or exited with a nonzero status
    #[error("AI tool execution failed (exit code: {exit_code:?})")]
    ToolExecution {
        exit_code: Option<i32>,
        /// Tail of stderr/stdout. May contain environment leakage: operator logs only.
        diagnostic: String,
    },
}

impl ExecutorError {
    pub fn configuration(message: impl Into<String>) -> Self {
        ExecutorError::Configuration(message.into())
    }

    /// Content-free failure class
    pub fn class(&self) -> FailureClass {
        match self {
            ExecutorError::Configuration(_) => FailureClass::Configuration,
            ExecutorError::Timeout(_) => FailureClass::Timeout,
            ExecutorError::ToolExecution { .. } => FailureClass::ToolError,
        }
    }

    /// Diagnostic output captured from the tool, if any
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            ExecutorError::ToolExecution { diagnostic, .. } => Some(diagnostic),
            _ => None,
        }
    }
}

/// Generic failure class surfaced to the consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    Configuration,
    Timeout,
    ToolError,
}

impl FailureClass {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureClass::Configuration => "configuration",
            FailureClass::Timeout => "timeout",
            FailureClass::ToolError => "tool_error",
        }
    }

    /// Message safe to post downstream
    pub fn user_message(self) -> &'static str {
        match self {
            FailureClass::Configuration => {
                "The AI agent could not be started because its sandbox is not configured. \
                 An operator has been notified."
            }
            FailureClass::Timeout => {
                "The AI agent did not finish within its time limit. \
                 Please review the issue manually."
            }
            FailureClass::ToolError => {
                "The AI agent failed to complete the task. Please review the issue manually."
            }
        }
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
