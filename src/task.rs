//! Task Type Catalogue
//!
//! A task type is the category of work handed to the AI tool. It selects the
//! sandbox profile installed for the invocation and the report sections the
//! response must reproduce.
//!
//! The set is closed: adding a task type means adding a variant here, and the
//! compiler then points at every table that needs a new entry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Label prefix used by the workflow engine (e.g. `ai-fix`)
pub const LABEL_PREFIX: &str = "ai-";

/// Error returned when a string does not name a known task type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task type '{0}'")]
pub struct TaskTypeError(pub String);

/// Category of work performed by one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Root-cause investigation of a bug (read-only)
    Investigate,
    /// Impact analysis of a proposed change (read-only)
    Impact,
    /// Approach recommendations (read-only)
    Recommend,
    /// Bug fix that edits the repository
    Fix,
    /// Feature implementation that edits the repository
    Implement,
    /// Review of an open pull request (read-only)
    CodeReview,
    /// Security-focused review of an open pull request (read-only)
    SecurityReview,
}

impl TaskType {
    /// Every task type, in declaration order
    pub const ALL: [TaskType; 7] = [
        TaskType::Investigate,
        TaskType::Impact,
        TaskType::Recommend,
        TaskType::Fix,
        TaskType::Implement,
        TaskType::CodeReview,
        TaskType::SecurityReview,
    ];

    /// Canonical snake_case name, also the sandbox profile file stem
    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::Investigate => "investigate",
            TaskType::Impact => "impact",
            TaskType::Recommend => "recommend",
            TaskType::Fix => "fix",
            TaskType::Implement => "implement",
            TaskType::CodeReview => "code_review",
            TaskType::SecurityReview => "security_review",
        }
    }

    /// Workflow label that triggers this task type
    pub fn label(self) -> String {
        format!("{}{}", LABEL_PREFIX, self.as_str().replace('_', "-"))
    }

    /// File name of the sandbox profile for this task type
    pub fn profile_file_name(self) -> String {
        format!("{}.json", self.as_str())
    }

    /// Whether the tool is expected to modify the working tree
    pub fn mutates_code(self) -> bool {
        matches!(self, TaskType::Fix | TaskType::Implement)
    }

    /// Report sections a well-formed response for this task type contains
    ///
    /// Markers are matched case-insensitively and in any order. An empty
    /// slice means the task type has no structural requirement.
    pub fn required_sections(self) -> &'static [&'static str] {
        match self {
            TaskType::Investigate => &["SUMMARY", "ROOT CAUSE"],
            TaskType::Impact => &[],
            TaskType::Recommend => &["RECOMMENDATION"],
            TaskType::Fix => &["SUMMARY", "CHANGES"],
            TaskType::Implement => &["SUMMARY", "CHANGES"],
            TaskType::CodeReview => &["SUMMARY", "FINDINGS"],
            TaskType::SecurityReview => &["FINDINGS"],
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = TaskTypeError;

    /// Accepts canonical names (`code_review`), dashed names (`code-review`)
    /// and workflow labels (`ai-code-review`), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        let normalized = normalized
            .strip_prefix(LABEL_PREFIX)
            .unwrap_or(normalized.as_str())
            .replace('-', "_");

        TaskType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| TaskTypeError(s.to_string()))
    }
}
