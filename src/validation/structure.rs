//! Structural Validator
//!
//! An on-task response reproduces the report skeleton its prompt asks for.
//! A response diverted by injected instructions usually does not, even when
//! it leaks nothing, so missing sections are treated as a block signal.

use crate::task::TaskType;
use std::collections::HashMap;

/// Required section markers per task type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionRequirements {
    markers: HashMap<TaskType, Vec<String>>,
}

impl Default for SectionRequirements {
    /// The built-in table from [`TaskType::required_sections`]
    fn default() -> Self {
        let markers = TaskType::ALL
            .into_iter()
            .map(|t| {
                let sections = t.required_sections().iter().map(|s| s.to_string()).collect();
                (t, sections)
            })
            .collect();
        Self { markers }
    }
}

impl SectionRequirements {
    /// A table with no requirements at all
    pub fn empty() -> Self {
        Self {
            markers: HashMap::new(),
        }
    }

    /// Replace the markers for one task type
    pub fn with_requirement<I, S>(mut self, task_type: TaskType, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.markers
            .insert(task_type, markers.into_iter().map(Into::into).collect());
        self
    }

    /// Markers required for `task_type` (empty when none are configured)
    pub fn for_task(&self, task_type: TaskType) -> &[String] {
        self.markers
            .get(&task_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Checks that every required marker appears somewhere in the response
#[derive(Debug, Clone, Default)]
pub struct StructuralValidator {
    requirements: SectionRequirements,
}

impl StructuralValidator {
    pub fn new(requirements: SectionRequirements) -> Self {
        Self { requirements }
    }

    /// Markers from the task's requirement that do not occur in `text`
    pub fn missing_sections(&self, text: &str, task_type: TaskType) -> Vec<&str> {
        let haystack = text.to_lowercase();
        self.requirements
            .for_task(task_type)
            .iter()
            .filter(|marker| !haystack.contains(&marker.to_lowercase()))
            .map(String::as_str)
            .collect()
    }

    /// Whether all required markers are present
    pub fn is_complete(&self, text: &str, task_type: TaskType) -> bool {
        self.missing_sections(text, task_type).is_empty()
    }
}
