//! Execution Request and Outcome
//!
//! The request is built fresh for every invocation and consumed by the
//! executor. The outcome always carries response text: when the tool's JSON
//! payload cannot be decoded the raw stdout is kept instead, with zeroed
//! metrics.

use crate::task::TaskType;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Input to one tool invocation
#[derive(Debug)]
pub struct ExecutionRequest {
    /// Identifier used to scope log lines
    pub task_id: String,
    /// Exclusive, freshly created working directory
    pub work_dir: PathBuf,
    pub prompt: String,
    pub task_type: TaskType,
    pub timeout: Duration,
}

impl ExecutionRequest {
    pub fn new(
        work_dir: impl Into<PathBuf>,
        prompt: impl Into<String>,
        task_type: TaskType,
        timeout: Duration,
    ) -> Self {
        Self {
            task_id: format!("task-{}", uuid::Uuid::new_v4()),
            work_dir: work_dir.into(),
            prompt: prompt.into(),
            task_type,
            timeout,
        }
    }

    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = task_id.into();
        self
    }
}

/// A capability the tool tried to use and its profile refused
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionDenial {
    #[serde(default, alias = "tool_name")]
    pub capability: String,

    #[serde(default, alias = "attempted_command")]
    pub attempted_command: Option<String>,

    #[serde(default)]
    pub reason: Option<String>,
}

const MAX_CATEGORY_LEN: usize = 32;

impl PermissionDenial {
    fn unrecognized() -> Self {
        Self {
            capability: String::new(),
            attempted_command: None,
            reason: None,
        }
    }

    /// Capability category: the leading verb of the capability
    ///
    /// This is the only part of a denial that is safe to log. Anything that
    /// is not a short `[A-Za-z0-9_-]` verb is reported as `unknown`.
    pub fn category(&self) -> &str {
        let capability = self.capability.trim_start();
        let end = capability
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
            .unwrap_or(capability.len());
        match &capability[..end] {
            "" => "unknown",
            verb if verb.len() > MAX_CATEGORY_LEN => "unknown",
            verb => verb,
        }
    }
}

/// Decode denial records one by one so a malformed record cannot spoil the
/// whole payload
fn lenient_denials<'de, D>(deserializer: D) -> Result<Option<Vec<PermissionDenial>>, D::Error>
where
    D: Deserializer<'de>,
{
    let records = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?;
    Ok(records.map(|records| {
        records
            .into_iter()
            .map(|record| {
                serde_json::from_value(record).unwrap_or_else(|_| PermissionDenial::unrecognized())
            })
            .collect()
    }))
}

/// Decoded result of a successful invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionOutcome {
    pub response_text: String,
    pub cost_units: f64,
    pub duration_ms: u64,
    pub session_id: String,
    pub permission_denials: Vec<PermissionDenial>,
    /// False when stdout was not a decodable payload and raw text was kept
    pub structured: bool,
}

/// Payload emitted on stdout by the tool in JSON output mode
#[derive(Debug, Deserialize)]
struct ToolPayload {
    result: String,
    #[serde(default)]
    cost_usd: Option<f64>,
    #[serde(default)]
    total_cost_usd: Option<f64>,
    #[serde(default)]
    duration_ms: Option<f64>,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_denials")]
    permission_denials: Option<Vec<PermissionDenial>>,
}

impl ExecutionOutcome {
    /// Decode tool stdout, degrading to raw text on any decode failure
    pub fn from_stdout(stdout: &str) -> Self {
        match serde_json::from_str::<ToolPayload>(stdout) {
            Ok(payload) => Self {
                response_text: payload.result,
                cost_units: payload.total_cost_usd.or(payload.cost_usd).unwrap_or(0.0),
                duration_ms: payload.duration_ms.map(|d| d.max(0.0) as u64).unwrap_or(0),
                session_id: payload.session_id.unwrap_or_default(),
                permission_denials: payload.permission_denials.unwrap_or_default(),
                structured: true,
            },
            Err(e) => {
                tracing::debug!("tool output is not a structured payload: {}", e);
                Self::raw(stdout)
            }
        }
    }

    /// Raw-text fallback with zeroed metrics
    pub fn raw(stdout: &str) -> Self {
        Self {
            response_text: stdout.to_string(),
            cost_units: 0.0,
            duration_ms: 0,
            session_id: String::new(),
            permission_denials: Vec::new(),
            structured: false,
        }
    }

    /// Distinct denied capability categories, in first-seen order
    pub fn denied_categories(&self) -> Vec<&str> {
        let mut categories: Vec<&str> = Vec::new();
        for denial in &self.permission_denials {
            let category = denial.category();
            if !categories.contains(&category) {
                categories.push(category);
            }
        }
        categories
    }
}
