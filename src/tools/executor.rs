//! Sandboxed Tool Executor
//!
//! Runs the external AI tool against a working directory under the task's
//! sandbox profile, bounded by a wall-clock timeout, and decodes its JSON
//! output.
//!
//! One invocation:
//! 1. Resolve the sandbox profile for the task type (missing → configuration error)
//! 2. Install it into the working directory's local override location
//! 3. Spawn the tool with an explicit argument vector, cwd = working directory
//! 4. Wait under the timeout; on expiry kill the child and fail
//! 5. Nonzero exit → tool execution error with a diagnostic tail
//! 6. Decode stdout, falling back to raw text
//! 7. Log permission denials by category only

use super::command::{CommandValidationError, ToolCommand};
use super::error::{ExecutorError, ExecutorResult};
use super::outcome::{ExecutionOutcome, ExecutionRequest};
use super::sandbox::{LocalSettingsInstaller, ProfileInstaller, ProfileSource};
use super::timeout::ExecutionTimeout;
use crate::metrics;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command as TokioCommand;
use tracing::{debug, info, warn};

/// Default tool program
pub const DEFAULT_TOOL_COMMAND: &str = "claude";

/// Maximum diagnostic tail kept from a failed run (4KB)
pub const DEFAULT_MAX_DIAGNOSTIC_BYTES: usize = 4096;

/// Anything that can run one tool invocation
///
/// The pipeline depends on this trait rather than on [`ToolExecutor`] so the
/// coordinator can be exercised without spawning processes.
#[allow(async_fn_in_trait)]
pub trait ToolRunner: Send + Sync {
    async fn execute(&self, request: ExecutionRequest) -> ExecutorResult<ExecutionOutcome>;
}

/// Configuration for tool execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Tool program (bare name resolved via PATH, or a path)
    pub command: String,

    /// Extra arguments placed before the prompt
    pub args: Vec<String>,

    /// Bytes of stderr/stdout kept for operator diagnostics
    pub max_diagnostic_bytes: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_TOOL_COMMAND.to_string(),
            args: Vec::new(),
            max_diagnostic_bytes: DEFAULT_MAX_DIAGNOSTIC_BYTES,
        }
    }
}

/// Tool executor for sandboxed subprocess execution
///
/// # Security
///
/// - The tool is spawned with `tokio::process::Command`, never through a shell
/// - The prompt is a single argv element
/// - The child is `kill_on_drop`, and killed explicitly on timeout
/// - A missing sandbox profile aborts before anything is spawned
pub struct ToolExecutor {
    command: ToolCommand,
    profiles: Arc<dyn ProfileSource>,
    installer: Arc<dyn ProfileInstaller>,
    max_diagnostic_bytes: usize,
}

impl ToolExecutor {
    /// Create an executor that installs profiles with [`LocalSettingsInstaller`]
    pub fn new(
        config: &ExecutorConfig,
        profiles: Arc<dyn ProfileSource>,
    ) -> Result<Self, CommandValidationError> {
        Ok(Self {
            command: ToolCommand::new(&config.command, &config.args)?,
            profiles,
            installer: Arc::new(LocalSettingsInstaller),
            max_diagnostic_bytes: config.max_diagnostic_bytes,
        })
    }

    /// Replace the profile installer
    pub fn with_installer(mut self, installer: Arc<dyn ProfileInstaller>) -> Self {
        self.installer = installer;
        self
    }

    pub fn command(&self) -> &ToolCommand {
        &self.command
    }

    async fn run(&self, request: ExecutionRequest) -> ExecutorResult<ExecutionOutcome> {
        let ExecutionRequest {
            task_id,
            work_dir,
            prompt,
            task_type,
            timeout,
        } = request;

        info!(
            task_id = %task_id,
            task_type = %task_type,
            "Executing AI tool (timeout: {:?})",
            timeout
        );

        let profile = self.profiles.load(task_type)?;
        let installed = self.installer.install(&work_dir, &profile)?;
        debug!(task_id = %task_id, "Sandbox profile installed at {}", installed.display());

        let argv = self.command.argv(&prompt);
        let mut process = TokioCommand::new(&argv[0]);
        process
            .args(&argv[1..])
            .current_dir(&work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let start = Instant::now();
        let mut child = process.spawn().map_err(|e| ExecutorError::ToolExecution {
            exit_code: None,
            diagnostic: format!("failed to spawn {}: {}", self.command.program(), e),
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let completion = async {
            tokio::join!(child.wait(), read_stream(stdout), read_stream(stderr))
        };

        let finished = ExecutionTimeout::new(timeout).run(completion).await;
        let (status, stdout, stderr) = match finished {
            Ok(finished) => finished,
            Err(err) => {
                warn!(task_id = %task_id, "AI tool timed out after {:?}, terminating", timeout);
                if let Err(e) = child.kill().await {
                    warn!(task_id = %task_id, "Failed to kill timed-out AI tool: {}", e);
                }
                return Err(err);
            }
        };

        let elapsed = start.elapsed();
        let status = status.map_err(|e| ExecutorError::ToolExecution {
            exit_code: None,
            diagnostic: format!("failed to wait for AI tool: {}", e),
        })?;

        if !status.success() {
            return Err(ExecutorError::ToolExecution {
                exit_code: status.code(),
                diagnostic: diagnostic_tail(&stderr, &stdout, self.max_diagnostic_bytes),
            });
        }

        let outcome = ExecutionOutcome::from_stdout(&String::from_utf8_lossy(&stdout));
        if !outcome.structured {
            warn!(task_id = %task_id, "AI tool output was not structured JSON, using raw text");
        }

        if !outcome.permission_denials.is_empty() {
            let categories = outcome.denied_categories();
            warn!(
                task_id = %task_id,
                task_type = %task_type,
                denied = ?categories,
                count = outcome.permission_denials.len(),
                "AI tool attempted capabilities denied by its sandbox profile"
            );
            for category in &categories {
                metrics::record_permission_denial(task_type, category);
            }
        }

        info!(
            task_id = %task_id,
            "AI tool completed in {:.1}s (cost: {:.4})",
            elapsed.as_secs_f64(),
            outcome.cost_units
        );
        Ok(outcome)
    }
}

impl ToolRunner for ToolExecutor {
    async fn execute(&self, request: ExecutionRequest) -> ExecutorResult<ExecutionOutcome> {
        self.run(request).await
    }
}

/// Read a child stream to the end; a read error yields what was read so far
async fn read_stream<R: AsyncRead + Unpin>(stream: Option<R>) -> Vec<u8> {
    let mut buffer = Vec::new();
    if let Some(mut stream) = stream {
        if let Err(e) = stream.read_to_end(&mut buffer).await {
            debug!("Error reading AI tool output: {}", e);
        }
    }
    buffer
}

/// Bounded tail of stderr (or stdout when stderr is blank)
fn diagnostic_tail(stderr: &[u8], stdout: &[u8], max_bytes: usize) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    let stdout = String::from_utf8_lossy(stdout);
    let text = [stderr.trim(), stdout.trim()]
        .into_iter()
        .find(|s| !s.is_empty())
        .unwrap_or("Unknown error");

    if text.len() <= max_bytes {
        return text.to_string();
    }

    let mut start = text.len() - max_bytes;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &text[start..])
}
