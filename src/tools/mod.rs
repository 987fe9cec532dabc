//! Sandboxed Tool Execution
//!
//! This module runs the external AI tool as an isolated subprocess under a
//! per-task sandbox profile.
//!
//! # Security Features
//!
//! - **List Invocation**: The tool is executed with an explicit argument vector, never through a shell
//! - **Opaque Prompt**: The prompt is passed as exactly one argument
//! - **Sandbox Profiles**: Each task type runs under its own allow/deny capability rules
//! - **Timeout Enforcement**: Every invocation has a wall-clock budget; the child is killed on expiry
//! - **Content-Free Failures**: Consumers see a failure class, never tool output
//!
//! # Architecture
//!
//! The module is organized into:
//! - `command.rs`: Tool program validation and argv construction
//! - `sandbox.rs`: Sandbox profiles, profile sources and installation
//! - `executor.rs`: Subprocess execution with timeout handling
//! - `outcome.rs`: Execution request and decoded outcome
//! - `timeout.rs`: Timeout management
//! - `error.rs`: Failure classes
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use taskguard::task::TaskType;
//! use taskguard::tools::{
//!     DirectoryProfiles, ExecutionRequest, ExecutorConfig, ToolExecutor, ToolRunner,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let profiles = Arc::new(DirectoryProfiles::new("/etc/taskguard/profiles"));
//!     let executor = ToolExecutor::new(&ExecutorConfig::default(), profiles)?;
//!
//!     let request = ExecutionRequest::new(
//!         "/tmp/checkout",
//!         "Investigate the failing build",
//!         TaskType::Investigate,
//!         Duration::from_secs(600),
//!     );
//!     let outcome = executor.execute(request).await?;
//!     println!("{}", outcome.response_text);
//!
//!     Ok(())
//! }
//! ```

mod command;
mod error;
mod executor;
mod outcome;
mod sandbox;
mod timeout;

pub use command::{CommandValidationError, ToolCommand};
pub use error::{ExecutorError, ExecutorResult, FailureClass};
pub use executor::{
    ExecutorConfig, ToolExecutor, ToolRunner, DEFAULT_MAX_DIAGNOSTIC_BYTES, DEFAULT_TOOL_COMMAND,
};
pub use outcome::{ExecutionOutcome, ExecutionRequest, PermissionDenial};
pub use sandbox::{
    CapabilityGrant, DirectoryProfiles, LocalSettingsInstaller, PermissionDecision,
    PermissionRules, ProfileInstaller, ProfileSource, SandboxProfile, SandboxSettings,
    StaticProfiles, LOCAL_SETTINGS_FILE, SETTINGS_DIR,
};
pub use timeout::{ExecutionTimeout, DEFAULT_TIMEOUT_SECS};
