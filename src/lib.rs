//! taskguard Library
//!
//! Security gate between a workflow engine and an untrusted AI coding tool:
//! advisory input scanning, sandboxed tool execution and output validation,
//! coordinated by [`pipeline::ExecutionPipeline`].

pub mod config;
pub mod metrics;
pub mod pipeline;
pub mod prompt;
pub mod scanner;
pub mod task;
pub mod tools;
pub mod validation;
