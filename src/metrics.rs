// Prometheus metrics for the execution pipeline
//
// Rendered by `taskguard --metrics` in text exposition format:
// - Pipeline decisions (counter, by task type and outcome)
// - Block reasons (counter)
// - Execution failures (counter, by failure class)
// - Permission denials (counter, by capability category)
// - Input scan flags (counter, by category)
// - Tool execution duration (histogram)
// - Tool cost units (counter)

use crate::task::TaskType;
use crate::tools::FailureClass;
use crate::validation::BlockReason;
use lazy_static::lazy_static;
use prometheus::{CounterVec, Encoder, HistogramVec, IntCounterVec, Registry, TextEncoder};
use std::sync::Arc;
use std::time::Duration;

lazy_static! {
    pub static ref REGISTRY: Arc<Registry> = Arc::new(Registry::new());

    // Pipeline metrics
    pub static ref PIPELINE_DECISIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("pipeline_decisions_total", "Final pipeline decisions"),
        &["task_type", "outcome"]
    ).expect("Failed to create pipeline decisions metric");

    pub static ref BLOCKED_RESPONSES_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("blocked_responses_total", "Responses blocked by output validation"),
        &["reason"]
    ).expect("Failed to create blocked responses metric");

    pub static ref EXECUTION_FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("execution_failures_total", "Tool invocations that failed"),
        &["class"]
    ).expect("Failed to create execution failures metric");

    pub static ref INPUT_SCAN_FLAGS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("input_scan_flags_total", "Task inputs flagged by the input scanner"),
        &["category"]
    ).expect("Failed to create input scan flags metric");

    // Tool metrics
    pub static ref PERMISSION_DENIALS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("permission_denials_total", "Capabilities denied by sandbox profiles"),
        &["task_type", "capability"]
    ).expect("Failed to create permission denials metric");

    pub static ref EXECUTION_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        prometheus::HistogramOpts::new("execution_duration_seconds", "AI tool execution duration in seconds")
            .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        &["task_type"]
    ).expect("Failed to create execution duration metric");

    pub static ref EXECUTION_COST_UNITS_TOTAL: CounterVec = CounterVec::new(
        prometheus::Opts::new("execution_cost_units_total", "Cost units reported by the AI tool"),
        &["task_type"]
    ).expect("Failed to create execution cost metric");
}

/// Initialize metrics registry - call once at startup
///
/// Registering twice is not an error.
pub fn init() -> prometheus::Result<()> {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(PIPELINE_DECISIONS_TOTAL.clone()),
        Box::new(BLOCKED_RESPONSES_TOTAL.clone()),
        Box::new(EXECUTION_FAILURES_TOTAL.clone()),
        Box::new(INPUT_SCAN_FLAGS_TOTAL.clone()),
        Box::new(PERMISSION_DENIALS_TOTAL.clone()),
        Box::new(EXECUTION_DURATION_SECONDS.clone()),
        Box::new(EXECUTION_COST_UNITS_TOTAL.clone()),
    ];

    for collector in collectors {
        match REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

pub fn record_decision(task_type: TaskType, outcome: &str) {
    PIPELINE_DECISIONS_TOTAL
        .with_label_values(&[task_type.as_str(), outcome])
        .inc();
}

pub fn record_block(reason: BlockReason) {
    BLOCKED_RESPONSES_TOTAL
        .with_label_values(&[reason.as_str()])
        .inc();
}

pub fn record_failure(class: FailureClass) {
    EXECUTION_FAILURES_TOTAL
        .with_label_values(&[class.as_str()])
        .inc();
}

pub fn record_scan_flag(category: &str) {
    INPUT_SCAN_FLAGS_TOTAL.with_label_values(&[category]).inc();
}

pub fn record_permission_denial(task_type: TaskType, capability: &str) {
    PERMISSION_DENIALS_TOTAL
        .with_label_values(&[task_type.as_str(), capability])
        .inc();
}

pub fn record_execution(task_type: TaskType, elapsed: Duration, cost_units: f64) {
    EXECUTION_DURATION_SECONDS
        .with_label_values(&[task_type.as_str()])
        .observe(elapsed.as_secs_f64());
    if cost_units > 0.0 {
        EXECUTION_COST_UNITS_TOTAL
            .with_label_values(&[task_type.as_str()])
            .inc_by(cost_units);
    }
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in metrics: {}", e))
}
