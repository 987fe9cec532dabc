// taskguard - Main Entry Point
//
// Command-line front end for the secure execution pipeline:
// - run: scan, execute and validate one task
// - validate: check a response against the output rules
// - scan: check task input for sensitive topics
// - profile: inspect a task type's sandbox profile
//
// Exit status: 0 allowed/clean, 1 blocked/flagged, 2 execution failure.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use taskguard::config::Config;
use taskguard::metrics;
use taskguard::pipeline::{ExecutionPipeline, PipelineDecision};
use taskguard::prompt::{self, PromptTemplate};
use taskguard::task::TaskType;
use taskguard::tools::{ExecutionRequest, ProfileSource, ToolExecutor};
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

const EXIT_BLOCKED: u8 = 1;
const EXIT_FAILED: u8 = 2;

/// taskguard: security gate for AI coding agents
#[derive(Parser, Debug)]
#[command(name = "taskguard")]
#[command(version)]
#[command(about = "Sandboxed execution and output validation for AI coding agents", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (default: ~/.config/taskguard/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print Prometheus metrics to stderr before exiting
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one task through the full pipeline
    Run {
        /// Task type (e.g. fix, ai-code-review)
        #[arg(short, long)]
        task_type: TaskType,

        /// Freshly prepared working directory (repository checkout)
        #[arg(short, long)]
        work_dir: PathBuf,

        /// Prompt text
        #[arg(short, long, conflicts_with = "template", required_unless_present = "template")]
        prompt: Option<String>,

        /// Prompt template file with {key} placeholders
        #[arg(long)]
        template: Option<PathBuf>,

        /// Template variable as key=value (repeatable)
        #[arg(long = "var", requires = "template")]
        vars: Vec<String>,

        /// Raw task input to scan (issue title and description)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Identifier used in log lines
        #[arg(long)]
        task_id: Option<String>,

        /// Timeout in seconds (overrides config)
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Validate a response (file or stdin) and print the verdict
    Validate {
        /// Task type the response was produced for
        #[arg(short, long)]
        task_type: TaskType,

        /// Response file (stdin when omitted)
        file: Option<PathBuf>,
    },
    /// Scan task input (file or stdin) for sensitive topics
    Scan {
        /// Input file (stdin when omitted)
        file: Option<PathBuf>,
    },
    /// Load and summarize a task type's sandbox profile
    Profile {
        /// Task type
        task_type: TaskType,

        /// Evaluate a capability, e.g. --check Bash "curl example.com"
        #[arg(long, num_args = 2, value_names = ["VERB", "TARGET"])]
        check: Option<Vec<String>>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(EXIT_FAILED)
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let config = match &args.config {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            Config::load_from_path(path)?
        }
        None => Config::load()?,
    };

    init_logging(&config, args.verbose)?;
    metrics::init().context("Failed to register metrics")?;

    let code = match args.command {
        Commands::Run {
            task_type,
            work_dir,
            prompt,
            template,
            vars,
            input,
            task_id,
            timeout,
        } => {
            let prompt = match (prompt, template) {
                (Some(prompt), _) => prompt,
                (None, Some(template)) => render_template(&template, &vars)?,
                (None, None) => anyhow::bail!("Either --prompt or --template is required"),
            };
            let input = input.as_deref().map(read_input).transpose()?;
            let timeout = timeout
                .map(Duration::from_secs)
                .unwrap_or_else(|| config.timeout());

            let mut request = ExecutionRequest::new(work_dir, prompt, task_type, timeout);
            if let Some(task_id) = task_id {
                request = request.with_task_id(task_id);
            }
            run_task(&config, request, input.as_deref()).await?
        }
        Commands::Validate { task_type, file } => {
            let response = read_input_or_stdin(file.as_deref())?;
            let validator = config.build_validator()?;
            let verdict = validator.validate(&response, task_type);
            println!("{}", serde_json::to_string(&verdict)?);
            if verdict.is_allowed() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(EXIT_BLOCKED)
            }
        }
        Commands::Scan { file } => {
            let text = read_input_or_stdin(file.as_deref())?;
            let scanner = config
                .build_scanner()?
                .context("Input scanning is disabled in the configuration")?;
            let verdict = scanner.scan(&text);
            println!("{}", serde_json::to_string(&verdict)?);
            if verdict.flagged {
                ExitCode::from(EXIT_BLOCKED)
            } else {
                ExitCode::SUCCESS
            }
        }
        Commands::Profile { task_type, check } => show_profile(&config, task_type, check)?,
    };

    if args.metrics {
        eprint!("{}", metrics::gather_metrics()?);
    }
    Ok(code)
}

/// Initialize tracing; logs go to stderr so stdout stays machine-readable
fn init_logging(config: &Config, verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { config.log_level()? };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);

    let result = match config.logging.format.to_lowercase().as_str() {
        "json" => builder.json().try_init(),
        "pretty" => builder.pretty().try_init(),
        _ => builder.compact().try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

async fn run_task(config: &Config, request: ExecutionRequest, input: Option<&str>) -> Result<ExitCode> {
    info!(
        task_id = %request.task_id,
        task_type = %request.task_type,
        "Running task in {}",
        request.work_dir.display()
    );

    let executor = ToolExecutor::new(&config.executor_config(), Arc::new(config.profile_source()))
        .context("Invalid executor command")?;
    let mut pipeline = ExecutionPipeline::new(executor, Arc::new(config.build_validator()?));
    if let Some(scanner) = config.build_scanner()? {
        pipeline = pipeline.with_scanner(Arc::new(scanner));
    }

    let report = pipeline.run(request, input).await;

    println!("{}", report.decision.message());
    eprintln!("{}", serde_json::to_string(&report)?);

    Ok(match report.decision {
        PipelineDecision::Allowed { .. } => ExitCode::SUCCESS,
        PipelineDecision::Blocked { .. } => ExitCode::from(EXIT_BLOCKED),
        PipelineDecision::ExecutionFailed { .. } => ExitCode::from(EXIT_FAILED),
    })
}

fn show_profile(config: &Config, task_type: TaskType, check: Option<Vec<String>>) -> Result<ExitCode> {
    let source = config.profile_source();
    let profile = source
        .load(task_type)
        .with_context(|| format!("Failed to load sandbox profile for {}", task_type))?;

    let mut summary = json!({
        "task_type": task_type,
        "path": source.path_for(task_type),
        "sandbox_enabled": profile.sandbox.enabled,
        "allow": profile.permissions.allow,
        "deny": profile.permissions.deny,
    });

    if let Some([verb, target]) = check.as_deref() {
        let decision = profile.permissions.evaluate(verb, target);
        summary["check"] = json!({ "verb": verb, "target": target, "decision": decision });
    }

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(ExitCode::SUCCESS)
}

fn render_template(path: &Path, vars: &[String]) -> Result<String> {
    let source = read_input(path)?;
    let vars = prompt::parse_vars(vars).map_err(|e| anyhow::anyhow!(e))?;
    PromptTemplate::new(source)
        .render(&vars)
        .with_context(|| format!("Failed to render template {}", path.display()))
}

fn read_input(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn read_input_or_stdin(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => read_input(path),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read stdin")?;
            Ok(buffer)
        }
    }
}
