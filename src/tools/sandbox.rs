//! Sandbox Profiles
//!
//! A sandbox profile is the declarative permission document the AI tool runs
//! under for one task type. Profiles live as `<task_type>.json` files and are
//! read from disk on every invocation, so an edited profile takes effect on
//! the next task and a deleted one fails closed.
//!
//! Installation copies the profile into the working directory's local
//! override location (`.claude/settings.local.json`). The tool resolves
//! settings with precedence local override > repository-shared > user-global,
//! and a deny rule always wins over an allow rule.
//!
//! # Profile format
//!
//! ```json
//! {
//!   "sandbox": { "enabled": true },
//!   "permissions": {
//!     "allow": ["Read(./**)", "Bash(git diff:*)"],
//!     "deny": ["WebFetch", "Bash(curl:*)", "Read(./.env)"]
//!   }
//! }
//! ```

use super::error::{ExecutorError, ExecutorResult};
use crate::task::TaskType;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory inside the working tree holding tool settings
pub const SETTINGS_DIR: &str = ".claude";

/// Local override file name (highest precedence)
pub const LOCAL_SETTINGS_FILE: &str = "settings.local.json";

/// Sandbox enablement block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SandboxSettings {
    #[serde(default)]
    pub enabled: bool,

    /// Tool-specific keys, preserved verbatim on install
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Ordered allow/deny capability grants
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PermissionRules {
    #[serde(default)]
    pub allow: Vec<String>,

    #[serde(default)]
    pub deny: Vec<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Outcome of evaluating one capability request against a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionDecision {
    Allowed,
    Denied,
    /// No rule matched; the tool falls back to asking, which headless mode refuses
    Unlisted,
}

impl PermissionRules {
    /// Evaluate a capability request; deny rules override allow rules
    pub fn evaluate(&self, verb: &str, target: &str) -> PermissionDecision {
        let matches = |rule: &String| {
            CapabilityGrant::parse(rule)
                .map(|grant| grant.matches(verb, target))
                .unwrap_or(false)
        };

        if self.deny.iter().any(matches) {
            PermissionDecision::Denied
        } else if self.allow.iter().any(matches) {
            PermissionDecision::Allowed
        } else {
            PermissionDecision::Unlisted
        }
    }
}

/// Named, immutable permission document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxProfile {
    #[serde(default)]
    pub sandbox: SandboxSettings,

    pub permissions: PermissionRules,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SandboxProfile {
    /// Parse and check a profile document
    pub fn from_json(source: &str) -> ExecutorResult<Self> {
        let profile: SandboxProfile = serde_json::from_str(source)
            .map_err(|e| ExecutorError::configuration(format!("malformed sandbox profile: {}", e)))?;
        profile.check_rules()?;
        Ok(profile)
    }

    /// Every allow/deny entry must be `Verb` or `Verb(pattern)`
    pub fn check_rules(&self) -> ExecutorResult<()> {
        for rule in self.permissions.allow.iter().chain(&self.permissions.deny) {
            CapabilityGrant::parse(rule).ok_or_else(|| {
                ExecutorError::configuration(format!("invalid permission rule '{}'", rule))
            })?;
        }
        Ok(())
    }

    pub fn to_json(&self) -> ExecutorResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ExecutorError::configuration(format!("cannot serialize profile: {}", e)))
    }
}

/// A parsed `Verb(pattern)` rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityGrant<'a> {
    pub verb: &'a str,
    pub pattern: Option<&'a str>,
}

impl<'a> CapabilityGrant<'a> {
    pub fn parse(rule: &'a str) -> Option<Self> {
        let rule = rule.trim();
        let (verb, pattern) = match rule.find('(') {
            Some(open) => {
                let inner = rule[open + 1..].strip_suffix(')')?;
                (&rule[..open], Some(inner))
            }
            None => (rule, None),
        };

        let valid_verb = !verb.is_empty()
            && verb
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid_verb {
            return None;
        }

        Some(Self { verb, pattern })
    }

    /// Whether this grant covers `verb` applied to `target`
    pub fn matches(&self, verb: &str, target: &str) -> bool {
        if self.verb != verb {
            return false;
        }
        match self.pattern {
            None => true,
            Some(pattern) => match pattern.strip_suffix(":*") {
                Some(prefix) => target.starts_with(prefix),
                None => glob_match(pattern, target),
            },
        }
    }
}

/// Minimal glob: `*` matches any run of characters (including `/`)
fn glob_match(pattern: &str, target: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = target.chars().collect();
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut resume = 0usize;

    while ti < t.len() {
        if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            pi += 1;
            resume = ti;
        } else if pi < p.len() && p[pi] == t[ti] {
            pi += 1;
            ti += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            resume += 1;
            ti = resume;
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}

/// Resolves the profile for a task type
pub trait ProfileSource: Send + Sync {
    /// Load the profile. Absence is a configuration error, never a permissive default.
    fn load(&self, task_type: TaskType) -> ExecutorResult<SandboxProfile>;
}

/// Profiles stored as `<dir>/<task_type>.json`, re-read on every load
#[derive(Debug, Clone)]
pub struct DirectoryProfiles {
    dir: PathBuf,
}

impl DirectoryProfiles {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, task_type: TaskType) -> PathBuf {
        self.dir.join(task_type.profile_file_name())
    }
}

impl ProfileSource for DirectoryProfiles {
    fn load(&self, task_type: TaskType) -> ExecutorResult<SandboxProfile> {
        let path = self.path_for(task_type);
        let source = fs::read_to_string(&path).map_err(|e| {
            ExecutorError::configuration(format!(
                "sandbox profile for '{}' not readable at {}: {}",
                task_type,
                path.display(),
                e
            ))
        })?;
        SandboxProfile::from_json(&source).map_err(|e| match e {
            ExecutorError::Configuration(msg) => {
                ExecutorError::configuration(format!("{} ({})", msg, path.display()))
            }
            other => other,
        })
    }
}

/// In-memory profiles, for embedding and tests
#[derive(Debug, Clone, Default)]
pub struct StaticProfiles {
    profiles: HashMap<TaskType, SandboxProfile>,
}

impl StaticProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(mut self, task_type: TaskType, profile: SandboxProfile) -> Self {
        self.profiles.insert(task_type, profile);
        self
    }
}

impl ProfileSource for StaticProfiles {
    fn load(&self, task_type: TaskType) -> ExecutorResult<SandboxProfile> {
        self.profiles.get(&task_type).cloned().ok_or_else(|| {
            ExecutorError::configuration(format!("no sandbox profile for '{}'", task_type))
        })
    }
}

/// Writes a profile where the tool will pick it up
pub trait ProfileInstaller: Send + Sync {
    /// Install `profile` for a tool run in `work_dir`, returning the written path
    fn install(&self, work_dir: &Path, profile: &SandboxProfile) -> ExecutorResult<PathBuf>;
}

/// Installs into `<work_dir>/.claude/settings.local.json`
///
/// The working directory is exclusive to one invocation, so the write needs
/// no locking.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalSettingsInstaller;

impl ProfileInstaller for LocalSettingsInstaller {
    fn install(&self, work_dir: &Path, profile: &SandboxProfile) -> ExecutorResult<PathBuf> {
        if !work_dir.is_dir() {
            return Err(ExecutorError::configuration(format!(
                "working directory {} does not exist",
                work_dir.display()
            )));
        }

        let settings_dir = work_dir.join(SETTINGS_DIR);
        fs::create_dir_all(&settings_dir).map_err(|e| {
            ExecutorError::configuration(format!(
                "cannot create {}: {}",
                settings_dir.display(),
                e
            ))
        })?;

        let target = settings_dir.join(LOCAL_SETTINGS_FILE);
        fs::write(&target, profile.to_json()?).map_err(|e| {
            ExecutorError::configuration(format!("cannot write {}: {}", target.display(), e))
        })?;

        debug!("Installed sandbox profile to {}", target.display());
        Ok(target)
    }
}
