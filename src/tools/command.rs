//! Tool Command Construction
//!
//! The AI tool is always invoked through an explicit argument vector, never a
//! shell. The operator-configured program and extra arguments are validated
//! once at startup; the prompt is appended as a single opaque argument so its
//! content can never be reinterpreted as shell syntax or as extra flags.

use std::path::Path;

/// Flags the executor appends itself, or that would switch the sandbox off
const RESERVED_FLAGS: &[&str] = &[
    "-p",
    "--print",
    "--output-format",
    "--dangerously-skip-permissions",
    "--allowedTools",
    "--permission-mode",
];

/// Error types for tool command validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandValidationError {
    #[error("tool command is empty")]
    Empty,

    #[error("tool {context} '{value}' contains shell metacharacter '{character}'")]
    ShellMetacharacter {
        context: &'static str,
        value: String,
        character: char,
    },

    #[error("tool command path contains directory traversal: '{0}'")]
    DirectoryTraversal(String),

    #[error("tool argument '{0}' is managed by the executor and cannot be configured")]
    ReservedFlag(String),
}

/// A validated tool program plus its fixed extra arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: String,
    args: Vec<String>,
}

impl ToolCommand {
    /// Validate and build a tool command
    ///
    /// # Example
    ///
    /// ```
    /// use taskguard::tools::ToolCommand;
    ///
    /// let command = ToolCommand::new("claude", &["--model", "sonnet"]).unwrap();
    /// let argv = command.argv("Investigate; rm -rf /");
    /// assert_eq!(argv[0], "claude");
    /// assert_eq!(argv[4], "Investigate; rm -rf /");
    /// ```
    pub fn new<S: AsRef<str>>(program: &str, args: &[S]) -> Result<Self, CommandValidationError> {
        if program.trim().is_empty() {
            return Err(CommandValidationError::Empty);
        }
        check_path(program)?;
        check_shell_metacharacters(program, "command")?;

        for arg in args {
            let arg = arg.as_ref();
            check_shell_metacharacters(arg, "argument")?;
            let flag = arg.split('=').next().unwrap_or(arg);
            if RESERVED_FLAGS.contains(&flag) {
                return Err(CommandValidationError::ReservedFlag(arg.to_string()));
            }
        }

        Ok(Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.as_ref().to_string()).collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Full argument vector for one headless invocation
    ///
    /// `<program> <args…> -p <prompt> --output-format json`
    pub fn argv(&self, prompt: &str) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 5);
        argv.push(self.program.clone());
        argv.extend(self.args.iter().cloned());
        argv.push("-p".to_string());
        argv.push(prompt.to_string());
        argv.push("--output-format".to_string());
        argv.push("json".to_string());
        argv
    }
}

/// Reject `..` components in the program path
fn check_path(command: &str) -> Result<(), CommandValidationError> {
    let traverses = Path::new(command)
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir));
    if traverses {
        return Err(CommandValidationError::DirectoryTraversal(command.to_string()));
    }
    Ok(())
}

/// Check for shell metacharacters that could enable injection
///
/// These characters are dangerous when interpreted by a shell:
/// - ; : Command separator
/// - | : Pipe
/// - & : Background execution
/// - $ : Variable expansion
/// - ` : Command substitution
/// - \n \r : Line separators
/// - ( ) : Subshell
/// - < > : Redirection
fn check_shell_metacharacters(
    input: &str,
    context: &'static str,
) -> Result<(), CommandValidationError> {
    const DANGEROUS: [char; 11] = [';', '|', '&', '$', '`', '\n', '\r', '(', ')', '<', '>'];

    match input.chars().find(|c| DANGEROUS.contains(c)) {
        Some(character) => Err(CommandValidationError::ShellMetacharacter {
            context,
            value: input.to_string(),
            character,
        }),
        None => Ok(()),
    }
}
