//! Shell command tool
//!
//! Commands requested by the model pass through [`CommandValidator`] before
//! they reach the host interpreter (`sh -c` on Unix, `cmd /C` on Windows),
//! which runs in the process working directory.
//! Output is stdout followed by stderr; the exit status is not reported.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tokio::process::Command;

use crate::config::{ExecutionMode, TerminalConfig};
use crate::error::{Result, StepwiseError};
use crate::tools::{ToolExecutor, ToolResult};

/// Name the model uses to request a shell command
pub const TOOL_NAME: &str = "run_command";

/// Observation returned when a command prints nothing
pub const NO_OUTPUT_PLACEHOLDER: &str = "Command executed with no output.";

/// Read-only utilities permitted in restricted mode
const ALLOWLIST: &[&str] = &[
    "ls", "cat", "grep", "find", "echo", "printf", "pwd", "whoami", "id", "head", "tail", "wc",
    "sort", "uniq", "diff", "date", "uname", "hostname", "uptime", "df", "du", "file", "stat",
    "which", "basename", "dirname", "realpath", "true",
];

/// Patterns rejected in every mode
const DENYLIST: &[&str] = &[
    // Destructive file operations
    r"rm\s+-rf\s+/\s*$",
    r"rm\s+-rf\s+/\*",
    r"rm\s+-rf\s+~",
    r"rm\s+-rf\s+\$HOME",
    // Disk and filesystem
    r"dd\s+if=/dev/(zero|random|urandom)",
    r"dd\s+of=/dev/sd[a-z]",
    r"mkfs\.",
    r">\s*/dev/[sh]d[a-z]",
    // Fork bombs and unbounded loops
    r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:",
    r"while\s+true.*do.*done",
    r"for\s*\(\(;;",
    // Download and execute
    r"(curl|wget)\s+.*\|\s*(sh|bash|zsh)",
    // Privilege escalation
    r"\bsudo\b",
    r"\bsu\s+",
    r"\bchmod\s+[0-7]*7[0-7]*",
    // Sensitive files
    r"/etc/passwd",
    r"/etc/shadow",
    r"\.ssh\b",
    r"\.gnupg\b",
    r"\.aws/credentials",
];

/// Arguments for `run_command`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunCommandArgs {
    /// Command line handed to the shell
    pub command: String,
}

/// Capability boundary for model-supplied commands
///
/// Restricted mode accepts only allow-listed programs, rejects the options
/// that make them write files, and keeps every path argument inside the
/// working directory.
///
/// # Examples
///
/// ```
/// use stepwise::config::ExecutionMode;
/// use stepwise::tools::CommandValidator;
///
/// let cwd = std::env::current_dir().unwrap();
/// let validator = CommandValidator::new(ExecutionMode::Restricted, cwd);
/// assert!(validator.validate("ls -la").is_ok());
/// assert!(validator.validate("touch notes.txt").is_err());
/// assert!(validator.validate("cat /var/log/syslog").is_err());
/// assert!(validator.validate("rm -rf /").is_err());
/// ```
#[derive(Debug)]
pub struct CommandValidator {
    mode: ExecutionMode,
    working_dir: PathBuf,
    denylist: Vec<Regex>,
    segment_split: Regex,
    token_split: Regex,
}

impl CommandValidator {
    /// Create a validator for the given mode
    ///
    /// # Arguments
    ///
    /// * `mode` - Execution mode
    /// * `working_dir` - Directory commands run in; restricted mode keeps
    ///   path arguments inside it
    pub fn new(mode: ExecutionMode, working_dir: PathBuf) -> Self {
        let denylist = DENYLIST
            .iter()
            .map(|p| Regex::new(p).expect("Invalid regex pattern"))
            .collect();
        let segment_split = Regex::new(r"\|\||&&|[;|&\n]").expect("Invalid regex pattern");
        let token_split = Regex::new(r"[\s|;&<>()]+").expect("Invalid regex pattern");
        let working_dir = working_dir.canonicalize().unwrap_or(working_dir);

        Self {
            mode,
            working_dir,
            denylist,
            segment_split,
            token_split,
        }
    }

    /// Mode this validator enforces
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Directory commands are validated against
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Validate a command against the current mode
    ///
    /// # Errors
    ///
    /// Returns `DangerousCommand` for deny-listed patterns (all modes),
    /// `CommandNotAllowed` for programs or options outside the restricted
    /// allow-list and `PathOutsideWorkingDirectory` for paths that leave the
    /// working directory
    pub fn validate(&self, command: &str) -> std::result::Result<(), StepwiseError> {
        tracing::debug!("Validating command: {} (mode: {})", command, self.mode);

        if let Some(pattern) = self.denylist.iter().find(|p| p.is_match(command)) {
            tracing::error!(pattern = %pattern, "Command blocked by denylist: {}", command);
            return Err(StepwiseError::DangerousCommand(format!(
                "Command matches dangerous pattern: {}",
                command
            )));
        }

        match self.mode {
            ExecutionMode::Unrestricted => Ok(()),
            ExecutionMode::Restricted => {
                self.validate_restricted(command)?;
                self.validate_paths(command)
            }
        }
    }

    fn validate_restricted(&self, command: &str) -> std::result::Result<(), StepwiseError> {
        if command.trim().is_empty() {
            return Err(StepwiseError::Tool("Empty command".to_string()));
        }

        if command.contains('`') || command.contains("$(") {
            return Err(StepwiseError::CommandNotAllowed(
                "command substitution".to_string(),
            ));
        }

        if command.contains('>') {
            return Err(StepwiseError::CommandNotAllowed(
                "output redirection".to_string(),
            ));
        }

        for segment in self.segment_split.split(command) {
            let words: Vec<&str> = segment.split_whitespace().map(unquote).collect();
            let Some((program, args)) = words.split_first() else {
                continue;
            };

            if !ALLOWLIST.contains(program) {
                tracing::warn!("Command '{}' not in allowlist for restricted mode", program);
                return Err(StepwiseError::CommandNotAllowed(program.to_string()));
            }

            if let Some(reason) = writing_arguments(program, args) {
                tracing::warn!("Rejected {} in restricted mode: {}", program, reason);
                return Err(StepwiseError::CommandNotAllowed(format!(
                    "{} {}",
                    program, reason
                )));
            }
        }

        Ok(())
    }

    /// Keep path arguments inside the working directory
    fn validate_paths(&self, command: &str) -> std::result::Result<(), StepwiseError> {
        for word in self.token_split.split(command) {
            let token = unquote(word.trim());
            if token.is_empty() {
                continue;
            }

            // `--file=PATH` and `-fPATH` carry a path after the option name
            let token = if token.starts_with("--") {
                match token.split_once('=') {
                    Some((_, value)) => value,
                    None => continue,
                }
            } else if token.starts_with('-') {
                if !token.contains(|c: char| c == '/' || c == '~') {
                    continue;
                }
                token
                    .find(|c: char| c == '.' || c == '/' || c == '~')
                    .map(|idx| &token[idx..])
                    .unwrap_or(token)
            } else {
                token
            };

            let candidate = self.working_dir.join(token);
            let looks_like_path = token.contains('/')
                || token.starts_with('~')
                || token == "."
                || token == ".."
                || candidate.exists();
            if !looks_like_path {
                continue;
            }

            if token.starts_with('/') || Path::new(token).is_absolute() {
                return Err(path_error("Absolute path not allowed", token));
            }
            if token.starts_with('~') {
                return Err(path_error("Home directory path not allowed", token));
            }
            if token.contains("..") {
                return Err(path_error("Directory traversal not allowed", token));
            }
            if token.contains('$') {
                return Err(path_error("Variable expansion in path not allowed", token));
            }

            // Symlinks resolve before the containment check
            if let Ok(resolved) = candidate.canonicalize() {
                if !resolved.starts_with(&self.working_dir) {
                    return Err(path_error(
                        "Path escapes working directory",
                        &format!("{} -> {}", token, resolved.display()),
                    ));
                }
            }
        }

        Ok(())
    }
}

fn path_error(reason: &str, token: &str) -> StepwiseError {
    tracing::error!("{}: {}", reason, token);
    StepwiseError::PathOutsideWorkingDirectory(format!("{}: {}", reason, token))
}

fn unquote(word: &str) -> &str {
    word.trim_matches(|c| c == '"' || c == '\'')
}

/// Options that turn an allow-listed program into one that writes or executes
fn writing_arguments(program: &str, args: &[&str]) -> Option<&'static str> {
    let short_cluster_has = |arg: &str, flag: char| {
        arg.len() > 1 && arg.starts_with('-') && !arg.starts_with("--") && arg[1..].contains(flag)
    };

    match program {
        "find" => args
            .iter()
            .any(|a| {
                matches!(*a, "-delete" | "-exec" | "-execdir" | "-ok" | "-okdir" | "-fls")
                    || a.starts_with("-fprint")
            })
            .then_some("with -delete, -exec or -fprint"),
        "sort" => args
            .iter()
            .any(|a| {
                short_cluster_has(a, 'o')
                    || a.starts_with("--output")
                    || a.starts_with("--compress-program")
            })
            .then_some("with an output file"),
        "uniq" => {
            let mut positional = 0;
            let mut takes_value = false;
            for arg in args {
                if takes_value {
                    takes_value = false;
                } else if matches!(*arg, "-f" | "-s" | "-w") {
                    takes_value = true;
                } else if !arg.starts_with('-') || *arg == "-" {
                    positional += 1;
                }
            }
            (positional > 1).then_some("with an output file")
        }
        "file" => args
            .iter()
            .any(|a| short_cluster_has(a, 'C') || *a == "--compile")
            .then_some("with --compile"),
        "date" => args
            .iter()
            .any(|a| short_cluster_has(a, 's') || a.starts_with("--set"))
            .then_some("with --set"),
        "hostname" => args
            .iter()
            .any(|a| !a.starts_with('-') || short_cluster_has(a, 'F') || a.starts_with("--file"))
            .then_some("with a new name"),
        _ => None,
    }
}

/// Executes model-requested commands through the host shell
pub struct ShellTool {
    validator: CommandValidator,
    timeout: Option<Duration>,
}

impl ShellTool {
    /// Create the tool from configuration
    pub fn new(config: &TerminalConfig) -> Self {
        if config.mode == ExecutionMode::Unrestricted {
            tracing::warn!(
                "run_command is UNRESTRICTED: model output runs verbatim in the host shell; use only in a sandbox"
            );
        }
        let working_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            validator: CommandValidator::new(config.mode, working_dir),
            timeout: config.timeout_seconds.map(Duration::from_secs),
        }
    }

    fn shell_command(&self, command: &str) -> Command {
        let mut cmd = if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(command);
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(command);
            cmd
        };
        cmd.current_dir(self.validator.working_dir())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl ToolExecutor for ShellTool {
    type Args = RunCommandArgs;
    const NAME: &'static str = TOOL_NAME;

    fn tool_definition(&self) -> serde_json::Value {
        serde_json::json!({
            "name": TOOL_NAME,
            "description": "Takes a shell command as input to execute on system and returns output.",
            "parameters": {
                "type": "object",
                "properties": {
                    "command": {
                        "type": "string",
                        "description": "Command line to run"
                    }
                },
                "required": ["command"]
            }
        })
    }

    async fn execute(&self, args: RunCommandArgs) -> Result<ToolResult> {
        if let Err(e) = self.validator.validate(&args.command) {
            tracing::warn!(command = %args.command, "Command rejected: {}", e);
            return Ok(ToolResult::error(e.to_string()));
        }

        tracing::info!(mode = %self.validator.mode(), "Executing command: {}", args.command);
        let mut cmd = self.shell_command(&args.command);

        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, cmd.output()).await {
                Ok(output) => output,
                Err(_) => {
                    tracing::warn!("Command timed out after {:?}: {}", limit, args.command);
                    return Ok(ToolResult::error(format!(
                        "Command timed out after {} seconds",
                        limit.as_secs()
                    )));
                }
            },
            None => cmd.output().await,
        };

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                tracing::error!("Failed to spawn shell: {}", e);
                return Ok(ToolResult::error(format!("Failed to spawn shell: {}", e)));
            }
        };

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        if text.is_empty() {
            return Ok(ToolResult::success(NO_OUTPUT_PLACEHOLDER));
        }
        Ok(ToolResult::success(text))
    }
}
