//! Single external tool invocation: run to completion, capture output,
//! validate, classify failure.
//!
//! This is the lowest layer of the command orchestration stack. It performs
//! no retries and has no side effects beyond the external process and a
//! debug-level echo of the command line.

use std::process::Command;

use tracing::debug;

/// Predicate applied to captured stdout to decide whether a zero/tolerated
/// exit still counts as a failure.
pub type OutputValidator = fn(&str) -> bool;

/// Validator that accepts any output.
pub fn accept_any(_: &str) -> bool {
    true
}

/// Classified failure of a single tool invocation.
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    /// The tool binary could not be located or executed.
    #[error("tool not found: {tool}")]
    ToolMissing { tool: String },

    /// The tool ran, but its stdout was rejected by the validator.
    #[error("`{command}` produced unexpected output")]
    ValidationRejected { command: String, output: String },

    /// The tool exited non-zero and wrote to stderr.
    #[error("`{command}` exited with status {code}: {stderr}")]
    NonZeroExit {
        command: String,
        code: i32,
        stderr: String,
    },

    /// The tool could not be run for a reason other than a missing binary.
    /// Surfaced unclassified; nothing in the fallback chains keys on it.
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

impl InvokeError {
    /// The raw output attached to this failure, if any.
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::ValidationRejected { output, .. } => Some(output),
            Self::NonZeroExit { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}

/// Seam for invoking external tools, so higher layers are testable with a
/// scripted implementation.
pub trait ToolInvoker: Send + Sync {
    /// Run `program` with `args` to completion and return its stdout.
    ///
    /// # Errors
    ///
    /// - [`InvokeError::ToolMissing`] if the binary cannot be located.
    /// - [`InvokeError::NonZeroExit`] on a non-zero exit **with** non-empty
    ///   stderr. A non-zero exit with empty stderr is tolerated — several of
    ///   the wrapped tools exit non-zero on benign conditions.
    /// - [`InvokeError::ValidationRejected`] if `is_valid` rejects the
    ///   captured stdout.
    fn invoke(
        &self,
        program: &str,
        args: &[&str],
        is_valid: OutputValidator,
    ) -> Result<String, InvokeError>;
}

/// Real invoker backed by `std::process::Command`.
#[derive(Debug, Default)]
pub struct ProcessInvoker;

impl ProcessInvoker {
    /// Create a new process invoker.
    pub fn new() -> Self {
        Self
    }
}

impl ToolInvoker for ProcessInvoker {
    fn invoke(
        &self,
        program: &str,
        args: &[&str],
        is_valid: OutputValidator,
    ) -> Result<String, InvokeError> {
        let command_line = render_command(program, args);
        debug!("exec: {command_line}");

        let output = Command::new(program).args(args).output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                InvokeError::ToolMissing {
                    tool: program.to_owned(),
                }
            } else {
                InvokeError::Spawn {
                    command: command_line.clone(),
                    source: e,
                }
            }
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        debug!("stdout: {}", stdout.trim_end());

        if !output.status.success() && !stderr.is_empty() {
            return Err(InvokeError::NonZeroExit {
                command: command_line,
                code: output.status.code().unwrap_or(-1),
                stderr,
            });
        }

        if !is_valid(&stdout) {
            return Err(InvokeError::ValidationRejected {
                command: command_line,
                output: format!("{stdout}\n{stderr}"),
            });
        }

        Ok(stdout)
    }
}

/// Render a command line for logs and error messages.
pub fn render_command(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_owned()
    } else {
        format!("{program} {}", args.join(" "))
    }
}
