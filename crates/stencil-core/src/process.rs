//! Subprocess execution with streamed output

use crate::context::Output;
use crate::error::{ErrorReason, Help, WorkflowError};
use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command as TokioCommand;
use tracing::debug;

/// Exit status and captured output of a finished process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `-1` when the process was terminated by a signal
    pub code: i32,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Run `program` in `directory`, forwarding each output line to `output`
/// as it is produced.
///
/// A non-zero exit is not an error here; callers decide what it means.
pub async fn run_command(
    program: &str,
    arguments: &[String],
    directory: &Path,
    output: &dyn Output,
) -> Result<ProcessOutput, WorkflowError> {
    debug!(program, ?arguments, directory = %directory.display(), "spawning process");

    let mut child = TokioCommand::new(program)
        .args(arguments)
        .current_dir(directory)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| spawn_error(program, e))?;

    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        return Err(WorkflowError::new(format!(
            "Failed to capture the output of `{}`",
            program
        )));
    };
    let mut stdout_reader = BufReader::new(stdout).lines();
    let mut stderr_reader = BufReader::new(stderr).lines();

    let mut captured = ProcessOutput {
        code: -1,
        stdout: Vec::new(),
        stderr: Vec::new(),
    };
    let mut stdout_open = true;
    let mut stderr_open = true;

    while stdout_open || stderr_open {
        tokio::select! {
            line = stdout_reader.next_line(), if stdout_open => match line {
                Ok(Some(line)) => {
                    output.inform(&line);
                    captured.stdout.push(line);
                }
                Ok(None) => stdout_open = false,
                Err(e) => {
                    debug!(error = %e, "stopped reading stdout");
                    stdout_open = false;
                }
            },
            line = stderr_reader.next_line(), if stderr_open => match line {
                Ok(Some(line)) => {
                    output.inform(&line);
                    captured.stderr.push(line);
                }
                Ok(None) => stderr_open = false,
                Err(e) => {
                    debug!(error = %e, "stopped reading stderr");
                    stderr_open = false;
                }
            },
        }
    }

    let status = child.wait().await.map_err(|e| {
        WorkflowError::wrap(
            e,
            Help {
                message: Some(format!("Failed to wait for `{}`", program)),
                ..Help::default()
            },
        )
    })?;
    captured.code = status.code().unwrap_or(-1);
    debug!(program, code = captured.code, "process exited");

    Ok(captured)
}

fn spawn_error(program: &str, error: std::io::Error) -> WorkflowError {
    let help = if error.kind() == ErrorKind::NotFound {
        Help {
            message: Some(format!("Command `{}` was not found", program)),
            ..Help::with_reason(ErrorReason::PreconditionFailed)
        }
        .suggestion(format!("Make sure `{}` is installed and on your PATH", program))
    } else {
        Help {
            message: Some(format!("Failed to start `{}`", program)),
            ..Help::default()
        }
    };
    WorkflowError::wrap(error, help)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::context::{MemoryOutput, Semantics};
    use tempfile::TempDir;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_output_is_streamed_and_captured() {
        let dir = TempDir::new().unwrap();
        let output = MemoryOutput::new();

        let result = run_command(
            "sh",
            &args(&["-c", "echo one; echo two >&2; echo three"]),
            dir.path(),
            &output,
        )
        .await
        .unwrap();

        assert!(result.success());
        assert_eq!(result.stdout, vec!["one", "three"]);
        assert_eq!(result.stderr, vec!["two"]);
        assert_eq!(output.texts(Semantics::Info).len(), 3);
    }

    #[tokio::test]
    async fn test_runs_in_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();

        let result = run_command("ls", &[], dir.path(), &MemoryOutput::new())
            .await
            .unwrap();
        assert_eq!(result.stdout, vec!["marker.txt"]);
    }

    #[tokio::test]
    async fn test_exit_code_is_reported() {
        let dir = TempDir::new().unwrap();
        let result = run_command("sh", &args(&["-c", "exit 3"]), dir.path(), &MemoryOutput::new())
            .await
            .unwrap();
        assert_eq!(result.code, 3);
        assert!(!result.success());
    }

    #[tokio::test]
    async fn test_missing_program() {
        let dir = TempDir::new().unwrap();
        let error = run_command(
            "stencil-no-such-program",
            &[],
            dir.path(),
            &MemoryOutput::new(),
        )
        .await
        .unwrap_err();
        assert_eq!(error.reason(), Some(ErrorReason::PreconditionFailed));
    }
}
