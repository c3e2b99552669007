//! Child-process helpers shared by the tmux backend.

use crate::error::MuxError;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::Duration;

/// Captured status and streams of one finished child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    /// Most useful diagnostic text: stderr when present, else stdout.
    pub fn details(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        format!("command exited with {}", self.exit_code)
    }
}

/// Spawn and wait for a process, optionally piping stdin.
///
/// The child is killed if the returned future is dropped, so wrapping this in
/// `tokio::time::timeout` or `select!` never leaks a blocked `tmux wait-for`.
pub async fn run_process(
    program: &str,
    args: &[String],
    stdin: Option<&[u8]>,
) -> Result<ProcessOutput, MuxError> {
    let mut cmd = Command::new(program);
    cmd.kill_on_drop(true);
    cmd.args(args).stdout(Stdio::piped()).stderr(Stdio::piped());
    if stdin.is_some() {
        cmd.stdin(Stdio::piped());
    } else {
        cmd.stdin(Stdio::null());
    }

    let mut child = cmd
        .spawn()
        .map_err(|e| MuxError::Backend(format!("{program}: {e}")))?;

    if let Some(input) = stdin {
        if let Some(mut child_stdin) = child.stdin.take() {
            child_stdin
                .write_all(input)
                .await
                .map_err(|e| MuxError::Backend(format!("{program}: {e}")))?;
        }
    }

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| MuxError::Backend(format!("{program}: {e}")))?;

    Ok(ProcessOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

/// Convert a non-zero status into a contextual backend error.
pub fn ensure_success(output: ProcessOutput, context: &str) -> Result<ProcessOutput, MuxError> {
    if output.exit_code == 0 {
        return Ok(output);
    }
    Err(MuxError::Backend(format!("{context}: {}", output.details())))
}

/// Human-oriented duration formatting used in timeout messages.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();
    if secs == 0 {
        return format!("{millis}ms");
    }
    if millis == 0 {
        if secs % 3600 == 0 {
            return format!("{}h", secs / 3600);
        }
        if secs % 60 == 0 {
            return format!("{}m", secs / 60);
        }
        return format!("{secs}s");
    }
    format!("{secs}.{millis:03}s")
}

/// Shell-safe single-quote escaping.
pub fn shell_quote(s: &str) -> String {
    if s.is_empty() {
        "''".into()
    } else {
        format!("'{}'", s.replace('\'', "'\\''"))
    }
}
