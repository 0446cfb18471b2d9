//! External process execution
//!
//! Every build stage, hook and package install goes through a
//! `ProcessRunner`, so tests can record the exact command sequence
//! without touching the host.

use crate::error::{ProvisionError, ProvisionResult};
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

/// Max number of output lines to include in stage error messages.
const ERROR_TAIL_LINES: usize = 50;

/// A command to run: program, arguments, working directory and env overlay
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Variables set on top of the inherited process environment
    pub fn envs(mut self, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env.extend(vars);
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Executes external commands
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `command` to completion; a nonzero exit is an error
    async fn run(&self, command: &CommandSpec) -> ProvisionResult<()>;
}

/// Runs commands with `tokio::process`, streaming their output
pub struct TokioProcessRunner {
    echo: bool,
}

impl TokioProcessRunner {
    /// Create a runner that logs command output at debug level
    pub fn new() -> Self {
        Self { echo: false }
    }

    /// Also print every output line to stdout (CI logs)
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }
}

impl Default for TokioProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> ProvisionResult<()> {
        debug!("Executing: {}", spec);

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(ref dir) = spec.cwd {
            command.current_dir(dir);
        }

        let mut child = command
            .spawn()
            .map_err(|e| ProvisionError::command_failed(spec.to_string(), e))?;

        let echo = self.echo;
        let lines = stream_child_output(&mut child, &move |line: String| {
            if echo {
                println!("{}", line);
            } else {
                debug!("{}", line);
            }
        })
        .await?;

        let status = child
            .wait()
            .await
            .map_err(|e| ProvisionError::command_failed(spec.to_string(), e))?;

        if status.success() {
            Ok(())
        } else {
            Err(ProvisionError::CommandExit {
                command: spec.to_string(),
                code: status.code().unwrap_or(-1),
                output: error_tail(&lines),
            })
        }
    }
}

/// Keep the last `ERROR_TAIL_LINES` lines so error messages stay actionable
fn error_tail(lines: &[String]) -> String {
    let start = lines.len().saturating_sub(ERROR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Stream stdout+stderr from a child process, calling `on_output` for each line.
///
/// Returns all collected output lines for error reporting.
async fn stream_child_output(
    child: &mut tokio::process::Child,
    on_output: &(dyn Fn(String) + Send + Sync),
) -> ProvisionResult<Vec<String>> {
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| ProvisionError::Internal("child stderr not piped".to_string()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ProvisionError::Internal("child stdout not piped".to_string()))?;

    // Lines are split on raw bytes; compilers in non-UTF-8 locales must not
    // stop a pipe from being drained
    let mut stderr_reader = BufReader::new(stderr);
    let mut stdout_reader = BufReader::new(stdout);
    let mut stderr_buf = Vec::new();
    let mut stdout_buf = Vec::new();

    let mut all_output = Vec::new();
    let mut stderr_done = false;
    let mut stdout_done = false;

    while !stderr_done || !stdout_done {
        tokio::select! {
            read = stderr_reader.read_until(b'\n', &mut stderr_buf), if !stderr_done => {
                stderr_done = collect_line(read, &mut stderr_buf, &mut all_output, on_output);
            }
            read = stdout_reader.read_until(b'\n', &mut stdout_buf), if !stdout_done => {
                stdout_done = collect_line(read, &mut stdout_buf, &mut all_output, on_output);
            }
        }
    }

    Ok(all_output)
}

/// Handle one `read_until` result; returns true once the stream is finished.
///
/// A completed read leaves a whole line in `buf` (newline-terminated, or the
/// last bytes before EOF). A cancelled read leaves partial bytes there, which
/// the next read on the same buffer continues.
fn collect_line(
    read: std::io::Result<usize>,
    buf: &mut Vec<u8>,
    all_output: &mut Vec<String>,
    on_output: &(dyn Fn(String) + Send + Sync),
) -> bool {
    let done = match read {
        Ok(0) => true,
        Ok(_) => false,
        Err(e) => {
            debug!("Stopped reading command output: {}", e);
            true
        }
    };

    if !buf.is_empty() {
        let line = String::from_utf8_lossy(&buf[..])
            .trim_end_matches(['\n', '\r'])
            .to_string();
        buf.clear();
        on_output(line.clone());
        all_output.push(line);
    }
    done
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_display() {
        let spec = CommandSpec::new("git").args(["clone", "--depth", "1"]);
        assert_eq!(spec.to_string(), "git clone --depth 1");
    }

    #[test]
    fn error_tail_keeps_last_lines() {
        let lines: Vec<String> = (0..120).map(|i| format!("line {}", i)).collect();
        let tail = error_tail(&lines);
        assert_eq!(tail.lines().count(), ERROR_TAIL_LINES);
        assert!(tail.ends_with("line 119"));
        assert!(tail.starts_with("line 70"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_successful_command() {
        let runner = TokioProcessRunner::new();
        runner
            .run(&CommandSpec::new("sh").args(["-c", "echo hello"]))
            .await
            .unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_carries_code_and_output() {
        let runner = TokioProcessRunner::new();
        let err = runner
            .run(&CommandSpec::new("sh").args(["-c", "echo boom >&2; exit 3"]))
            .await
            .unwrap_err();

        match err {
            ProvisionError::CommandExit { code, output, .. } => {
                assert_eq!(code, 3);
                assert_eq!(output, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn passes_env_and_cwd() {
        let dir = tempfile::TempDir::new().unwrap();
        let runner = TokioProcessRunner::new();
        runner
            .run(
                &CommandSpec::new("sh")
                    .args(["-c", "test \"$SETUP_VS_MARKER\" = yes && touch marker"])
                    .cwd(dir.path())
                    .envs([("SETUP_VS_MARKER".to_string(), "yes".to_string())]),
            )
            .await
            .unwrap();

        assert!(dir.path().join("marker").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn invalid_utf8_output_keeps_draining() {
        let runner = TokioProcessRunner::new();
        // A non-UTF-8 line followed by more stderr than a pipe buffer holds
        let script = "printf 'bad \\377 byte\\n' >&2; \
                      head -c 200000 /dev/zero | tr '\\0' a >&2; \
                      echo done";
        let result = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            runner.run(&CommandSpec::new("sh").args(["-c", script])),
        )
        .await
        .expect("runner stopped draining stderr");
        result.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn output_after_invalid_utf8_reaches_error_tail() {
        let runner = TokioProcessRunner::new();
        let err = runner
            .run(&CommandSpec::new("sh").args([
                "-c",
                "printf 'bad \\377\\n' >&2; echo real-error >&2; exit 2",
            ]))
            .await
            .unwrap_err();

        match err {
            ProvisionError::CommandExit { code, output, .. } => {
                assert_eq!(code, 2);
                assert_eq!(output, "bad \u{FFFD}\nreal-error");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unterminated_last_line_is_kept() {
        let mut buf = b"no newline".to_vec();
        let mut lines = Vec::new();
        assert!(!collect_line(Ok(10), &mut buf, &mut lines, &|_| {}));
        assert!(collect_line(Ok(0), &mut buf, &mut lines, &|_| {}));
        assert_eq!(lines, vec!["no newline".to_string()]);
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn missing_program_fails_to_start() {
        let runner = TokioProcessRunner::new();
        let err = runner
            .run(&CommandSpec::new("definitely-not-a-real-program-xyz"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::CommandFailed { .. }));
    }
}
