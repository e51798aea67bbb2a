// Process Runner
// Spawns interpreters, collects their output and enforces a deadline

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// How long to wait for output after killing a process
const OUTPUT_GRACE: Duration = Duration::from_millis(500);

/// A command line to execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl ProcessSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
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

    pub fn working_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }
}

/// Output collected from a finished process
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    /// Standard output lines joined with '\n'
    pub stdout: String,
    /// Standard error lines joined with '\n'
    pub stderr: String,
    /// Exit code (None when killed or not started)
    pub exit_code: Option<i32>,
    /// The deadline passed and the process was killed
    pub timed_out: bool,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    fn spawn_failure(program: &str, error: std::io::Error) -> Self {
        Self {
            stderr: format!("Failed to spawn process '{}': {}", program, error),
            ..Self::default()
        }
    }
}

/// Run a process to completion, killing it if the deadline passes
pub async fn run_process(spec: &ProcessSpec, deadline: Option<Instant>) -> ProcessOutput {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args);
    if let Some(dir) = &spec.working_dir {
        cmd.current_dir(dir);
    }
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);

    debug!(program = %spec.program, args = ?spec.args, "spawning process");

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => return ProcessOutput::spawn_failure(&spec.program, e),
    };

    let stdout_handle = child.stdout.take().map(collect_lines);
    let stderr_handle = child.stderr.take().map(collect_lines);

    let (wait_result, timed_out) = match deadline {
        Some(deadline) => match tokio::time::timeout_at(deadline, child.wait()).await {
            Ok(result) => (result, false),
            Err(_) => {
                let _ = child.kill().await;
                (child.wait().await, true)
            }
        },
        None => (child.wait().await, false),
    };

    let exit_code = if timed_out {
        None
    } else {
        wait_result.ok().and_then(|status| status.code())
    };

    // A killed process may leave children holding the pipes open
    let grace = timed_out.then_some(OUTPUT_GRACE);
    let stdout = join_lines(stdout_handle, grace).await;
    let mut stderr = join_lines(stderr_handle, grace).await;
    if timed_out {
        if !stderr.is_empty() {
            stderr.push('\n');
        }
        stderr.push_str("Process killed after the task group deadline");
    }

    ProcessOutput {
        stdout,
        stderr,
        exit_code,
        timed_out,
    }
}

/// Read a pipe to its end, decoding each line lossily
fn collect_lines<R>(reader: R) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        let mut output = String::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    while matches!(buf.last(), Some(b'\n' | b'\r')) {
                        buf.pop();
                    }
                    if !output.is_empty() {
                        output.push('\n');
                    }
                    output.push_str(&String::from_utf8_lossy(&buf));
                }
            }
        }
        output
    })
}

async fn join_lines(handle: Option<JoinHandle<String>>, grace: Option<Duration>) -> String {
    let Some(mut handle) = handle else {
        return String::new();
    };
    match grace {
        Some(grace) => match tokio::time::timeout(grace, &mut handle).await {
            Ok(joined) => joined.unwrap_or_default(),
            Err(_) => {
                handle.abort();
                String::new()
            }
        },
        None => handle.await.unwrap_or_default(),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_process_echo() {
        let spec = ProcessSpec::new("sh").args(["-c", "echo hello; echo world"]);
        let output = run_process(&spec, None).await;

        assert!(output.success());
        assert_eq!(output.stdout, "hello\nworld");
    }

    #[tokio::test]
    async fn test_run_process_exit_code_and_stderr() {
        let spec = ProcessSpec::new("sh").args(["-c", "echo oops >&2; exit 3"]);
        let output = run_process(&spec, None).await;

        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stderr, "oops");
        assert!(!output.success());
    }

    #[tokio::test]
    async fn test_run_process_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let spec = ProcessSpec::new("sh")
            .args(["-c", "pwd"])
            .working_dir(dir.path());
        let output = run_process(&spec, None).await;

        let expected = dir.path().canonicalize().unwrap();
        let actual = Path::new(&output.stdout).canonicalize().unwrap();
        assert_eq!(actual, expected);
    }

    #[tokio::test]
    async fn test_run_process_deadline_kills() {
        let spec = ProcessSpec::new("sh").args(["-c", "sleep 5"]);
        let deadline = Instant::now() + Duration::from_millis(100);

        let started = Instant::now();
        let output = run_process(&spec, Some(deadline)).await;

        assert!(output.timed_out);
        assert!(!output.success());
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_run_process_keeps_lines_after_invalid_utf8() {
        let spec = ProcessSpec::new("sh").args(["-c", "echo first; printf 'bad\\377\\n'; echo last"]);
        let output = run_process(&spec, None).await;

        assert!(output.success());
        let lines: Vec<&str> = output.stdout.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "first");
        assert!(lines[1].starts_with("bad"));
        assert!(lines[1].contains('\u{FFFD}'));
        assert_eq!(lines[2], "last");
    }

    #[tokio::test]
    async fn test_run_process_missing_program() {
        let spec = ProcessSpec::new("definitely-not-a-real-program-xyz");
        let output = run_process(&spec, None).await;

        assert_eq!(output.exit_code, None);
        assert!(output.stderr.contains("Failed to spawn"));
    }
}
