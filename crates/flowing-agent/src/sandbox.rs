//! Sandboxed execution of generated code.
//!
//! One call is one attempt: the code is written to a uniquely named scratch
//! file, run as a child process with the working directory pinned to the
//! flowing install root, and reaped under a wall-clock timeout. Retry
//! policy lives in the workflow, not here.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Default wall-clock ceiling for one execution attempt
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How the sandbox launches generated code
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Runtime executable, e.g. `npx`
    pub runtime: String,
    /// Arguments before the scratch-file path, e.g. `["tsx"]`
    pub runtime_args: Vec<String>,
    /// Working directory for the child; the flowing install root, so that
    /// relative imports inside generated code resolve
    pub work_dir: PathBuf,
    /// Wall-clock timeout per attempt
    pub timeout: Duration,
    /// Scratch-file suffix
    pub file_suffix: String,
}

impl SandboxConfig {
    /// Default configuration for running TypeScript under `npx tsx`.
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            runtime: "npx".to_string(),
            runtime_args: vec!["tsx".to_string()],
            work_dir: work_dir.into(),
            timeout: DEFAULT_TIMEOUT,
            file_suffix: ".ts".to_string(),
        }
    }
}

/// Why an execution attempt failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecError {
    /// Child exited non-zero; `output` is stderr if non-empty, else stdout
    Exit { code: i32, output: String },
    /// Wall-clock timeout exceeded; the child was killed
    Timeout { limit: Duration },
    /// The child could not be started (runtime missing, filesystem error)
    Launch(String),
    /// The run was aborted by the caller; the child was killed
    Cancelled,
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecError::Exit { output, .. } => write!(f, "{}", output),
            ExecError::Timeout { limit } => {
                write!(f, "execution timed out ({}s)", limit.as_secs())
            }
            ExecError::Launch(msg) => write!(f, "{}", msg),
            ExecError::Cancelled => write!(f, "execution cancelled"),
        }
    }
}

/// Result of one code submission
#[derive(Debug)]
pub struct ExecOutcome {
    pub success: bool,
    /// The submitted source, echoed back for inspection
    pub code: String,
    /// Artifact path declared by the code; present only on success
    pub output_path: Option<String>,
    /// Captured standard output, if any
    pub stdout: Option<String>,
    /// Present only on failure
    pub error: Option<ExecError>,
}

impl ExecOutcome {
    fn succeeded(code: String, output_path: Option<String>, stdout: String) -> Self {
        Self {
            success: true,
            code,
            output_path,
            stdout: if stdout.is_empty() {
                None
            } else {
                Some(stdout)
            },
            error: None,
        }
    }

    fn failed(code: String, error: ExecError) -> Self {
        Self {
            success: false,
            code,
            output_path: None,
            stdout: None,
            error: Some(error),
        }
    }

    /// Whether this outcome is a caller-initiated abort.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.error, Some(ExecError::Cancelled))
    }

    /// Rendered error text, present only on failure.
    pub fn error_text(&self) -> Option<String> {
        self.error.as_ref().map(|e| e.to_string())
    }
}

/// Scan submitted source for the first `export("<path>")` string-literal
/// argument. Best-effort convention: absence is not an error.
pub fn find_output_path(code: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r#"export\(\s*['"]([^'"]+)['"]"#).unwrap());
    re.captures(code).map(|caps| caps[1].to_string())
}

/// Executes one code submission in an isolated child process.
pub struct SandboxRunner {
    config: SandboxConfig,
}

impl SandboxRunner {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Run `code` and produce an [`ExecOutcome`].
    ///
    /// The cancellation token aborts the attempt immediately, killing the
    /// child; no orphaned process is left behind on cancel or timeout.
    pub async fn execute(&self, code: &str, cancel: CancellationToken) -> ExecOutcome {
        let scratch = std::env::temp_dir().join(format!(
            "flowing_agent_{}{}",
            Uuid::new_v4().simple(),
            self.config.file_suffix
        ));

        if let Err(e) = tokio::fs::write(&scratch, code).await {
            return ExecOutcome::failed(
                code.to_string(),
                ExecError::Launch(format!("failed to write scratch file: {}", e)),
            );
        }

        let outcome = self.run_child(code, &scratch, cancel).await;
        cleanup_scratch(&scratch).await;
        outcome
    }

    async fn run_child(
        &self,
        code: &str,
        scratch: &Path,
        cancel: CancellationToken,
    ) -> ExecOutcome {
        let mut child = match Command::new(&self.config.runtime)
            .args(&self.config.runtime_args)
            .arg(scratch)
            .current_dir(&self.config.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(c) => c,
            Err(e) => {
                return ExecOutcome::failed(code.to_string(), ExecError::Launch(e.to_string()));
            }
        };

        // Drain the pipes concurrently so a chatty child cannot block on a
        // full pipe buffer while we wait on it.
        let mut stdout_pipe = child.stdout.take().expect("stdout was piped");
        let mut stderr_pipe = child.stderr.take().expect("stderr was piped");
        let stdout_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stdout_pipe.read_to_string(&mut buf).await;
            buf
        });
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr_pipe.read_to_string(&mut buf).await;
            buf
        });

        let deadline = tokio::time::Instant::now() + self.config.timeout;
        let status = tokio::select! {
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                return ExecOutcome::failed(code.to_string(), ExecError::Cancelled);
            }
            _ = tokio::time::sleep_until(deadline) => {
                let _ = child.kill().await;
                return ExecOutcome::failed(
                    code.to_string(),
                    ExecError::Timeout { limit: self.config.timeout },
                );
            }
            status = child.wait() => status,
        };

        let status = match status {
            Ok(s) => s,
            Err(e) => {
                return ExecOutcome::failed(code.to_string(), ExecError::Launch(e.to_string()));
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();

        if status.success() {
            ExecOutcome::succeeded(code.to_string(), find_output_path(code), stdout)
        } else {
            let output = if stderr.trim().is_empty() {
                stdout
            } else {
                stderr
            };
            ExecOutcome::failed(
                code.to_string(),
                ExecError::Exit {
                    code: status.code().unwrap_or(-1),
                    output,
                },
            )
        }
    }
}

/// Best-effort scratch cleanup; failure never fails the run.
async fn cleanup_scratch(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::debug!(path = %path.display(), "scratch cleanup failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh_config(timeout: Duration) -> SandboxConfig {
        SandboxConfig {
            runtime: "sh".to_string(),
            runtime_args: vec![],
            work_dir: std::env::temp_dir(),
            timeout,
            file_suffix: ".sh".to_string(),
        }
    }

    fn runner(timeout: Duration) -> SandboxRunner {
        SandboxRunner::new(sh_config(timeout))
    }

    #[test]
    fn test_find_output_path_double_quotes() {
        let code = r#"await fig.export("diagram.png", { fit: true })"#;
        assert_eq!(find_output_path(code).as_deref(), Some("diagram.png"));
    }

    #[test]
    fn test_find_output_path_single_quotes_and_spacing() {
        let code = "fig.export( 'out/flow.svg' )";
        assert_eq!(find_output_path(code).as_deref(), Some("out/flow.svg"));
    }

    #[test]
    fn test_find_output_path_absent() {
        assert!(find_output_path("console.log('no export here')").is_none());
    }

    #[tokio::test]
    async fn test_successful_run_locates_output_path() {
        // find_output_path scans the source text, so the marker may live in
        // a comment as far as the shell is concerned.
        let code = "# export(\"out.png\")\necho rendered";
        let outcome = runner(Duration::from_secs(5))
            .execute(code, CancellationToken::new())
            .await;
        assert!(outcome.success, "error: {:?}", outcome.error);
        assert_eq!(outcome.output_path.as_deref(), Some("out.png"));
        assert!(outcome.stdout.unwrap().contains("rendered"));
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn test_missing_export_is_not_an_error() {
        let outcome = runner(Duration::from_secs(5))
            .execute("true", CancellationToken::new())
            .await;
        assert!(outcome.success);
        assert!(outcome.output_path.is_none());
    }

    #[tokio::test]
    async fn test_nonzero_exit_prefers_stderr() {
        let code = "echo ignored\necho 'TypeError: boom' >&2\nexit 3";
        let outcome = runner(Duration::from_secs(5))
            .execute(code, CancellationToken::new())
            .await;
        assert!(!outcome.success);
        assert!(outcome.output_path.is_none());
        match outcome.error {
            Some(ExecError::Exit { code, ref output }) => {
                assert_eq!(code, 3);
                assert!(output.contains("TypeError: boom"));
            }
            ref other => panic!("expected Exit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_nonzero_exit_falls_back_to_stdout() {
        let code = "echo only-on-stdout\nexit 1";
        let outcome = runner(Duration::from_secs(5))
            .execute(code, CancellationToken::new())
            .await;
        let text = outcome.error_text().unwrap();
        assert!(text.contains("only-on-stdout"));
    }

    #[tokio::test]
    async fn test_timeout_kills_child_with_fixed_message() {
        let started = std::time::Instant::now();
        let outcome = runner(Duration::from_secs(1))
            .execute("sleep 30", CancellationToken::new())
            .await;
        assert!(!outcome.success);
        assert_eq!(
            outcome.error_text().as_deref(),
            Some("execution timed out (1s)")
        );
        // Returns promptly instead of waiting out the sleep
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_launch_failure_reports_os_error() {
        let config = SandboxConfig {
            runtime: "flowing-no-such-runtime".to_string(),
            ..sh_config(Duration::from_secs(5))
        };
        let outcome = SandboxRunner::new(config)
            .execute("true", CancellationToken::new())
            .await;
        assert!(!outcome.success);
        assert!(matches!(outcome.error, Some(ExecError::Launch(_))));
    }

    #[tokio::test]
    async fn test_cancel_aborts_run() {
        let cancel = CancellationToken::new();
        let aborter = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            aborter.cancel();
        });

        let started = std::time::Instant::now();
        let outcome = runner(Duration::from_secs(30))
            .execute("sleep 30", cancel)
            .await;
        assert!(outcome.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
