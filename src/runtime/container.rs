//! Container-backed agent execution — the process orchestrator.
//!
//! Spawns the agent worker in an isolated container, drains its two output
//! channels concurrently (tool events on stderr, the terminal findings line
//! on stdout), and classifies whatever happens into exactly one
//! [`AgentFindings`]. Once the worker has been spawned, this module never
//! fails past its boundary: every crash, kill, or garbled output becomes a
//! `passed=false` findings.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use uuid::Uuid;

use super::engine::{detect_engine, Engine};
use super::image::{ImageBuilder, AGENT_IMAGE};
use super::{resolve_api_key, Runtime, CREDENTIAL_VAR};
use crate::agent::OnEvent;
use crate::display::{self, ToolEvent};
use crate::error::RuntimeError;
use crate::result::{AgentFindings, CheckResult};

/// Fixed workspace path inside the container; the target's directory is
/// mounted here read-only.
const WORKSPACE_DIR: &str = "/workspace";

/// Runs the agent inside a container (podman or docker).
pub struct ContainerRuntime {
    engine: Engine,
    verbose: bool,
}

impl ContainerRuntime {
    /// Creates a container runtime, detecting an engine on the host.
    pub fn new(verbose: bool) -> Result<Self, RuntimeError> {
        Ok(Self {
            engine: detect_engine()?,
            verbose,
        })
    }

    /// Pre-flight plus invocation construction, shared by both variants.
    async fn prepare(&self, prompt: &str, target: &str) -> Result<(String, Command), RuntimeError> {
        ImageBuilder::new(self.engine, self.verbose).ensure().await?;

        let api_key = resolve_api_key()?;
        let mount_dir = resolve_mount_dir(target)?;
        let name = format!("docforge-check-{}", Uuid::new_v4());

        let args = worker_args(&name, &mount_dir, &api_key, prompt, target);
        tracing::debug!(engine = %self.engine, container = %name, mount = %mount_dir.display(), "Prepared worker invocation");

        let mut command = Command::new(self.engine.command());
        command.args(&args);
        Ok((name, command))
    }

    /// Non-streaming variant: collects all output under a wall-clock timeout.
    ///
    /// Timeout is a process-level fatal error, not a findings failure; the
    /// named container is killed before reporting it so nothing leaks.
    pub async fn run_collected(
        &self,
        prompt: &str,
        target: &str,
        timeout: Duration,
    ) -> Result<CheckResult, RuntimeError> {
        let (name, command) = self.prepare(prompt, target).await?;

        let output = match collect_worker(command, timeout).await {
            Ok(output) => output,
            Err(e) => {
                if matches!(e, RuntimeError::Timeout(_)) {
                    // Kill the named container so the timed-out run leaks nothing.
                    let _ = Command::new(self.engine.command())
                        .args(["rm", "-f", &name])
                        .stdout(Stdio::null())
                        .stderr(Stdio::null())
                        .status()
                        .await;
                }
                return Err(e);
            }
        };

        let findings = self.classify(&output.stdout, output.status);
        Ok(CheckResult::new(Vec::new(), findings))
    }

    /// Applies outcome classification, echoing raw output in verbose mode
    /// when the worker reported nothing parsable.
    fn classify(&self, stdout: &str, status: ExitStatus) -> AgentFindings {
        match parse_findings(stdout) {
            Some(findings) => findings,
            None => {
                if self.verbose && !stdout.trim().is_empty() {
                    eprintln!("  {}", stdout.trim());
                }
                classify_exit(status)
            }
        }
    }
}

#[async_trait]
impl Runtime for ContainerRuntime {
    async fn run(
        &self,
        prompt: &str,
        target: &str,
        on_event: OnEvent<'_>,
    ) -> Result<CheckResult, RuntimeError> {
        let (_name, command) = self.prepare(prompt, target).await?;

        eprintln!("  Container started ({}). Agent is working...", self.engine);

        let output = stream_worker(command, on_event, self.verbose).await?;
        let findings = self.classify(&output.stdout, output.status);
        Ok(CheckResult::new(Vec::new(), findings))
    }
}

/// Raw outcome of one worker process: fully drained primary channel plus
/// exit status.
#[derive(Debug)]
pub(crate) struct WorkerOutput {
    pub stdout: String,
    pub status: ExitStatus,
}

/// Spawns the worker and drains both channels concurrently.
///
/// Both pipes have bounded buffers: if the worker fills one while we block
/// on the other, both sides stall forever. A background task therefore
/// drains stdout to completion while the foreground loop reads stderr
/// line-by-line for live events; the buffers hand off only after the drain
/// task is joined, so no lock is needed.
///
/// Malformed side-channel lines never abort the run: they are ignored, or
/// echoed raw in verbose mode. The internal `StructuredOutput` marker is
/// suppressed before the callback sees it.
pub(crate) async fn stream_worker(
    mut command: Command,
    on_event: OnEvent<'_>,
    verbose: bool,
) -> std::io::Result<WorkerOutput> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command.spawn()?;
    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| std::io::Error::other("worker stdout was not captured"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| std::io::Error::other("worker stderr was not captured"))?;

    // Raw bytes: the worker runs arbitrary documented commands, so the
    // noise above the terminal findings line need not be valid UTF-8.
    let drain = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout.read_to_end(&mut buf).await.map(|_| buf)
    });

    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<ToolEvent>(line) {
                    Ok(event) if !display::is_hidden(&event.tool) => on_event(&event),
                    Ok(_) => {}
                    Err(_) if verbose => eprintln!("  {line}"),
                    Err(_) => {}
                }
            }
            Ok(None) => break,
            Err(e) => {
                // Display-path failure only; the verdict comes from stdout.
                tracing::debug!(error = %e, "Side channel read error, stopping event stream");
                break;
            }
        }
    }

    let status = child.wait().await?;
    let bytes = drain.await.map_err(std::io::Error::other)??;

    Ok(WorkerOutput {
        stdout: String::from_utf8_lossy(&bytes).to_string(),
        status,
    })
}

/// Collects all worker output under a wall-clock timeout.
pub(crate) async fn collect_worker(
    mut command: Command,
    timeout: Duration,
) -> Result<WorkerOutput, RuntimeError> {
    // Dropping the output future on timeout must take the child with it.
    command.stdin(Stdio::null()).kill_on_drop(true);
    match tokio::time::timeout(timeout, command.output()).await {
        Ok(output) => {
            let output = output?;
            Ok(WorkerOutput {
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                status: output.status,
            })
        }
        Err(_) => Err(RuntimeError::Timeout(timeout)),
    }
}

/// Parses the last non-empty line of the drained primary channel.
///
/// Any amount of log noise above that line is tolerated; only the terminal
/// line speaks for the worker.
pub(crate) fn parse_findings(stdout: &str) -> Option<AgentFindings> {
    let last_line = stdout.lines().rev().find(|line| !line.trim().is_empty())?;
    serde_json::from_str(last_line.trim()).ok()
}

/// Exit code the engine reports for an OOM-killed container (128 + SIGKILL).
const OOM_EXIT_CODE: i32 = 137;

/// Synthesizes findings from an exit status when no parsable findings exist.
pub(crate) fn classify_exit(status: ExitStatus) -> AgentFindings {
    if killed_by_oom(status) {
        return AgentFindings::failure(
            "Container was killed before reporting findings, likely by the out-of-memory \
             (OOM) killer. Raise the engine's memory limit and retry.",
        );
    }

    match status.code() {
        Some(0) => AgentFindings::failure("Container produced no output."),
        Some(code) => AgentFindings::failure(format!(
            "Container exited with code {code} and produced no parsable findings."
        )),
        None => AgentFindings::failure(
            "Container was terminated by a signal before reporting findings.",
        ),
    }
}

#[cfg(unix)]
fn killed_by_oom(status: ExitStatus) -> bool {
    use std::os::unix::process::ExitStatusExt;
    status.signal() == Some(9) || status.code() == Some(OOM_EXIT_CODE)
}

#[cfg(not(unix))]
fn killed_by_oom(status: ExitStatus) -> bool {
    status.code() == Some(OOM_EXIT_CODE)
}

/// Builds the engine `run` arguments for one worker invocation.
///
/// The mount is read-only: the worker must not be able to mutate the
/// caller's filesystem.
fn worker_args(
    name: &str,
    mount_dir: &Path,
    api_key: &str,
    prompt: &str,
    target: &str,
) -> Vec<String> {
    vec![
        "run".to_string(),
        "--rm".to_string(),
        "--name".to_string(),
        name.to_string(),
        "-v".to_string(),
        format!("{}:{}:ro", mount_dir.display(), WORKSPACE_DIR),
        "-w".to_string(),
        WORKSPACE_DIR.to_string(),
        "-e".to_string(),
        format!("{CREDENTIAL_VAR}={api_key}"),
        AGENT_IMAGE.to_string(),
        "--prompt".to_string(),
        prompt.to_string(),
        "--target".to_string(),
        target.to_string(),
    ]
}

/// Resolves the directory to mount: a file target mounts its parent, a
/// directory target mounts itself.
fn resolve_mount_dir(target: &str) -> Result<PathBuf, RuntimeError> {
    let path = std::fs::canonicalize(target)
        .map_err(|_| RuntimeError::TargetMissing(target.to_string()))?;
    if path.is_file() {
        Ok(path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/")))
    } else {
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::process::ExitStatusExt;
    use tempfile::TempDir;

    /// Writes a scripted fake worker and returns a command running it.
    fn scripted_worker(dir: &TempDir, script: &str) -> Command {
        let path = dir.path().join("worker.sh");
        fs::write(&path, script).unwrap();
        let mut command = Command::new("sh");
        command.arg(path);
        command
    }

    async fn run_scripted(script: &str) -> (Vec<ToolEvent>, WorkerOutput) {
        let dir = TempDir::new().unwrap();
        let command = scripted_worker(&dir, script);
        let mut events = Vec::new();
        let output = stream_worker(command, &mut |e| events.push(e.clone()), false)
            .await
            .unwrap();
        (events, output)
    }

    #[tokio::test]
    async fn findings_round_trip_through_worker() {
        let (_, output) = run_scripted(
            r#"echo 'some log noise'
echo '{"passed": true, "details": "All good"}'
exit 0
"#,
        )
        .await;

        let findings = parse_findings(&output.stdout).unwrap();
        assert!(findings.passed);
        assert_eq!(findings.details, "All good");
    }

    #[tokio::test]
    async fn self_reported_findings_beat_nonzero_exit() {
        let (_, output) = run_scripted(
            r#"echo '{"passed": false, "details": "Agent encountered an error: credentials expired"}'
exit 1
"#,
        )
        .await;

        assert!(!output.status.success());
        let findings = parse_findings(&output.stdout).unwrap();
        assert_eq!(
            findings.details,
            "Agent encountered an error: credentials expired"
        );
    }

    #[tokio::test]
    async fn non_utf8_noise_does_not_discard_findings() {
        // Documented commands can write raw bytes; only the terminal line
        // must parse.
        let (_, output) = run_scripted(
            "printf '\\377\\376 binary noise\\n'\necho '{\"passed\": true, \"details\": \"ok\"}'\n",
        )
        .await;

        let findings = parse_findings(&output.stdout).unwrap();
        assert!(findings.passed);
        assert_eq!(findings.details, "ok");
    }

    #[tokio::test]
    async fn events_arrive_in_order_with_marker_suppressed() {
        let (events, output) = run_scripted(
            r#"echo '{"tool": "Read", "input": {"file_path": "README.md"}}' >&2
echo 'not json at all' >&2
echo '{"tool": "StructuredOutput", "input": {}}' >&2
echo '{"tool": "Bash", "input": {"command": "make"}}' >&2
echo '{"input": {"no": "tool key"}}' >&2
echo '{"passed": true, "details": "ok"}'
"#,
        )
        .await;

        let tools: Vec<&str> = events.iter().map(|e| e.tool.as_str()).collect();
        assert_eq!(tools, vec!["Read", "Bash"]);
        assert!(parse_findings(&output.stdout).unwrap().passed);
    }

    #[tokio::test]
    async fn dual_channel_drain_does_not_deadlock() {
        // More side-channel bytes than an OS pipe buffer, plus a large
        // primary payload written before the terminal findings line.
        let script = r#"i=0
while [ $i -lt 10000 ]; do
  echo '{"tool": "Bash", "input": {"command": "step"}}' >&2
  i=$((i+1))
done
head -c 1000000 /dev/zero | tr '\0' 'x'
echo ''
echo '{"passed": true, "details": "survived the flood"}'
"#;
        let result = tokio::time::timeout(Duration::from_secs(30), run_scripted(script))
            .await
            .expect("dual-channel drain deadlocked");

        let (events, output) = result;
        assert_eq!(events.len(), 10_000);
        let findings = parse_findings(&output.stdout).unwrap();
        assert_eq!(findings.details, "survived the flood");
    }

    #[tokio::test]
    async fn collect_variant_times_out_and_reports_fatal() {
        let dir = TempDir::new().unwrap();
        let command = scripted_worker(&dir, "sleep 10\n");

        let err = collect_worker(command, Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Timeout(_)));
    }

    #[tokio::test]
    async fn collect_variant_timeout_kills_the_child() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("survived");
        let command = scripted_worker(
            &dir,
            &format!("sleep 1\ntouch {}\n", marker.display()),
        );

        let err = collect_worker(command, Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Timeout(_)));

        // A killed worker never reaches the post-sleep write.
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists(), "worker outlived its timeout");
    }

    #[tokio::test]
    async fn collect_variant_captures_findings_within_budget() {
        let dir = TempDir::new().unwrap();
        let command = scripted_worker(&dir, "echo '{\"passed\": true, \"details\": \"fast\"}'\n");

        let output = collect_worker(command, Duration::from_secs(10)).await.unwrap();
        assert!(parse_findings(&output.stdout).unwrap().passed);
    }

    #[test]
    fn oom_signal_classifies_with_memory_guidance() {
        // Raw wait status 9: terminated by SIGKILL.
        let findings = classify_exit(ExitStatus::from_raw(9));
        assert!(!findings.passed);
        assert!(findings.details.contains("OOM") || findings.details.contains("memory"));
    }

    #[test]
    fn oom_exit_code_classifies_with_memory_guidance() {
        let findings = classify_exit(ExitStatus::from_raw(137 << 8));
        assert!(!findings.passed);
        assert!(findings.details.contains("OOM"));
    }

    #[test]
    fn nonzero_exit_classifies_with_code() {
        let findings = classify_exit(ExitStatus::from_raw(2 << 8));
        assert!(!findings.passed);
        assert!(findings.details.contains("Container exited with code 2"));
    }

    #[test]
    fn clean_exit_without_output_classifies_as_no_output() {
        let findings = classify_exit(ExitStatus::from_raw(0));
        assert!(!findings.passed);
        assert!(findings.details.contains("no output"));
    }

    #[test]
    fn parse_findings_takes_last_nonempty_line() {
        let stdout = "warning: something\n{\"passed\": false, \"details\": \"draft\"}\n\n{\"passed\": true, \"details\": \"final\"}\n\n";
        let findings = parse_findings(stdout).unwrap();
        assert!(findings.passed);
        assert_eq!(findings.details, "final");
    }

    #[test]
    fn parse_findings_rejects_garbage() {
        assert!(parse_findings("").is_none());
        assert!(parse_findings("plain text\nmore text\n").is_none());
    }

    #[test]
    fn worker_invocation_mounts_read_only() {
        let args = worker_args(
            "docforge-check-test",
            Path::new("/home/dev/project"),
            "sk-test",
            "follow the docs",
            ".",
        );

        assert!(args.contains(&"/home/dev/project:/workspace:ro".to_string()));
        assert!(args.contains(&format!("{CREDENTIAL_VAR}=sk-test")));
        assert!(args.contains(&AGENT_IMAGE.to_string()));

        // Image args form the worker CLI contract.
        let image_pos = args.iter().position(|a| a == AGENT_IMAGE).unwrap();
        assert_eq!(
            &args[image_pos + 1..],
            &["--prompt", "follow the docs", "--target", "."]
        );
    }

    #[test]
    fn file_target_mounts_parent_directory() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("README.md");
        fs::write(&file, "# hi").unwrap();

        let mount = resolve_mount_dir(&file.display().to_string()).unwrap();
        assert_eq!(mount, dir.path().canonicalize().unwrap());
    }

    #[test]
    fn directory_target_mounts_itself() {
        let dir = TempDir::new().unwrap();
        let mount = resolve_mount_dir(&dir.path().display().to_string()).unwrap();
        assert_eq!(mount, dir.path().canonicalize().unwrap());
    }

    #[test]
    fn missing_target_is_an_error() {
        let err = resolve_mount_dir("/does/not/exist").unwrap_err();
        assert!(matches!(err, RuntimeError::TargetMissing(_)));
    }
}
