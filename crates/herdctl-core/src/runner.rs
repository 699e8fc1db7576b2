//! Command fallback runner.
//!
//! Given an ordered list of candidate commands for one intent (start or
//! stop), try each until one succeeds. A missing executable is not an
//! error, it just means this platform does not have that candidate.

use std::fmt;
use std::io;
use std::process::Stdio;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::BoxFuture;

/// Error reported when every candidate was tried and none succeeded.
pub const EXHAUSTED: &str = "no candidate succeeded";

/// One way to achieve an intent: an executable plus its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Build from an argv array. Returns `None` when `argv` is empty.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone(), args.iter().cloned()))
    }

    /// Program and arguments joined by spaces, as shown to users.
    pub fn describe(&self) -> String {
        let mut out = self.program.clone();
        for arg in &self.args {
            out.push(' ');
            out.push_str(arg);
        }
        out
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Convert configured argv arrays, dropping empty entries.
pub fn commands_from_config(argvs: &[Vec<String>]) -> Vec<CommandSpec> {
    argvs
        .iter()
        .filter_map(|argv| CommandSpec::from_argv(argv))
        .collect()
}

/// How a candidate is run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Fire and forget: the candidate succeeds as soon as the process has
    /// been spawned. Used for starting a long-running daemon.
    Launch,
    /// Wait for the process to exit; only exit status 0 is success.
    Run,
}

/// Outcome of a single candidate attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt {
    /// The executable does not exist on this system.
    NotFound,
    /// The candidate did not finish within the per-command timeout.
    TimedOut,
    Succeeded,
    /// The candidate ran (or could not be spawned) and did not succeed.
    Failed(String),
}

/// Executes candidate commands. The system implementation spawns real
/// processes; tests substitute a scripted one.
pub trait CandidateExecutor: Send + Sync {
    fn execute<'a>(
        &'a self,
        command: &'a CommandSpec,
        mode: LaunchMode,
        timeout: Duration,
    ) -> BoxFuture<'a, Attempt>;
}

/// Runs candidates as OS processes via `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

impl SystemExecutor {
    async fn launch(command: &CommandSpec) -> Attempt {
        let mut proc = tokio::process::Command::new(&command.program);
        proc.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        // Detach from our process group so the daemon survives us.
        #[cfg(unix)]
        proc.process_group(0);

        match proc.spawn() {
            Ok(child) => {
                debug!(command = %command, pid = ?child.id(), "launched detached process");
                Attempt::Succeeded
            }
            Err(e) => spawn_failure(e),
        }
    }

    async fn run(command: &CommandSpec, timeout: Duration) -> Attempt {
        let mut proc = tokio::process::Command::new(&command.program);
        proc.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = match proc.spawn() {
            Ok(child) => child,
            Err(e) => return spawn_failure(e),
        };

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) if output.status.success() => Attempt::Succeeded,
            Ok(Ok(output)) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let stderr = stderr.trim();
                let mut detail = match output.status.code() {
                    Some(code) => format!("exited with status {code}"),
                    None => "terminated by signal".to_string(),
                };
                if !stderr.is_empty() {
                    detail.push_str(": ");
                    detail.push_str(stderr);
                }
                Attempt::Failed(detail)
            }
            Ok(Err(e)) => Attempt::Failed(format!("wait failed: {e}")),
            Err(_) => Attempt::TimedOut,
        }
    }
}

fn spawn_failure(err: io::Error) -> Attempt {
    if err.kind() == io::ErrorKind::NotFound {
        Attempt::NotFound
    } else {
        Attempt::Failed(format!("spawn failed: {err}"))
    }
}

impl CandidateExecutor for SystemExecutor {
    fn execute<'a>(
        &'a self,
        command: &'a CommandSpec,
        mode: LaunchMode,
        timeout: Duration,
    ) -> BoxFuture<'a, Attempt> {
        Box::pin(async move {
            match mode {
                LaunchMode::Launch => Self::launch(command).await,
                LaunchMode::Run => Self::run(command, timeout).await,
            }
        })
    }
}

/// What a timed-out candidate does to the rest of the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeoutPolicy {
    /// End the operation with a "timed out" failure.
    #[default]
    Abort,
    /// Count the timeout as this candidate's failure and try the next one.
    Continue,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown timeout policy {0:?} (expected \"abort\" or \"continue\")")]
pub struct UnknownTimeoutPolicy(String);

impl FromStr for TimeoutPolicy {
    type Err = UnknownTimeoutPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "abort" => Ok(TimeoutPolicy::Abort),
            "continue" => Ok(TimeoutPolicy::Continue),
            other => Err(UnknownTimeoutPolicy(other.to_string())),
        }
    }
}

/// Terminal result of one lifecycle operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationResult {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl OperationResult {
    pub fn succeeded(command: impl Into<String>) -> Self {
        Self {
            success: true,
            command: Some(command.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            command: None,
            error: Some(error.into()),
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    /// The candidate that succeeded.
    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

impl fmt::Display for OperationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.command, &self.error) {
            (Some(command), _) => write!(f, "ok ({command})"),
            (None, Some(error)) => write!(f, "failed: {error}"),
            (None, None) => f.write_str(if self.success { "ok" } else { "failed" }),
        }
    }
}

/// Tries candidates in order until one succeeds.
#[derive(Clone)]
pub struct FallbackRunner {
    executor: Arc<dyn CandidateExecutor>,
    command_timeout: Duration,
    timeout_policy: TimeoutPolicy,
}

impl fmt::Debug for FallbackRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackRunner")
            .field("command_timeout", &self.command_timeout)
            .field("timeout_policy", &self.timeout_policy)
            .finish_non_exhaustive()
    }
}

impl FallbackRunner {
    pub fn new(executor: Arc<dyn CandidateExecutor>, command_timeout: Duration) -> Self {
        Self {
            executor,
            command_timeout,
            timeout_policy: TimeoutPolicy::default(),
        }
    }

    /// A runner that spawns real processes.
    pub fn system(command_timeout: Duration) -> Self {
        Self::new(Arc::new(SystemExecutor), command_timeout)
    }

    pub fn with_timeout_policy(mut self, policy: TimeoutPolicy) -> Self {
        self.timeout_policy = policy;
        self
    }

    pub fn timeout_policy(&self) -> TimeoutPolicy {
        self.timeout_policy
    }

    /// Try `candidates` in order. The first success wins; intermediate
    /// failures are only logged.
    pub async fn run(&self, candidates: &[CommandSpec], mode: LaunchMode) -> OperationResult {
        for command in candidates {
            let attempt = self
                .executor
                .execute(command, mode, self.command_timeout)
                .await;

            match attempt {
                Attempt::Succeeded => {
                    info!(command = %command, ?mode, "candidate succeeded");
                    return OperationResult::succeeded(command.describe());
                }
                Attempt::NotFound => {
                    debug!(command = %command, "candidate not found, trying next");
                }
                Attempt::Failed(detail) => {
                    warn!(command = %command, %detail, "candidate failed");
                }
                Attempt::TimedOut => {
                    warn!(
                        command = %command,
                        timeout_secs = self.command_timeout.as_secs_f64(),
                        policy = ?self.timeout_policy,
                        "candidate timed out"
                    );
                    if self.timeout_policy == TimeoutPolicy::Abort {
                        return OperationResult::failed(format!("{command}: timed out"));
                    }
                }
            }
        }

        warn!(candidates = candidates.len(), "{EXHAUSTED}");
        OperationResult::failed(EXHAUSTED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Returns a fixed outcome per program name and records what was tried.
    #[derive(Default)]
    struct ScriptedExecutor {
        outcomes: HashMap<String, Attempt>,
        tried: Mutex<Vec<String>>,
    }

    impl ScriptedExecutor {
        fn with(mut self, program: &str, attempt: Attempt) -> Self {
            self.outcomes.insert(program.to_string(), attempt);
            self
        }

        fn tried(&self) -> Vec<String> {
            self.tried.lock().unwrap().clone()
        }
    }

    impl CandidateExecutor for ScriptedExecutor {
        fn execute<'a>(
            &'a self,
            command: &'a CommandSpec,
            _mode: LaunchMode,
            _timeout: Duration,
        ) -> BoxFuture<'a, Attempt> {
            self.tried.lock().unwrap().push(command.program.clone());
            let attempt = self
                .outcomes
                .get(&command.program)
                .cloned()
                .unwrap_or(Attempt::NotFound);
            Box::pin(async move { attempt })
        }
    }

    fn cmd(program: &str) -> CommandSpec {
        CommandSpec::new(program, Vec::<String>::new())
    }

    fn scripted(executor: ScriptedExecutor) -> (Arc<ScriptedExecutor>, FallbackRunner) {
        let executor = Arc::new(executor);
        let runner = FallbackRunner::new(executor.clone(), Duration::from_secs(1));
        (executor, runner)
    }

    #[test]
    fn test_command_spec_describe() {
        let spec = CommandSpec::new("systemctl", ["start", "ollama"]);
        assert_eq!(spec.describe(), "systemctl start ollama");
        assert_eq!(spec.to_string(), "systemctl start ollama");
        assert_eq!(cmd("true").describe(), "true");
    }

    #[test]
    fn test_commands_from_config_skips_empty() {
        let argvs = vec![
            vec!["ollama".to_string(), "serve".to_string()],
            vec![],
            vec!["killall".to_string(), "ollama".to_string()],
        ];
        let specs = commands_from_config(&argvs);
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[1], CommandSpec::new("killall", ["ollama"]));
    }

    #[test]
    fn test_timeout_policy_parse() {
        assert_eq!("abort".parse::<TimeoutPolicy>().unwrap(), TimeoutPolicy::Abort);
        assert_eq!(
            "continue".parse::<TimeoutPolicy>().unwrap(),
            TimeoutPolicy::Continue
        );
        assert!("retry".parse::<TimeoutPolicy>().is_err());
    }

    #[tokio::test]
    async fn test_not_found_then_success() {
        let (executor, runner) =
            scripted(ScriptedExecutor::default().with("b", Attempt::Succeeded));

        let result = runner.run(&[cmd("a"), cmd("b")], LaunchMode::Run).await;
        assert_eq!(result, OperationResult::succeeded("b"));
        assert!(result.error().is_none());
        assert_eq!(executor.tried(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_all_not_found_is_exhausted() {
        let (_, runner) = scripted(ScriptedExecutor::default());

        let result = runner.run(&[cmd("a"), cmd("b")], LaunchMode::Run).await;
        assert!(!result.success());
        assert_eq!(result.error(), Some(EXHAUSTED));
        assert!(result.command().is_none());
    }

    #[tokio::test]
    async fn test_empty_candidate_list_is_exhausted() {
        let (_, runner) = scripted(ScriptedExecutor::default());
        let result = runner.run(&[], LaunchMode::Launch).await;
        assert_eq!(result.error(), Some(EXHAUSTED));
    }

    #[tokio::test]
    async fn test_first_success_short_circuits() {
        let (executor, runner) = scripted(
            ScriptedExecutor::default()
                .with("a", Attempt::Succeeded)
                .with("b", Attempt::Succeeded),
        );

        let result = runner.run(&[cmd("a"), cmd("b")], LaunchMode::Run).await;
        assert_eq!(result.command(), Some("a"));
        assert_eq!(executor.tried(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_failure_advances_and_is_not_reported() {
        let (executor, runner) = scripted(
            ScriptedExecutor::default()
                .with("a", Attempt::Failed("exited with status 1".into()))
                .with("b", Attempt::Failed("exited with status 1".into())),
        );

        let result = runner.run(&[cmd("a"), cmd("b")], LaunchMode::Run).await;
        assert_eq!(result.error(), Some(EXHAUSTED));
        assert_eq!(executor.tried(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_timeout_aborts_chain_by_default() {
        let (executor, runner) = scripted(
            ScriptedExecutor::default()
                .with("slow", Attempt::TimedOut)
                .with("b", Attempt::Succeeded),
        );

        let result = runner.run(&[cmd("slow"), cmd("b")], LaunchMode::Run).await;
        assert!(!result.success());
        assert_eq!(result.error(), Some("slow: timed out"));
        assert_eq!(executor.tried(), vec!["slow"]);
    }

    #[tokio::test]
    async fn test_timeout_continues_when_configured() {
        let (executor, runner) = scripted(
            ScriptedExecutor::default()
                .with("slow", Attempt::TimedOut)
                .with("b", Attempt::Succeeded),
        );
        let runner = runner.with_timeout_policy(TimeoutPolicy::Continue);

        let result = runner.run(&[cmd("slow"), cmd("b")], LaunchMode::Run).await;
        assert_eq!(result, OperationResult::succeeded("b"));
        assert_eq!(executor.tried(), vec!["slow", "b"]);
    }

    #[test]
    fn test_operation_result_json() {
        let ok = serde_json::to_value(OperationResult::succeeded("ollama serve")).unwrap();
        assert_eq!(ok, serde_json::json!({"success": true, "command": "ollama serve"}));

        let err = serde_json::to_value(OperationResult::failed(EXHAUSTED)).unwrap();
        assert_eq!(err, serde_json::json!({"success": false, "error": EXHAUSTED}));
    }

    #[cfg(unix)]
    mod system {
        use super::*;
        use pretty_assertions::assert_eq;

        const MISSING: &str = "herdctl-test-no-such-binary";

        #[tokio::test]
        async fn test_missing_binary_is_not_found() {
            let attempt = SystemExecutor
                .execute(&cmd(MISSING), LaunchMode::Run, Duration::from_secs(1))
                .await;
            assert_eq!(attempt, Attempt::NotFound);
        }

        #[tokio::test]
        async fn test_run_mode_exit_status() {
            let ok = SystemExecutor
                .execute(&cmd("true"), LaunchMode::Run, Duration::from_secs(5))
                .await;
            assert_eq!(ok, Attempt::Succeeded);

            let failed = SystemExecutor
                .execute(&cmd("false"), LaunchMode::Run, Duration::from_secs(5))
                .await;
            assert!(matches!(failed, Attempt::Failed(_)), "{failed:?}");
        }

        #[tokio::test]
        async fn test_run_mode_timeout() {
            let sleep = CommandSpec::new("sleep", ["5"]);
            let attempt = SystemExecutor
                .execute(&sleep, LaunchMode::Run, Duration::from_millis(100))
                .await;
            assert_eq!(attempt, Attempt::TimedOut);
        }

        #[tokio::test]
        async fn test_launch_mode_ignores_exit_status() {
            // `false` exits non-zero, but launching it worked.
            let attempt = SystemExecutor
                .execute(&cmd("false"), LaunchMode::Launch, Duration::from_secs(1))
                .await;
            assert_eq!(attempt, Attempt::Succeeded);
        }

        #[tokio::test]
        async fn test_system_runner_fallback() {
            let runner = FallbackRunner::system(Duration::from_secs(5));
            let result = runner
                .run(&[cmd(MISSING), cmd("true")], LaunchMode::Run)
                .await;
            assert_eq!(result, OperationResult::succeeded("true"));
        }

        #[tokio::test]
        async fn test_system_runner_exhausted() {
            let runner = FallbackRunner::system(Duration::from_secs(5));
            let result = runner
                .run(
                    &[cmd(MISSING), cmd("herdctl-test-another-missing")],
                    LaunchMode::Launch,
                )
                .await;
            assert_eq!(result.error(), Some(EXHAUSTED));
        }

        #[tokio::test]
        async fn test_unexecutable_candidate_fails_and_chain_continues() {
            use std::os::unix::fs::PermissionsExt;

            let dir = tempfile::tempdir().unwrap();
            let script = dir.path().join("not-executable");
            std::fs::write(&script, "#!/bin/sh\nexit 0\n").unwrap();
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o644)).unwrap();
            let script = cmd(script.to_str().unwrap());

            let attempt = SystemExecutor
                .execute(&script, LaunchMode::Launch, Duration::from_secs(1))
                .await;
            assert!(
                matches!(&attempt, Attempt::Failed(detail) if detail.starts_with("spawn failed:")),
                "{attempt:?}"
            );

            let runner = FallbackRunner::system(Duration::from_secs(5));
            let result = runner.run(&[script, cmd("true")], LaunchMode::Run).await;
            assert_eq!(result, OperationResult::succeeded("true"));
        }

        #[tokio::test]
        async fn test_system_runner_timeout_policies() {
            let candidates = [CommandSpec::new("sleep", ["5"]), cmd("true")];

            let abort = FallbackRunner::system(Duration::from_millis(100));
            let result = abort.run(&candidates, LaunchMode::Run).await;
            assert!(result.error().unwrap().contains("timed out"));

            let cont = FallbackRunner::system(Duration::from_millis(100))
                .with_timeout_policy(TimeoutPolicy::Continue);
            let result = cont.run(&candidates, LaunchMode::Run).await;
            assert_eq!(result.command(), Some("true"));
        }
    }
}
