//! Lifecycle controller: start, stop and restart the daemon.
//!
//! Composes a [`FallbackRunner`] with the configured candidate lists and
//! inter-step delays. The controller never checks that an operation reached
//! its intended end state; the next probe does that.

use std::sync::Arc;
use std::time::Duration;

use herdctl_config::LifecycleConfig;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::runner::{
    CandidateExecutor, CommandSpec, FallbackRunner, LaunchMode, OperationResult, SystemExecutor,
    TimeoutPolicy, commands_from_config,
};

/// Which lifecycle operation to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Start,
    Stop,
    Restart,
}

impl LifecycleAction {
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleAction::Start => "start",
            LifecycleAction::Stop => "stop",
            LifecycleAction::Restart => "restart",
        }
    }
}

impl std::fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct LifecycleController {
    runner: FallbackRunner,
    start_commands: Vec<CommandSpec>,
    stop_commands: Vec<CommandSpec>,
    start_settle: Duration,
    restart_delay: Duration,
    /// Held for the whole of each operation so at most one runs at a time.
    in_flight: Arc<Mutex<()>>,
}

impl LifecycleController {
    pub fn new(
        runner: FallbackRunner,
        start_commands: Vec<CommandSpec>,
        stop_commands: Vec<CommandSpec>,
    ) -> Self {
        Self {
            runner,
            start_commands,
            stop_commands,
            start_settle: Duration::from_secs(2),
            restart_delay: Duration::from_secs(3),
            in_flight: Arc::new(Mutex::new(())),
        }
    }

    /// Build a controller that spawns real processes.
    pub fn from_config(config: &LifecycleConfig) -> Self {
        Self::with_executor(config, Arc::new(SystemExecutor))
    }

    /// Build from config with a custom executor.
    pub fn with_executor(config: &LifecycleConfig, executor: Arc<dyn CandidateExecutor>) -> Self {
        let policy = config
            .timeout_policy
            .parse::<TimeoutPolicy>()
            .unwrap_or_else(|e| {
                warn!(error = %e, "falling back to the abort timeout policy");
                TimeoutPolicy::Abort
            });
        let runner =
            FallbackRunner::new(executor, config.command_timeout()).with_timeout_policy(policy);

        Self::new(
            runner,
            commands_from_config(&config.start_commands),
            commands_from_config(&config.stop_commands),
        )
        .with_delays(config.start_settle(), config.restart_delay())
    }

    pub fn with_delays(mut self, start_settle: Duration, restart_delay: Duration) -> Self {
        self.start_settle = start_settle;
        self.restart_delay = restart_delay;
        self
    }

    pub fn start_commands(&self) -> &[CommandSpec] {
        &self.start_commands
    }

    pub fn stop_commands(&self) -> &[CommandSpec] {
        &self.stop_commands
    }

    /// Whether a lifecycle operation is currently running.
    pub fn is_busy(&self) -> bool {
        self.in_flight.try_lock().is_err()
    }

    pub async fn run(&self, action: LifecycleAction) -> OperationResult {
        let _guard = self.in_flight.lock().await;
        self.run_locked(action).await
    }

    /// Claim the controller and run `action` on its own task.
    ///
    /// Returns `None` without waiting when another operation holds the
    /// controller. The task keeps running if the handle is dropped, so a
    /// restart always reaches its start half.
    pub fn try_spawn(
        self: &Arc<Self>,
        action: LifecycleAction,
    ) -> Option<JoinHandle<OperationResult>> {
        let guard = self.in_flight.clone().try_lock_owned().ok()?;
        let controller = Arc::clone(self);
        Some(tokio::spawn(async move {
            let _guard = guard;
            controller.run_locked(action).await
        }))
    }

    async fn run_locked(&self, action: LifecycleAction) -> OperationResult {
        match action {
            LifecycleAction::Start => self.start_locked().await,
            LifecycleAction::Stop => self.stop_locked().await,
            LifecycleAction::Restart => self.restart_locked().await,
        }
    }

    /// Launch the daemon, then wait for it to settle before the caller
    /// re-probes.
    pub async fn start(&self) -> OperationResult {
        let _guard = self.in_flight.lock().await;
        self.start_locked().await
    }

    pub async fn stop(&self) -> OperationResult {
        let _guard = self.in_flight.lock().await;
        self.stop_locked().await
    }

    /// Stop, wait, then start. A failed stop does not prevent the start:
    /// "already stopped" looks the same as a real failure from here.
    pub async fn restart(&self) -> OperationResult {
        let _guard = self.in_flight.lock().await;
        self.restart_locked().await
    }

    async fn restart_locked(&self) -> OperationResult {
        let stopped = self.stop_locked().await;
        if !stopped.success() {
            warn!(result = %stopped, "stop half of restart failed, starting anyway");
        }

        tokio::time::sleep(self.restart_delay).await;
        self.start_locked().await
    }

    async fn start_locked(&self) -> OperationResult {
        info!(candidates = self.start_commands.len(), "starting daemon");
        let result = self
            .runner
            .run(&self.start_commands, LaunchMode::Launch)
            .await;
        if result.success() {
            tokio::time::sleep(self.start_settle).await;
        }
        info!(%result, "start finished");
        result
    }

    async fn stop_locked(&self) -> OperationResult {
        info!(candidates = self.stop_commands.len(), "stopping daemon");
        let result = self.runner.run(&self.stop_commands, LaunchMode::Run).await;
        info!(%result, "stop finished");
        result
    }
}
