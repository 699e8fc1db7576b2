//! Core TUI application state and event handling.
//!
//! [`App`] is owned by the UI loop and never blocks. Key actions that need
//! I/O come back as an [`Effect`] for the loop to dispatch onto a task;
//! results arrive later as [`AppEvent`]s.

use std::sync::Arc;

use chrono::{DateTime, Local};
use herdctl_config::AppConfig;
use herdctl_core::{
    ControlAvailability, LifecycleAction, LogReader, OperationResult, ServerState, ServerStatus,
};

use crate::keymap::{Action, KeyMapper};
use crate::panels::{DashboardPanel, LogsPanel, ModelsPanel, PanelState};

/// The panels available in the TUI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    Dashboard,
    Models,
    Logs,
}

const ALL_PANELS: [Panel; 3] = [Panel::Dashboard, Panel::Models, Panel::Logs];

impl Panel {
    pub fn title(self) -> &'static str {
        match self {
            Panel::Dashboard => "Dashboard",
            Panel::Models => "Models",
            Panel::Logs => "Logs",
        }
    }

    pub fn index(self) -> usize {
        match self {
            Panel::Dashboard => 0,
            Panel::Models => 1,
            Panel::Logs => 2,
        }
    }

    pub fn next(self) -> Self {
        ALL_PANELS[(self.index() + 1) % ALL_PANELS.len()]
    }

    pub fn prev(self) -> Self {
        ALL_PANELS[(self.index() + ALL_PANELS.len() - 1) % ALL_PANELS.len()]
    }
}

/// Results delivered to the UI loop from background tasks.
#[derive(Debug)]
pub enum AppEvent {
    Status(Arc<ServerStatus>),
    Lifecycle {
        action: LifecycleAction,
        result: OperationResult,
    },
}

/// Work the UI loop must dispatch off-thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Lifecycle(LifecycleAction),
    Refresh,
    SetAutoRefresh(bool),
}

pub struct App {
    pub should_quit: bool,
    pub active_panel: Panel,
    pub keymap: KeyMapper,

    pub base_url: String,
    pub status: Option<Arc<ServerStatus>>,
    pub last_checked: Option<DateTime<Local>>,
    /// Operation currently running, if any.
    pub busy: Option<LifecycleAction>,
    pub auto_refresh: bool,
    /// Outcome of the most recent user action.
    pub message: String,

    pub dashboard: DashboardPanel,
    pub models: ModelsPanel,
    pub logs: LogsPanel,
}

impl App {
    pub fn new(config: &AppConfig, log_reader: LogReader) -> Self {
        Self {
            should_quit: false,
            active_panel: Panel::Dashboard,
            keymap: KeyMapper::new(),
            base_url: config.daemon.base_url.clone(),
            status: None,
            last_checked: None,
            busy: None,
            auto_refresh: config.monitor.auto_refresh,
            message: "Checking server status...".to_string(),
            dashboard: DashboardPanel::new(),
            models: ModelsPanel::new(),
            logs: LogsPanel::new(log_reader),
        }
    }

    pub fn state(&self) -> ServerState {
        self.status
            .as_deref()
            .map_or(ServerState::Unknown, ServerStatus::state)
    }

    pub fn controls(&self) -> ControlAvailability {
        ControlAvailability::for_state(self.state(), self.busy.is_some())
    }

    /// Process a resolved action, returning any work to dispatch.
    pub fn handle_action(&mut self, action: Action) -> Option<Effect> {
        match action {
            Action::Quit => self.should_quit = true,
            Action::NextPanel => self.active_panel = self.active_panel.next(),
            Action::PrevPanel => self.active_panel = self.active_panel.prev(),
            Action::GoToPanel(n) => {
                if let Some(&panel) = ALL_PANELS.get(n) {
                    self.active_panel = panel;
                }
            }
            Action::ScrollDown => self.active_panel_state_mut().scroll_down(1),
            Action::ScrollUp => self.active_panel_state_mut().scroll_up(1),
            Action::HalfPageDown => self.active_panel_state_mut().scroll_down(10),
            Action::HalfPageUp => self.active_panel_state_mut().scroll_up(10),
            Action::ScrollToTop => self.active_panel_state_mut().scroll_to_top(),
            Action::ScrollToBottom => self.active_panel_state_mut().scroll_to_bottom(),
            Action::Lifecycle(op) => return self.request_lifecycle(op),
            Action::Refresh => {
                self.message = "Refreshing...".to_string();
                return Some(Effect::Refresh);
            }
            Action::ToggleAutoRefresh => {
                self.auto_refresh = !self.auto_refresh;
                self.message = format!(
                    "Auto-refresh {}",
                    if self.auto_refresh { "on" } else { "off" }
                );
                return Some(Effect::SetAutoRefresh(self.auto_refresh));
            }
            Action::None => {}
        }
        None
    }

    fn request_lifecycle(&mut self, op: LifecycleAction) -> Option<Effect> {
        if let Some(running) = self.busy {
            self.message = format!("Busy: {running} in progress");
            return None;
        }
        let controls = self.controls();
        let allowed = match op {
            LifecycleAction::Start => controls.start,
            LifecycleAction::Stop => controls.stop,
            LifecycleAction::Restart => controls.restart,
        };
        if !allowed {
            self.message = format!("Cannot {op}: server is {}", self.state().as_str());
            return None;
        }

        self.busy = Some(op);
        self.message = match op {
            LifecycleAction::Start => "Starting server...",
            LifecycleAction::Stop => "Stopping server...",
            LifecycleAction::Restart => "Restarting server...",
        }
        .to_string();
        Some(Effect::Lifecycle(op))
    }

    pub fn apply(&mut self, event: AppEvent) {
        match event {
            AppEvent::Status(status) => {
                self.models.set_models(status.models().unwrap_or_default().to_vec());
                self.status = Some(status);
                self.last_checked = Some(Local::now());
                if self.busy.is_none() && self.message.ends_with("...") {
                    self.message.clear();
                }
            }
            AppEvent::Lifecycle { action, result } => {
                self.busy = None;
                self.message = if result.success() {
                    match result.command() {
                        Some(command) => format!("{action} succeeded ({command})"),
                        None => format!("{action} succeeded"),
                    }
                } else {
                    format!(
                        "{action} failed: {}",
                        result.error().unwrap_or("unknown error")
                    )
                };
            }
        }
    }

    /// Tick: refresh data from live sources.
    pub fn tick(&mut self) {
        self.logs.refresh();
    }

    fn active_panel_state_mut(&mut self) -> &mut dyn PanelState {
        match self.active_panel {
            Panel::Dashboard => &mut self.dashboard,
            Panel::Models => &mut self.models,
            Panel::Logs => &mut self.logs,
        }
    }

    pub fn help_line(&self) -> String {
        format!(
            " q:quit  Tab:next  s:start  x:stop  r:restart  f:refresh  a:auto[{auto}]  j/k:scroll  [{panel}]",
            auto = if self.auto_refresh { "on" } else { "off" },
            panel = self.active_panel.title()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herdctl_core::{LogCollector, ModelSummary};
    use pretty_assertions::assert_eq;

    fn make_app() -> App {
        let collector = LogCollector::new(100);
        App::new(&AppConfig::default(), collector.reader())
    }

    fn with_status(app: &mut App, status: ServerStatus) {
        app.apply(AppEvent::Status(Arc::new(status)));
    }

    #[test]
    fn test_panel_cycle_wraps() {
        assert_eq!(Panel::Dashboard.next(), Panel::Models);
        assert_eq!(Panel::Logs.next(), Panel::Dashboard);
        assert_eq!(Panel::Dashboard.prev(), Panel::Logs);
        assert_eq!(Panel::Models.prev(), Panel::Dashboard);
    }

    #[test]
    fn test_app_defaults() {
        let app = make_app();
        assert!(!app.should_quit);
        assert_eq!(app.state(), ServerState::Unknown);
        assert_eq!(app.controls(), ControlAvailability::ALL);
        assert!(app.auto_refresh);
    }

    #[test]
    fn test_goto_panel_out_of_range() {
        let mut app = make_app();
        app.handle_action(Action::GoToPanel(2));
        assert_eq!(app.active_panel, Panel::Logs);
        app.handle_action(Action::GoToPanel(99));
        assert_eq!(app.active_panel, Panel::Logs);
    }

    #[test]
    fn test_start_blocked_while_running() {
        let mut app = make_app();
        with_status(&mut app, ServerStatus::running(vec![], 0.01));

        assert_eq!(app.handle_action(Action::Lifecycle(LifecycleAction::Start)), None);
        assert_eq!(app.message, "Cannot start: server is running");
        assert_eq!(
            app.handle_action(Action::Lifecycle(LifecycleAction::Stop)),
            Some(Effect::Lifecycle(LifecycleAction::Stop))
        );
    }

    #[test]
    fn test_one_operation_at_a_time() {
        let mut app = make_app();
        with_status(&mut app, ServerStatus::stopped("Connection refused"));

        assert_eq!(
            app.handle_action(Action::Lifecycle(LifecycleAction::Start)),
            Some(Effect::Lifecycle(LifecycleAction::Start))
        );
        assert_eq!(app.controls(), ControlAvailability::NONE);
        assert_eq!(app.handle_action(Action::Lifecycle(LifecycleAction::Start)), None);
        assert_eq!(app.message, "Busy: start in progress");

        app.apply(AppEvent::Lifecycle {
            action: LifecycleAction::Start,
            result: OperationResult::succeeded("ollama serve"),
        });
        assert!(app.busy.is_none());
        assert_eq!(app.message, "start succeeded (ollama serve)");
    }

    #[test]
    fn test_failed_operation_message() {
        let mut app = make_app();
        app.handle_action(Action::Lifecycle(LifecycleAction::Restart));
        app.apply(AppEvent::Lifecycle {
            action: LifecycleAction::Restart,
            result: OperationResult::failed("no candidate succeeded"),
        });
        assert_eq!(app.message, "restart failed: no candidate succeeded");
    }

    #[test]
    fn test_status_event_updates_models_and_timestamp() {
        let mut app = make_app();
        with_status(
            &mut app,
            ServerStatus::running(vec![ModelSummary::new("phi3", 1, "")], 0.02),
        );
        assert_eq!(app.state(), ServerState::Running);
        assert_eq!(app.models.len(), 1);
        assert!(app.last_checked.is_some());
        assert!(app.message.is_empty());
    }

    #[test]
    fn test_toggle_auto_refresh() {
        let mut app = make_app();
        assert_eq!(
            app.handle_action(Action::ToggleAutoRefresh),
            Some(Effect::SetAutoRefresh(false))
        );
        assert!(app.help_line().contains("a:auto[off]"));
    }

    #[test]
    fn test_scroll_actions_no_panic() {
        let mut app = make_app();
        for i in 0..ALL_PANELS.len() {
            app.handle_action(Action::GoToPanel(i));
            app.handle_action(Action::ScrollDown);
            app.handle_action(Action::ScrollUp);
            app.handle_action(Action::HalfPageDown);
            app.handle_action(Action::HalfPageUp);
            app.handle_action(Action::ScrollToTop);
            app.handle_action(Action::ScrollToBottom);
        }
    }
}
