#![deny(unsafe_code)]

//! herdctl-tui: interactive terminal dashboard for a local Ollama daemon.

mod app;
mod keymap;
mod panels;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    ExecutableCommand,
    event::{self, Event, KeyEventKind},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use herdctl_config::AppConfig;
use herdctl_core::{
    DaemonClient, LifecycleController, LogCollector, MonitorHandle, Prober, StatusMonitor,
    StatusSource,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, Tabs},
};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use app::{App, AppEvent, Effect, Panel};
use panels::DashboardView;

const LOG_CAPACITY: usize = 1000;
const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Delay between a finished lifecycle operation and its confirming probe.
const REPROBE_DELAY: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(name = "herdctl-tui", version = herdctl_core::build_info::VERSION, about, long_about = None)]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, default_value = "herdctl.toml")]
    config: PathBuf,

    /// Daemon base URL, overriding the config file.
    #[arg(long)]
    url: Option<String>,
}

/// Shared handles the UI loop hands to background tasks.
struct Services {
    prober: Arc<Prober>,
    controller: Arc<LifecycleController>,
    events: mpsc::UnboundedSender<AppEvent>,
    reprobe_delay: Duration,
}

impl Services {
    fn new(config: &AppConfig, events: mpsc::UnboundedSender<AppEvent>) -> Self {
        let client = Arc::new(DaemonClient::from_config(&config.daemon));
        Self {
            prober: Arc::new(Prober::new(client, config.daemon.probe_timeout())),
            controller: Arc::new(LifecycleController::from_config(&config.lifecycle)),
            events,
            reprobe_delay: REPROBE_DELAY,
        }
    }

    fn start_monitor(&self, config: &AppConfig) -> MonitorHandle {
        let events = self.events.clone();
        StatusMonitor::new(self.prober.clone(), config.monitor.interval())
            .paused(!config.monitor.auto_refresh)
            .start(move |status| {
                let _ = events.send(AppEvent::Status(status));
            })
    }

    fn dispatch(&self, effect: Effect, monitor: &MonitorHandle) {
        match effect {
            Effect::Lifecycle(action) => {
                let controller = self.controller.clone();
                let prober = self.prober.clone();
                let events = self.events.clone();
                let delay = self.reprobe_delay;
                tokio::spawn(async move {
                    let result = controller.run(action).await;
                    if !result.success() {
                        warn!(%action, %result, "lifecycle operation failed");
                    }
                    let _ = events.send(AppEvent::Lifecycle { action, result });

                    tokio::time::sleep(delay).await;
                    let status = prober.probe().await;
                    let _ = events.send(AppEvent::Status(Arc::new(status)));
                });
            }
            Effect::Refresh => {
                let prober = self.prober.clone();
                let events = self.events.clone();
                tokio::spawn(async move {
                    let status = prober.probe().await;
                    let _ = events.send(AppEvent::Status(Arc::new(status)));
                });
            }
            Effect::SetAutoRefresh(enabled) => {
                monitor.set_paused(!enabled);
                info!(enabled, "auto-refresh toggled");
            }
        }
    }
}

fn render(app: &App, frame: &mut Frame) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // tabs
            Constraint::Min(1),    // active panel
            Constraint::Length(3), // status line
        ])
        .split(frame.area());

    let titles = [Panel::Dashboard, Panel::Models, Panel::Logs]
        .iter()
        .enumerate()
        .map(|(i, p)| format!("{} {}", i + 1, p.title()));
    let tabs = Tabs::new(titles)
        .select(app.active_panel.index())
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .block(
            Block::default()
                .title(format!(
                    " Ollama Server Manager  {} ",
                    herdctl_core::build_info::version_string()
                ))
                .borders(Borders::BOTTOM),
        );
    frame.render_widget(tabs, chunks[0]);

    match app.active_panel {
        Panel::Dashboard => {
            let view = DashboardView {
                status: app.status.as_deref(),
                base_url: &app.base_url,
                last_checked: app.last_checked,
                controls: app.controls(),
            };
            app.dashboard.render(frame, chunks[1], &view);
        }
        Panel::Models => app.models.render(frame, chunks[1]),
        Panel::Logs => app.logs.render(frame, chunks[1]),
    }

    let status_line = if app.message.is_empty() {
        app.help_line()
    } else {
        format!(" {}", app.message)
    };
    let status = Paragraph::new(status_line)
        .style(Style::default().fg(Color::DarkGray))
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(status, chunks[2]);
}

async fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    services: &Services,
    monitor: &MonitorHandle,
    events: &mut mpsc::UnboundedReceiver<AppEvent>,
) -> Result<()> {
    while !app.should_quit {
        while let Ok(event) = events.try_recv() {
            app.apply(event);
        }
        app.tick();
        terminal.draw(|frame| render(app, frame))?;

        if event::poll(POLL_INTERVAL)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    let action = app.keymap.resolve(key.code);
                    if let Some(effect) = app.handle_action(action) {
                        services.dispatch(effect, monitor);
                    }
                }
            }
        } else {
            tokio::task::yield_now().await;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::load_or_default(&args.config)
        .await
        .with_context(|| format!("failed to load config from {}", args.config.display()))?;
    if let Some(url) = args.url {
        config.daemon.base_url = url;
        config.validate().context("invalid --url")?;
    }

    // The terminal belongs to the UI, so logs go to the Logs panel.
    let collector = LogCollector::new(LOG_CAPACITY);
    let log_reader = collector.reader();
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with(collector)
        .init();
    info!(base_url = %config.daemon.base_url, "starting herdctl-tui");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let services = Services::new(&config, tx);
    let monitor = services.start_monitor(&config);
    let mut app = App::new(&config, log_reader);

    enable_raw_mode()?;
    io::stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;

    let outcome = run(&mut terminal, &mut app, &services, &monitor, &mut rx).await;

    // Restore the terminal before reporting any loop error.
    disable_raw_mode()?;
    io::stdout().execute(LeaveAlternateScreen)?;
    monitor.cancel().await;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use herdctl_core::{LifecycleAction, ServerState};
    use herdctl_test_utils::config::TestConfigBuilder;
    use herdctl_test_utils::fake_daemon::{FakeDaemon, FakeModel};
    use pretty_assertions::assert_eq;

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<AppEvent>) -> AppEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn test_monitor_feeds_status_events() {
        let daemon = FakeDaemon::healthy(vec![FakeModel::new("phi3", 1024, "phi3")]).await;
        let config = TestConfigBuilder::new().base_url(&daemon.base_url()).build();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let services = Services::new(&config, tx);
        let monitor = services.start_monitor(&config);

        let AppEvent::Status(status) = next_event(&mut rx).await else {
            panic!("expected a status event");
        };
        assert_eq!(status.state(), ServerState::Running);
        assert_eq!(status.model_count(), Some(1));
        monitor.cancel().await;
    }

    #[cfg(unix)]
    #[test_log::test(tokio::test)]
    async fn test_lifecycle_effect_reports_then_reprobes() {
        let daemon = FakeDaemon::healthy(vec![]).await;
        let config = TestConfigBuilder::new()
            .base_url(&daemon.base_url())
            .stop_commands(&[&["true"]])
            .instant_lifecycle()
            .auto_refresh(false)
            .build();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut services = Services::new(&config, tx);
        services.reprobe_delay = Duration::from_millis(10);
        let monitor = services.start_monitor(&config);

        // Paused monitors still deliver their first probe.
        assert!(matches!(next_event(&mut rx).await, AppEvent::Status(_)));

        services.dispatch(Effect::Lifecycle(LifecycleAction::Stop), &monitor);
        match next_event(&mut rx).await {
            AppEvent::Lifecycle { action, result } => {
                assert_eq!(action, LifecycleAction::Stop);
                assert_eq!(result.command(), Some("true"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(matches!(next_event(&mut rx).await, AppEvent::Status(_)));
        monitor.cancel().await;
    }

    #[tokio::test]
    async fn test_auto_refresh_effect_pauses_monitor() {
        let config = TestConfigBuilder::new()
            .base_url(&herdctl_test_utils::fake_daemon::unused_local_url().await)
            .build();
        let (tx, _rx) = mpsc::unbounded_channel();
        let services = Services::new(&config, tx);
        let monitor = services.start_monitor(&config);

        services.dispatch(Effect::SetAutoRefresh(false), &monitor);
        assert!(monitor.is_paused());
        services.dispatch(Effect::SetAutoRefresh(true), &monitor);
        assert!(!monitor.is_paused());
        monitor.cancel().await;
    }
}
