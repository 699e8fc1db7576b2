//! Dashboard panel: daemon status, host, latency and a model preview.

use chrono::{DateTime, Local};
use herdctl_core::{ControlAvailability, ServerState, ServerStatus};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph},
};

use super::PanelState;

/// Models listed before the preview collapses into "... and N more".
const PREVIEW_MODELS: usize = 5;

/// Everything the dashboard shows, borrowed from the app for one frame.
pub struct DashboardView<'a> {
    pub status: Option<&'a ServerStatus>,
    pub base_url: &'a str,
    pub last_checked: Option<DateTime<Local>>,
    pub controls: ControlAvailability,
}

pub struct DashboardPanel {
    pub scroll_offset: usize,
}

impl DashboardPanel {
    pub fn new() -> Self {
        Self { scroll_offset: 0 }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, view: &DashboardView<'_>) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(7), Constraint::Min(0)])
            .split(area);

        let status = Paragraph::new(status_lines(view))
            .block(Block::default().title(" Status ").borders(Borders::ALL));
        frame.render_widget(status, chunks[0]);

        let models = Paragraph::new(
            model_preview(view.status)
                .into_iter()
                .map(Line::from)
                .collect::<Vec<_>>(),
        )
        .scroll((self.scroll_offset.min(u16::MAX as usize) as u16, 0))
        .block(Block::default().title(" Models ").borders(Borders::ALL));
        frame.render_widget(models, chunks[1]);
    }
}

impl Default for DashboardPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl PanelState for DashboardPanel {
    fn scroll_down(&mut self, n: usize) {
        self.scroll_offset = self.scroll_offset.saturating_add(n);
    }
    fn scroll_up(&mut self, n: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(n);
    }
    fn scroll_to_top(&mut self) {
        self.scroll_offset = 0;
    }
    fn scroll_to_bottom(&mut self) {
        // Preview is at most six lines, no-op
    }
}

fn state_color(state: ServerState) -> Color {
    match state {
        ServerState::Running => Color::Green,
        ServerState::Stopped => Color::Red,
        ServerState::Timeout => Color::Yellow,
        ServerState::Error => Color::Magenta,
        ServerState::Unknown => Color::DarkGray,
    }
}

fn field<'a>(label: &'a str, value: impl Into<Span<'a>>) -> Line<'a> {
    Line::from(vec![
        Span::styled(format!("{label:<14}"), Style::default().fg(Color::Gray)),
        value.into(),
    ])
}

fn status_lines<'a>(view: &'a DashboardView<'a>) -> Vec<Line<'a>> {
    let state = view.status.map_or(ServerState::Unknown, ServerStatus::state);
    let last_checked = view
        .last_checked
        .map_or_else(|| "never".to_string(), |t| t.format("%H:%M:%S").to_string());
    let response = view
        .status
        .and_then(ServerStatus::response_time_secs)
        .map_or_else(|| "-".to_string(), |secs| format!("{secs:.2}s"));

    let mut lines = vec![
        field(
            "Status:",
            Span::styled(
                state.label(),
                Style::default()
                    .fg(state_color(state))
                    .add_modifier(Modifier::BOLD),
            ),
        ),
        field("Host:", Span::raw(view.base_url)),
        field("Last checked:", Span::raw(last_checked)),
        field("Response:", Span::raw(response)),
    ];
    if let Some(error) = view.status.and_then(ServerStatus::error_message) {
        lines.push(field(
            "Error:",
            Span::styled(error, Style::default().fg(Color::Red)),
        ));
    }
    lines.push(field("Controls:", Span::raw(control_hint(view.controls))));
    lines
}

fn control_hint(controls: ControlAvailability) -> String {
    let mut keys = Vec::new();
    if controls.start {
        keys.push("[s]tart");
    }
    if controls.stop {
        keys.push("[x] stop");
    }
    if controls.restart {
        keys.push("[r]estart");
    }
    if keys.is_empty() {
        "busy".to_string()
    } else {
        keys.join("  ")
    }
}

fn model_preview(status: Option<&ServerStatus>) -> Vec<String> {
    let Some(models) = status.and_then(ServerStatus::models) else {
        return vec!["No model information available".to_string()];
    };
    if models.is_empty() {
        return vec!["No models installed".to_string()];
    }

    let mut lines: Vec<String> = models
        .iter()
        .take(PREVIEW_MODELS)
        .map(|m| format!("- {} ({})", m.name, m.size_mb()))
        .collect();
    if models.len() > PREVIEW_MODELS {
        lines.push(format!("... and {} more", models.len() - PREVIEW_MODELS));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use herdctl_core::ModelSummary;
    use pretty_assertions::assert_eq;

    fn text(lines: &[Line<'_>]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    #[test]
    fn test_preview_truncates_after_five() {
        let models = (0..7)
            .map(|i| ModelSummary::new(format!("m{i}"), 1024 * 1024, ""))
            .collect();
        let status = ServerStatus::running(models, 0.1);

        let lines = model_preview(Some(&status));
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "- m0 (1.0 MB)");
        assert_eq!(lines[5], "... and 2 more");
    }

    #[test]
    fn test_preview_without_inventory() {
        assert_eq!(
            model_preview(Some(&ServerStatus::stopped("Connection refused"))),
            vec!["No model information available"]
        );
        assert_eq!(
            model_preview(Some(&ServerStatus::running(vec![], 0.1))),
            vec!["No models installed"]
        );
    }

    #[test]
    fn test_status_lines_show_error() {
        let status = ServerStatus::stopped("Connection refused");
        let view = DashboardView {
            status: Some(&status),
            base_url: "http://localhost:11434",
            last_checked: None,
            controls: ControlAvailability::for_state(status.state(), false),
        };

        let lines = text(&status_lines(&view));
        assert!(lines[0].ends_with("Stopped"));
        assert!(lines[1].ends_with("http://localhost:11434"));
        assert!(lines[2].ends_with("never"));
        assert!(lines[3].ends_with("-"));
        assert!(lines[4].ends_with("Connection refused"));
        assert!(lines[5].ends_with("[s]tart"));
    }

    #[test]
    fn test_control_hint_busy() {
        assert_eq!(control_hint(ControlAvailability::NONE), "busy");
    }
}
