//! Logs panel: this process's own tracing events as a table.

use std::collections::VecDeque;
use std::ops::Range;

use herdctl_core::LogReader;
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Row, Table},
};
use tracing::Level;

use super::PanelState;

const MAX_LINES: usize = 1000;

/// Borders plus the header row.
const CHROME_ROWS: u16 = 3;

pub struct LogsPanel {
    reader: LogReader,
    lines: VecDeque<LogLine>,
    next_seq: u64,
    /// Index of the first visible line; `None` follows the newest entries.
    anchor: Option<usize>,
    /// Body rows that fit in the last rendered frame.
    viewport: std::cell::Cell<usize>,
}

struct LogLine {
    time: String,
    level: Level,
    source: String,
    message: String,
}

impl LogsPanel {
    pub fn new(reader: LogReader) -> Self {
        Self {
            reader,
            lines: VecDeque::new(),
            next_seq: 0,
            anchor: None,
            viewport: std::cell::Cell::new(0),
        }
    }

    /// Pull entries recorded since the last refresh. A scrolled-back view
    /// stays on the same lines while new ones arrive.
    pub fn refresh(&mut self) {
        let fresh = self.reader.entries_since(self.next_seq);
        if let Some(last) = fresh.last() {
            self.next_seq = last.seq + 1;
        }
        self.lines.extend(fresh.into_iter().map(|e| LogLine {
            time: e.timestamp.format("%H:%M:%S").to_string(),
            level: e.level,
            source: short_source(&e.target).to_string(),
            message: e.message,
        }));

        let evicted = self.lines.len().saturating_sub(MAX_LINES);
        self.lines.drain(..evicted);
        if let Some(top) = self.anchor.as_mut() {
            *top = top.saturating_sub(evicted);
        }
    }

    pub fn is_following(&self) -> bool {
        self.anchor.is_none()
    }

    /// Lines shown in a body `height` rows tall.
    fn window(&self, height: usize) -> Range<usize> {
        let len = self.lines.len();
        match self.anchor {
            None => len.saturating_sub(height)..len,
            Some(top) => top.min(len)..(top + height).min(len),
        }
    }

    /// First line index when following.
    fn bottom_top(&self) -> usize {
        self.lines.len().saturating_sub(self.viewport.get())
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let height = area.height.saturating_sub(CHROME_ROWS) as usize;
        self.viewport.set(height);

        let rows = self.lines.range(self.window(height)).map(|line| {
            Row::new(vec![
                Cell::from(line.time.as_str()).style(Style::default().fg(Color::DarkGray)),
                Cell::from(line.level.as_str()).style(level_style(line.level)),
                Cell::from(line.source.as_str()).style(Style::default().fg(Color::Gray)),
                Cell::from(line.message.as_str()),
            ])
        });

        let mode = match self.anchor {
            None => "following".to_string(),
            Some(top) => format!("from line {}", top + 1),
        };
        let title = format!(" Logs ({}, {mode}) ", self.lines.len());

        let table = Table::new(
            rows,
            [
                Constraint::Length(8),
                Constraint::Length(5),
                Constraint::Length(12),
                Constraint::Fill(1),
            ],
        )
        .header(
            Row::new(vec!["Time", "Level", "Source", "Message"])
                .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .block(Block::default().title(title).borders(Borders::ALL));
        frame.render_widget(table, area);
    }
}

/// Last path segment of a tracing target: `herdctl_core::probe` is `probe`.
fn short_source(target: &str) -> &str {
    target.rsplit("::").next().unwrap_or(target)
}

fn level_style(level: Level) -> Style {
    match level {
        Level::ERROR => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        Level::WARN => Style::default().fg(Color::Yellow),
        Level::INFO => Style::default().fg(Color::Cyan),
        Level::DEBUG => Style::default().fg(Color::Gray),
        Level::TRACE => Style::default().fg(Color::DarkGray),
    }
}

impl PanelState for LogsPanel {
    fn scroll_down(&mut self, n: usize) {
        if let Some(top) = self.anchor {
            let top = top + n;
            self.anchor = (top < self.bottom_top()).then_some(top);
        }
    }

    fn scroll_up(&mut self, n: usize) {
        let top = self.anchor.unwrap_or_else(|| self.bottom_top());
        self.anchor = Some(top.saturating_sub(n));
    }

    fn scroll_to_top(&mut self) {
        self.anchor = Some(0);
    }

    fn scroll_to_bottom(&mut self) {
        self.anchor = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herdctl_core::LogCollector;
    use pretty_assertions::assert_eq;
    use tracing_subscriber::layer::SubscriberExt;

    /// Run `emit` under a collector and return a refreshed panel over it.
    fn capture(emit: impl FnOnce()) -> LogsPanel {
        let collector = LogCollector::new(2 * MAX_LINES);
        let mut panel = LogsPanel::new(collector.reader());
        let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(collector));
        emit();
        panel.refresh();
        panel
    }

    fn numbered(count: usize) -> impl FnOnce() {
        move || {
            for i in 0..count {
                tracing::info!("line {i}");
            }
        }
    }

    #[test]
    fn test_refresh_is_incremental() {
        let collector = LogCollector::new(100);
        let reader = collector.reader();
        let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(collector));

        let mut panel = LogsPanel::new(reader);
        tracing::info!("first");
        panel.refresh();
        panel.refresh();
        assert_eq!(panel.lines.len(), 1);

        tracing::warn!(code = 7, "second");
        panel.refresh();
        assert_eq!(panel.lines.len(), 2);
        assert_eq!(panel.lines[1].level, Level::WARN);
        assert_eq!(panel.lines[1].message, "second code=7");
        assert_eq!(panel.lines[1].source, "tests");
    }

    #[test]
    fn test_short_source() {
        assert_eq!(short_source("herdctl_core::controller"), "controller");
        assert_eq!(short_source("herdctl_tui"), "herdctl_tui");
    }

    #[test]
    fn test_following_shows_newest_lines() {
        let panel = capture(numbered(20));
        assert!(panel.is_following());
        assert_eq!(panel.window(5), 15..20);
        assert_eq!(panel.window(50), 0..20);
    }

    #[test]
    fn test_scrolled_view_stays_put_as_lines_arrive() {
        let collector = LogCollector::new(100);
        let mut panel = LogsPanel::new(collector.reader());
        let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(collector));
        numbered(20)();
        panel.refresh();
        panel.viewport.set(5);

        panel.scroll_up(3);
        assert!(!panel.is_following());
        assert_eq!(panel.window(5), 12..17);

        numbered(10)();
        panel.refresh();
        assert_eq!(panel.window(5), 12..17);
    }

    #[test]
    fn test_scroll_down_to_bottom_resumes_following() {
        let mut panel = capture(numbered(20));
        panel.viewport.set(5);

        panel.scroll_up(4);
        panel.scroll_down(2);
        assert_eq!(panel.anchor, Some(13));

        panel.scroll_down(10);
        assert!(panel.is_following());
    }

    #[test]
    fn test_scroll_to_top_and_bottom() {
        let mut panel = capture(numbered(20));
        panel.viewport.set(5);

        panel.scroll_to_top();
        assert_eq!(panel.window(5), 0..5);

        panel.scroll_to_bottom();
        assert!(panel.is_following());
        assert_eq!(panel.window(5), 15..20);
    }

    #[test]
    fn test_eviction_keeps_anchor_on_same_line() {
        let collector = LogCollector::new(2 * MAX_LINES);
        let mut panel = LogsPanel::new(collector.reader());
        let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(collector));
        numbered(MAX_LINES)();
        panel.refresh();
        panel.viewport.set(5);

        panel.scroll_to_top();
        panel.scroll_down(10);
        numbered(5)();
        panel.refresh();

        assert_eq!(panel.lines.len(), MAX_LINES);
        assert_eq!(panel.anchor, Some(5));
        assert_eq!(panel.lines[5].message, "line 10");
    }

    #[test]
    fn test_scroll_on_empty_panel() {
        let mut panel = LogsPanel::new(LogCollector::new(10).reader());
        panel.scroll_up(5);
        assert_eq!(panel.window(5), 0..0);
        panel.scroll_down(5);
        assert!(panel.is_following());
    }
}
