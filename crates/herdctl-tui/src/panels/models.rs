//! Models panel: the full inventory as a table.

use herdctl_core::ModelSummary;
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Row, Table},
};

use super::PanelState;

pub struct ModelsPanel {
    models: Vec<ModelSummary>,
    /// Index of the first visible row.
    scroll_offset: usize,
}

impl ModelsPanel {
    pub fn new() -> Self {
        Self {
            models: Vec::new(),
            scroll_offset: 0,
        }
    }

    /// Replace the inventory, keeping the scroll position in range.
    pub fn set_models(&mut self, models: Vec<ModelSummary>) {
        self.models = models;
        self.scroll_offset = self.scroll_offset.min(self.max_offset());
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    fn max_offset(&self) -> usize {
        self.models.len().saturating_sub(1)
    }

    fn rows(&self) -> Vec<[String; 4]> {
        self.models
            .iter()
            .skip(self.scroll_offset)
            .map(|m| {
                [
                    m.name.clone(),
                    m.display_size(),
                    m.modified_at.display(),
                    m.family.clone(),
                ]
            })
            .collect()
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let rows = self
            .rows()
            .into_iter()
            .map(|cells| Row::new(cells.into_iter().map(Cell::from)));

        let title = format!(" Models ({}) ", self.models.len());
        let table = Table::new(
            rows,
            [
                Constraint::Min(24),
                Constraint::Length(12),
                Constraint::Length(18),
                Constraint::Length(12),
            ],
        )
        .header(
            Row::new(vec!["Name", "Size", "Modified", "Family"])
                .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .block(Block::default().title(title).borders(Borders::ALL));
        frame.render_widget(table, area);
    }
}

impl Default for ModelsPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl PanelState for ModelsPanel {
    fn scroll_down(&mut self, n: usize) {
        self.scroll_offset = (self.scroll_offset + n).min(self.max_offset());
    }
    fn scroll_up(&mut self, n: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(n);
    }
    fn scroll_to_top(&mut self) {
        self.scroll_offset = 0;
    }
    fn scroll_to_bottom(&mut self) {
        self.scroll_offset = self.max_offset();
    }
}
