//! Vim-style keybindings.
//!
//! Maps key events to actions. Supports single keys and the two-key `gg`
//! sequence for scroll-to-top.

use crossterm::event::KeyCode;
use herdctl_core::LifecycleAction;

/// An action the TUI can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    NextPanel,
    PrevPanel,
    GoToPanel(usize),
    ScrollDown,
    ScrollUp,
    HalfPageDown,
    HalfPageUp,
    ScrollToTop,
    ScrollToBottom,
    Lifecycle(LifecycleAction),
    Refresh,
    ToggleAutoRefresh,
    None,
}

/// Key mapper with support for multi-key sequences.
pub struct KeyMapper {
    /// First key of a pending two-key sequence.
    pending: Option<KeyCode>,
}

impl KeyMapper {
    pub fn new() -> Self {
        Self { pending: None }
    }

    /// Feed a key code and return the resolved action.
    ///
    /// A key that starts a sequence yields `Action::None` until the next
    /// key arrives. An unknown sequence drops the first key.
    pub fn resolve(&mut self, key: KeyCode) -> Action {
        if let Some(prev) = self.pending.take() {
            return self.resolve_sequence(prev, key);
        }

        match key {
            KeyCode::Char('q') | KeyCode::Esc => Action::Quit,

            KeyCode::Tab | KeyCode::Char('l') => Action::NextPanel,
            KeyCode::BackTab | KeyCode::Char('h') => Action::PrevPanel,
            KeyCode::Char('1') => Action::GoToPanel(0),
            KeyCode::Char('2') => Action::GoToPanel(1),
            KeyCode::Char('3') => Action::GoToPanel(2),

            KeyCode::Char('j') | KeyCode::Down => Action::ScrollDown,
            KeyCode::Char('k') | KeyCode::Up => Action::ScrollUp,
            KeyCode::Char('d') | KeyCode::PageDown => Action::HalfPageDown,
            KeyCode::Char('u') | KeyCode::PageUp => Action::HalfPageUp,
            KeyCode::Char('G') | KeyCode::End => Action::ScrollToBottom,
            KeyCode::Home => Action::ScrollToTop,

            KeyCode::Char('s') => Action::Lifecycle(LifecycleAction::Start),
            KeyCode::Char('x') => Action::Lifecycle(LifecycleAction::Stop),
            KeyCode::Char('r') => Action::Lifecycle(LifecycleAction::Restart),
            KeyCode::Char('f') | KeyCode::F(5) => Action::Refresh,
            KeyCode::Char('a') => Action::ToggleAutoRefresh,

            KeyCode::Char('g') => {
                self.pending = Some(key);
                Action::None
            }

            _ => Action::None,
        }
    }

    fn resolve_sequence(&mut self, first: KeyCode, second: KeyCode) -> Action {
        match (first, second) {
            (KeyCode::Char('g'), KeyCode::Char('g')) => Action::ScrollToTop,
            _ => self.resolve(second),
        }
    }
}

impl Default for KeyMapper {
    fn default() -> Self {
        Self::new()
    }
}
