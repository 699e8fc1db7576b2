//! Which lifecycle controls a front-end should offer.

use serde::Serialize;

use crate::status::ServerState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ControlAvailability {
    pub start: bool,
    pub stop: bool,
    pub restart: bool,
}

impl ControlAvailability {
    pub const ALL: Self = Self {
        start: true,
        stop: true,
        restart: true,
    };

    pub const NONE: Self = Self {
        start: false,
        stop: false,
        restart: false,
    };

    /// Derive from the latest known state. Everything is disabled while an
    /// operation is in flight; unclear states leave every control enabled.
    pub fn for_state(state: ServerState, busy: bool) -> Self {
        if busy {
            return Self::NONE;
        }
        match state {
            ServerState::Running => Self {
                start: false,
                ..Self::ALL
            },
            ServerState::Stopped => Self {
                stop: false,
                restart: false,
                ..Self::ALL
            },
            ServerState::Timeout | ServerState::Error | ServerState::Unknown => Self::ALL,
        }
    }
}
