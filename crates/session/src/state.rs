use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};

/// Whether instruction-driven execution may start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    #[default]
    Running,
    Paused,
}

/// Pause/resume state machine. Changes only on explicit user signals.
#[derive(Debug, Default)]
pub struct SessionControl {
    state: RunState,
}

impl SessionControl {
    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_paused(&self) -> bool {
        self.state == RunState::Paused
    }

    /// Returns `true` if the state changed.
    pub fn pause(&mut self) -> bool {
        self.transition(RunState::Paused)
    }

    /// Returns `true` if the state changed.
    pub fn resume(&mut self) -> bool {
        self.transition(RunState::Running)
    }

    /// Guard for instruction-driven execution.
    pub fn ensure_running(&self) -> Result<()> {
        match self.state {
            RunState::Running => Ok(()),
            RunState::Paused => Err(SessionError::Paused),
        }
    }

    fn transition(&mut self, to: RunState) -> bool {
        let changed = self.state != to;
        self.state = to;
        changed
    }
}
