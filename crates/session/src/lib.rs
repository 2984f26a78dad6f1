//! Per-session orchestration: turning generator text into browser actions,
//! gating them behind approval, and keeping a replayable history.

pub mod actions;
pub mod approval;
pub mod error;
pub mod events;
pub mod executor;
pub mod extractor;
pub mod history;
pub mod orchestrator;
pub mod prompt;
pub mod registry;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use {
    actions::UserAction,
    approval::{ApprovalWorkflow, ProposalTarget, ProposedCommand},
    error::{Result, SessionError},
    events::{EventSender, SessionEvent},
    executor::{Executor, ExecutorSettings},
    extractor::{SuggestedAction, extract_command},
    history::{CommandHistory, Disposition, HistoryEntry},
    orchestrator::{Capabilities, InstructionOutcome, Resolution, Session, SessionSettings},
    registry::SessionRegistry,
    state::{RunState, SessionControl},
};
