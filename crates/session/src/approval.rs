//! Human-in-the-loop gate in front of the executor.

use std::collections::HashMap;

use {
    chrono::{DateTime, Utc},
    serde::Serialize,
    serde_json::Value,
    tracing::{debug, warn},
    wayfinder_common::ActionCommand,
};

use crate::error::{Result, SessionError};

/// A command waiting for an operator decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposedCommand {
    pub id: String,
    pub command: ActionCommand,
    pub created_at: DateTime<Utc>,
}

/// How an approve/reject/modify request names its command.
#[derive(Debug, Clone, PartialEq)]
pub enum ProposalTarget {
    Id(String),
    /// Command echoed back by the client instead of an id.
    Inline(ActionCommand),
}

impl ProposalTarget {
    /// Accepts `{"proposalId": …}`, `{"command": {…}}` or a bare command
    /// object.
    pub fn from_data(data: Option<&Value>) -> Result<Self> {
        let data = data.ok_or_else(|| SessionError::invalid_request("missing proposal data"))?;

        if let Some(id) = data.get("proposalId").and_then(Value::as_str) {
            return Ok(Self::Id(id.to_string()));
        }

        let raw = data.get("command").unwrap_or(data);
        if raw.get("action").is_some() {
            return serde_json::from_value(raw.clone())
                .map(Self::Inline)
                .map_err(|e| SessionError::invalid_request(format!("malformed command: {e}")));
        }

        Err(SessionError::invalid_request(
            "expected `proposalId` or `command`",
        ))
    }
}

/// Pending proposals keyed by id.
#[derive(Debug, Default)]
pub struct ApprovalWorkflow {
    pending: HashMap<String, ProposedCommand>,
}

impl ApprovalWorkflow {
    pub fn propose(&mut self, command: ActionCommand) -> ProposedCommand {
        let proposal = ProposedCommand {
            id: uuid::Uuid::new_v4().to_string(),
            command,
            created_at: Utc::now(),
        };
        debug!(proposal_id = %proposal.id, action = %proposal.command.action, "command proposed");
        self.pending.insert(proposal.id.clone(), proposal.clone());
        proposal
    }

    /// Resolve `target` and remove it from the pending set.
    ///
    /// An inline command also retires a pending proposal with the same
    /// command, if there is one. It is accepted even when none matches
    /// (never proposed, or cleared by `stop`).
    pub fn take(&mut self, target: &ProposalTarget) -> Result<ActionCommand> {
        match target {
            ProposalTarget::Id(id) => self
                .pending
                .remove(id)
                .map(|p| p.command)
                .ok_or_else(|| unknown(id)),
            ProposalTarget::Inline(command) => {
                let matching = self
                    .pending
                    .values()
                    .filter(|p| p.command == *command)
                    .min_by_key(|p| p.created_at)
                    .map(|p| p.id.clone());
                match matching {
                    Some(id) => {
                        self.pending.remove(&id);
                    },
                    None => warn!(
                        action = %command.action,
                        pending = self.pending.len(),
                        "inline command matches no pending proposal; resolving it anyway"
                    ),
                }
                Ok(command.clone())
            },
        }
    }

    /// Pending proposals, oldest first.
    pub fn pending(&self) -> Vec<ProposedCommand> {
        let mut list: Vec<_> = self.pending.values().cloned().collect();
        list.sort_by_key(|p| p.created_at);
        list
    }

    /// Drop every pending proposal; returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

fn unknown(id: &str) -> SessionError {
    SessionError::invalid_request(format!("unknown proposal '{id}'"))
}
