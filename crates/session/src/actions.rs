//! Direct user actions that bypass the extractor.

use std::fmt;

use serde_json::Value;

use crate::{
    approval::ProposalTarget,
    error::{Result, SessionError},
};

#[derive(Debug, Clone, PartialEq)]
pub enum UserAction {
    NavigateBack,
    NavigateForward,
    NavigateHome,
    ScrollUp,
    ScrollDown,
    CaptureScreenshot,
    RequestAnalysis,
    SuggestActions,
    ExplainCurrentState,
    Pause,
    Resume,
    Stop,
    Approve(ProposalTarget),
    Reject(ProposalTarget),
    Modify {
        target: ProposalTarget,
        feedback: String,
    },
    ReplayCommand {
        index: usize,
    },
}

impl UserAction {
    /// Build an action from the `type` / `data` pair of a `user-action`
    /// request.
    pub fn parse(action_type: &str, data: Option<&Value>) -> Result<Self> {
        let action = match action_type {
            "navigate_back" => Self::NavigateBack,
            "navigate_forward" => Self::NavigateForward,
            "navigate_home" => Self::NavigateHome,
            "scroll_up" => Self::ScrollUp,
            "scroll_down" => Self::ScrollDown,
            "capture_screenshot" => Self::CaptureScreenshot,
            "request_analysis" => Self::RequestAnalysis,
            "suggest_actions" => Self::SuggestActions,
            "explain_current_state" => Self::ExplainCurrentState,
            "pause" => Self::Pause,
            "resume" => Self::Resume,
            "stop" => Self::Stop,
            "approve" => Self::Approve(ProposalTarget::from_data(data)?),
            "reject" => Self::Reject(ProposalTarget::from_data(data)?),
            "modify" => {
                let feedback = data
                    .and_then(|d| d.get("feedback"))
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|f| !f.is_empty())
                    .ok_or_else(|| SessionError::invalid_request("modify requires `feedback`"))?;
                Self::Modify {
                    target: ProposalTarget::from_data(data)?,
                    feedback: feedback.to_string(),
                }
            },
            "replay_command" => {
                let index = data
                    .and_then(|d| d.get("commandIndex"))
                    .and_then(Value::as_u64)
                    .ok_or_else(|| {
                        SessionError::invalid_request(
                            "replay_command requires a non-negative `commandIndex`",
                        )
                    })?;
                Self::ReplayCommand {
                    index: usize::try_from(index).map_err(|_| {
                        SessionError::invalid_request("`commandIndex` is out of range")
                    })?,
                }
            },
            other => {
                return Err(SessionError::invalid_request(format!(
                    "unknown user action '{other}'"
                )));
            },
        };
        Ok(action)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::NavigateBack => "navigate_back",
            Self::NavigateForward => "navigate_forward",
            Self::NavigateHome => "navigate_home",
            Self::ScrollUp => "scroll_up",
            Self::ScrollDown => "scroll_down",
            Self::CaptureScreenshot => "capture_screenshot",
            Self::RequestAnalysis => "request_analysis",
            Self::SuggestActions => "suggest_actions",
            Self::ExplainCurrentState => "explain_current_state",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Stop => "stop",
            Self::Approve(_) => "approve",
            Self::Reject(_) => "reject",
            Self::Modify { .. } => "modify",
            Self::ReplayCommand { .. } => "replay_command",
        }
    }
}

impl fmt::Display for UserAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
