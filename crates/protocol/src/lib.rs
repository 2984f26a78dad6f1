//! Wayfinder WebSocket protocol definitions.
//!
//! All communication uses JSON text frames over one WebSocket per session.
//!
//! Frame types:
//! - `RequestFrame`:  client → gateway request (`type: "req"`)
//! - `ResponseFrame`: gateway → client result for every request (`type: "res"`)
//! - `EventFrame`:    gateway → client server-push (`type: "event"`)

use serde::{Deserialize, Serialize};

// ── Constants ────────────────────────────────────────────────────────────────

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_PAYLOAD_BYTES: usize = 524_288; // 512 KB

// ── Error codes ──────────────────────────────────────────────────────────────

pub mod error_codes {
    pub const SESSION_NOT_INITIALIZED: &str = "SESSION_NOT_INITIALIZED";
    pub const INVALID_COMMAND: &str = "INVALID_COMMAND";
    pub const EXTRACTION_FAILED: &str = "EXTRACTION_FAILED";
    pub const CAPABILITY_FAILURE: &str = "CAPABILITY_FAILURE";
    pub const PAUSED: &str = "PAUSED";
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
    pub const SESSION_CLOSED: &str = "SESSION_CLOSED";
}

// ── Method and event names ───────────────────────────────────────────────────

/// Inbound request methods.
pub mod methods {
    pub const INITIALIZE_SESSION: &str = "initialize-session";
    pub const RUN_INSTRUCTION: &str = "run-instruction";
    pub const USER_ACTION: &str = "user-action";
    pub const GET_HISTORY: &str = "get-history";
    pub const GET_STATE: &str = "get-state";
    pub const DISCONNECT: &str = "disconnect";

    pub const ALL: [&str; 6] = [
        INITIALIZE_SESSION,
        RUN_INSTRUCTION,
        USER_ACTION,
        GET_HISTORY,
        GET_STATE,
        DISCONNECT,
    ];
}

/// Outbound event names.
pub mod events {
    pub const CONNECTED: &str = "connected";
    pub const SESSION_READY: &str = "session-ready";
    pub const SESSION_ERROR: &str = "session-error";
    pub const INSTRUCTION_STARTED: &str = "instruction-started";
    pub const GENERATOR_TEXT: &str = "generator-text";
    pub const APPROVAL_NEEDED: &str = "approval-needed";
    pub const STATE_UPDATE: &str = "state-update";
    pub const GENERATOR_FEEDBACK: &str = "generator-feedback";
    pub const HISTORY: &str = "history";
    pub const ERROR: &str = "error";
    pub const USER_ACTION_RESULT: &str = "user-action-result";
    pub const SUGGESTED_ACTIONS: &str = "suggested-actions";
    pub const STATE_EXPLANATION: &str = "state-explanation";
    pub const PAGE_ANALYSIS: &str = "page-analysis";
    pub const OPERATION_PAUSED: &str = "operation-paused";
    pub const OPERATION_RESUMED: &str = "operation-resumed";
}

// ── Error shape ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorShape {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorShape {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

// ── Frames ───────────────────────────────────────────────────────────────────

/// Gateway → client response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub r#type: String, // always "res"
    pub id: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorShape>,
}

impl ResponseFrame {
    pub fn ok(id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            r#type: "res".into(),
            id: id.into(),
            ok: true,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn err(id: impl Into<String>, error: ErrorShape) -> Self {
        Self {
            r#type: "res".into(),
            id: id.into(),
            ok: false,
            payload: None,
            error: Some(error),
        }
    }
}

/// Gateway → client server-push event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventFrame {
    pub r#type: String, // always "event"
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    pub seq: u64,
}

impl EventFrame {
    pub fn new(event: impl Into<String>, payload: serde_json::Value, seq: u64) -> Self {
        Self {
            r#type: "event".into(),
            event: event.into(),
            payload: Some(payload),
            seq,
        }
    }
}

/// Discriminated union of all frame types.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GatewayFrame {
    #[serde(rename = "req")]
    Request(RequestFrame),
    #[serde(rename = "res")]
    Response(ResponseFrameInner),
    #[serde(rename = "event")]
    Event(EventFrameInner),
}

/// Client → gateway request body (the `type` tag lives on [`GatewayFrame`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestFrame {
    pub id: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseFrameInner {
    pub id: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorShape>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventFrameInner {
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    pub seq: u64,
}

// ── Request params ───────────────────────────────────────────────────────────

/// Params of `run-instruction`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunInstructionParams {
    pub prompt: String,
    #[serde(default)]
    pub require_approval: bool,
}

/// Params of `user-action`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserActionParams {
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// User-action types answered without waiting behind queued work. Actions
/// that resolve or drop proposals keep delivery order.
pub const CONTROL_USER_ACTIONS: [&str; 2] = ["pause", "resume"];

/// Whether a request belongs on the connection's control lane.
pub fn is_control_request(method: &str, params: Option<&serde_json::Value>) -> bool {
    match method {
        methods::GET_HISTORY => true,
        methods::USER_ACTION => params
            .and_then(|p| p.get("type"))
            .and_then(serde_json::Value::as_str)
            .is_some_and(|t| CONTROL_USER_ACTIONS.contains(&t)),
        _ => false,
    }
}
