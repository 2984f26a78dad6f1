use std::sync::Arc;

use {
    serde::{Serialize, de::DeserializeOwned},
    serde_json::{Value, json},
    tracing::{debug, warn},
};

use {
    wayfinder_protocol::{
        ErrorShape, ResponseFrame, RunInstructionParams, UserActionParams, error_codes, methods,
    },
    wayfinder_session::{Session, SessionError, UserAction},
};

/// Context passed to every method handler.
pub struct MethodContext {
    pub request_id: String,
    pub method: String,
    pub params: Option<Value>,
    pub conn_id: String,
    pub session: Arc<Session>,
}

pub type MethodResult = Result<Value, ErrorShape>;

/// Run one request against the connection's session and build its response.
pub async fn dispatch(ctx: MethodContext) -> ResponseFrame {
    match handle(&ctx).await {
        Ok(payload) => {
            debug!(
                conn_id = %ctx.conn_id,
                request_id = %ctx.request_id,
                method = %ctx.method,
                "method ok"
            );
            ResponseFrame::ok(ctx.request_id, payload)
        },
        Err(err) => {
            warn!(
                conn_id = %ctx.conn_id,
                request_id = %ctx.request_id,
                method = %ctx.method,
                code = %err.code,
                error = %err.message,
                "method failed"
            );
            ResponseFrame::err(ctx.request_id, err)
        },
    }
}

async fn handle(ctx: &MethodContext) -> MethodResult {
    let session = &ctx.session;
    match ctx.method.as_str() {
        methods::INITIALIZE_SESSION => {
            let state = session.initialize().await.map_err(session_error)?;
            Ok(json!({ "sessionId": session.id(), "state": state }))
        },
        methods::RUN_INSTRUCTION => {
            let params: RunInstructionParams = parse_params(ctx)?;
            if params.prompt.trim().is_empty() {
                return Err(invalid_request("`prompt` must not be empty"));
            }
            let outcome = session
                .run_instruction(&params.prompt, params.require_approval)
                .await
                .map_err(session_error)?;
            to_payload(&outcome)
        },
        methods::USER_ACTION => {
            let params: UserActionParams = parse_params(ctx)?;
            let action = UserAction::parse(&params.action_type, params.data.as_ref())
                .map_err(session_error)?;
            session.user_action(action).await.map_err(session_error)
        },
        methods::GET_HISTORY => {
            let history = session.publish_history().await.map_err(session_error)?;
            Ok(json!({ "history": history }))
        },
        methods::GET_STATE => {
            let state = session.get_state().await.map_err(session_error)?;
            Ok(json!({ "state": state }))
        },
        methods::DISCONNECT => Ok(json!({ "disconnected": true })),
        other => Err(invalid_request(format!("unknown method '{other}'"))),
    }
}

fn parse_params<T: DeserializeOwned>(ctx: &MethodContext) -> Result<T, ErrorShape> {
    let params = ctx.params.clone().unwrap_or(Value::Null);
    serde_json::from_value(params)
        .map_err(|e| invalid_request(format!("invalid params for {}: {e}", ctx.method)))
}

fn to_payload<T: Serialize>(value: &T) -> MethodResult {
    serde_json::to_value(value).map_err(|e| invalid_request(format!("unserializable payload: {e}")))
}

fn session_error(err: SessionError) -> ErrorShape {
    ErrorShape::from(&err)
}

fn invalid_request(message: impl Into<String>) -> ErrorShape {
    ErrorShape::new(error_codes::INVALID_REQUEST, message)
}
