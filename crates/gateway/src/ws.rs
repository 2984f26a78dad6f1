use std::{net::SocketAddr, sync::Arc, time::Duration};

use {
    axum::extract::ws::{Message, WebSocket},
    futures::{SinkExt, stream::StreamExt},
    serde::Serialize,
    serde_json::{Value, json},
    tokio::sync::mpsc,
    tracing::{debug, info, warn},
};

use {
    wayfinder_protocol::{
        EventFrame, GatewayFrame, MAX_PAYLOAD_BYTES, PROTOCOL_VERSION, RequestFrame, events,
        is_control_request, methods,
    },
    wayfinder_session::{EventSender, Session},
};

use crate::{
    methods::{MethodContext, dispatch},
    state::GatewayState,
};

/// How long the write loop may take to flush queued frames after the
/// connection winds down.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Serialized frames waiting for the write loop.
type Outbound = mpsc::UnboundedSender<String>;

fn send_frame(tx: &Outbound, frame: &impl Serialize) -> bool {
    match serde_json::to_string(frame) {
        Ok(text) => tx.send(text).is_ok(),
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize frame");
            false
        },
    }
}

fn send_event(state: &GatewayState, tx: &Outbound, event: &str, payload: Value) {
    send_frame(tx, &EventFrame::new(event, payload, state.next_seq()));
}

/// Session events go straight onto the outbound queue, so they are written
/// before the response of the request that produced them.
fn session_events(state: &Arc<GatewayState>, tx: &Outbound) -> EventSender {
    let state = Arc::downgrade(state);
    let tx = tx.clone();
    EventSender::new(move |event| {
        let Some(state) = state.upgrade() else {
            return false;
        };
        send_frame(
            &tx,
            &EventFrame::new(event.name, event.payload, state.next_seq()),
        )
    })
}

/// Handle a single WebSocket connection through its full lifecycle:
/// session creation → message loop → teardown.
pub async fn handle_connection(
    socket: WebSocket,
    state: Arc<GatewayState>,
    remote_addr: SocketAddr,
) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    let active = state.connection_opened();
    info!(
        conn_id = %conn_id,
        remote_ip = %remote_addr.ip(),
        active,
        "ws: new connection"
    );

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (client_tx, mut client_rx) = mpsc::unbounded_channel::<String>();

    // Write loop: forwards frames from client_tx to the socket.
    let write_conn_id = conn_id.clone();
    let mut write_handle = tokio::spawn(async move {
        while let Some(msg) = client_rx.recv().await {
            if ws_tx.send(Message::Text(msg.into())).await.is_err() {
                debug!(conn_id = %write_conn_id, "ws: write loop closed");
                return;
            }
        }
        let _ = ws_tx.close().await;
    });

    let session = state
        .registry
        .create(session_events(&state, &client_tx))
        .await;
    info!(conn_id = %conn_id, session_id = %session.id(), "ws: session attached");

    send_event(
        &state,
        &client_tx,
        events::CONNECTED,
        json!({
            "connId": conn_id,
            "sessionId": session.id(),
            "protocol": PROTOCOL_VERSION,
            "version": state.version,
        }),
    );

    // Queued requests run one at a time, in delivery order.
    let (work_tx, mut work_rx) = mpsc::unbounded_channel::<MethodContext>();
    let worker_state = Arc::clone(&state);
    let worker_tx = client_tx.clone();
    let worker = tokio::spawn(async move {
        while let Some(ctx) = work_rx.recv().await {
            respond(ctx, &worker_state, &worker_tx).await;
        }
    });

    // ── Message loop ─────────────────────────────────────────────────────

    while let Some(msg) = ws_rx.next().await {
        let text = match msg {
            Ok(Message::Text(t)) => t.to_string(),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!(conn_id = %conn_id, error = %e, "ws: read error");
                break;
            },
        };

        if text.len() > MAX_PAYLOAD_BYTES {
            warn!(conn_id = %conn_id, size = text.len(), "ws: payload too large");
            send_event(
                &state,
                &client_tx,
                events::ERROR,
                json!({ "message": "payload too large", "maxBytes": MAX_PAYLOAD_BYTES }),
            );
            continue;
        }

        let req = match serde_json::from_str::<GatewayFrame>(&text) {
            Ok(GatewayFrame::Request(req)) => req,
            Ok(_) => {
                debug!(conn_id = %conn_id, "ws: ignoring non-request frame");
                continue;
            },
            Err(e) => {
                warn!(conn_id = %conn_id, error = %e, "ws: invalid frame");
                send_event(
                    &state,
                    &client_tx,
                    events::ERROR,
                    json!({ "message": "invalid frame" }),
                );
                continue;
            },
        };

        debug!(
            conn_id = %conn_id,
            request_id = %req.id,
            method = %req.method,
            "ws: received request frame"
        );

        let disconnect = req.method == methods::DISCONNECT;
        let inline = disconnect || is_control_request(&req.method, req.params.as_ref());
        let ctx = context(req, &conn_id, &session);
        if inline {
            respond(ctx, &state, &client_tx).await;
        } else if work_tx.send(ctx).is_err() {
            warn!(conn_id = %conn_id, "ws: request worker gone");
            break;
        }
        if disconnect {
            info!(conn_id = %conn_id, "ws: client requested disconnect");
            break;
        }
    }

    // ── Cleanup ──────────────────────────────────────────────────────────

    // Dropping the in-flight request releases the session's execution lane
    // so teardown does not wait for it.
    drop(work_tx);
    worker.abort();
    let _ = worker.await;

    let session_id = session.id().to_string();
    drop(session);
    state.registry.destroy(&session_id).await;
    state.connection_closed();

    drop(client_tx);
    if tokio::time::timeout(FLUSH_TIMEOUT, &mut write_handle)
        .await
        .is_err()
    {
        write_handle.abort();
    }

    info!(conn_id = %conn_id, session_id = %session_id, "ws: connection closed");
}

fn context(req: RequestFrame, conn_id: &str, session: &Arc<Session>) -> MethodContext {
    MethodContext {
        request_id: req.id,
        method: req.method,
        params: req.params,
        conn_id: conn_id.to_string(),
        session: Arc::clone(session),
    }
}

/// Dispatch one request and queue its response. A failure is followed by an
/// `error` event.
async fn respond(ctx: MethodContext, state: &GatewayState, tx: &Outbound) {
    let method = ctx.method.clone();
    let response = dispatch(ctx).await;
    send_frame(tx, &response);
    if let Some(err) = &response.error {
        send_event(
            state,
            tx,
            events::ERROR,
            json!({
                "requestId": response.id,
                "method": method,
                "code": err.code,
                "message": err.message,
                "details": err.details,
            }),
        );
    }
}
