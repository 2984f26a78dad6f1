use std::{fmt, sync::Arc};

use {
    serde_json::Value,
    tokio::sync::mpsc,
    tracing::{debug, trace},
};

/// One outbound notification produced by a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    pub name: &'static str,
    pub payload: Value,
}

type Sink = Arc<dyn Fn(SessionEvent) -> bool + Send + Sync>;

/// Sending half of a session's event stream.
///
/// Events reach the sink synchronously and in emission order, so a transport
/// that writes them straight to its outbound queue delivers every event before
/// the response of the request that caused it. Emitting never fails: once the
/// sink reports the receiver gone (connection closed) events are dropped.
#[derive(Clone)]
pub struct EventSender {
    sink: Sink,
}

impl fmt::Debug for EventSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSender").finish_non_exhaustive()
    }
}

impl EventSender {
    /// Deliver events to `sink`; it returns `false` once nothing is listening.
    pub fn new(sink: impl Fn(SessionEvent) -> bool + Send + Sync + 'static) -> Self {
        Self {
            sink: Arc::new(sink),
        }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(move |event| tx.send(event).is_ok()), rx)
    }

    pub fn emit(&self, name: &'static str, payload: Value) {
        trace!(event = name, "emit");
        if !(self.sink)(SessionEvent { name, payload }) {
            debug!(event = name, "event receiver dropped");
        }
    }
}
