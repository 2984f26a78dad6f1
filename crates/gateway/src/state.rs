use std::sync::{
    Arc,
    atomic::{AtomicU64, AtomicUsize, Ordering},
};

use wayfinder_session::SessionRegistry;

/// Process-wide gateway state shared by every connection.
pub struct GatewayState {
    pub registry: Arc<SessionRegistry>,
    pub version: String,
    seq: AtomicU64,
    connections: AtomicUsize,
}

impl GatewayState {
    pub fn new(registry: Arc<SessionRegistry>) -> Arc<Self> {
        Arc::new(Self {
            registry,
            version: env!("CARGO_PKG_VERSION").to_string(),
            seq: AtomicU64::new(0),
            connections: AtomicUsize::new(0),
        })
    }

    /// Next event sequence number. Shared across connections so a client can
    /// detect gaps.
    pub fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }

    pub(crate) fn connection_opened(&self) -> usize {
        self.connections.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn connection_closed(&self) {
        let _ = self
            .connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        wayfinder_session::{Capabilities, SessionSettings},
    };

    struct NoBrowser;

    #[async_trait::async_trait]
    impl wayfinder_common::BrowserLauncher for NoBrowser {
        async fn launch(
            &self,
        ) -> wayfinder_common::Result<Box<dyn wayfinder_common::BrowserCapability>> {
            Err(wayfinder_common::Error::unavailable("browser", "not in tests"))
        }
    }

    struct Silent;

    #[async_trait::async_trait]
    impl wayfinder_common::Generator for Silent {
        fn name(&self) -> &str {
            "silent"
        }

        async fn complete(
            &self,
            _request: wayfinder_common::GeneratorRequest,
        ) -> wayfinder_common::Result<String> {
            Ok(String::new())
        }
    }

    fn state() -> Arc<GatewayState> {
        let capabilities = Capabilities {
            launcher: Arc::new(NoBrowser),
            generator: Arc::new(Silent),
        };
        GatewayState::new(Arc::new(SessionRegistry::new(
            capabilities,
            SessionSettings::default(),
        )))
    }

    #[test]
    fn sequence_numbers_increase() {
        let state = state();
        let a = state.next_seq();
        let b = state.next_seq();
        assert!(b > a);
    }

    #[test]
    fn connection_count_never_underflows() {
        let state = state();
        state.connection_closed();
        assert_eq!(state.connection_count(), 0);
        assert_eq!(state.connection_opened(), 1);
        state.connection_closed();
        assert_eq!(state.connection_count(), 0);
    }
}
