use std::{collections::HashMap, sync::Arc};

use {tokio::sync::RwLock, tracing::info};

use crate::{
    events::EventSender,
    orchestrator::{Capabilities, Session, SessionSettings},
};

/// Live sessions, one per connection. Sessions share nothing but the
/// capabilities handed to them.
pub struct SessionRegistry {
    capabilities: Capabilities,
    settings: SessionSettings,
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new(capabilities: Capabilities, settings: SessionSettings) -> Self {
        Self {
            capabilities,
            settings,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Register a fresh, uninitialized session.
    pub async fn create(&self, events: EventSender) -> Arc<Session> {
        let id = uuid::Uuid::new_v4().to_string();
        let session = Arc::new(Session::new(
            id.clone(),
            self.capabilities.clone(),
            self.settings.clone(),
            events,
        ));
        let mut sessions = self.sessions.write().await;
        sessions.insert(id.clone(), Arc::clone(&session));
        info!(session_id = %id, active = sessions.len(), "session created");
        session
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Remove and tear down a session. Returns `false` if it was unknown.
    pub async fn destroy(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id);
        match removed {
            Some(session) => {
                session.teardown().await;
                info!(session_id = %id, "session destroyed");
                true
            },
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Tear down every session.
    pub async fn shutdown(&self) {
        let drained: Vec<_> = self.sessions.write().await.drain().collect();
        if drained.is_empty() {
            return;
        }
        info!(count = drained.len(), "tearing down sessions");
        for (_, session) in drained {
            session.teardown().await;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        crate::{
            approval::ProposalTarget,
            testing::{BrowserRecorder, Call, ScriptedGenerator, navigate_reply},
        },
    };

    fn registry(recorder: &BrowserRecorder, generator: Arc<ScriptedGenerator>) -> SessionRegistry {
        SessionRegistry::new(
            Capabilities {
                launcher: recorder.launcher(),
                generator,
            },
            SessionSettings {
                feedback: false,
                ..SessionSettings::default()
            },
        )
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let recorder = BrowserRecorder::default();
        let generator = ScriptedGenerator::new();
        let registry = registry(&recorder, generator.clone());

        let (a_events, _a_rx) = EventSender::channel();
        let (b_events, _b_rx) = EventSender::channel();
        let a = registry.create(a_events).await;
        let b = registry.create(b_events).await;
        assert_ne!(a.id(), b.id());
        assert_eq!(registry.len().await, 2);

        a.initialize().await.unwrap();
        b.initialize().await.unwrap();
        assert_eq!(recorder.launches(), 2);

        generator.reply(navigate_reply("https://example.com"));
        let proposal = match a.run_instruction("open", true).await.unwrap() {
            crate::InstructionOutcome::Proposed { proposal } => proposal,
            other => panic!("expected a proposal, got {other:?}"),
        };

        // A proposal id from one session means nothing to another.
        assert!(b.approve(&ProposalTarget::Id(proposal.id.clone())).await.is_err());
        b.pause().await.unwrap();
        assert!(!a.is_paused().await);

        a.approve(&ProposalTarget::Id(proposal.id)).await.unwrap();
        assert_eq!(a.history().await.len(), 1);
        assert!(b.history().await.is_empty());
    }

    #[tokio::test]
    async fn destroy_tears_down_once() {
        let recorder = BrowserRecorder::default();
        let registry = registry(&recorder, ScriptedGenerator::new());
        let (events, _rx) = EventSender::channel();
        let session = registry.create(events).await;
        session.initialize().await.unwrap();

        let id = session.id().to_string();
        assert!(registry.destroy(&id).await);
        assert!(!registry.destroy(&id).await);
        assert!(registry.get(&id).await.is_none());
        assert!(session.is_closed());
        assert_eq!(
            recorder.calls().iter().filter(|c| **c == Call::Close).count(),
            1
        );
    }

    #[tokio::test]
    async fn shutdown_empties_the_registry() {
        let recorder = BrowserRecorder::default();
        let registry = registry(&recorder, ScriptedGenerator::new());
        for _ in 0..3 {
            let (events, _rx) = EventSender::channel();
            registry.create(events).await;
        }
        registry.shutdown().await;
        assert!(registry.is_empty().await);
    }
}
