//! One operator session: the instruction pipeline, the approval gate, the
//! command history and the direct user actions, all against a single
//! browser handle.
//!
//! Everything that touches the browser goes through one lane (a mutex around
//! the [`Executor`]), so capability calls for a session never interleave.
//! Pause, resume, stop and history reads do not take the lane.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use {
    serde::Serialize,
    serde_json::{Value, json},
    tokio::{
        sync::{MappedMutexGuard, Mutex, MutexGuard, RwLock},
        time::timeout,
    },
    tracing::{debug, info, warn},
    wayfinder_common::{
        ActionCommand, BrowserLauncher, BrowserState, ExecutionResult, Generator,
        GeneratorRequest, ScrollDirection,
    },
    wayfinder_config::WayfinderConfig,
    wayfinder_protocol::events,
};

use crate::{
    actions::UserAction,
    approval::{ApprovalWorkflow, ProposalTarget, ProposedCommand},
    error::{Result, SessionError},
    events::EventSender,
    executor::{Executor, ExecutorSettings},
    extractor::{
        SuggestedAction, extract_command, extract_json_object, extract_suggestions,
        parse_structured,
    },
    history::{CommandHistory, Disposition, HistoryEntry},
    prompt,
    state::{RunState, SessionControl},
};

/// Shown to the operator when the feedback call itself fails.
const FEEDBACK_FALLBACK: &str =
    "The action finished, but no feedback could be generated for it.";

/// The external services a session drives.
#[derive(Clone)]
pub struct Capabilities {
    pub launcher: Arc<dyn BrowserLauncher>,
    pub generator: Arc<dyn Generator>,
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("generator", &self.generator.name())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub executor: ExecutorSettings,
    /// Token cap for instruction-style generator calls.
    pub max_tokens: u32,
    /// Ask the generator to evaluate directly executed instructions.
    pub feedback: bool,
    /// Append replays to the history as `replayed` entries.
    pub record_replays: bool,
}

impl SessionSettings {
    pub fn from_config(config: &WayfinderConfig) -> Self {
        Self {
            executor: ExecutorSettings::from(&config.session),
            max_tokens: config.generator.max_tokens,
            feedback: config.generator.feedback,
            record_replays: config.session.record_replays,
        }
    }

    fn generator_timeout(&self) -> Duration {
        self.executor.action_timeout
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&WayfinderConfig::default())
    }
}

/// What `run-instruction` did with the derived command.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum InstructionOutcome {
    /// Parked until the operator approves, rejects or modifies it.
    Proposed { proposal: ProposedCommand },
    Executed {
        command: ActionCommand,
        result: ExecutionResult,
        #[serde(skip_serializing_if = "Option::is_none")]
        feedback: Option<String>,
    },
}

/// Result of approving, rejecting, modifying or replaying a command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub disposition: Disposition,
    /// Index of the appended history entry, if one was appended.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_index: Option<usize>,
    pub command: ActionCommand,
    /// Absent for rejections.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ExecutionResult>,
}

pub struct Session {
    id: String,
    capabilities: Capabilities,
    settings: SessionSettings,
    events: EventSender,
    lane: Mutex<Option<Executor>>,
    initialized: AtomicBool,
    closed: AtomicBool,
    control: RwLock<SessionControl>,
    approvals: RwLock<ApprovalWorkflow>,
    history: RwLock<CommandHistory>,
}

impl Session {
    pub fn new(
        id: impl Into<String>,
        capabilities: Capabilities,
        settings: SessionSettings,
        events: EventSender,
    ) -> Self {
        Self {
            id: id.into(),
            capabilities,
            settings,
            events,
            lane: Mutex::new(None),
            initialized: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            control: RwLock::new(SessionControl::default()),
            approvals: RwLock::new(ApprovalWorkflow::default()),
            history: RwLock::new(CommandHistory::default()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub async fn run_state(&self) -> RunState {
        self.control.read().await.state()
    }

    pub async fn is_paused(&self) -> bool {
        self.control.read().await.is_paused()
    }

    // ── Lifecycle ───────────────────────────────────────────────────────────

    /// Launch the browser. Calling it again on a live session only reports
    /// the current state.
    pub async fn initialize(&self) -> Result<BrowserState> {
        self.ensure_open()?;
        let mut lane = self.lane.lock().await;
        self.ensure_open()?;

        if let Some(executor) = lane.as_mut() {
            debug!(session_id = %self.id, "session already initialized");
            let state = executor.current_state().await;
            self.events
                .emit(events::SESSION_READY, json!({ "state": state }));
            return Ok(state);
        }

        let limit = self.settings.executor.action_timeout;
        let browser = match timeout(limit, self.capabilities.launcher.launch()).await {
            Ok(Ok(browser)) => browser,
            Ok(Err(e)) => return Err(self.launch_failed(format!("browser launch failed: {e}"))),
            Err(_) => {
                return Err(self.launch_failed(format!(
                    "browser launch timed out after {}ms",
                    limit.as_millis()
                )));
            },
        };

        let mut executor = Executor::new(browser, self.settings.executor.clone());
        let state = executor.current_state().await;
        *lane = Some(executor);
        self.initialized.store(true, Ordering::SeqCst);

        info!(session_id = %self.id, "browser session initialized");
        self.events
            .emit(events::SESSION_READY, json!({ "state": state }));
        Ok(state)
    }

    fn launch_failed(&self, message: String) -> SessionError {
        warn!(session_id = %self.id, error = %message, "session initialization failed");
        self.events
            .emit(events::SESSION_ERROR, json!({ "message": message }));
        SessionError::CapabilityFailure(message)
    }

    /// Release the browser and drop pending proposals. Safe to call more
    /// than once and on a session that never launched a browser. Waits for
    /// an in-flight action to leave the lane.
    pub async fn teardown(&self) {
        let first = !self.closed.swap(true, Ordering::SeqCst);
        let executor = self.lane.lock().await.take();
        if let Some(mut executor) = executor {
            match executor.close().await {
                Ok(()) => info!(session_id = %self.id, "browser released"),
                Err(e) => warn!(session_id = %self.id, error = %e, "browser close failed"),
            }
        }
        if first {
            let dropped = self.approvals.write().await.clear();
            debug!(session_id = %self.id, dropped_proposals = dropped, "session torn down");
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        Ok(())
    }

    fn ensure_initialized(&self) -> Result<()> {
        self.ensure_open()?;
        if !self.is_initialized() {
            return Err(SessionError::NotInitialized);
        }
        Ok(())
    }

    /// Enter the lane.
    async fn executor(&self) -> Result<MappedMutexGuard<'_, Executor>> {
        self.ensure_initialized()?;
        let guard = self.lane.lock().await;
        MutexGuard::try_map(guard, Option::as_mut).map_err(|_| {
            if self.is_closed() {
                SessionError::Closed
            } else {
                SessionError::NotInitialized
            }
        })
    }

    // ── Instruction pipeline ────────────────────────────────────────────────

    /// Turn a natural-language instruction into one browser command and
    /// either execute it or park it for approval.
    ///
    /// Directly executed commands are not recorded in the history.
    pub async fn run_instruction(
        &self,
        prompt: &str,
        require_approval: bool,
    ) -> Result<InstructionOutcome> {
        self.ensure_initialized()?;
        self.control.read().await.ensure_running()?;

        let mut executor = self.executor().await?;
        // Pause may have landed while we waited for the lane.
        self.control.read().await.ensure_running()?;

        info!(session_id = %self.id, require_approval, "running instruction");
        self.events.emit(
            events::INSTRUCTION_STARTED,
            json!({ "prompt": prompt, "requireApproval": require_approval }),
        );

        let before = executor.current_state().await;
        let raw = self
            .generate(prompt::instruction(prompt, &before, self.settings.max_tokens))
            .await?;
        self.events
            .emit(events::GENERATOR_TEXT, json!({ "text": raw }));

        let Some(command) = extract_command(&raw) else {
            warn!(session_id = %self.id, "no command derived from generator output");
            return Err(SessionError::ExtractionFailure { raw });
        };

        if require_approval {
            let proposal = self.approvals.write().await.propose(command);
            self.events.emit(
                events::APPROVAL_NEEDED,
                json!({ "proposalId": proposal.id, "command": proposal.command }),
            );
            return Ok(InstructionOutcome::Proposed { proposal });
        }

        let result = executor.execute(&command).await;
        self.emit_state(&result);

        let feedback = if self.settings.feedback {
            Some(self.feedback(prompt, &result).await)
        } else {
            None
        };

        Ok(InstructionOutcome::Executed {
            command,
            result,
            feedback,
        })
    }

    /// One generator call under the action timeout.
    async fn generate(&self, request: GeneratorRequest) -> Result<String> {
        let limit = self.settings.generator_timeout();
        let generator = &self.capabilities.generator;
        let err = match timeout(limit, generator.complete(request)).await {
            Ok(Ok(text)) => return Ok(text),
            Ok(Err(e)) => SessionError::capability(format!("generator: {e}")),
            Err(_) => SessionError::capability(format!(
                "generator timed out after {}ms",
                limit.as_millis()
            )),
        };
        warn!(session_id = %self.id, generator = generator.name(), error = %err, "generator call failed");
        Err(err)
    }

    async fn feedback(&self, prompt: &str, result: &ExecutionResult) -> String {
        let text = self
            .generate(prompt::feedback(prompt, result))
            .await
            .unwrap_or_else(|_| FEEDBACK_FALLBACK.to_string());
        self.events
            .emit(events::GENERATOR_FEEDBACK, json!({ "feedback": text }));
        text
    }

    fn emit_state(&self, result: &ExecutionResult) {
        self.events.emit(events::STATE_UPDATE, json!(result));
    }

    // ── Approval ────────────────────────────────────────────────────────────

    /// Execute a proposal exactly as proposed.
    pub async fn approve(&self, target: &ProposalTarget) -> Result<Resolution> {
        let mut executor = self.executor().await?;
        let command = self.approvals.write().await.take(target)?;

        let result = executor.execute(&command).await;
        let index = self
            .history
            .write()
            .await
            .record(command.clone(), Disposition::Approved);
        info!(session_id = %self.id, history_index = index, success = result.success, "approved command executed");
        self.emit_state(&result);

        Ok(Resolution {
            disposition: Disposition::Approved,
            history_index: Some(index),
            command,
            result: Some(result),
        })
    }

    /// Discard a proposal without touching the browser.
    pub async fn reject(&self, target: &ProposalTarget) -> Result<Resolution> {
        self.ensure_open()?;
        let command = self.approvals.write().await.take(target)?;
        let index = self
            .history
            .write()
            .await
            .record(command.clone(), Disposition::Rejected);
        info!(session_id = %self.id, history_index = index, "command rejected");

        Ok(Resolution {
            disposition: Disposition::Rejected,
            history_index: Some(index),
            command,
            result: None,
        })
    }

    /// Ask the generator to revise a proposal, then execute the revision.
    /// When no revision can be derived the original runs instead.
    pub async fn modify(&self, target: &ProposalTarget, feedback: &str) -> Result<Resolution> {
        let mut executor = self.executor().await?;
        let original = self.approvals.write().await.take(target)?;

        let state = executor.current_state().await;
        let request =
            prompt::modification(&original, feedback, &state, self.settings.max_tokens);
        let revised = match self.generate(request).await {
            Ok(text) => parse_structured(&text).unwrap_or_else(|| {
                warn!(session_id = %self.id, "revision was not a command; keeping the original");
                original.clone()
            }),
            Err(_) => original.clone(),
        };

        let result = executor.execute(&revised).await;
        let index = self.history.write().await.record_modified(
            revised.clone(),
            original,
            feedback.to_string(),
        );
        info!(session_id = %self.id, history_index = index, success = result.success, "modified command executed");
        self.emit_state(&result);

        Ok(Resolution {
            disposition: Disposition::Modified,
            history_index: Some(index),
            command: revised,
            result: Some(result),
        })
    }

    /// Re-execute a recorded command. Replays skip the approval gate.
    pub async fn replay(&self, index: usize) -> Result<Resolution> {
        let mut executor = self.executor().await?;
        let command = self
            .history
            .read()
            .await
            .get(index)
            .map(|entry| entry.command.clone())
            .ok_or_else(|| {
                SessionError::invalid_request(format!("no history entry at index {index}"))
            })?;

        let result = executor.execute(&command).await;
        let history_index = if self.settings.record_replays {
            Some(
                self.history
                    .write()
                    .await
                    .record(command.clone(), Disposition::Replayed),
            )
        } else {
            None
        };
        info!(session_id = %self.id, replayed = index, success = result.success, "command replayed");
        self.emit_state(&result);

        Ok(Resolution {
            disposition: Disposition::Replayed,
            history_index,
            command,
            result: Some(result),
        })
    }

    pub async fn pending_proposals(&self) -> Vec<ProposedCommand> {
        self.approvals.read().await.pending()
    }

    // ── Control ─────────────────────────────────────────────────────────────

    /// Block new instructions. An instruction already in flight finishes.
    pub async fn pause(&self) -> Result<RunState> {
        self.ensure_open()?;
        if self.control.write().await.pause() {
            info!(session_id = %self.id, "session paused");
        }
        self.events
            .emit(events::OPERATION_PAUSED, json!({ "paused": true }));
        Ok(RunState::Paused)
    }

    pub async fn resume(&self) -> Result<RunState> {
        self.ensure_open()?;
        if self.control.write().await.resume() {
            info!(session_id = %self.id, "session resumed");
        }
        self.events
            .emit(events::OPERATION_RESUMED, json!({ "paused": false }));
        Ok(RunState::Running)
    }

    /// Abandon every pending proposal; returns how many were dropped.
    pub async fn stop(&self) -> Result<usize> {
        self.ensure_open()?;
        let dropped = self.approvals.write().await.clear();
        info!(session_id = %self.id, dropped_proposals = dropped, "pending proposals cleared");
        Ok(dropped)
    }

    // ── State and history ───────────────────────────────────────────────────

    pub async fn get_state(&self) -> Result<BrowserState> {
        let state = self.executor().await?.current_state().await;
        self.events.emit(events::STATE_UPDATE, json!(state));
        Ok(state)
    }

    pub async fn history(&self) -> Vec<HistoryEntry> {
        self.history.read().await.entries().to_vec()
    }

    /// Same as [`Session::history`], also pushed to the client as a
    /// `history` event.
    pub async fn publish_history(&self) -> Result<Vec<HistoryEntry>> {
        self.ensure_open()?;
        let entries = self.history().await;
        self.events
            .emit(events::HISTORY, json!({ "history": entries }));
        Ok(entries)
    }

    // ── Direct user actions ─────────────────────────────────────────────────

    /// Run one user action and report it as a `user-action-result` event.
    pub async fn user_action(&self, action: UserAction) -> Result<Value> {
        let name = action.name();
        debug!(session_id = %self.id, action = name, "user action");

        let payload = match action {
            UserAction::NavigateBack => {
                let result = self.executor().await?.go_back().await;
                self.state_payload(result)
            },
            UserAction::NavigateForward => {
                let result = self.executor().await?.go_forward().await;
                self.state_payload(result)
            },
            UserAction::NavigateHome => {
                let result = self.executor().await?.navigate_home().await;
                self.state_payload(result)
            },
            UserAction::ScrollUp => {
                let result = self.executor().await?.scroll_by(ScrollDirection::Up).await;
                self.state_payload(result)
            },
            UserAction::ScrollDown => {
                let result = self
                    .executor()
                    .await?
                    .scroll_by(ScrollDirection::Down)
                    .await;
                self.state_payload(result)
            },
            UserAction::CaptureScreenshot => {
                let result = self.executor().await?.capture().await;
                self.state_payload(result)
            },
            UserAction::RequestAnalysis => self.analyze().await?,
            UserAction::SuggestActions => self.suggest().await?,
            UserAction::ExplainCurrentState => self.explain().await?,
            UserAction::Pause => json!({ "state": self.pause().await? }),
            UserAction::Resume => json!({ "state": self.resume().await? }),
            UserAction::Stop => json!({ "clearedProposals": self.stop().await? }),
            UserAction::Approve(target) => json!(self.approve(&target).await?),
            UserAction::Reject(target) => json!(self.reject(&target).await?),
            UserAction::Modify { target, feedback } => {
                json!(self.modify(&target, &feedback).await?)
            },
            UserAction::ReplayCommand { index } => json!(self.replay(index).await?),
        };

        self.events.emit(
            events::USER_ACTION_RESULT,
            json!({ "type": name, "result": payload }),
        );
        Ok(payload)
    }

    fn state_payload(&self, result: ExecutionResult) -> Value {
        self.emit_state(&result);
        json!(result)
    }

    async fn analyze(&self) -> Result<Value> {
        let mut executor = self.executor().await?;
        let state = executor.current_state().await;
        let analysis = match self.generate(prompt::analysis(&state)).await {
            Ok(text) => match extract_json_object(&text) {
                Some(map) => Value::Object(map),
                None => json!({
                    "rawAnalysis": text,
                    "error": "analysis was not valid JSON",
                }),
            },
            Err(e) => json!({ "error": "page analysis failed", "details": e.to_string() }),
        };
        self.events
            .emit(events::PAGE_ANALYSIS, json!({ "analysis": analysis }));
        Ok(json!({ "analysis": analysis }))
    }

    async fn suggest(&self) -> Result<Value> {
        let mut executor = self.executor().await?;
        let state = executor.current_state().await;
        let suggestions = match self
            .generate(prompt::suggestions(&state, self.settings.max_tokens))
            .await
        {
            Ok(text) => extract_suggestions(&text),
            Err(e) => vec![SuggestedAction::error(
                "could not generate suggestions",
                e.to_string(),
            )],
        };
        self.events
            .emit(events::SUGGESTED_ACTIONS, json!({ "suggestions": suggestions }));
        Ok(json!({ "suggestions": suggestions }))
    }

    async fn explain(&self) -> Result<Value> {
        let mut executor = self.executor().await?;
        let state = executor.current_state().await;
        let explanation = self
            .generate(prompt::explanation(&state, self.settings.max_tokens))
            .await
            .unwrap_or_else(|e| format!("The current page could not be explained: {e}"));
        self.events.emit(
            events::STATE_EXPLANATION,
            json!({ "explanation": explanation }),
        );
        Ok(json!({ "explanation": explanation }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        crate::{
            events::SessionEvent,
            testing::{BrowserRecorder, Call, ScriptedGenerator, navigate_reply},
        },
        tokio::sync::mpsc::UnboundedReceiver,
    };

    struct Harness {
        session: Arc<Session>,
        recorder: BrowserRecorder,
        generator: Arc<ScriptedGenerator>,
        events: UnboundedReceiver<SessionEvent>,
    }

    impl Harness {
        fn new() -> Self {
            Self::with(|_| {})
        }

        fn with(tweak: impl FnOnce(&mut SessionSettings)) -> Self {
            let recorder = BrowserRecorder::default();
            let generator = ScriptedGenerator::new();
            let mut settings = SessionSettings {
                feedback: false,
                ..SessionSettings::default()
            };
            settings.executor.action_timeout = Duration::from_secs(2);
            tweak(&mut settings);
            let (sender, events) = EventSender::channel();
            let session = Session::new(
                "test-session",
                Capabilities {
                    launcher: recorder.launcher(),
                    generator: generator.clone(),
                },
                settings,
                sender,
            );
            Self {
                session: Arc::new(session),
                recorder,
                generator,
                events,
            }
        }

        async fn ready() -> Self {
            let h = Self::new();
            h.session.initialize().await.unwrap();
            h
        }

        fn drain(&mut self) -> Vec<SessionEvent> {
            let mut out = Vec::new();
            while let Ok(event) = self.events.try_recv() {
                out.push(event);
            }
            out
        }

        fn names(&mut self) -> Vec<&'static str> {
            self.drain().into_iter().map(|e| e.name).collect()
        }

        /// Park a navigate proposal and return its id.
        async fn propose(&self, url: &str) -> String {
            self.generator.reply(navigate_reply(url));
            match self.session.run_instruction("open it", true).await.unwrap() {
                InstructionOutcome::Proposed { proposal } => proposal.id,
                other => panic!("expected a proposal, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let mut h = Harness::new();
        h.session.initialize().await.unwrap();
        h.session.initialize().await.unwrap();
        assert_eq!(h.recorder.launches(), 1);
        assert!(h.session.is_initialized());
        assert_eq!(h.names(), vec![events::SESSION_READY, events::SESSION_READY]);
    }

    #[tokio::test]
    async fn launch_failure_reports_session_error() {
        let mut h = Harness::new();
        h.recorder.fail_launches();
        let err = h.session.initialize().await.unwrap_err();
        assert!(matches!(err, SessionError::CapabilityFailure(_)));
        assert!(!h.session.is_initialized());
        assert_eq!(h.names(), vec![events::SESSION_ERROR]);
    }

    #[tokio::test]
    async fn operations_before_initialize_fail_without_side_effects() {
        let h = Harness::new();
        assert!(matches!(
            h.session.run_instruction("go to example.com", false).await,
            Err(SessionError::NotInitialized)
        ));
        assert!(matches!(
            h.session.user_action(UserAction::NavigateBack).await,
            Err(SessionError::NotInitialized)
        ));
        assert!(matches!(
            h.session.replay(0).await,
            Err(SessionError::NotInitialized)
        ));
        assert!(h.recorder.calls().is_empty());
        assert!(h.generator.requests().is_empty());
    }

    #[tokio::test]
    async fn direct_instruction_executes_without_history() {
        let mut h = Harness::ready().await;
        h.drain();
        h.generator.reply(navigate_reply("https://example.com"));

        let outcome = h
            .session
            .run_instruction("go to example.com", false)
            .await
            .unwrap();
        let InstructionOutcome::Executed { result, feedback, .. } = outcome else {
            panic!("expected execution");
        };
        assert!(result.success);
        assert_eq!(result.url.as_deref(), Some("https://example.com/"));
        assert!(feedback.is_none());

        assert_eq!(
            h.recorder.actions(),
            vec![Call::Navigate("https://example.com/".into())]
        );
        assert!(h.session.history().await.is_empty());

        let events = h.drain();
        let names: Vec<_> = events.iter().map(|e| e.name).collect();
        assert_eq!(
            names,
            vec![
                events::INSTRUCTION_STARTED,
                events::GENERATOR_TEXT,
                events::STATE_UPDATE
            ]
        );
        let update = &events[2].payload;
        assert_eq!(update["url"], "https://example.com/");
        assert_eq!(update["title"], "Title of https://example.com/");
        assert!(update["screenshot"].is_string());
    }

    #[tokio::test]
    async fn feedback_follows_direct_execution() {
        let mut h = Harness::with(|s| s.feedback = true);
        h.session.initialize().await.unwrap();
        h.drain();
        h.generator.reply(navigate_reply("https://example.com"));
        h.generator.reply("Looks good, the page loaded.");

        let outcome = h.session.run_instruction("open example", false).await.unwrap();
        assert!(matches!(
            outcome,
            InstructionOutcome::Executed { feedback: Some(ref f), .. } if f == "Looks good, the page loaded."
        ));
        assert_eq!(h.names().last(), Some(&events::GENERATOR_FEEDBACK));
    }

    #[tokio::test]
    async fn feedback_fault_uses_fallback_text() {
        let h = Harness::with(|s| s.feedback = true);
        h.session.initialize().await.unwrap();
        h.generator.reply(navigate_reply("https://example.com"));
        h.generator.fail("rate limited");

        let outcome = h.session.run_instruction("open example", false).await.unwrap();
        let InstructionOutcome::Executed { result, feedback, .. } = outcome else {
            panic!("expected execution");
        };
        assert!(result.success);
        assert_eq!(feedback.as_deref(), Some(FEEDBACK_FALLBACK));
    }

    #[tokio::test]
    async fn unusable_generator_text_is_an_extraction_failure() {
        let h = Harness::ready().await;
        h.generator.reply("I am not sure what you would like me to do.");
        let err = h.session.run_instruction("hmm", false).await.unwrap_err();
        match err {
            SessionError::ExtractionFailure { raw } => {
                assert_eq!(raw, "I am not sure what you would like me to do.");
            },
            other => panic!("unexpected error: {other}"),
        }
        assert!(h.recorder.actions().is_empty());
    }

    #[tokio::test]
    async fn generator_fault_is_a_capability_failure() {
        let h = Harness::ready().await;
        h.generator.fail("connection refused");
        let err = h.session.run_instruction("open example", false).await.unwrap_err();
        assert!(matches!(err, SessionError::CapabilityFailure(ref m) if m.contains("connection refused")));
        assert!(h.recorder.actions().is_empty());
    }

    #[tokio::test]
    async fn approve_executes_the_original_proposal() {
        let mut h = Harness::ready().await;
        let id = h.propose("https://example.com").await;
        assert!(h.recorder.actions().is_empty());
        assert!(h.names().contains(&events::APPROVAL_NEEDED));

        let resolution = h.session.approve(&ProposalTarget::Id(id.clone())).await.unwrap();
        assert_eq!(resolution.disposition, Disposition::Approved);
        assert_eq!(resolution.history_index, Some(0));
        assert_eq!(
            resolution.command.param_str("url"),
            Some("https://example.com")
        );
        assert_eq!(
            h.recorder.actions(),
            vec![Call::Navigate("https://example.com/".into())]
        );

        let history = h.session.history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].disposition, Disposition::Approved);
        assert_eq!(history[0].command, resolution.command);
        assert!(h.session.pending_proposals().await.is_empty());

        // Resolved proposals cannot be approved twice.
        assert!(matches!(
            h.session.approve(&ProposalTarget::Id(id)).await,
            Err(SessionError::InvalidRequest(_))
        ));
        assert_eq!(h.session.history().await.len(), 1);
    }

    #[tokio::test]
    async fn reject_never_touches_the_browser() {
        let h = Harness::ready().await;
        let id = h.propose("https://example.com").await;
        let calls_before = h.recorder.calls().len();

        let resolution = h.session.reject(&ProposalTarget::Id(id)).await.unwrap();
        assert_eq!(resolution.disposition, Disposition::Rejected);
        assert!(resolution.result.is_none());
        assert_eq!(h.recorder.calls().len(), calls_before);

        let history = h.session.history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].disposition, Disposition::Rejected);
    }

    #[tokio::test]
    async fn modify_executes_the_revision() {
        let h = Harness::ready().await;
        let id = h.propose("https://example.com").await;
        h.generator.reply(navigate_reply("https://example.org"));

        let resolution = h
            .session
            .modify(&ProposalTarget::Id(id), "use the .org site")
            .await
            .unwrap();
        assert_eq!(resolution.disposition, Disposition::Modified);
        assert_eq!(
            h.recorder.actions(),
            vec![Call::Navigate("https://example.org/".into())]
        );

        let entry = &h.session.history().await[0];
        assert_eq!(entry.command.param_str("url"), Some("https://example.org"));
        assert_eq!(
            entry.original_command.as_ref().and_then(|c| c.param_str("url")),
            Some("https://example.com")
        );
        assert_eq!(entry.feedback.as_deref(), Some("use the .org site"));
    }

    #[tokio::test]
    async fn modify_falls_back_to_the_original() {
        let h = Harness::ready().await;
        let id = h.propose("https://example.com").await;
        h.generator.reply("Sorry, I cannot revise that.");

        let resolution = h
            .session
            .modify(&ProposalTarget::Id(id), "something else")
            .await
            .unwrap();
        assert_eq!(
            resolution.command.param_str("url"),
            Some("https://example.com")
        );
        assert_eq!(
            h.recorder.actions(),
            vec![Call::Navigate("https://example.com/".into())]
        );
        assert_eq!(
            h.session.history().await[0].disposition,
            Disposition::Modified
        );
    }

    #[tokio::test]
    async fn paused_session_rejects_instructions_until_resumed() {
        let h = Harness::ready().await;
        h.session.pause().await.unwrap();
        assert!(h.session.is_paused().await);

        assert!(matches!(
            h.session.run_instruction("go to example.com", false).await,
            Err(SessionError::Paused)
        ));
        assert!(h.generator.requests().is_empty());
        assert!(h.recorder.actions().is_empty());

        h.session.resume().await.unwrap();
        h.generator.reply(navigate_reply("https://example.com"));
        assert!(h.session.run_instruction("go to example.com", false).await.is_ok());
        assert_eq!(h.recorder.actions().len(), 1);
    }

    #[tokio::test]
    async fn pause_does_not_cancel_the_instruction_in_flight() {
        let h = Harness::ready().await;
        h.recorder.set_navigate_delay(Duration::from_millis(200));
        h.generator.reply(navigate_reply("https://example.com"));

        let session = h.session.clone();
        let in_flight =
            tokio::spawn(async move { session.run_instruction("open example", false).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        h.session.pause().await.unwrap();

        let outcome = in_flight.await.unwrap().unwrap();
        assert!(matches!(outcome, InstructionOutcome::Executed { ref result, .. } if result.success));
        assert!(matches!(
            h.session.run_instruction("again", false).await,
            Err(SessionError::Paused)
        ));
    }

    #[tokio::test]
    async fn replay_reexecutes_recorded_commands() {
        let h = Harness::ready().await;
        let id = h.propose("https://example.com").await;
        h.session.approve(&ProposalTarget::Id(id)).await.unwrap();

        let resolution = h.session.replay(0).await.unwrap();
        assert_eq!(resolution.disposition, Disposition::Replayed);
        assert!(resolution.history_index.is_none());
        assert_eq!(h.recorder.actions().len(), 2);
        assert_eq!(h.session.history().await.len(), 1);
    }

    #[tokio::test]
    async fn replays_can_be_recorded() {
        let h = Harness::with(|s| s.record_replays = true);
        h.session.initialize().await.unwrap();
        let id = h.propose("https://example.com").await;
        h.session.approve(&ProposalTarget::Id(id)).await.unwrap();

        let resolution = h.session.replay(0).await.unwrap();
        assert_eq!(resolution.history_index, Some(1));
        assert_eq!(
            h.session.history().await[1].disposition,
            Disposition::Replayed
        );
    }

    #[tokio::test]
    async fn replay_out_of_range_never_executes() {
        let h = Harness::ready().await;
        let err = h.session.replay(3).await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidRequest(ref m) if m.contains("index 3")));
        assert!(h.recorder.actions().is_empty());
    }

    #[tokio::test]
    async fn stop_clears_pending_proposals() {
        let h = Harness::ready().await;
        let id = h.propose("https://a.example").await;
        h.propose("https://b.example").await;

        assert_eq!(h.session.stop().await.unwrap(), 2);
        assert!(h.session.pending_proposals().await.is_empty());
        assert!(h.session.approve(&ProposalTarget::Id(id)).await.is_err());
        assert!(h.recorder.actions().is_empty());
    }

    #[tokio::test]
    async fn direct_actions_emit_state_updates() {
        let mut h = Harness::ready().await;
        h.generator.reply(navigate_reply("https://a.example"));
        h.session.run_instruction("a", false).await.unwrap();
        h.generator.reply(navigate_reply("https://b.example"));
        h.session.run_instruction("b", false).await.unwrap();
        h.drain();

        let payload = h.session.user_action(UserAction::NavigateBack).await.unwrap();
        assert_eq!(payload["url"], "https://a.example/");
        assert_eq!(payload["action"], "navigate_back");

        h.session.user_action(UserAction::ScrollDown).await.unwrap();
        assert_eq!(
            h.recorder.actions().last(),
            Some(&Call::Scroll(ScrollDirection::Down, 300))
        );

        let names = h.names();
        assert_eq!(
            names,
            vec![
                events::STATE_UPDATE,
                events::USER_ACTION_RESULT,
                events::STATE_UPDATE,
                events::USER_ACTION_RESULT
            ]
        );
        assert!(h.session.history().await.is_empty());
    }

    #[tokio::test]
    async fn suggestions_fall_back_to_an_error_entry() {
        let mut h = Harness::ready().await;
        h.drain();
        h.generator.reply("```json\n[{\"action\": \"click\", \"params\": {\"selector\": \"#login\"}, \"description\": \"log in\"}]\n```");
        let payload = h.session.user_action(UserAction::SuggestActions).await.unwrap();
        assert_eq!(payload["suggestions"][0]["action"], "click");

        h.generator.reply("no idea");
        let payload = h.session.user_action(UserAction::SuggestActions).await.unwrap();
        assert_eq!(payload["suggestions"][0]["action"], "error");

        let names = h.names();
        assert_eq!(names[0], events::SUGGESTED_ACTIONS);
    }

    #[tokio::test]
    async fn analysis_sends_the_screenshot_and_keeps_raw_text() {
        let h = Harness::ready().await;
        h.generator.reply("The page has a header and a login form.");
        let payload = h.session.user_action(UserAction::RequestAnalysis).await.unwrap();
        assert_eq!(
            payload["analysis"]["rawAnalysis"],
            "The page has a header and a login form."
        );

        let request = h.generator.requests().pop().unwrap();
        assert_eq!(request.image.as_deref(), Some("iVBORw0KGgo="));
    }

    #[tokio::test]
    async fn teardown_during_an_action_closes_once() {
        let h = Harness::ready().await;
        h.recorder.set_navigate_delay(Duration::from_millis(200));
        h.generator.reply(navigate_reply("https://example.com"));

        let session = h.session.clone();
        let in_flight =
            tokio::spawn(async move { session.run_instruction("open example", false).await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        tokio::join!(h.session.teardown(), h.session.teardown());

        let outcome = in_flight.await.unwrap().unwrap();
        assert!(matches!(outcome, InstructionOutcome::Executed { ref result, .. } if result.success));
        let closes = h.recorder.calls().iter().filter(|c| **c == Call::Close).count();
        assert_eq!(closes, 1);
        assert!(matches!(
            h.session.get_state().await,
            Err(SessionError::Closed)
        ));
    }

    #[tokio::test]
    async fn teardown_is_idempotent() {
        let never_started = Harness::new();
        never_started.session.teardown().await;
        never_started.session.teardown().await;
        assert!(never_started.recorder.calls().is_empty());

        let h = Harness::ready().await;
        h.session.teardown().await;
        h.session.teardown().await;
        let closes = h.recorder.calls().iter().filter(|c| **c == Call::Close).count();
        assert_eq!(closes, 1);
        assert!(matches!(
            h.session.run_instruction("anything", false).await,
            Err(SessionError::Closed)
        ));
        assert!(matches!(h.session.initialize().await, Err(SessionError::Closed)));
    }
}
