//! Adapts one [`ActionCommand`] to the browser capability.
//!
//! Every capability fault is converted into an [`ExecutionResult`] here;
//! nothing escapes [`Executor::execute`].

use std::{future::Future, time::Duration};

use {
    serde::{Deserialize, de::DeserializeOwned},
    serde_json::{Map, Value},
    tokio::time::timeout,
    tracing::{debug, warn},
    url::Url,
    wayfinder_common::{
        ActionCommand, ActionKind, BrowserCapability, BrowserState, ExecutionResult,
        ScrollDirection,
    },
    wayfinder_config::SessionConfig,
};

use crate::error::{Result, SessionError};

/// Substrings that only show up when a generator leaks JSON or prompt
/// fragments into a URL.
const SUSPICIOUS_URL_PATTERNS: [&str; 5] = ["}}}", "]}", "}<", "assistant to=", "functions."];

#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    /// Upper bound on every capability call.
    pub action_timeout: Duration,
    pub default_wait: Duration,
    pub scroll_amount: u32,
    pub home_url: String,
}

impl From<&SessionConfig> for ExecutorSettings {
    fn from(cfg: &SessionConfig) -> Self {
        Self {
            action_timeout: Duration::from_millis(cfg.action_timeout_ms),
            default_wait: Duration::from_millis(cfg.default_wait_ms),
            scroll_amount: cfg.scroll_amount,
            home_url: cfg.home_url.clone(),
        }
    }
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

// ── Typed params ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct NavigateParams {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ClickParams {
    selector: Option<String>,
    x: Option<f64>,
    y: Option<f64>,
}

#[derive(Debug, PartialEq)]
enum ClickTarget {
    Selector(String),
    Point { x: f64, y: f64 },
}

impl ClickParams {
    fn target(self) -> Result<ClickTarget> {
        match (self.selector, self.x, self.y) {
            (Some(selector), ..) if !selector.trim().is_empty() => {
                Ok(ClickTarget::Selector(selector))
            },
            (_, Some(x), Some(y)) => Ok(ClickTarget::Point { x, y }),
            _ => Err(SessionError::InvalidCommand(
                "click: requires a selector or both x and y".into(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypeParams {
    selector: String,
    text: String,
    #[serde(default, alias = "press_enter")]
    press_enter: bool,
}

#[derive(Debug, Deserialize)]
struct WaitParams {
    time: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ExtractParams {
    selector: String,
}

#[derive(Debug, Deserialize)]
struct ScrollParams {
    direction: Option<ScrollDirection>,
    amount: Option<f64>,
}

fn decode<T: DeserializeOwned>(kind: ActionKind, params: &Map<String, Value>) -> Result<T> {
    serde_json::from_value(Value::Object(params.clone()))
        .map_err(|e| SessionError::InvalidCommand(format!("{kind}: {e}")))
}

fn require(kind: ActionKind, field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(SessionError::InvalidCommand(format!(
            "{kind}: `{field}` must not be empty"
        )));
    }
    Ok(())
}

fn non_negative_millis(value: f64) -> Duration {
    Duration::from_millis(value.max(0.0) as u64)
}

// ── Capability calls ────────────────────────────────────────────────────────

/// Run one capability call under the action timeout.
async fn bounded<T>(
    limit: Duration,
    op: &str,
    call: impl Future<Output = wayfinder_common::Result<T>>,
) -> Result<T> {
    match timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(SessionError::CapabilityFailure(format!("{op}: {e}"))),
        Err(_) => Err(SessionError::CapabilityFailure(format!(
            "{op} timed out after {}ms",
            limit.as_millis()
        ))),
    }
}

enum Outcome {
    Mutated,
    Extracted(Option<String>),
}

/// Owns one session's browser handle.
pub struct Executor {
    browser: Box<dyn BrowserCapability>,
    settings: ExecutorSettings,
    closed: bool,
}

impl Executor {
    pub fn new(browser: Box<dyn BrowserCapability>, settings: ExecutorSettings) -> Self {
        Self {
            browser,
            settings,
            closed: false,
        }
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// Execute one command. Mutating actions carry the post-action snapshot;
    /// `extract` carries only the extracted text.
    pub async fn execute(&mut self, command: &ActionCommand) -> ExecutionResult {
        let Some(kind) = command.kind() else {
            warn!(action = %command.action, "unknown action");
            return ExecutionResult::failed(None, "unknown action");
        };

        debug!(action = %kind, "executing command");
        match self.run(kind, &command.params).await {
            Ok(Outcome::Mutated) => {
                let state = self.current_state().await;
                ExecutionResult::succeeded(kind.as_str()).with_state(state)
            },
            Ok(Outcome::Extracted(content)) => {
                ExecutionResult::succeeded(kind.as_str()).with_extracted(content)
            },
            Err(e) => {
                warn!(action = %kind, error = %e, "command failed");
                ExecutionResult::failed(Some(kind.as_str().to_string()), e.to_string())
            },
        }
    }

    async fn run(&mut self, kind: ActionKind, params: &Map<String, Value>) -> Result<Outcome> {
        let limit = self.settings.action_timeout;
        match kind {
            ActionKind::Navigate => {
                let p: NavigateParams = decode(kind, params)?;
                let url = normalize_url(&p.url)?;
                bounded(limit, "navigate", self.browser.navigate(&url)).await?;
            },
            ActionKind::Click => match decode::<ClickParams>(kind, params)?.target()? {
                ClickTarget::Selector(selector) => {
                    bounded(limit, "click", self.browser.click_selector(&selector)).await?;
                },
                ClickTarget::Point { x, y } => {
                    bounded(limit, "click", self.browser.click_at(x, y)).await?;
                },
            },
            ActionKind::Type => {
                let p: TypeParams = decode(kind, params)?;
                require(kind, "selector", &p.selector)?;
                bounded(
                    limit,
                    "type",
                    self.browser.type_text(&p.selector, &p.text, p.press_enter),
                )
                .await?;
            },
            ActionKind::Wait => {
                let p: WaitParams = decode(kind, params)?;
                let wait = p
                    .time
                    .map_or(self.settings.default_wait, non_negative_millis)
                    .min(limit);
                tokio::time::sleep(wait).await;
            },
            ActionKind::Extract => {
                let p: ExtractParams = decode(kind, params)?;
                require(kind, "selector", &p.selector)?;
                let content =
                    bounded(limit, "extract", self.browser.extract_text(&p.selector)).await?;
                return Ok(Outcome::Extracted(content));
            },
            ActionKind::Scroll => {
                let p: ScrollParams = decode(kind, params)?;
                let amount = p
                    .amount
                    .map_or(self.settings.scroll_amount, |a| a.max(0.0) as u32);
                let direction = p.direction.unwrap_or_default();
                bounded(limit, "scroll", self.browser.scroll(direction, amount)).await?;
            },
        }
        Ok(Outcome::Mutated)
    }

    /// Snapshot the page. A failed snapshot is folded into
    /// [`BrowserState::error`].
    pub async fn current_state(&mut self) -> BrowserState {
        match bounded(
            self.settings.action_timeout,
            "snapshot",
            self.browser.snapshot(),
        )
        .await
        {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "snapshot failed");
                BrowserState::from_error(e.to_string())
            },
        }
    }

    pub async fn go_back(&mut self) -> ExecutionResult {
        let outcome = bounded(
            self.settings.action_timeout,
            "go back",
            self.browser.go_back(),
        )
        .await;
        self.finish("navigate_back", outcome).await
    }

    pub async fn go_forward(&mut self) -> ExecutionResult {
        let outcome = bounded(
            self.settings.action_timeout,
            "go forward",
            self.browser.go_forward(),
        )
        .await;
        self.finish("navigate_forward", outcome).await
    }

    pub async fn navigate_home(&mut self) -> ExecutionResult {
        let command = ActionCommand::navigate(self.settings.home_url.clone());
        self.execute(&command).await
    }

    pub async fn scroll_by(&mut self, direction: ScrollDirection) -> ExecutionResult {
        let mut params = Map::new();
        params.insert(
            "direction".into(),
            serde_json::to_value(direction).unwrap_or(Value::Null),
        );
        params.insert("amount".into(), Value::from(self.settings.scroll_amount));
        self.execute(&ActionCommand::new(ActionKind::Scroll, params))
            .await
    }

    /// Snapshot wrapped as a successful result.
    pub async fn capture(&mut self) -> ExecutionResult {
        let state = self.current_state().await;
        ExecutionResult::succeeded("capture_screenshot").with_state(state)
    }

    /// Release the browser. Later calls are no-ops.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        bounded(
            self.settings.action_timeout,
            "close",
            self.browser.close(),
        )
        .await
    }

    async fn finish(&mut self, action: &str, outcome: Result<()>) -> ExecutionResult {
        match outcome {
            Ok(()) => {
                let state = self.current_state().await;
                ExecutionResult::succeeded(action).with_state(state)
            },
            Err(e) => {
                warn!(action, error = %e, "direct action failed");
                ExecutionResult::failed(Some(action.to_string()), e.to_string())
            },
        }
    }
}

// ── URL validation ──────────────────────────────────────────────────────────

/// Validate and normalize a navigation target.
///
/// Only http/https are accepted. A bare host (`example.com`,
/// `localhost:3000/path`) gets an `https://` prefix.
pub fn normalize_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SessionError::InvalidCommand(
            "navigate: `url` must not be empty".into(),
        ));
    }

    if let Some(pattern) = SUSPICIOUS_URL_PATTERNS
        .iter()
        .find(|p| trimmed.contains(**p))
    {
        warn!(url = %truncate_url(trimmed), pattern, "rejecting malformed URL");
        return Err(SessionError::InvalidCommand(format!(
            "navigate: malformed URL '{}'",
            truncate_url(trimmed)
        )));
    }

    let parsed = match Url::parse(trimmed) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => url,
        Ok(url) if looks_like_host_port(&url) => with_https(trimmed)?,
        Ok(url) => {
            return Err(SessionError::InvalidCommand(format!(
                "navigate: unsupported URL scheme '{}', only http and https are allowed",
                url.scheme()
            )));
        },
        Err(url::ParseError::RelativeUrlWithoutBase) => with_https(trimmed)?,
        Err(e) => return Err(invalid_url(trimmed, e)),
    };

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(SessionError::InvalidCommand(format!(
            "navigate: URL '{}' has no host",
            truncate_url(trimmed)
        )));
    }
    Ok(parsed.into())
}

/// `host:port[/path]` parses as a URL whose scheme is the host.
fn looks_like_host_port(url: &Url) -> bool {
    url.cannot_be_a_base()
        && url
            .path()
            .split('/')
            .next()
            .is_some_and(|port| !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()))
}

fn with_https(raw: &str) -> Result<Url> {
    Url::parse(&format!("https://{raw}")).map_err(|e| invalid_url(raw, e))
}

fn invalid_url(raw: &str, e: url::ParseError) -> SessionError {
    SessionError::InvalidCommand(format!(
        "navigate: invalid URL '{}': {e}",
        truncate_url(raw)
    ))
}

fn truncate_url(url: &str) -> String {
    const MAX: usize = 120;
    match url.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}...", &url[..cut]),
        None => url.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        crate::testing::{BrowserRecorder, Call},
        serde_json::json,
    };

    fn command(value: Value) -> ActionCommand {
        serde_json::from_value(value).unwrap()
    }

    fn executor(recorder: &BrowserRecorder) -> Executor {
        Executor::new(recorder.browser(), ExecutorSettings::default())
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("example.com").unwrap(), "https://example.com/");
        assert_eq!(
            normalize_url(" https://example.com/a?b=1 ").unwrap(),
            "https://example.com/a?b=1"
        );
        assert_eq!(
            normalize_url("localhost:3000/app").unwrap(),
            "https://localhost:3000/app"
        );
        assert!(normalize_url("").is_err());
        assert!(normalize_url("file:///etc/passwd").is_err());
        assert!(normalize_url("javascript:alert(1)").is_err());
        assert!(normalize_url("https://example.com/}}}").is_err());
        assert!(normalize_url("functions.browser").is_err());
    }

    #[tokio::test]
    async fn test_navigate_resnapshots() {
        let recorder = BrowserRecorder::default();
        let mut exec = executor(&recorder);
        let result = exec
            .execute(&command(json!({"action": "navigate", "params": {"url": "example.com"}})))
            .await;
        assert!(result.success, "{result:?}");
        assert_eq!(result.action.as_deref(), Some("navigate"));
        assert_eq!(result.url.as_deref(), Some("https://example.com/"));
        assert!(result.screenshot.is_some());
        assert_eq!(
            recorder.calls(),
            vec![Call::Navigate("https://example.com/".into()), Call::Snapshot]
        );
    }

    #[tokio::test]
    async fn test_unknown_action_never_touches_capability() {
        let recorder = BrowserRecorder::default();
        let mut exec = executor(&recorder);
        let result = exec
            .execute(&command(json!({"action": "hover", "params": {"selector": "a"}})))
            .await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("unknown action"));
        assert!(recorder.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_param_is_invalid_command() {
        let recorder = BrowserRecorder::default();
        let mut exec = executor(&recorder);
        let result = exec
            .execute(&command(json!({"action": "navigate", "params": {}})))
            .await;
        assert!(!result.success);
        assert!(
            result
                .error
                .as_deref()
                .unwrap()
                .starts_with("invalid command: navigate")
        );

        let result = exec
            .execute(&command(json!({"action": "click", "params": {"x": 10}})))
            .await;
        assert!(result.error.unwrap().contains("selector or both x and y"));
        assert!(recorder.calls().is_empty());
    }

    #[tokio::test]
    async fn test_click_by_coordinates() {
        let recorder = BrowserRecorder::default();
        let mut exec = executor(&recorder);
        let result = exec
            .execute(&command(json!({"action": "click", "params": {"x": 12.5, "y": 40}})))
            .await;
        assert!(result.success);
        assert_eq!(recorder.calls()[0], Call::ClickAt(12.5, 40.0));
    }

    #[tokio::test]
    async fn test_type_with_press_enter() {
        let recorder = BrowserRecorder::default();
        let mut exec = executor(&recorder);
        let result = exec
            .execute(&command(json!({
                "action": "type",
                "params": {"selector": "input#q", "text": "rust", "pressEnter": true}
            })))
            .await;
        assert!(result.success);
        assert_eq!(
            recorder.calls()[0],
            Call::Type {
                selector: "input#q".into(),
                text: "rust".into(),
                press_enter: true,
            }
        );
    }

    #[tokio::test]
    async fn test_extract_does_not_resnapshot() {
        let recorder = BrowserRecorder::default();
        let mut exec = executor(&recorder);
        let result = exec
            .execute(&command(json!({"action": "extract", "params": {"selector": "h1"}})))
            .await;
        assert!(result.success);
        assert_eq!(result.extracted_content.as_deref(), Some("text of h1"));
        assert!(result.url.is_none());
        assert_eq!(recorder.calls(), vec![Call::Extract("h1".into())]);
    }

    #[tokio::test]
    async fn test_scroll_defaults() {
        let recorder = BrowserRecorder::default();
        let mut exec = executor(&recorder);
        exec.execute(&command(json!({"action": "scroll"}))).await;
        assert_eq!(recorder.calls()[0], Call::Scroll(ScrollDirection::Down, 300));

        exec.scroll_by(ScrollDirection::Up).await;
        assert!(recorder.calls().contains(&Call::Scroll(ScrollDirection::Up, 300)));
    }

    #[tokio::test]
    async fn test_wait_is_capped_by_timeout() {
        let recorder = BrowserRecorder::default();
        let mut exec = Executor::new(recorder.browser(), ExecutorSettings {
            action_timeout: Duration::from_millis(20),
            ..Default::default()
        });
        let started = std::time::Instant::now();
        let result = exec
            .execute(&command(json!({"action": "wait", "params": {"time": 60000}})))
            .await;
        assert!(result.success);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_capability_fault_becomes_result_and_next_action_runs() {
        let recorder = BrowserRecorder::default();
        let mut exec = executor(&recorder);
        let result = exec
            .execute(&command(json!({"action": "click", "params": {"selector": "#missing"}})))
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("capability failure: click"));

        let result = exec
            .execute(&command(json!({"action": "click", "params": {"selector": "#ok"}})))
            .await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_timeout_is_capability_failure() {
        let recorder = BrowserRecorder::default();
        recorder.set_navigate_delay(Duration::from_secs(10));
        let mut exec = Executor::new(recorder.browser(), ExecutorSettings {
            action_timeout: Duration::from_millis(30),
            ..Default::default()
        });
        let result = exec.execute(&ActionCommand::navigate("https://slow.example")).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("timed out after 30ms"));

        recorder.set_navigate_delay(Duration::ZERO);
        let result = exec.execute(&ActionCommand::navigate("https://fast.example")).await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_history_navigation_and_home() {
        let recorder = BrowserRecorder::default();
        let mut exec = executor(&recorder);
        exec.execute(&ActionCommand::navigate("https://a.example")).await;
        exec.execute(&ActionCommand::navigate("https://b.example")).await;

        let back = exec.go_back().await;
        assert_eq!(back.action.as_deref(), Some("navigate_back"));
        assert_eq!(back.url.as_deref(), Some("https://a.example/"));

        let forward = exec.go_forward().await;
        assert_eq!(forward.url.as_deref(), Some("https://b.example/"));

        let home = exec.navigate_home().await;
        assert_eq!(home.url.as_deref(), Some("https://www.google.com/"));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let recorder = BrowserRecorder::default();
        let mut exec = executor(&recorder);
        exec.close().await.unwrap();
        exec.close().await.unwrap();
        assert_eq!(recorder.calls(), vec![Call::Close]);
    }
}
