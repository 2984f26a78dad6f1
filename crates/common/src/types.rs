use std::fmt;

use {
    serde::{Deserialize, Deserializer, Serialize},
    serde_json::{Map, Value},
};

// ── Action vocabulary ───────────────────────────────────────────────────────

/// The fixed set of browser actions a command may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Navigate,
    Click,
    Type,
    Wait,
    Extract,
    Scroll,
}

impl ActionKind {
    pub const ALL: [Self; 6] = [
        Self::Navigate,
        Self::Click,
        Self::Type,
        Self::Wait,
        Self::Extract,
        Self::Scroll,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Navigate => "navigate",
            Self::Click => "click",
            Self::Type => "type",
            Self::Wait => "wait",
            Self::Extract => "extract",
            Self::Scroll => "scroll",
        }
    }

    /// Case-insensitive lookup of an action name.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name))
    }

    /// Whether the action changes page state and needs a fresh snapshot.
    pub fn is_mutating(self) -> bool {
        !matches!(self, Self::Extract)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    #[default]
    Down,
    Left,
    Right,
}

impl ScrollDirection {
    /// Signed `(dx, dy)` offsets for `window.scrollBy`.
    pub fn offsets(self, amount: u32) -> (i64, i64) {
        let amount = i64::from(amount);
        match self {
            Self::Up => (0, -amount),
            Self::Down => (0, amount),
            Self::Left => (-amount, 0),
            Self::Right => (amount, 0),
        }
    }
}

// ── Commands ────────────────────────────────────────────────────────────────

/// One structured browser action derived from generator output.
///
/// `action` stays a string so that a command naming an action outside the
/// vocabulary still reaches the executor, which reports it. `params` is kept
/// verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCommand {
    pub action: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub params: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

fn null_as_empty<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Map<String, Value>, D::Error> {
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

impl ActionCommand {
    pub fn new(kind: ActionKind, params: Map<String, Value>) -> Self {
        Self {
            action: kind.as_str().to_string(),
            params,
            reasoning: None,
        }
    }

    pub fn navigate(url: impl Into<String>) -> Self {
        let mut params = Map::new();
        params.insert("url".into(), Value::String(url.into()));
        Self::new(ActionKind::Navigate, params)
    }

    #[must_use]
    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    /// The vocabulary entry this command names, if any.
    pub fn kind(&self) -> Option<ActionKind> {
        ActionKind::parse(&self.action)
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }
}

// ── Browser state ───────────────────────────────────────────────────────────

/// Snapshot of the page after an action. Every field is optional: a session
/// without a page, or a faulted snapshot, yields nulls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserState {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// Base64-encoded PNG.
    #[serde(default)]
    pub screenshot: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BrowserState {
    pub fn from_error(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Outcome of executing one command, with the post-action page state merged
/// in for mutating actions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_content: Option<String>,
    /// Set when the post-action snapshot itself faulted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    pub fn succeeded(action: impl Into<String>) -> Self {
        Self {
            success: true,
            action: Some(action.into()),
            ..Default::default()
        }
    }

    pub fn failed(action: Option<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            action,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_state(mut self, state: BrowserState) -> Self {
        self.url = state.url;
        self.title = state.title;
        self.screenshot = state.screenshot;
        self.content = state.content;
        self.state_error = state.error;
        self
    }

    #[must_use]
    pub fn with_extracted(mut self, content: Option<String>) -> Self {
        self.extracted_content = content;
        self
    }

    /// The page state carried by this result.
    pub fn state(&self) -> BrowserState {
        BrowserState {
            url: self.url.clone(),
            title: self.title.clone(),
            screenshot: self.screenshot.clone(),
            content: self.content.clone(),
            error: self.state_error.clone(),
        }
    }
}

// ── Generator requests ──────────────────────────────────────────────────────

/// Prompt context handed to a [`crate::Generator`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorRequest {
    pub system: String,
    pub user: String,
    /// Base64-encoded PNG attached to the user turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl GeneratorRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_image(mut self, image: Option<String>) -> Self {
        self.image = image;
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}
