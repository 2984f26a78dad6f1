/// Config schema types (server, browser, generator, session).
use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Environment variable consulted when `generator.api_key` is unset.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WayfinderConfig {
    pub server: ServerConfig,
    pub browser: BrowserConfig,
    pub generator: GeneratorConfig,
    pub session: SessionConfig,
}

/// HTTP/WebSocket listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 3000,
        }
    }
}

/// Browser launch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Path to a Chrome/Chromium binary (auto-detected when unset or empty).
    pub chrome_path: Option<String>,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// CDP request and navigation timeout in milliseconds.
    pub navigation_timeout_ms: u64,
    /// Extra Chrome command-line arguments.
    pub chrome_args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: true,
            viewport_width: 1280,
            viewport_height: 800,
            navigation_timeout_ms: 30_000,
            chrome_args: Vec::new(),
        }
    }
}

/// OpenAI-compatible text generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub base_url: String,
    pub model: String,
    /// API key; `OPENAI_API_KEY` is used when unset.
    #[serde(
        default,
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_key: Option<Secret<String>>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask the generator to comment on each directly executed instruction.
    pub feedback: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o".into(),
            api_key: None,
            temperature: 0.7,
            max_tokens: 500,
            feedback: true,
        }
    }
}

impl GeneratorConfig {
    /// The configured key, or `OPENAI_API_KEY` from the environment.
    ///
    /// A `${VAR}` placeholder that substitution could not resolve counts as
    /// unset.
    pub fn resolved_api_key(&self) -> Option<Secret<String>> {
        self.resolved_api_key_with(|name| std::env::var(name).ok())
    }

    fn resolved_api_key_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Option<Secret<String>> {
        self.api_key
            .as_ref()
            .map(|key| key.expose_secret().trim().to_string())
            .filter(|key| !key.is_empty() && !key.contains("${"))
            .or_else(|| lookup(API_KEY_ENV).filter(|key| !key.trim().is_empty()))
            .map(Secret::new)
    }
}

/// Per-session behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Upper bound on any single capability call.
    pub action_timeout_ms: u64,
    /// Target of the `navigate_home` user action.
    pub home_url: String,
    /// Pixels moved by `scroll_up` / `scroll_down` and by a `scroll` command
    /// without an amount.
    pub scroll_amount: u32,
    /// Duration of a `wait` command without a `time` param.
    pub default_wait_ms: u64,
    /// Append a `replayed` history entry for every replay.
    pub record_replays: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            action_timeout_ms: 30_000,
            home_url: "https://www.google.com".into(),
            scroll_amount: 300,
            default_wait_ms: 1_000,
            record_replays: false,
        }
    }
}

// ── Serde helpers for Secret<String> ────────────────────────────────────────

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}
