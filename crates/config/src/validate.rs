//! Semantic checks on a loaded configuration.

use std::fmt;

use crate::schema::WayfinderConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "session.home_url"
    pub path: &'static str,
    pub message: String,
}

impl Diagnostic {
    fn error(path: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            path,
            message: message.into(),
        }
    }

    fn warning(path: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            path,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.severity, self.path, self.message)
    }
}

/// Check values that deserialize fine but cannot work at runtime.
#[must_use]
pub fn validate(config: &WayfinderConfig) -> Vec<Diagnostic> {
    let mut out = Vec::new();

    if config.server.port == 0 {
        out.push(Diagnostic::warning(
            "server.port",
            "port 0 binds a random port",
        ));
    }

    if config.browser.viewport_width == 0 || config.browser.viewport_height == 0 {
        out.push(Diagnostic::error(
            "browser.viewport_width",
            "viewport dimensions must be non-zero",
        ));
    }

    match url::Url::parse(&config.generator.base_url) {
        Ok(u) if matches!(u.scheme(), "http" | "https") => {},
        Ok(u) => out.push(Diagnostic::error(
            "generator.base_url",
            format!("unsupported scheme '{}'", u.scheme()),
        )),
        Err(e) => out.push(Diagnostic::error(
            "generator.base_url",
            format!("not a valid URL: {e}"),
        )),
    }

    if !(0.0..=2.0).contains(&config.generator.temperature) {
        out.push(Diagnostic::warning(
            "generator.temperature",
            "expected a value between 0 and 2",
        ));
    }

    if config.generator.max_tokens == 0 {
        out.push(Diagnostic::error(
            "generator.max_tokens",
            "must be greater than zero",
        ));
    }

    if config.generator.resolved_api_key().is_none() {
        out.push(Diagnostic::warning(
            "generator.api_key",
            "no API key configured and OPENAI_API_KEY is unset",
        ));
    }

    if config.session.action_timeout_ms == 0 {
        out.push(Diagnostic::error(
            "session.action_timeout_ms",
            "must be greater than zero",
        ));
    }

    if url::Url::parse(&config.session.home_url).is_err() {
        out.push(Diagnostic::error(
            "session.home_url",
            "not a valid absolute URL",
        ));
    }

    if config.session.default_wait_ms > config.session.action_timeout_ms {
        out.push(Diagnostic::warning(
            "session.default_wait_ms",
            "longer than action_timeout_ms; waits will be capped",
        ));
    }

    out
}

/// Whether any diagnostic is an error.
#[must_use]
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(|d| d.severity == Severity::Error)
}
