use {
    serde_json::{Value, json},
    thiserror::Error,
    wayfinder_protocol::{ErrorShape, error_codes},
};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("browser session is not initialized")]
    NotInitialized,

    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// Generator text yielded no command; carries the text for manual review.
    #[error("no command could be derived from the generator output")]
    ExtractionFailure { raw: String },

    #[error("capability failure: {0}")]
    CapabilityFailure(String),

    #[error("session is paused; resume before running instructions")]
    Paused,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("session is closed")]
    Closed,
}

impl SessionError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotInitialized => error_codes::SESSION_NOT_INITIALIZED,
            Self::InvalidCommand(_) => error_codes::INVALID_COMMAND,
            Self::ExtractionFailure { .. } => error_codes::EXTRACTION_FAILED,
            Self::CapabilityFailure(_) => error_codes::CAPABILITY_FAILURE,
            Self::Paused => error_codes::PAUSED,
            Self::InvalidRequest(_) => error_codes::INVALID_REQUEST,
            Self::Closed => error_codes::SESSION_CLOSED,
        }
    }

    pub fn capability(source: impl std::fmt::Display) -> Self {
        Self::CapabilityFailure(source.to_string())
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    fn details(&self) -> Option<Value> {
        match self {
            Self::ExtractionFailure { raw } => Some(json!({ "rawText": raw })),
            _ => None,
        }
    }
}

impl From<&SessionError> for ErrorShape {
    fn from(err: &SessionError) -> Self {
        let shape = ErrorShape::new(err.code(), err.to_string());
        match err.details() {
            Some(details) => shape.with_details(details),
            None => shape,
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
