use wayfinder_common::FromMessage;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no API key configured; set generator.api_key or {env}")]
    MissingApiKey { env: &'static str },

    #[error("generator request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("generator API error HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("generator response contained no message content")]
    EmptyResponse,

    #[error("{message}")]
    Message { message: String },
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

wayfinder_common::impl_context!();

impl From<Error> for wayfinder_common::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::MissingApiKey { .. } => Self::unavailable("generator", err.to_string()),
            other => Self::wrap("generator", other),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn context_prefixes_the_message() {
        let failed: std::result::Result<(), &str> = Err("socket closed");
        let err = failed.context("reading response").unwrap_err();
        assert_eq!(err.to_string(), "reading response: socket closed");
    }

    #[test]
    fn missing_key_crosses_the_boundary_as_unavailable() {
        let err: wayfinder_common::Error = Error::MissingApiKey {
            env: "OPENAI_API_KEY",
        }
        .into();
        assert!(matches!(err, wayfinder_common::Error::Unavailable { .. }));
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }
}
