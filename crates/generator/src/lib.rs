//! Text-generation capability backed by an OpenAI-compatible
//! `/chat/completions` endpoint.

pub mod error;
pub mod openai;

pub use {
    error::{Context, Error as GeneratorError, Result},
    openai::OpenAiGenerator,
};
