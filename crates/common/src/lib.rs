//! Shared types, capability traits, and error definitions used across all
//! wayfinder crates.

pub mod capability;
pub mod error;
pub mod types;

pub use {
    capability::{BrowserCapability, BrowserLauncher, Generator},
    error::{Error, FromMessage, Result},
    types::{
        ActionCommand, ActionKind, BrowserState, ExecutionResult, GeneratorRequest,
        ScrollDirection,
    },
};
