//! WebSocket gateway: one browser-automation session per connection.
//!
//! Lifecycle:
//! 1. Client upgrades `/ws`; the gateway creates a session and pushes `connected`
//! 2. Requests arrive as `{"type":"req"}` frames and are answered with `res` frames
//! 3. Session activity is pushed as `event` frames in emission order
//! 4. On disconnect the session is torn down and its browser released

pub mod methods;
pub mod server;
pub mod state;
pub mod ws;

pub use {
    server::{build_app, serve, start},
    state::GatewayState,
};
