//! Backend Service
//!
//! The authenticated message protocol: envelope types, connection and
//! dispatch machinery, the shared service state, and the request handlers.

pub mod handlers;
pub mod launcher;
pub mod protocol;
pub mod server;
pub mod state;

pub use launcher::{GameLauncher, LoggingLauncher};
pub use server::{announce_playlist, push_log, run_message_server};
pub use state::BackState;
