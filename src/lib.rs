//! exo-backend: backend service engine for an offline game-collection
//! launcher.
//!
//! A backend process owns the authoritative in-memory game list and exposes
//! it to a UI process over an authenticated WebSocket message protocol; an
//! independent HTTP server streams collection media with byte-range
//! support. The search pipeline (query parser → filter evaluator → order
//! engine) is pure and synchronous; all transport runs on tokio.

pub mod backend;
pub mod config;
pub mod fileserver;
pub mod game;
pub mod net;
pub mod search;
