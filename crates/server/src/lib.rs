// crates/server/src/lib.rs
//! HTTP and WebSocket server for live agent-session monitoring.
//!
//! The server discovers JSONL transcripts on disk, tails each one into the
//! shared [`registry::SessionRegistry`], and fans state changes out to
//! browser viewers over `/ws`.

pub mod config;
pub mod discovery;
pub mod error;
pub mod git;
pub mod hub;
pub mod registry;
pub mod routes;
pub mod state;
pub mod tailer;
pub mod ws;

pub use config::Config;
pub use hub::EventHub;
pub use registry::SessionRegistry;
pub use routes::create_app;
pub use state::AppState;
