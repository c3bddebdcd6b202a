// crates/types/src/lib.rs
//! Shared domain and wire types for agentdeck.
//!
//! Everything serialized over the WebSocket or HTTP surface lives here so
//! the core and server crates agree on one wire shape. Field casing is
//! camelCase, enum variants are snake_case, matching what the frontend
//! consumes.

pub mod message;
pub mod protocol;
pub mod search;
pub mod session;

pub use message::*;
pub use protocol::*;
pub use search::*;
pub use session::*;
