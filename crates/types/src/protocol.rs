// crates/types/src/protocol.rs
//! The tagged WebSocket protocol.
//!
//! One closed enum per direction so the hub and the connection handler can
//! match exhaustively; adding an event kind is a compile error everywhere
//! it matters.

use serde::{Deserialize, Serialize};

use crate::message::AgentMessage;
use crate::session::{ActivityState, CumulativeUsage, GitStatus, SessionSummary};

/// Server → viewer events.
///
/// `sessions:init` is always the first frame on a new connection;
/// `session:messages_init` is the first frame after each subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "sessions:init")]
    SessionsInit { sessions: Vec<SessionSummary> },

    #[serde(rename = "session:discovered")]
    SessionDiscovered { session: SessionSummary },

    #[serde(rename = "session:removed")]
    #[serde(rename_all = "camelCase")]
    SessionRemoved { session_id: String },

    #[serde(rename = "session:state_changed")]
    #[serde(rename_all = "camelCase")]
    StateChanged {
        session_id: String,
        previous: ActivityState,
        current: ActivityState,
        session: SessionSummary,
    },

    #[serde(rename = "session:new_message")]
    #[serde(rename_all = "camelCase")]
    NewMessage {
        session_id: String,
        message: AgentMessage,
    },

    #[serde(rename = "session:messages_init")]
    #[serde(rename_all = "camelCase")]
    MessagesInit {
        session_id: String,
        messages: Vec<AgentMessage>,
    },

    #[serde(rename = "session:usage_updated")]
    #[serde(rename_all = "camelCase")]
    UsageUpdated {
        session_id: String,
        usage: CumulativeUsage,
    },

    #[serde(rename = "session:git_status_updated")]
    #[serde(rename_all = "camelCase")]
    GitStatusUpdated {
        session_id: String,
        git_status: GitStatus,
    },
}

impl ServerEvent {
    /// Session id this event concerns, if any. The filtered message path
    /// uses this to match events against viewer subscriptions.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            ServerEvent::SessionsInit { .. } => None,
            ServerEvent::SessionDiscovered { session } => Some(&session.session_id),
            ServerEvent::SessionRemoved { session_id }
            | ServerEvent::StateChanged { session_id, .. }
            | ServerEvent::NewMessage { session_id, .. }
            | ServerEvent::MessagesInit { session_id, .. }
            | ServerEvent::UsageUpdated { session_id, .. }
            | ServerEvent::GitStatusUpdated { session_id, .. } => Some(session_id),
        }
    }
}

/// Viewer → server requests.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "subscribe:session")]
    #[serde(rename_all = "camelCase")]
    Subscribe { session_id: String },

    #[serde(rename = "unsubscribe:session")]
    #[serde(rename_all = "camelCase")]
    Unsubscribe { session_id: String },
}
