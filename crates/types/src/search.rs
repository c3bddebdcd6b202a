// crates/types/src/search.rs
use serde::{Deserialize, Serialize};

use crate::message::{MessageKind, MessageRole};
use crate::session::SessionSummary;

/// Which session fields a search query runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchScope {
    ProjectName,
    CurrentTask,
    WorkingDirectory,
    Content,
}

impl SearchScope {
    pub const ALL: [SearchScope; 4] = [
        SearchScope::ProjectName,
        SearchScope::CurrentTask,
        SearchScope::WorkingDirectory,
        SearchScope::Content,
    ];
}

/// One matching excerpt inside a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMatch {
    pub content: String,
    pub scope: SearchScope,
    pub message_role: MessageRole,
    pub message_type: MessageKind,
    pub timestamp: String,
}

/// All matches for one session, with the total count before excerpting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSearchResult {
    pub session: SessionSummary,
    pub match_count: u32,
    pub matches: Vec<SearchMatch>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub query: String,
    pub total_sessions: u32,
    pub results: Vec<SessionSearchResult>,
}
