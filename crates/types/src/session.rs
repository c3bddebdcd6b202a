// crates/types/src/session.rs
use serde::{Deserialize, Serialize};

use crate::message::AgentMessage;

/// The inferred real-time status of one agent session.
///
/// Exactly one current value per session. Transitions are computed by the
/// activity tracker in `agentdeck-core`, never set arbitrarily.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityState {
    Running,
    Idle,
    PermissionWaiting,
    Error,
    Stopped,
}

impl std::fmt::Display for ActivityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActivityState::Running => "running",
            ActivityState::Idle => "idle",
            ActivityState::PermissionWaiting => "permission_waiting",
            ActivityState::Error => "error",
            ActivityState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Running token and cost totals for a session across its lifetime.
///
/// Counters are monotonically non-decreasing. `estimated_cost` is accrued
/// per entry with that entry's own model pricing, so a mid-session model
/// switch keeps the total honest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CumulativeUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_creation_tokens: u64,
    pub estimated_cost: f64,
}

/// Version-control status for the session's working directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitStatus {
    pub branch: String,
    pub additions: u64,
    pub deletions: u64,
}

/// The client-visible summary of one live session.
///
/// `session_id` is the transcript file stem and never changes after
/// creation. The path/name/working-directory fields come from the
/// transcript's own declared fields, not from directory-name heuristics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub provider: String,
    pub state: ActivityState,
    pub project_path: String,
    pub project_name: String,
    pub working_directory: String,
    pub current_task: String,
    pub model: String,
    pub last_activity_at: String,
    pub started_at: String,
    pub cumulative_usage: CumulativeUsage,
    pub git_status: GitStatus,
}

/// Summary plus the retained message backlog, served by the detail route.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetail {
    #[serde(flatten)]
    pub summary: SessionSummary,
    pub messages: Vec<AgentMessage>,
}
