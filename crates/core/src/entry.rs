// crates/core/src/entry.rs
//! Transcript entry parser.
//!
//! One JSON-Lines record in, one typed [`TranscriptEntry`] out. The
//! transcript format is provider-controlled and drifts over time, so
//! unknown top-level types parse to [`TranscriptEntry::Unknown`] and a
//! malformed line is a `None`, never an error that could stall a tailer.

use serde::Deserialize;
use serde_json::Value;

/// One block inside an assistant message's content array.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "thinking")]
    Thinking {
        thinking: String,
        #[serde(default)]
        signature: Option<String>,
    },

    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },

    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: Value,
        #[serde(default)]
        is_error: Option<bool>,
    },

    /// Forward-compatibility: block types this version does not know.
    #[serde(other)]
    Other,
}

/// Token counts reported on an assistant turn.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct TokenCounts {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_read_input_tokens: Option<u64>,
    #[serde(default)]
    pub cache_creation_input_tokens: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserBody {
    /// Either a plain string or an array of blocks (tool results come back
    /// through user-role entries).
    pub content: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssistantBody {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub usage: Option<TokenCounts>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEntry {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub cwd: Option<String>,
    pub message: UserBody,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub git_branch: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantEntry {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub cwd: Option<String>,
    pub message: AssistantBody,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub git_branch: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemEntry {
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEntry {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// One parsed transcript line, pre-normalization.
#[derive(Debug, Clone)]
pub enum TranscriptEntry {
    User(UserEntry),
    Assistant(AssistantEntry),
    System(SystemEntry),
    Progress(ProgressEntry),
    /// Recognized as JSON with a `type` we don't handle
    /// (file-history-snapshot, queue-operation, ...).
    Unknown,
}

impl TranscriptEntry {
    /// Entry timestamp in epoch milliseconds, when present and parseable.
    pub fn timestamp_ms(&self) -> Option<i64> {
        let ts = match self {
            TranscriptEntry::User(e) => e.timestamp.as_deref(),
            TranscriptEntry::Assistant(e) => e.timestamp.as_deref(),
            TranscriptEntry::System(e) => e.timestamp.as_deref(),
            TranscriptEntry::Progress(e) => e.timestamp.as_deref(),
            TranscriptEntry::Unknown => None,
        }?;
        ts.parse::<chrono::DateTime<chrono::Utc>>()
            .ok()
            .map(|dt| dt.timestamp_millis())
    }

    /// Whether this entry carries a tool_result block flagged as an error.
    /// Tool results ride on user-role entries in this format.
    pub fn has_error_result(&self) -> bool {
        let TranscriptEntry::User(user) = self else {
            return false;
        };
        let Some(blocks) = user.message.content.as_array() else {
            return false;
        };
        blocks.iter().any(|b| {
            b.get("type").and_then(Value::as_str) == Some("tool_result")
                && b.get("is_error").and_then(Value::as_bool) == Some(true)
        })
    }
}

impl UserEntry {
    /// The `/exit` slash command ends the session from the user side.
    pub fn is_exit_command(&self) -> bool {
        self.message
            .content
            .as_str()
            .is_some_and(|s| s.contains("<command-name>/exit</command-name>"))
    }

    /// Slash-command echoes and their stdout are bookkeeping, not activity.
    pub fn is_local_command(&self) -> bool {
        self.message.content.as_str().is_some_and(|s| {
            s.contains("<local-command-stdout>")
                || s.contains("<local-command-caveat>")
                || s.contains("<command-name>")
        })
    }
}

impl AssistantEntry {
    pub fn has_tool_use(&self) -> bool {
        self.message
            .content
            .iter()
            .any(|b| matches!(b, ContentBlock::ToolUse { .. }))
    }
}

impl SystemEntry {
    /// Turn-duration markers close a turn and drive the Idle transition.
    pub fn is_turn_duration(&self) -> bool {
        self.subtype.as_deref() == Some("turn_duration")
    }
}

/// Parse one raw transcript line.
///
/// Returns `None` for blank lines, malformed JSON, a missing/non-string
/// `type` field, or a known type whose body doesn't deserialize. Callers
/// log and skip; parse failures never halt a tailer.
pub fn parse_transcript_line(line: &str) -> Option<TranscriptEntry> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    let value: Value = serde_json::from_str(trimmed).ok()?;
    let entry_type = value.get("type")?.as_str()?;

    match entry_type {
        "user" => serde_json::from_value(value).ok().map(TranscriptEntry::User),
        "assistant" => serde_json::from_value(value)
            .ok()
            .map(TranscriptEntry::Assistant),
        "system" => serde_json::from_value(value)
            .ok()
            .map(TranscriptEntry::System),
        "progress" => serde_json::from_value(value)
            .ok()
            .map(TranscriptEntry::Progress),
        _ => Some(TranscriptEntry::Unknown),
    }
}
