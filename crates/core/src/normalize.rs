// crates/core/src/normalize.rs
//! Entry → message normalization.
//!
//! Pure and deterministic: the same entry always yields the same messages
//! with the same ids, so a tailer restart that re-reads a file from byte
//! zero reproduces the exact original message sequence.

use std::collections::HashMap;

use serde_json::{json, Value};

use agentdeck_types::{AgentMessage, MessageKind, MessageRole};

use crate::entry::{AssistantEntry, ContentBlock, SystemEntry, TranscriptEntry, UserEntry};

/// Display caps. Viewers get excerpts; the transcript keeps the full text.
const USER_TEXT_MAX: usize = 500;
const TOOL_RESULT_MAX: usize = 300;
const TASK_MAX: usize = 200;

/// XML-ish wrappers the agent CLI injects around user content. Stripped
/// when deriving the current-task string; an unclosed tag is assumed to be
/// a literal mention in user text and left alone.
const SYSTEM_TAGS: &[&str] = &[
    "local-command-caveat",
    "local-command-stdout",
    "command-name",
    "command-message",
    "command-args",
    "system-reminder",
];

fn truncate_at_boundary(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

pub fn strip_system_tags(text: &str) -> String {
    let mut result = text.to_string();
    for tag in SYSTEM_TAGS {
        let open = format!("<{}", tag);
        let close = format!("</{}>", tag);
        while let Some(start) = result.find(&open) {
            match result[start..].find(&close) {
                Some(rel_end) => {
                    let end = start + rel_end + close.len();
                    result.replace_range(start..end, "");
                }
                // No closing tag: literal user text, leave it.
                None => break,
            }
        }
    }
    result.trim().to_string()
}

/// Stable per-message id: entry uuid for the first produced message,
/// `{uuid}:{ordinal}` for subsequent blocks of the same entry. Entries
/// without a uuid fall back to timestamp + ordinal, which is still stable
/// across replays of the same file.
fn message_id(uuid: Option<&str>, timestamp: &str, ordinal: usize) -> String {
    match (uuid, ordinal) {
        (Some(u), 0) => u.to_string(),
        (Some(u), n) => format!("{}:{}", u, n),
        (None, n) => format!("{}:{}", timestamp, n),
    }
}

fn user_messages(entry: &UserEntry, session_id: &str) -> Vec<AgentMessage> {
    let timestamp = entry.timestamp.clone().unwrap_or_default();
    let uuid = entry.uuid.as_deref();
    let mut messages = Vec::new();

    if let Some(text) = entry.message.content.as_str() {
        messages.push(AgentMessage {
            id: message_id(uuid, &timestamp, 0),
            session_id: session_id.to_string(),
            timestamp: timestamp.clone(),
            role: MessageRole::User,
            kind: MessageKind::Text,
            content: truncate_at_boundary(text, USER_TEXT_MAX),
            metadata: None,
        });
    } else if let Some(blocks) = entry.message.content.as_array() {
        for block in blocks {
            if block.get("type").and_then(Value::as_str) != Some("tool_result") {
                continue;
            }
            let content = match block.get("content") {
                Some(Value::String(s)) => s.clone(),
                Some(other) => serde_json::to_string(other).unwrap_or_default(),
                None => String::new(),
            };
            let is_error = block
                .get("is_error")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let tool_use_id = block
                .get("tool_use_id")
                .and_then(Value::as_str)
                .unwrap_or_default();

            let mut metadata = HashMap::new();
            metadata.insert("toolUseId".to_string(), json!(tool_use_id));
            metadata.insert("isError".to_string(), json!(is_error));

            messages.push(AgentMessage {
                id: message_id(uuid, &timestamp, messages.len()),
                session_id: session_id.to_string(),
                timestamp: timestamp.clone(),
                role: MessageRole::User,
                kind: if is_error {
                    MessageKind::Error
                } else {
                    MessageKind::ToolResult
                },
                content: truncate_at_boundary(&content, TOOL_RESULT_MAX),
                metadata: Some(metadata),
            });
        }
    }

    messages
}

fn assistant_messages(entry: &AssistantEntry, session_id: &str) -> Vec<AgentMessage> {
    let timestamp = entry.timestamp.clone().unwrap_or_default();
    let uuid = entry.uuid.as_deref();
    let mut messages = Vec::new();

    for block in &entry.message.content {
        match block {
            ContentBlock::Text { text } => {
                messages.push(AgentMessage {
                    id: message_id(uuid, &timestamp, messages.len()),
                    session_id: session_id.to_string(),
                    timestamp: timestamp.clone(),
                    role: MessageRole::Assistant,
                    kind: MessageKind::Text,
                    content: text.clone(),
                    metadata: None,
                });
            }
            ContentBlock::Thinking { thinking, .. } => {
                messages.push(AgentMessage {
                    id: message_id(uuid, &timestamp, messages.len()),
                    session_id: session_id.to_string(),
                    timestamp: timestamp.clone(),
                    role: MessageRole::Assistant,
                    kind: MessageKind::Thinking,
                    content: truncate_at_boundary(thinking, USER_TEXT_MAX),
                    metadata: None,
                });
            }
            ContentBlock::ToolUse { id, name, input } => {
                let mut metadata = HashMap::new();
                metadata.insert("toolName".to_string(), json!(name));
                metadata.insert("toolId".to_string(), json!(id));
                metadata.insert("input".to_string(), input.clone());

                messages.push(AgentMessage {
                    id: message_id(uuid, &timestamp, messages.len()),
                    session_id: session_id.to_string(),
                    timestamp: timestamp.clone(),
                    role: MessageRole::Assistant,
                    kind: MessageKind::ToolUse,
                    content: tool_use_content(name, input),
                    metadata: Some(metadata),
                });
            }
            ContentBlock::ToolResult { .. } | ContentBlock::Other => {}
        }
    }

    messages
}

/// Stable content string for a tool invocation: the tool name, plus the
/// target path when the input has an obvious one.
fn tool_use_content(name: &str, input: &Value) -> String {
    let path = ["file_path", "path", "cwd", "url"]
        .iter()
        .find_map(|k| input.get(k).and_then(Value::as_str));
    match path {
        Some(p) => format!("{} {}", name, p),
        None => name.to_string(),
    }
}

fn system_messages(entry: &SystemEntry, session_id: &str) -> Vec<AgentMessage> {
    if !entry.is_turn_duration() {
        return Vec::new();
    }
    let duration_ms = entry.duration_ms.unwrap_or(0);
    let timestamp = entry.timestamp.clone().unwrap_or_default();
    let mut metadata = HashMap::new();
    metadata.insert("durationMs".to_string(), json!(duration_ms));

    vec![AgentMessage {
        id: message_id(None, &timestamp, 0),
        session_id: session_id.to_string(),
        timestamp,
        role: MessageRole::System,
        kind: MessageKind::StateChange,
        content: format!("Turn completed ({}ms)", duration_ms),
        metadata: Some(metadata),
    }]
}

/// Map one parsed entry to zero or more normalized messages.
pub fn normalize_entry(entry: &TranscriptEntry, session_id: &str) -> Vec<AgentMessage> {
    match entry {
        TranscriptEntry::User(user) => user_messages(user, session_id),
        TranscriptEntry::Assistant(assistant) => assistant_messages(assistant, session_id),
        TranscriptEntry::System(sys) => system_messages(sys, session_id),
        TranscriptEntry::Progress(_) | TranscriptEntry::Unknown => Vec::new(),
    }
}

/// The current-task string for a user entry: its text content with
/// system wrappers stripped, truncated for display. `None` when the entry
/// carries no usable free text (tool results, pure command echoes).
pub fn extract_task(entry: &UserEntry) -> Option<String> {
    let text = entry.message.content.as_str()?;
    let cleaned = strip_system_tags(text);
    if cleaned.is_empty() {
        return None;
    }
    Some(truncate_at_boundary(&cleaned, TASK_MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::parse_transcript_line;
    use pretty_assertions::assert_eq;

    fn parse(line: &str) -> TranscriptEntry {
        parse_transcript_line(line).expect("fixture line should parse")
    }

    #[test]
    fn user_text_becomes_one_message() {
        let entry = parse(
            r#"{"type":"user","message":{"role":"user","content":"hello world"},"uuid":"u1","timestamp":"2025-01-01T00:00:00Z"}"#,
        );
        let msgs = normalize_entry(&entry, "s1");
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].id, "u1");
        assert_eq!(msgs[0].role, MessageRole::User);
        assert_eq!(msgs[0].kind, MessageKind::Text);
        assert_eq!(msgs[0].content, "hello world");
    }

    #[test]
    fn tool_result_carries_metadata() {
        let entry = parse(
            r#"{"type":"user","message":{"role":"user","content":[{"type":"tool_result","tool_use_id":"t1","content":"result data","is_error":false}]},"uuid":"u2","timestamp":"2025-01-01T00:00:00Z"}"#,
        );
        let msgs = normalize_entry(&entry, "s1");
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].kind, MessageKind::ToolResult);
        let meta = msgs[0].metadata.as_ref().unwrap();
        assert_eq!(meta["toolUseId"], "t1");
        assert_eq!(meta["isError"], false);
    }

    #[test]
    fn errored_tool_result_maps_to_error_kind() {
        let entry = parse(
            r#"{"type":"user","message":{"role":"user","content":[{"type":"tool_result","tool_use_id":"t1","content":"boom","is_error":true}]},"uuid":"u3","timestamp":"2025-01-01T00:00:00Z"}"#,
        );
        let msgs = normalize_entry(&entry, "s1");
        assert_eq!(msgs[0].kind, MessageKind::Error);
    }

    #[test]
    fn assistant_blocks_map_in_order() {
        let entry = parse(
            r#"{"type":"assistant","message":{"model":"claude-sonnet-4-20250514","content":[{"type":"text","text":"reading"},{"type":"tool_use","id":"t1","name":"Read","input":{"file_path":"/tmp/a.rs"}}]},"uuid":"a1","timestamp":"2025-01-01T00:00:01Z"}"#,
        );
        let msgs = normalize_entry(&entry, "s1");
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].id, "a1");
        assert_eq!(msgs[1].id, "a1:1");
        assert_eq!(msgs[1].kind, MessageKind::ToolUse);
        assert_eq!(msgs[1].content, "Read /tmp/a.rs");
        assert_eq!(msgs[1].metadata.as_ref().unwrap()["toolName"], "Read");
    }

    #[test]
    fn thinking_blocks_are_kept_as_thinking() {
        let entry = parse(
            r#"{"type":"assistant","message":{"content":[{"type":"thinking","thinking":"hmm"}]},"uuid":"a2","timestamp":"2025-01-01T00:00:01Z"}"#,
        );
        let msgs = normalize_entry(&entry, "s1");
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].kind, MessageKind::Thinking);
    }

    #[test]
    fn turn_duration_becomes_state_change() {
        let entry = parse(
            r#"{"type":"system","subtype":"turn_duration","durationMs":1500,"timestamp":"2025-01-01T00:00:02Z"}"#,
        );
        let msgs = normalize_entry(&entry, "s1");
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].role, MessageRole::System);
        assert_eq!(msgs[0].kind, MessageKind::StateChange);
        assert!(msgs[0].content.contains("1500ms"));
    }

    #[test]
    fn progress_and_unknown_map_to_nothing() {
        let progress = parse(r#"{"type":"progress","timestamp":"2025-01-01T00:00:03Z"}"#);
        assert!(normalize_entry(&progress, "s1").is_empty());
        let unknown = parse(r#"{"type":"queue-operation","op":"push"}"#);
        assert!(normalize_entry(&unknown, "s1").is_empty());
    }

    #[test]
    fn normalization_is_deterministic() {
        let entry = parse(
            r#"{"type":"assistant","message":{"content":[{"type":"text","text":"a"},{"type":"text","text":"b"}]},"uuid":"a9","timestamp":"2025-01-01T00:00:04Z"}"#,
        );
        let first = normalize_entry(&entry, "s1");
        let second = normalize_entry(&entry, "s1");
        let ids_first: Vec<_> = first.iter().map(|m| m.id.clone()).collect();
        let ids_second: Vec<_> = second.iter().map(|m| m.id.clone()).collect();
        assert_eq!(ids_first, ids_second);
        assert_eq!(ids_first, vec!["a9", "a9:1"]);
    }

    #[test]
    fn long_user_text_truncated_at_char_boundary() {
        let long = "é".repeat(600);
        let line = format!(
            r#"{{"type":"user","message":{{"role":"user","content":"{}"}},"uuid":"u9","timestamp":"2025-01-01T00:00:00Z"}}"#,
            long
        );
        let msgs = normalize_entry(&parse(&line), "s1");
        assert!(msgs[0].content.len() <= USER_TEXT_MAX + 3);
        assert!(msgs[0].content.ends_with("..."));
    }

    #[test]
    fn strip_tags_removes_closed_wrappers() {
        assert_eq!(
            strip_system_tags(
                "<local-command-caveat>caveat</local-command-caveat>Hello world"
            ),
            "Hello world"
        );
        assert_eq!(
            strip_system_tags(
                "<command-name>clear</command-name><command-message>msg</command-message>Actual prompt"
            ),
            "Actual prompt"
        );
        assert_eq!(
            strip_system_tags("<system-reminder>reminder</system-reminder>User prompt"),
            "User prompt"
        );
    }

    #[test]
    fn strip_tags_leaves_unclosed_mentions() {
        let input = "Hello<local-command-caveat>unclosed tag without end";
        assert_eq!(strip_system_tags(input), input);
    }

    #[test]
    fn extract_task_strips_and_truncates() {
        let entry = parse(
            r#"{"type":"user","message":{"role":"user","content":"<local-command-caveat>caveat</local-command-caveat>Fix the bug"},"timestamp":"2025-01-01T00:00:00Z"}"#,
        );
        let TranscriptEntry::User(user) = entry else {
            panic!("expected user entry");
        };
        assert_eq!(extract_task(&user).as_deref(), Some("Fix the bug"));
    }

    #[test]
    fn extract_task_none_for_pure_command_echo() {
        let entry = parse(
            r#"{"type":"user","message":{"role":"user","content":"<local-command-caveat>only caveat</local-command-caveat>"},"timestamp":"2025-01-01T00:00:00Z"}"#,
        );
        let TranscriptEntry::User(user) = entry else {
            panic!("expected user entry");
        };
        assert_eq!(extract_task(&user), None);
    }
}
