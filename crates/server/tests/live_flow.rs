// crates/server/tests/live_flow.rs
//! End-to-end flows through the registry and event hub, as a viewer
//! would see them over the WebSocket.

use std::collections::HashSet;
use std::path::PathBuf;

use tokio::sync::watch;

use agentdeck_core::{parse_transcript_line, TranscriptEntry};
use agentdeck_server::{EventHub, SessionRegistry};
use agentdeck_types::ServerEvent;

const T0: i64 = 1_735_689_600_000; // 2025-01-01T00:00:00Z

fn assistant_line(uuid: &str, text: &str) -> TranscriptEntry {
    let line = format!(
        r#"{{"type":"assistant","cwd":"/home/alice/web","message":{{"model":"claude-sonnet-4-20250514","content":[{{"type":"text","text":"{}"}}],"usage":{{"input_tokens":10,"output_tokens":5}}}},"uuid":"{}","timestamp":"2025-01-01T00:00:01Z"}}"#,
        text, uuid
    );
    parse_transcript_line(&line).unwrap()
}

fn user_line(uuid: &str, text: &str) -> TranscriptEntry {
    let line = format!(
        r#"{{"type":"user","cwd":"/home/alice/web","message":{{"role":"user","content":"{}"}},"uuid":"{}","timestamp":"2025-01-01T00:00:00Z"}}"#,
        text, uuid
    );
    parse_transcript_line(&line).unwrap()
}

async fn announced_session(reg: &SessionRegistry, id: &str) {
    let (stop_tx, _stop_rx) = watch::channel(false);
    reg.insert(
        id,
        PathBuf::from(format!("/tmp/projects/proj/{}.jsonl", id)),
        stop_tx,
        T0,
    )
    .await;
    reg.apply_entries(id, &[assistant_line("a0", "hello")], T0)
        .await;
}

/// A late subscriber replays exactly the last 500 messages, and every
/// message after the snapshot arrives incrementally without duplication.
#[tokio::test]
async fn late_viewer_replays_last_500_then_streams_without_duplicates() {
    let reg = SessionRegistry::new(EventHub::new());
    announced_session(&reg, "s1").await;

    for i in 0..600 {
        let entry = user_line(&format!("u{}", i), &format!("message {}", i));
        reg.apply_entries("s1", &[entry], T0 + i).await;
    }

    // Subscribe first, snapshot second. Worst case a message shows up in
    // both; it must never be missing from both.
    let mut message_rx = reg.hub().subscribe_messages();
    let snapshot = reg.messages("s1").await.unwrap();

    assert_eq!(snapshot.len(), 500);
    assert_eq!(snapshot[0].content, "message 100");
    assert_eq!(snapshot[499].content, "message 599");

    reg.apply_entries("s1", &[user_line("u600", "message 600")], T0 + 600)
        .await;

    let seen: HashSet<String> = snapshot.iter().map(|m| m.id.clone()).collect();
    let event = message_rx.recv().await.unwrap();
    match event {
        ServerEvent::NewMessage { session_id, message } => {
            assert_eq!(session_id, "s1");
            assert_eq!(message.content, "message 600");
            assert!(!seen.contains(&message.id));
        }
        other => panic!("expected NewMessage, got {:?}", other),
    }
}

/// A retired session produces exactly one removal event and disappears
/// from the listing.
#[tokio::test]
async fn retired_session_is_removed_once_and_unlisted() {
    let reg = SessionRegistry::new(EventHub::new());
    announced_session(&reg, "s1").await;
    announced_session(&reg, "s2").await;

    let mut rx = reg.hub().subscribe_broadcast();
    reg.remove("s1").await;

    let mut removed = 0;
    while let Ok(event) = rx.try_recv() {
        if matches!(&event, ServerEvent::SessionRemoved { session_id } if session_id == "s1") {
            removed += 1;
        }
    }
    assert_eq!(removed, 1);

    let summaries = reg.summaries().await;
    assert!(summaries.iter().all(|s| s.session_id != "s1"));
}
