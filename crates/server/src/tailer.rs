// crates/server/src/tailer.rs
//! One background task per transcript file.
//!
//! The task wakes on filesystem notifications for its file and on a 2 s
//! polling interval, reads whatever was appended through its [`TailCursor`],
//! parses the lines, and hands the entries to the registry. The cursor lives
//! inside the task, so reads are serialized by construction.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use agentdeck_core::{parse_transcript_line, TailCursor, TranscriptEntry};

use crate::registry::SessionRegistry;

/// Fallback cadence when notifications are late or unavailable.
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Start tailing `path` for `session_id`. The caller creates the stop
/// channel and registers the session BEFORE spawning, so the first read can
/// never race the registry insert.
pub fn spawn_tailer(
    registry: Arc<SessionRegistry>,
    session_id: String,
    path: PathBuf,
    mut stop_rx: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        let (wake_tx, mut wake_rx) = mpsc::channel::<()>(8);
        // Kept alive for the duration of the task; dropping it stops the
        // notifications and leaves only the poll.
        let _watcher = start_file_watcher(&path, wake_tx);

        let mut cursor = TailCursor::new();
        let mut poll = tokio::time::interval(POLL_INTERVAL);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
                _ = poll.tick() => {}
                Some(()) = wake_rx.recv() => {}
            }

            match cursor.read_appended(&path).await {
                Ok(lines) if !lines.is_empty() => {
                    let entries: Vec<TranscriptEntry> = lines
                        .iter()
                        .filter_map(|line| {
                            let parsed = parse_transcript_line(line);
                            if parsed.is_none() {
                                debug!(session_id = %session_id, "skipping malformed transcript line");
                            }
                            parsed
                        })
                        .collect();
                    if !entries.is_empty() {
                        let now_ms = chrono::Utc::now().timestamp_millis();
                        registry.apply_entries(&session_id, &entries, now_ms).await;
                    }
                }
                Ok(_) => {}
                // Transient read failures are retried on the next wake.
                Err(e) => {
                    debug!(session_id = %session_id, error = %e, "tail read failed; will retry");
                }
            }
        }

        debug!(session_id = %session_id, "tailer stopped");
    });
}

/// Watch the file's parent directory and nudge the tailer on any event that
/// touches our file. Watcher failure is non-fatal: polling still covers it.
fn start_file_watcher(path: &Path, wake_tx: mpsc::Sender<()>) -> Option<RecommendedWatcher> {
    let target = path.to_path_buf();
    let parent = path.parent()?.to_path_buf();

    let mut watcher = match notify::recommended_watcher(
        move |res: Result<notify::Event, notify::Error>| {
            if let Ok(event) = res {
                if event.paths.iter().any(|p| p == &target) {
                    let _ = wake_tx.try_send(());
                }
            }
        },
    ) {
        Ok(w) => w,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "file watcher unavailable; polling only");
            return None;
        }
    };

    if let Err(e) = watcher.watch(&parent, RecursiveMode::NonRecursive) {
        warn!(path = %parent.display(), error = %e, "watch failed; polling only");
        return None;
    }

    Some(watcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::EventHub;
    use std::io::Write;
    use std::time::Instant;

    async fn wait_for_messages(
        registry: &SessionRegistry,
        session_id: &str,
        expected: usize,
    ) -> Vec<agentdeck_types::AgentMessage> {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            if let Some(messages) = registry.messages(session_id).await {
                if messages.len() >= expected {
                    return messages;
                }
            }
            assert!(
                Instant::now() < deadline,
                "timed out waiting for {} messages",
                expected
            );
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn tailer_feeds_appended_entries_to_the_registry() {
        let registry = Arc::new(SessionRegistry::new(EventHub::new()));
        let dir = tempfile::tempdir().unwrap();
        let proj = dir.path().join("proj");
        std::fs::create_dir(&proj).unwrap();
        let path = proj.join("s1.jsonl");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"{{"type":"user","cwd":"/tmp/demo","message":{{"role":"user","content":"hello"}},"uuid":"u1","timestamp":"2025-01-01T00:00:00Z"}}"#
        )
        .unwrap();
        file.flush().unwrap();

        let now_ms = chrono::Utc::now().timestamp_millis();
        let (stop, stop_rx) = watch::channel(false);
        registry.insert("s1", path.clone(), stop.clone(), now_ms).await;
        spawn_tailer(registry.clone(), "s1".to_string(), path.clone(), stop_rx);

        let messages = wait_for_messages(&registry, "s1", 1).await;
        assert_eq!(messages[0].content, "hello");

        // Append while the tailer is live; malformed lines are skipped.
        writeln!(file, "not json at all").unwrap();
        writeln!(
            file,
            r#"{{"type":"assistant","message":{{"model":"claude-sonnet-4-20250514","content":[{{"type":"text","text":"hi back"}}]}},"uuid":"a1","timestamp":"2025-01-01T00:00:01Z"}}"#
        )
        .unwrap();
        file.flush().unwrap();

        let messages = wait_for_messages(&registry, "s1", 2).await;
        assert_eq!(messages[1].content, "hi back");

        let _ = stop.send(true);
    }
}
