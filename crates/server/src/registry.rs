// crates/server/src/registry.rs
//! The session registry: one tracked record per live transcript.
//!
//! Shared as `Arc<SessionRegistry>` between the discovery loop, the per-file
//! tailer tasks, the tick loop, and the HTTP/WS handlers. Many readers,
//! short exclusive writes; each session has exactly one logical writer (its
//! tailer task), so entry application never races with itself.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;

use tokio::sync::{watch, RwLock};
use tracing::{debug, info};

use agentdeck_core::{
    accrue, extract_task, normalize_entry, reported_counts, reported_model, ActivityTracker,
    TranscriptEntry,
};
use agentdeck_types::{
    ActivityState, AgentMessage, CumulativeUsage, GitStatus, SearchMatch, SearchScope,
    ServerEvent, SessionDetail, SessionSearchResult, SessionSummary,
};

use crate::git::diff_shortstat;
use crate::hub::EventHub;

/// Retained backlog per session. Oldest message is evicted one-for-one when
/// a new message lands on a full ring.
const MESSAGE_HISTORY_CAP: usize = 500;

/// Minimum gap between `git diff --shortstat` runs per session.
const GIT_CHECK_COOLDOWN_MS: i64 = 30_000;

/// Matches returned per session in search results; the count still reflects
/// every match.
const SEARCH_MATCHES_PER_SESSION: usize = 3;

struct TrackedSession {
    summary: SessionSummary,
    messages: VecDeque<AgentMessage>,
    tracker: ActivityTracker,
    /// Transcript file backing this session.
    path: PathBuf,
    /// Parent directory name of the transcript. Sessions under the same
    /// project directory share it; used only for grouping, never decoded.
    project_dir: String,
    /// A session is announced to viewers only once its model is known from
    /// a parsed assistant entry.
    emitted: bool,
    last_git_check_ms: i64,
    stop_tailer: watch::Sender<bool>,
}

impl TrackedSession {
    fn publish_if_emitted(&self, hub: &EventHub, event: ServerEvent) {
        if self.emitted {
            hub.publish(event);
        }
    }
}

pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, TrackedSession>>,
    hub: EventHub,
}

impl SessionRegistry {
    pub fn new(hub: EventHub) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            hub,
        }
    }

    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    /// Track a newly discovered transcript. Older live sessions under the
    /// same project directory are stopped immediately: their files stop
    /// receiving entries once the agent switches transcripts, and waiting
    /// for the silence timeout would mislabel them as active.
    pub async fn insert(
        &self,
        session_id: &str,
        path: PathBuf,
        stop_tailer: watch::Sender<bool>,
        now_ms: i64,
    ) {
        let project_dir = path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();

        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(session_id) {
            return;
        }

        for (sid, session) in sessions.iter_mut() {
            if session.project_dir != project_dir {
                continue;
            }
            // Stop through the tracker so its timers are disarmed along
            // with the visible state; a stale pending tool_use must not
            // revive the session on a later tick.
            if let Some(change) = session.tracker.force_stop() {
                session.summary.state = change.current;
                debug!(session_id = %sid, "superseded by a newer session in the same project");
                session.publish_if_emitted(
                    &self.hub,
                    ServerEvent::StateChanged {
                        session_id: sid.clone(),
                        previous: change.previous,
                        current: change.current,
                        session: session.summary.clone(),
                    },
                );
            }
        }

        let now_rfc3339 = rfc3339_from_ms(now_ms);
        let summary = SessionSummary {
            session_id: session_id.to_string(),
            provider: "claude-code".to_string(),
            state: ActivityState::Running,
            project_path: String::new(),
            project_name: String::new(),
            working_directory: String::new(),
            current_task: String::new(),
            model: "unknown".to_string(),
            last_activity_at: now_rfc3339.clone(),
            started_at: now_rfc3339,
            cumulative_usage: CumulativeUsage::default(),
            git_status: GitStatus::default(),
        };

        sessions.insert(
            session_id.to_string(),
            TrackedSession {
                summary,
                messages: VecDeque::with_capacity(MESSAGE_HISTORY_CAP),
                tracker: ActivityTracker::new(now_ms),
                path,
                project_dir,
                emitted: false,
                last_git_check_ms: 0,
                stop_tailer,
            },
        );
    }

    pub async fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    /// (session id, transcript path) for every tracked session. Discovery
    /// uses this to spot vanished files.
    pub async fn tracked_paths(&self) -> Vec<(String, PathBuf)> {
        self.sessions
            .read()
            .await
            .iter()
            .map(|(id, s)| (id.clone(), s.path.clone()))
            .collect()
    }

    /// Remove a session whose transcript vanished. At most one
    /// `session:removed` goes out, and only for announced sessions.
    pub async fn remove(&self, session_id: &str) {
        let removed = self.sessions.write().await.remove(session_id);
        if let Some(session) = removed {
            let _ = session.stop_tailer.send(true);
            info!(session_id = %session_id, "session removed");
            session.publish_if_emitted(
                &self.hub,
                ServerEvent::SessionRemoved {
                    session_id: session_id.to_string(),
                },
            );
        }
    }

    /// Stop every tailer. Used during shutdown.
    pub async fn shutdown_all(&self) {
        let mut sessions = self.sessions.write().await;
        for (_, session) in sessions.drain() {
            let _ = session.stop_tailer.send(true);
        }
    }

    /// Apply freshly tailed entries to a session, in arrival order.
    ///
    /// Updates metadata, usage, the message ring and the state machine, and
    /// publishes the corresponding events. A trailing time-based check runs
    /// immediately so a stale backlog read at startup settles into the right
    /// state without waiting for the next tick.
    pub async fn apply_entries(
        &self,
        session_id: &str,
        entries: &[TranscriptEntry],
        now_ms: i64,
    ) {
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get_mut(session_id) else {
            return;
        };

        for entry in entries {
            apply_metadata(session, entry);
            apply_usage(&self.hub, session, session_id, entry);

            if let Some(change) = session.tracker.observe(entry, now_ms) {
                session.summary.state = change.current;
                session.summary.last_activity_at =
                    rfc3339_from_ms(session.tracker.last_entry_at_ms());
                session.publish_if_emitted(
                    &self.hub,
                    ServerEvent::StateChanged {
                        session_id: session_id.to_string(),
                        previous: change.previous,
                        current: change.current,
                        session: session.summary.clone(),
                    },
                );
            }

            check_emit_gate(&self.hub, session, entry);

            for message in normalize_entry(entry, session_id) {
                if session.messages.len() == MESSAGE_HISTORY_CAP {
                    session.messages.pop_front();
                }
                session.messages.push_back(message.clone());
                session.publish_if_emitted(
                    &self.hub,
                    ServerEvent::NewMessage {
                        session_id: session_id.to_string(),
                        message,
                    },
                );
            }
        }

        session.summary.last_activity_at = rfc3339_from_ms(session.tracker.last_entry_at_ms());

        // Settle time-gated transitions now rather than on the next tick.
        if let Some(change) = session.tracker.tick(now_ms) {
            session.summary.state = change.current;
            session.publish_if_emitted(
                &self.hub,
                ServerEvent::StateChanged {
                    session_id: session_id.to_string(),
                    previous: change.previous,
                    current: change.current,
                    session: session.summary.clone(),
                },
            );
        }
    }

    /// Periodic pass: time-gated state transitions plus a rate-limited git
    /// diff refresh for sessions that are sitting still.
    ///
    /// Git commands run between the two lock scopes so a slow `git` never
    /// blocks readers or tailers.
    pub async fn tick(&self, now_ms: i64) {
        let mut git_targets: Vec<(String, PathBuf)> = Vec::new();

        {
            let mut sessions = self.sessions.write().await;
            for (session_id, session) in sessions.iter_mut() {
                if let Some(change) = session.tracker.tick(now_ms) {
                    session.summary.state = change.current;
                    session.publish_if_emitted(
                        &self.hub,
                        ServerEvent::StateChanged {
                            session_id: session_id.clone(),
                            previous: change.previous,
                            current: change.current,
                            session: session.summary.clone(),
                        },
                    );
                }

                let state = session.summary.state;
                if session.emitted
                    && matches!(
                        state,
                        ActivityState::Idle | ActivityState::PermissionWaiting
                    )
                    && !session.summary.working_directory.is_empty()
                    && now_ms - session.last_git_check_ms > GIT_CHECK_COOLDOWN_MS
                {
                    session.last_git_check_ms = now_ms;
                    git_targets.push((
                        session_id.clone(),
                        PathBuf::from(&session.summary.working_directory),
                    ));
                }
            }
        }

        for (session_id, dir) in git_targets {
            let Some((additions, deletions)) = diff_shortstat(&dir).await else {
                continue;
            };
            let mut sessions = self.sessions.write().await;
            if let Some(session) = sessions.get_mut(&session_id) {
                let status = &mut session.summary.git_status;
                if status.additions != additions || status.deletions != deletions {
                    status.additions = additions;
                    status.deletions = deletions;
                    let git_status = status.clone();
                    session.publish_if_emitted(
                        &self.hub,
                        ServerEvent::GitStatusUpdated {
                            session_id,
                            git_status,
                        },
                    );
                }
            }
        }
    }

    /// Announced session summaries, for `sessions:init` and the list route.
    pub async fn summaries(&self) -> Vec<SessionSummary> {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| s.emitted)
            .map(|s| s.summary.clone())
            .collect()
    }

    pub async fn detail(&self, session_id: &str) -> Option<SessionDetail> {
        let sessions = self.sessions.read().await;
        sessions.get(session_id).map(|s| SessionDetail {
            summary: s.summary.clone(),
            messages: s.messages.iter().cloned().collect(),
        })
    }

    /// The retained backlog for one session, oldest first.
    pub async fn messages(&self, session_id: &str) -> Option<Vec<AgentMessage>> {
        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .map(|s| s.messages.iter().cloned().collect())
    }

    /// Case-insensitive substring search over the requested scopes,
    /// ranked by match count, then recency.
    pub async fn search(&self, query: &str, scopes: &[SearchScope]) -> Vec<SessionSearchResult> {
        let query_lower = query.to_lowercase();
        let sessions = self.sessions.read().await;
        let mut results: Vec<SessionSearchResult> = Vec::new();

        for session in sessions.values().filter(|s| s.emitted) {
            let mut matches: Vec<SearchMatch> = Vec::new();
            for scope in scopes {
                collect_matches(session, *scope, &query_lower, &mut matches);
            }
            if !matches.is_empty() {
                let match_count = matches.len() as u32;
                matches.truncate(SEARCH_MATCHES_PER_SESSION);
                results.push(SessionSearchResult {
                    session: session.summary.clone(),
                    match_count,
                    matches,
                });
            }
        }

        results.sort_by(|a, b| {
            b.match_count
                .cmp(&a.match_count)
                .then_with(|| b.session.last_activity_at.cmp(&a.session.last_activity_at))
        });
        results
    }
}

/// Project identity and task metadata come from the transcript itself,
/// never from directory-name decoding.
fn apply_metadata(session: &mut TrackedSession, entry: &TranscriptEntry) {
    match entry {
        TranscriptEntry::User(user) => {
            if let Some(cwd) = &user.cwd {
                session.summary.working_directory = cwd.clone();
                session.summary.project_path = cwd.clone();
                if let Some(name) = cwd.rsplit('/').next() {
                    if !name.is_empty() {
                        session.summary.project_name = name.to_string();
                    }
                }
            }
            if session.summary.current_task.is_empty() {
                if let Some(task) = extract_task(user) {
                    session.summary.current_task = task;
                    if let Some(ts) = &user.timestamp {
                        session.summary.started_at = ts.clone();
                    }
                }
            }
            apply_branch(session, user.git_branch.as_deref());
        }
        TranscriptEntry::Assistant(assistant) => {
            if let Some(cwd) = &assistant.cwd {
                session.summary.working_directory = cwd.clone();
                session.summary.project_path = cwd.clone();
                if let Some(name) = cwd.rsplit('/').next() {
                    if !name.is_empty() {
                        session.summary.project_name = name.to_string();
                    }
                }
            }
            apply_branch(session, assistant.git_branch.as_deref());
        }
        _ => {}
    }
}

fn apply_branch(session: &mut TrackedSession, branch: Option<&str>) {
    if let Some(branch) = branch {
        if !branch.is_empty() && branch != "HEAD" {
            session.summary.git_status.branch = branch.to_string();
        }
    }
}

/// Accrue usage with the entry's own model so a mid-session model switch
/// prices each turn correctly.
fn apply_usage(
    hub: &EventHub,
    session: &mut TrackedSession,
    session_id: &str,
    entry: &TranscriptEntry,
) {
    let TranscriptEntry::Assistant(assistant) = entry else {
        return;
    };
    let Some(counts) = reported_counts(assistant) else {
        return;
    };
    let model = reported_model(assistant)
        .map(str::to_string)
        .unwrap_or_else(|| session.summary.model.clone());

    session.summary.cumulative_usage = accrue(&session.summary.cumulative_usage, &model, &counts);
    session.publish_if_emitted(
        hub,
        ServerEvent::UsageUpdated {
            session_id: session_id.to_string(),
            usage: session.summary.cumulative_usage.clone(),
        },
    );
}

/// Announce the session the moment its model is known.
fn check_emit_gate(hub: &EventHub, session: &mut TrackedSession, entry: &TranscriptEntry) {
    if session.emitted {
        if let TranscriptEntry::Assistant(assistant) = entry {
            if let Some(model) = reported_model(assistant) {
                session.summary.model = model.to_string();
            }
        }
        return;
    }
    let TranscriptEntry::Assistant(assistant) = entry else {
        return;
    };
    let Some(model) = reported_model(assistant) else {
        return;
    };
    session.summary.model = model.to_string();
    session.emitted = true;
    info!(
        session_id = %session.summary.session_id,
        project = %session.summary.project_name,
        "session announced"
    );
    hub.publish(ServerEvent::SessionDiscovered {
        session: session.summary.clone(),
    });
}

fn collect_matches(
    session: &TrackedSession,
    scope: SearchScope,
    query_lower: &str,
    matches: &mut Vec<SearchMatch>,
) {
    use agentdeck_types::{MessageKind, MessageRole};

    match scope {
        SearchScope::ProjectName => {
            let name = &session.summary.project_name;
            if name.to_lowercase().contains(query_lower) {
                matches.push(SearchMatch {
                    content: name.clone(),
                    scope,
                    message_role: MessageRole::System,
                    message_type: MessageKind::Text,
                    timestamp: session.summary.started_at.clone(),
                });
            }
        }
        SearchScope::CurrentTask => {
            let task = &session.summary.current_task;
            if task.to_lowercase().contains(query_lower) {
                matches.push(SearchMatch {
                    content: make_snippet(task, query_lower),
                    scope,
                    message_role: MessageRole::System,
                    message_type: MessageKind::Text,
                    timestamp: session.summary.started_at.clone(),
                });
            }
        }
        SearchScope::WorkingDirectory => {
            let wd = &session.summary.working_directory;
            if wd.to_lowercase().contains(query_lower)
                || session
                    .summary
                    .project_path
                    .to_lowercase()
                    .contains(query_lower)
            {
                matches.push(SearchMatch {
                    content: wd.clone(),
                    scope,
                    message_role: MessageRole::System,
                    message_type: MessageKind::Text,
                    timestamp: session.summary.started_at.clone(),
                });
            }
        }
        SearchScope::Content => {
            for msg in &session.messages {
                if msg.content.to_lowercase().contains(query_lower) {
                    matches.push(SearchMatch {
                        content: make_snippet(&msg.content, query_lower),
                        scope,
                        message_role: msg.role,
                        message_type: msg.kind,
                        timestamp: msg.timestamp.clone(),
                    });
                }
            }
        }
    }
}

/// Excerpt ~40 chars of context on each side of the first hit, snapped to
/// char boundaries.
fn make_snippet(text: &str, query_lower: &str) -> String {
    let text_lower = text.to_lowercase();
    let Some(pos) = text_lower.find(query_lower) else {
        return text.chars().take(100).collect();
    };

    let context = 40;
    let start = {
        let mut s = pos.saturating_sub(context);
        while s > 0 && !text.is_char_boundary(s) {
            s -= 1;
        }
        s
    };
    let end = {
        let mut e = (pos + query_lower.len() + context).min(text.len());
        while e < text.len() && !text.is_char_boundary(e) {
            e += 1;
        }
        e
    };

    let mut snippet = String::new();
    if start > 0 {
        snippet.push_str("...");
    }
    snippet.push_str(&text[start..end]);
    if end < text.len() {
        snippet.push_str("...");
    }
    snippet
}

fn rfc3339_from_ms(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| chrono::Utc::now().to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentdeck_core::parse_transcript_line;
    use pretty_assertions::assert_eq;

    const T0: i64 = 1_735_689_600_000; // 2025-01-01T00:00:00Z

    fn registry() -> SessionRegistry {
        SessionRegistry::new(EventHub::new())
    }

    fn stop_handle() -> watch::Sender<bool> {
        watch::channel(false).0
    }

    async fn insert(reg: &SessionRegistry, id: &str, project: &str) {
        reg.insert(
            id,
            PathBuf::from(format!("/tmp/projects/{}/{}.jsonl", project, id)),
            stop_handle(),
            T0,
        )
        .await;
    }

    fn assistant_text(uuid: &str, text: &str) -> TranscriptEntry {
        let line = format!(
            r#"{{"type":"assistant","cwd":"/home/alice/web","message":{{"model":"claude-sonnet-4-20250514","content":[{{"type":"text","text":"{}"}}],"usage":{{"input_tokens":100,"output_tokens":50}}}},"uuid":"{}","timestamp":"2025-01-01T00:00:01Z"}}"#,
            text, uuid
        );
        parse_transcript_line(&line).unwrap()
    }

    fn user_text(uuid: &str, text: &str) -> TranscriptEntry {
        let line = format!(
            r#"{{"type":"user","cwd":"/home/alice/web","gitBranch":"main","message":{{"role":"user","content":"{}"}},"uuid":"{}","timestamp":"2025-01-01T00:00:00Z"}}"#,
            text, uuid
        );
        parse_transcript_line(&line).unwrap()
    }

    #[tokio::test]
    async fn session_is_announced_only_after_model_is_known() {
        let reg = registry();
        let mut rx = reg.hub().subscribe_broadcast();
        insert(&reg, "s1", "proj").await;

        reg.apply_entries("s1", &[user_text("u1", "fix the bug")], T0)
            .await;
        assert!(reg.summaries().await.is_empty());
        assert!(rx.try_recv().is_err());

        reg.apply_entries("s1", &[assistant_text("a1", "on it")], T0 + 1000)
            .await;
        let summaries = reg.summaries().await;
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].model, "claude-sonnet-4-20250514");
        assert_eq!(summaries[0].project_name, "web");
        assert_eq!(summaries[0].working_directory, "/home/alice/web");
        assert_eq!(summaries[0].current_task, "fix the bug");
        assert_eq!(summaries[0].git_status.branch, "main");

        let discovered = rx.try_recv().unwrap();
        assert!(matches!(discovered, ServerEvent::SessionDiscovered { .. }));
    }

    #[tokio::test]
    async fn message_ring_holds_exactly_the_last_500() {
        let reg = registry();
        insert(&reg, "s1", "proj").await;
        reg.apply_entries("s1", &[assistant_text("a0", "hello")], T0)
            .await;

        for i in 0..600 {
            let entry = user_text(&format!("u{}", i), &format!("message {}", i));
            reg.apply_entries("s1", &[entry], T0 + i).await;
        }

        let messages = reg.messages("s1").await.unwrap();
        assert_eq!(messages.len(), 500);
        // Oldest survivor is message 100 (601 total inserts, one eviction each
        // past capacity), newest is message 599.
        assert_eq!(messages[0].content, "message 100");
        assert_eq!(messages[499].content, "message 599");
    }

    #[tokio::test]
    async fn usage_accrues_monotonically() {
        let reg = registry();
        insert(&reg, "s1", "proj").await;

        reg.apply_entries("s1", &[assistant_text("a1", "one")], T0)
            .await;
        let first = reg.detail("s1").await.unwrap().summary.cumulative_usage;
        assert_eq!(first.input_tokens, 100);
        assert_eq!(first.output_tokens, 50);
        assert!(first.estimated_cost > 0.0);

        reg.apply_entries("s1", &[assistant_text("a2", "two")], T0 + 1000)
            .await;
        let second = reg.detail("s1").await.unwrap().summary.cumulative_usage;
        assert_eq!(second.input_tokens, 200);
        assert!(second.estimated_cost > first.estimated_cost);
    }

    #[tokio::test]
    async fn newer_session_in_same_project_stops_the_older_one() {
        let reg = registry();
        insert(&reg, "old", "proj").await;
        reg.apply_entries("old", &[assistant_text("a1", "working")], T0)
            .await;
        assert_eq!(reg.summaries().await[0].state, ActivityState::Running);

        let mut rx = reg.hub().subscribe_broadcast();
        insert(&reg, "new", "proj").await;

        let old = reg.detail("old").await.unwrap().summary;
        assert_eq!(old.state, ActivityState::Stopped);
        let event = rx.try_recv().unwrap();
        assert!(matches!(
            event,
            ServerEvent::StateChanged { current: ActivityState::Stopped, .. }
        ));
    }

    #[tokio::test]
    async fn superseded_session_stays_stopped_across_ticks() {
        let reg = registry();
        insert(&reg, "old", "proj").await;
        let tool_use = parse_transcript_line(
            r#"{"type":"assistant","cwd":"/home/alice/web","message":{"model":"claude-sonnet-4-20250514","content":[{"type":"tool_use","id":"t1","name":"Bash","input":{}}],"usage":{"input_tokens":100,"output_tokens":50}},"uuid":"a1","timestamp":"2025-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        reg.apply_entries("old", &[tool_use], T0).await;

        insert(&reg, "new", "proj").await;
        assert_eq!(
            reg.detail("old").await.unwrap().summary.state,
            ActivityState::Stopped
        );

        // The unanswered tool_use left behind must not arm a timer.
        let mut rx = reg.hub().subscribe_broadcast();
        reg.tick(T0 + 11_000).await;
        reg.tick(T0 + 120_000).await;
        assert_eq!(
            reg.detail("old").await.unwrap().summary.state,
            ActivityState::Stopped
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unrelated_project_is_left_alone() {
        let reg = registry();
        insert(&reg, "a", "proj-one").await;
        reg.apply_entries("a", &[assistant_text("a1", "hi")], T0)
            .await;
        insert(&reg, "b", "proj-two").await;

        assert_eq!(
            reg.detail("a").await.unwrap().summary.state,
            ActivityState::Running
        );
    }

    #[tokio::test]
    async fn removal_emits_exactly_one_removed_event() {
        let reg = registry();
        insert(&reg, "s1", "proj").await;
        reg.apply_entries("s1", &[assistant_text("a1", "hi")], T0)
            .await;

        let mut rx = reg.hub().subscribe_broadcast();
        reg.remove("s1").await;
        reg.remove("s1").await; // second call is a no-op

        let event = rx.try_recv().unwrap();
        assert!(matches!(event, ServerEvent::SessionRemoved { session_id } if session_id == "s1"));
        assert!(rx.try_recv().is_err());
        assert!(reg.detail("s1").await.is_none());
    }

    #[tokio::test]
    async fn unannounced_removal_is_silent() {
        let reg = registry();
        insert(&reg, "s1", "proj").await;
        let mut rx = reg.hub().subscribe_broadcast();
        reg.remove("s1").await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn tick_applies_time_gated_transitions() {
        let reg = registry();
        insert(&reg, "s1", "proj").await;
        reg.apply_entries("s1", &[assistant_text("a1", "hi")], T0 + 1000)
            .await;

        let mut rx = reg.hub().subscribe_broadcast();
        reg.tick(T0 + 1000 + 61_000).await;
        let summary = reg.detail("s1").await.unwrap().summary;
        assert_eq!(summary.state, ActivityState::Stopped);

        let event = rx.try_recv().unwrap();
        match event {
            ServerEvent::StateChanged {
                previous, current, ..
            } => {
                assert_eq!(previous, ActivityState::Running);
                assert_eq!(current, ActivityState::Stopped);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn search_ranks_by_match_count_then_recency() {
        let reg = registry();
        insert(&reg, "busy", "proj-a").await;
        reg.apply_entries("busy", &[assistant_text("a1", "refactor start")], T0)
            .await;
        for i in 0..3 {
            reg.apply_entries(
                "busy",
                &[user_text(&format!("u{}", i), "refactor the parser")],
                T0 + i,
            )
            .await;
        }

        insert(&reg, "quiet", "proj-b").await;
        reg.apply_entries("quiet", &[assistant_text("b1", "refactor notes")], T0)
            .await;

        let results = reg
            .search("refactor", &[SearchScope::Content])
            .await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].session.session_id, "busy");
        assert_eq!(results[0].match_count, 4);
        // Excerpts are capped; the count is not.
        assert_eq!(results[0].matches.len(), 3);
        assert_eq!(results[1].session.session_id, "quiet");
    }

    #[tokio::test]
    async fn search_scopes_are_respected() {
        let reg = registry();
        insert(&reg, "s1", "proj").await;
        reg.apply_entries(
            "s1",
            &[
                user_text("u1", "improve startup latency"),
                assistant_text("a1", "profiling now"),
            ],
            T0,
        )
        .await;

        // "web" appears in the project name but not in any message content.
        let by_name = reg.search("web", &[SearchScope::ProjectName]).await;
        assert_eq!(by_name.len(), 1);
        let by_content = reg.search("web", &[SearchScope::Content]).await;
        assert!(by_content.is_empty());
    }

    #[test]
    fn snippet_excerpts_around_the_hit() {
        let long = format!("{}NEEDLE{}", "a".repeat(100), "b".repeat(100));
        let snippet = make_snippet(&long, "needle");
        assert!(snippet.starts_with("..."));
        assert!(snippet.ends_with("..."));
        assert!(snippet.to_lowercase().contains("needle"));
        assert!(snippet.len() < long.len());
    }
}
