// crates/core/src/activity.rs
//! Per-session activity state machine.
//!
//! State is a pure function of (entry history, elapsed time since the last
//! entry): rather than arming real timers per state, callers feed entries
//! as they arrive and call [`ActivityTracker::tick`] on a periodic
//! interval. Every method takes `now_ms`, so tests drive a simulated clock
//! and replays are deterministic.
//!
//! Transition rules, first match wins:
//! 1. Error: the latest entry carries a tool_result flagged `is_error`.
//! 2. PermissionWaiting: the latest entry is an assistant tool_use and
//!    ≥ 10 s passed with nothing after it.
//! 3. Idle: a turn_duration marker is the latest relevant entry.
//! 4. Stopped: Running with ≥ 60 s of silence. Idle never auto-stops:
//!    "agent finished, awaiting user" is not inactivity.
//! 5. Running: any qualifying user/assistant/progress entry, including
//!    recovery out of Error or Stopped.

use agentdeck_types::ActivityState;

use crate::entry::TranscriptEntry;

/// Silence after an un-answered tool invocation before we assume the agent
/// is blocked on a permission prompt.
pub const PERMISSION_WAIT_MS: i64 = 10_000;

/// Silence while Running before the session is considered stopped.
pub const STOPPED_AFTER_MS: i64 = 60_000;

/// A committed state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub previous: ActivityState,
    pub current: ActivityState,
}

/// One tracker per session. Owns nothing but timestamps and flags; the
/// registry holds it inside the session record.
#[derive(Debug, Clone)]
pub struct ActivityTracker {
    state: ActivityState,
    /// Timestamp of the latest entry (from the entry itself when it has
    /// one). Ticks never touch this.
    last_entry_at_ms: i64,
    /// The latest entry was an assistant tool_use with no follow-up yet.
    /// Cleared by progress entries: a running tool was approved.
    pending_tool_use: bool,
}

impl ActivityTracker {
    /// Sessions start Running: discovery only creates a session once its
    /// transcript exists, which means the agent is (or just was) active.
    pub fn new(now_ms: i64) -> Self {
        Self {
            state: ActivityState::Running,
            last_entry_at_ms: now_ms,
            pending_tool_use: false,
        }
    }

    pub fn state(&self) -> ActivityState {
        self.state
    }

    pub fn last_entry_at_ms(&self) -> i64 {
        self.last_entry_at_ms
    }

    fn commit(&mut self, previous: ActivityState) -> Option<StateChange> {
        (previous != self.state).then_some(StateChange {
            previous,
            current: self.state,
        })
    }

    /// Feed one entry in arrival order.
    pub fn observe(&mut self, entry: &TranscriptEntry, now_ms: i64) -> Option<StateChange> {
        let previous = self.state;

        if matches!(entry, TranscriptEntry::Unknown) {
            return None;
        }
        self.last_entry_at_ms = entry.timestamp_ms().unwrap_or(now_ms);

        match entry {
            TranscriptEntry::System(sys) if sys.is_turn_duration() => {
                self.state = ActivityState::Idle;
                self.pending_tool_use = false;
            }
            TranscriptEntry::System(_) => {}
            TranscriptEntry::User(user) => {
                if user.is_exit_command() {
                    self.state = ActivityState::Stopped;
                    self.pending_tool_use = false;
                } else if user.is_local_command() {
                    // Slash-command echo: bookkeeping, not user activity.
                } else if entry.has_error_result() {
                    self.state = ActivityState::Error;
                    self.pending_tool_use = false;
                } else {
                    self.state = ActivityState::Running;
                    self.pending_tool_use = false;
                }
            }
            TranscriptEntry::Assistant(assistant) => {
                self.state = ActivityState::Running;
                self.pending_tool_use = assistant.has_tool_use();
            }
            TranscriptEntry::Progress(_) => {
                self.state = ActivityState::Running;
                self.pending_tool_use = false;
            }
            TranscriptEntry::Unknown => unreachable!(),
        }

        self.commit(previous)
    }

    /// Stop the session from outside the entry stream (a newer session in
    /// the same project took over). Clears the pending tool_use flag too,
    /// so no timer can pull the session back out of Stopped.
    pub fn force_stop(&mut self) -> Option<StateChange> {
        let previous = self.state;
        self.state = ActivityState::Stopped;
        self.pending_tool_use = false;
        self.commit(previous)
    }

    /// Evaluate the time-gated rules against the current clock.
    pub fn tick(&mut self, now_ms: i64) -> Option<StateChange> {
        let previous = self.state;
        let elapsed = now_ms - self.last_entry_at_ms;

        if self.state == ActivityState::Running {
            if self.pending_tool_use && elapsed >= PERMISSION_WAIT_MS {
                self.state = ActivityState::PermissionWaiting;
            } else if elapsed >= STOPPED_AFTER_MS {
                self.state = ActivityState::Stopped;
            }
        }

        self.commit(previous)
    }
}
