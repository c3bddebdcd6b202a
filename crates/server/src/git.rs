// crates/server/src/git.rs
//! Working-tree diff stats for tracked sessions.
//!
//! The branch name comes from transcript entries; only the added/removed
//! line counts need a real `git` invocation, and only for sessions that are
//! sitting still (the registry gates the call by state and a 30 s cooldown).

use std::path::Path;

use tokio::process::Command;

/// Run `git diff --shortstat` in `working_directory` and return
/// (additions, deletions). `None` when git is unavailable, the directory is
/// not a repository, or the output is unreadable.
pub async fn diff_shortstat(working_directory: &Path) -> Option<(u64, u64)> {
    let output = Command::new("git")
        .args(["diff", "--shortstat"])
        .current_dir(working_directory)
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    parse_shortstat(&String::from_utf8_lossy(&output.stdout))
}

/// Parse ` 3 files changed, 42 insertions(+), 10 deletions(-)`.
/// An empty diff is a clean tree, which is a valid (0, 0) answer.
fn parse_shortstat(output: &str) -> Option<(u64, u64)> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Some((0, 0));
    }
    let mut additions: u64 = 0;
    let mut deletions: u64 = 0;
    for part in trimmed.split(',') {
        let part = part.trim();
        if part.contains("insertion") {
            if let Some(n) = part.split_whitespace().next().and_then(|s| s.parse().ok()) {
                additions = n;
            }
        } else if part.contains("deletion") {
            if let Some(n) = part.split_whitespace().next().and_then(|s| s.parse().ok()) {
                deletions = n;
            }
        }
    }
    Some((additions, deletions))
}
