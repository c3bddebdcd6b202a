// crates/core/src/scan.rs
//! Transcript discovery: enumerate recently-active session files under
//! the transcript root.
//!
//! The layout is exactly two levels: `<root>/<project>/<session>.jsonl`.
//! The project directory name is path-encoded and ambiguous (both `/` and
//! `.` become `-`), so nothing here tries to decode it; session identity
//! comes from the `cwd` field inside the transcript itself.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use tracing::warn;

use crate::error::DiscoveryError;

/// Files untouched for longer than this are ignored by the scan.
pub const RECENCY_WINDOW_MS: i64 = 24 * 60 * 60 * 1000;

/// One `.jsonl` transcript found by [`scan_transcripts`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredTranscript {
    /// The file stem, which is the session id.
    pub session_id: String,
    pub path: PathBuf,
    pub modified_at_ms: i64,
}

/// `~/.claude/projects`, the default transcript root.
pub fn default_transcript_root() -> Result<PathBuf, DiscoveryError> {
    dirs::home_dir()
        .map(|home| home.join(".claude").join("projects"))
        .ok_or(DiscoveryError::HomeDirNotFound)
}

/// Walk `<root>/<project>/<session>.jsonl` and return every transcript
/// modified within [`RECENCY_WINDOW_MS`] of `now_ms`.
///
/// Only the two expected levels are visited; anything nested deeper is
/// not a session transcript. A missing or unreadable root is an error,
/// but an unreadable project directory is skipped with a warning so one
/// bad directory cannot blind the whole scan.
pub async fn scan_transcripts(
    root: &Path,
    now_ms: i64,
) -> Result<Vec<DiscoveredTranscript>, DiscoveryError> {
    let mut projects = tokio::fs::read_dir(root)
        .await
        .map_err(|e| DiscoveryError::io(root, e))?;

    let mut found = Vec::new();
    while let Some(project) = projects
        .next_entry()
        .await
        .map_err(|e| DiscoveryError::io(root, e))?
    {
        let project_path = project.path();
        match project.file_type().await {
            Ok(ft) if ft.is_dir() => {}
            Ok(_) => continue,
            Err(e) => {
                warn!(path = %project_path.display(), error = %e, "skipping unreadable entry");
                continue;
            }
        }

        let mut sessions = match tokio::fs::read_dir(&project_path).await {
            Ok(rd) => rd,
            Err(e) => {
                warn!(path = %project_path.display(), error = %e, "skipping unreadable project dir");
                continue;
            }
        };

        while let Some(session) = sessions
            .next_entry()
            .await
            .map_err(|e| DiscoveryError::io(&project_path, e))?
        {
            let path = session.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }
            let Some(session_id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let modified_at_ms = match session.metadata().await {
                Ok(meta) => modified_ms(&meta),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping transcript without metadata");
                    continue;
                }
            };
            if now_ms - modified_at_ms > RECENCY_WINDOW_MS {
                continue;
            }
            found.push(DiscoveredTranscript {
                session_id: session_id.to_string(),
                path,
                modified_at_ms,
            });
        }
    }

    // Stable order so successive scans diff cleanly.
    found.sort_by(|a, b| a.session_id.cmp(&b.session_id));
    Ok(found)
}

fn modified_ms(meta: &std::fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
