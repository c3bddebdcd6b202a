// crates/server/src/discovery.rs
//! Periodic transcript discovery.
//!
//! Every 5 s the loop enumerates recent transcripts under the root, starts
//! tracking new ones, and retires sessions whose file is gone. Retirement
//! keys on the file actually being absent, not merely aging out of the
//! scan's 24 h recency window.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use agentdeck_core::scan_transcripts;

use crate::registry::SessionRegistry;
use crate::tailer::spawn_tailer;

const SCAN_INTERVAL: Duration = Duration::from_secs(5);

/// Run the discovery loop until the shutdown signal fires. The first scan
/// happens immediately, so sessions active at startup appear right away.
pub fn spawn_discovery(
    registry: Arc<SessionRegistry>,
    root: PathBuf,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SCAN_INTERVAL);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => break,
                _ = interval.tick() => {
                    run_scan(&registry, &root).await;
                }
            }
        }

        registry.shutdown_all().await;
        info!("discovery stopped");
    });
}

async fn run_scan(registry: &Arc<SessionRegistry>, root: &PathBuf) {
    let now_ms = chrono::Utc::now().timestamp_millis();

    let found = match scan_transcripts(root, now_ms).await {
        Ok(found) => found,
        Err(e) => {
            warn!(root = %root.display(), error = %e, "transcript scan failed");
            return;
        }
    };

    for transcript in &found {
        if registry.contains(&transcript.session_id).await {
            continue;
        }
        info!(
            session_id = %transcript.session_id,
            path = %transcript.path.display(),
            "tracking new transcript"
        );
        let (stop_tx, stop_rx) = watch::channel(false);
        registry
            .insert(
                &transcript.session_id,
                transcript.path.clone(),
                stop_tx,
                now_ms,
            )
            .await;
        spawn_tailer(
            registry.clone(),
            transcript.session_id.clone(),
            transcript.path.clone(),
            stop_rx,
        );
    }

    // A tracked session whose file no longer exists is retired. Sessions
    // merely older than the recency window keep their backlog and state.
    for (session_id, path) in registry.tracked_paths().await {
        if found.iter().any(|t| t.session_id == session_id) {
            continue;
        }
        match tokio::fs::metadata(&path).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                registry.remove(&session_id).await;
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "could not stat transcript");
            }
        }
    }
}
