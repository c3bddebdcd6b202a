// crates/server/src/config.rs
//! Environment-driven server configuration.

use std::path::PathBuf;

use agentdeck_core::{default_transcript_root, DiscoveryError};

/// Default port for the server.
const DEFAULT_PORT: u16 = 3001;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Root directory holding `<project>/<session>.jsonl` transcripts.
    pub transcript_root: PathBuf,
}

impl Config {
    /// Read configuration from the environment.
    ///
    /// `AGENTDECK_PORT` wins over the generic `PORT`; unparseable values
    /// fall through to the default. `AGENTDECK_TRANSCRIPT_ROOT` overrides
    /// the default `~/.claude/projects` location.
    pub fn from_env() -> Result<Self, DiscoveryError> {
        let port = std::env::var("AGENTDECK_PORT")
            .ok()
            .or_else(|| std::env::var("PORT").ok())
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let transcript_root = match std::env::var("AGENTDECK_TRANSCRIPT_ROOT") {
            Ok(root) if !root.is_empty() => PathBuf::from(root),
            _ => default_transcript_root()?,
        };

        Ok(Self {
            port,
            transcript_root,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var reads are process-global; these tests only cover the pure
    // parts to avoid cross-test interference.

    #[test]
    fn default_port_value() {
        assert_eq!(DEFAULT_PORT, 3001);
    }

    #[test]
    fn explicit_root_is_used_verbatim() {
        let config = Config {
            port: DEFAULT_PORT,
            transcript_root: PathBuf::from("/tmp/transcripts"),
        };
        assert_eq!(config.transcript_root, PathBuf::from("/tmp/transcripts"));
    }
}
