// crates/core/src/error.rs
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while scanning the transcript root.
///
/// Per-file problems during a scan are skipped with a logged diagnostic;
/// these variants cover the root itself being unusable.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Transcript root not found: {path}")]
    RootNotFound { path: PathBuf },

    #[error("Cannot access transcript root: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("IO error accessing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Home directory not found")]
    HomeDirNotFound,
}

impl DiscoveryError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::RootNotFound { path },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            _ => Self::Io { path, source },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_classifies_by_kind() {
        let not_found = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(
            DiscoveryError::io("/tmp/x", not_found),
            DiscoveryError::RootNotFound { .. }
        ));

        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no");
        assert!(matches!(
            DiscoveryError::io("/tmp/x", denied),
            DiscoveryError::PermissionDenied { .. }
        ));

        let other = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        assert!(matches!(
            DiscoveryError::io("/tmp/x", other),
            DiscoveryError::Io { .. }
        ));
    }

    #[test]
    fn display_includes_path() {
        let err = DiscoveryError::RootNotFound {
            path: PathBuf::from("/nowhere/projects"),
        };
        assert!(err.to_string().contains("/nowhere/projects"));
    }
}
