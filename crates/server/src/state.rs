// crates/server/src/state.rs
use std::sync::Arc;

use crate::registry::SessionRegistry;

/// Shared state for route handlers. The registry owns the event hub.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }
}
