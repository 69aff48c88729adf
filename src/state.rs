//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the session registry (every live room of this process) and the
//! relay configuration. There is no other process-wide state.

use std::sync::Arc;

use crate::config::RelayConfig;
use crate::services::registry::SessionRegistry;

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub config: Arc<RelayConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(config: RelayConfig) -> Self {
        let registry = SessionRegistry::new();
        Self { registry: Arc::new(registry), config: Arc::new(config) }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
