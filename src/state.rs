//! Application state management
//!
//! Contains shared state accessible across all handlers. The guard
//! service owns the cache and statistics; handlers only hold the handle.

use crate::guard::GuardService;
use std::sync::Arc;

/// Application state shared across all handlers
pub struct AppState {
    /// The process-wide guard service
    pub guard: Arc<GuardService>,
}

impl AppState {
    pub fn new(guard: Arc<GuardService>) -> Self {
        Self { guard }
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;
