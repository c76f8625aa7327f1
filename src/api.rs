//! HTTP API: the messaging webhook plus a few operator endpoints

mod handlers;
mod twiml;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::runtime::SharedRuntimeManager;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<SharedRuntimeManager>,
}

impl AppState {
    pub fn new(runtime: SharedRuntimeManager) -> Self {
        Self {
            runtime: Arc::new(runtime),
        }
    }
}
