//! HTTP API: the LINE webhook plus health and admin endpoints

mod handlers;
mod types;

pub use handlers::create_router;

use crate::runtime::SharedRuntime;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<SharedRuntime>,
    /// Key for the webhook signature check
    pub channel_secret: Arc<str>,
    pub version: Arc<str>,
}

impl AppState {
    pub fn new(runtime: Arc<SharedRuntime>, channel_secret: &str, version: &str) -> Self {
        Self {
            runtime,
            channel_secret: Arc::from(channel_secret),
            version: Arc::from(version),
        }
    }
}
