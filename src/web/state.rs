//! # Web API Application State

use std::sync::Arc;

use crate::orchestration::{HealthSnapshot, PersonaDaemon};

/// Shared state for the health endpoint: a read-only handle on the daemon
#[derive(Debug, Clone)]
pub struct WebState {
    daemon: Arc<PersonaDaemon>,
}

impl WebState {
    pub fn new(daemon: Arc<PersonaDaemon>) -> Self {
        Self { daemon }
    }

    pub async fn snapshot(&self) -> HealthSnapshot {
        self.daemon.health_snapshot().await
    }
}
