//! Shared view of the sessions a server is carrying.
//!
//! Workers own their session state; the registry only mirrors each session's
//! lifecycle stage so the health endpoint and shutdown logging can report on
//! live connections without touching worker internals.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::session::SessionState;

#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<RwLock<HashMap<Uuid, SessionState>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly accepted session.
    pub async fn register(&self, id: Uuid) {
        self.inner.write().await.insert(id, SessionState::Connected);
    }

    /// Mirror a session's lifecycle stage.
    pub async fn set_state(&self, id: Uuid, state: SessionState) {
        if let Some(entry) = self.inner.write().await.get_mut(&id) {
            *entry = state;
        }
    }

    /// Drop a finished session.
    pub async fn deregister(&self, id: Uuid) {
        self.inner.write().await.remove(&id);
    }

    /// Number of sessions still connected, in any stage.
    pub async fn active_count(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Number of sessions currently mid-stream.
    pub async fn streaming_count(&self) -> usize {
        self.inner
            .read()
            .await
            .values()
            .filter(|&&state| state == SessionState::Streaming)
            .count()
    }

    /// Test accessor for a single session's mirrored stage.
    #[cfg(test)]
    pub async fn state_of(&self, id: Uuid) -> Option<SessionState> {
        self.inner.read().await.get(&id).copied()
    }
}
