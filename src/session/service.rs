// ABOUTME: SessionService trait and InMemorySessionService - creation of
// ABOUTME: isolated child sessions, lookup, and saving updated totals.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::Session;
use crate::error::SessionError;

/// Storage for sessions.
#[async_trait]
pub trait SessionService: Send + Sync {
    /// Create a top-level session.
    async fn create(&self, title: &str) -> Result<Session, SessionError>;

    /// Create an isolated session linked to `parent_id`.
    async fn create_child(&self, parent_id: &str, title: &str) -> Result<Session, SessionError>;

    async fn get(&self, id: &str) -> Result<Session, SessionError>;

    /// Persist `session`, returning the stored copy.
    async fn save(&self, session: Session) -> Result<Session, SessionError>;
}

/// Thread-safe in-memory session store. Clones share the same sessions.
#[derive(Default, Clone)]
pub struct InMemorySessionService {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl InMemorySessionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sessions whose parent is `parent_id`, oldest first.
    pub async fn children(&self, parent_id: &str) -> Vec<Session> {
        let sessions = self.sessions.read().await;
        let mut children: Vec<_> = sessions
            .values()
            .filter(|s| s.parent_id.as_deref() == Some(parent_id))
            .cloned()
            .collect();
        children.sort_by_key(|s| s.created_at);
        children
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionService for InMemorySessionService {
    async fn create(&self, title: &str) -> Result<Session, SessionError> {
        let session = Session::new(title);
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn create_child(&self, parent_id: &str, title: &str) -> Result<Session, SessionError> {
        let mut sessions = self.sessions.write().await;
        if !sessions.contains_key(parent_id) {
            return Err(SessionError::NotFound(parent_id.to_string()));
        }
        let session = Session::child_of(parent_id, title);
        debug!(parent_id = %parent_id, session_id = %session.id, "Created child session");
        sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn get(&self, id: &str) -> Result<Session, SessionError> {
        let sessions = self.sessions.read().await;
        sessions
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    async fn save(&self, session: Session) -> Result<Session, SessionError> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }
}
