use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{Session, SessionId, SessionStore, SessionStoreError};

/// An in-memory implementation of the `SessionStore` trait.
pub struct InMemorySessionStore {
    sessions: Arc<Mutex<HashMap<SessionId, Session>>>,
}

impl InMemorySessionStore {
    /// Creates a new `InMemorySessionStore`.
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create_session(&self, session: Session) -> Result<(), SessionStoreError> {
        let mut sessions = self.sessions.lock().await;
        let id = session.session_id.clone();
        if sessions.contains_key(&id) {
            return Err(SessionStoreError::AlreadyExists(id));
        }
        sessions.insert(id, session);
        Ok(())
    }

    async fn get_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<Session>, SessionStoreError> {
        let sessions = self.sessions.lock().await;
        Ok(sessions.get(session_id).cloned())
    }

    async fn update_session(&self, session: &Session) -> Result<(), SessionStoreError> {
        let mut sessions = self.sessions.lock().await;
        if !sessions.contains_key(&session.session_id) {
            return Err(SessionStoreError::NotFound(session.session_id.clone()));
        }
        sessions.insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn delete_session(&self, session_id: &SessionId) -> Result<(), SessionStoreError> {
        let mut sessions = self.sessions.lock().await;
        if sessions.remove(session_id).is_some() {
            Ok(())
        } else {
            Err(SessionStoreError::NotFound(session_id.clone()))
        }
    }
}
