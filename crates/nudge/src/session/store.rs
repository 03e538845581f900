use async_trait::async_trait;

use super::{Session, SessionId};

/// An error type for session store operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    #[error("session not found: {0}")]
    NotFound(SessionId),
    #[error("session already exists: {0}")]
    AlreadyExists(SessionId),
    #[error("database error: {0}")]
    DbError(String),
    #[error("serialization/deserialization error: {0}")]
    CodecError(String),
}

/// Trait for abstracting asynchronous session storage.
///
/// Each operation is scoped to exactly one session document; there are no
/// cross-session transactions. Read-modify-write cycles over this trait are
/// last-write-wins: concurrent mutations of the same session are not
/// conflict-detected.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Creates a new session in the store.
    async fn create_session(&self, session: Session) -> Result<(), SessionStoreError>;

    /// Retrieves a session by its ID.
    async fn get_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<Session>, SessionStoreError>;

    /// Replaces an existing session document wholesale.
    async fn update_session(&self, session: &Session) -> Result<(), SessionStoreError>;

    /// Deletes a session by its ID.
    async fn delete_session(&self, session_id: &SessionId) -> Result<(), SessionStoreError>;
}
