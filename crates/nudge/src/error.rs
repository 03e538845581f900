use thiserror::Error;

use crate::session::{SessionId, SessionStoreError};
use crate::vision::VisionError;

/// Error types that can occur when driving a decluttering session.
#[derive(Debug, Error)]
pub enum NudgeError {
    /// The referenced session does not exist.
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// The referenced task does not exist within the session.
    #[error("task not found: {0}")]
    TaskNotFound(String),

    /// The referenced item does not exist within the session.
    #[error("item not found: {0}")]
    ItemNotFound(String),

    /// The request violates a precondition or carries an invalid value.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The vision provider failed, timed out, or returned an unparsable
    /// structure. The session is left unchanged.
    #[error("vision provider error: {0}")]
    Vision(#[from] VisionError),

    /// The session store failed with an I/O or codec error.
    #[error("session store error: {0}")]
    Store(#[from] SessionStoreError),
}
