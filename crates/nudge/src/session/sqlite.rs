use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use super::{Session, SessionId, SessionStore, SessionStoreError};

/// A SQLite implementation of the `SessionStore` trait.
///
/// Each session is stored as a single JSON document in one row, matching the
/// one-document-per-session model. The timestamp columns are denormalized
/// copies for inspection with plain SQL; the document is authoritative.
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    /// Opens (creating if missing) the database at `path` and initializes the
    /// schema. `path` may be a filesystem path or `:memory:`.
    pub async fn connect(path: &str) -> Result<Self, SessionStoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| SessionStoreError::DbError(format!("invalid SQLite path: {e}")))?
            .create_if_missing(true);

        // A single connection keeps `:memory:` databases coherent across the
        // pool; one session document per request makes contention a non-issue.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| {
                SessionStoreError::DbError(format!("failed to connect to SQLite: {e}"))
            })?;

        Self::migrate(&pool).await?;

        Ok(Self { pool })
    }

    async fn migrate(pool: &SqlitePool) -> Result<(), SessionStoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY NOT NULL,
                doc TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );",
        )
        .execute(pool)
        .await
        .map_err(|e| {
            SessionStoreError::DbError(format!("failed to create sessions table: {e}"))
        })?;

        debug!("sqlite session store migrations completed");
        Ok(())
    }

    fn encode(session: &Session) -> Result<String, SessionStoreError> {
        serde_json::to_string(session)
            .map_err(|e| SessionStoreError::CodecError(format!("failed to serialize session: {e}")))
    }

    fn decode(doc: &str) -> Result<Session, SessionStoreError> {
        serde_json::from_str(doc).map_err(|e| {
            SessionStoreError::CodecError(format!("failed to deserialize session: {e}"))
        })
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn create_session(&self, session: Session) -> Result<(), SessionStoreError> {
        let doc = Self::encode(&session)?;
        let result = sqlx::query(
            "INSERT OR IGNORE INTO sessions (session_id, doc, created_at, updated_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(session.session_id.as_str())
        .bind(doc)
        .bind(session.created_at.to_rfc3339())
        .bind(session.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| SessionStoreError::DbError(format!("failed to insert session: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(SessionStoreError::AlreadyExists(session.session_id));
        }
        Ok(())
    }

    async fn get_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<Session>, SessionStoreError> {
        let row = sqlx::query("SELECT doc FROM sessions WHERE session_id = ?")
            .bind(session_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SessionStoreError::DbError(format!("failed to fetch session: {e}")))?;

        match row {
            Some(row) => {
                let doc: String = row
                    .try_get("doc")
                    .map_err(|e| SessionStoreError::DbError(e.to_string()))?;
                Ok(Some(Self::decode(&doc)?))
            }
            None => Ok(None),
        }
    }

    async fn update_session(&self, session: &Session) -> Result<(), SessionStoreError> {
        let doc = Self::encode(session)?;
        let result = sqlx::query("UPDATE sessions SET doc = ?, updated_at = ? WHERE session_id = ?")
            .bind(doc)
            .bind(session.updated_at.to_rfc3339())
            .bind(session.session_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| SessionStoreError::DbError(format!("failed to update session: {e}")))?;

        if result.rows_affected() == 0 {
            Err(SessionStoreError::NotFound(session.session_id.clone()))
        } else {
            Ok(())
        }
    }

    async fn delete_session(&self, session_id: &SessionId) -> Result<(), SessionStoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE session_id = ?")
            .bind(session_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| SessionStoreError::DbError(format!("failed to delete session: {e}")))?;

        if result.rows_affected() == 0 {
            Err(SessionStoreError::NotFound(session_id.clone()))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{SessionStatus, SortDecision};

    async fn store() -> SqliteSessionStore {
        SqliteSessionStore::connect(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = store().await;
        let session = Session::new("Test");
        let id = session.session_id.clone();
        store.create_session(session.clone()).await.unwrap();

        let fetched = store.get_session(&id).await.unwrap().unwrap();
        assert_eq!(fetched.session_id, id);
        assert_eq!(fetched.name, "Test");
        assert_eq!(fetched.status, SessionStatus::Created);
        assert_eq!(fetched.created_at, session.created_at);
    }

    #[tokio::test]
    async fn create_twice_is_already_exists() {
        let store = store().await;
        let session = Session::new("Test");
        store.create_session(session.clone()).await.unwrap();
        let err = store.create_session(session).await.unwrap_err();
        assert!(matches!(err, SessionStoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn update_replaces_the_document() {
        let store = store().await;
        let mut session = Session::new("Test");
        let id = session.session_id.clone();
        store.create_session(session.clone()).await.unwrap();

        session.replace_items(vec![crate::session::Item::new(
            "Lamp".to_string(),
            String::new(),
            crate::session::ItemCategory::Decor,
            SortDecision::Keep,
            String::new(),
        )]);
        store.update_session(&session).await.unwrap();

        let fetched = store.get_session(&id).await.unwrap().unwrap();
        assert_eq!(fetched.items.len(), 1);
        assert_eq!(fetched.items[0].name, "Lamp");
    }

    #[tokio::test]
    async fn update_and_delete_of_unknown_session_fail() {
        let store = store().await;
        let session = Session::new("Test");
        assert!(matches!(
            store.update_session(&session).await.unwrap_err(),
            SessionStoreError::NotFound(_)
        ));
        assert!(matches!(
            store.delete_session(&session.session_id).await.unwrap_err(),
            SessionStoreError::NotFound(_)
        ));
    }
}
