use std::sync::Arc;

use tracing::{info, warn};

use crate::error::NudgeError;
use crate::session::{Item, Session, SessionId, SessionStore, SortDecision, Task};
use crate::vision::VisionProvider;

/// The orchestrator: fetches sessions from the store, drives the vision
/// provider, applies the resulting mutations, and persists the document.
///
/// A failed provider call leaves the stored session untouched; there is no
/// retry and no partial write. Read-modify-write is last-write-wins, matching
/// the store's documented concurrency model.
pub struct Nudge {
    store: Arc<dyn SessionStore>,
    vision: Arc<dyn VisionProvider>,
}

impl Nudge {
    pub fn new(store: Arc<dyn SessionStore>, vision: Arc<dyn VisionProvider>) -> Self {
        Self { store, vision }
    }

    /// Creates an empty session. `name` defaults to a placeholder.
    pub async fn create_session(&self, name: Option<String>) -> Result<Session, NudgeError> {
        let session = Session::new(name.unwrap_or_else(|| "My Space".to_string()));
        self.store.create_session(session.clone()).await?;
        info!(session_id = %session.session_id, "session created");
        Ok(session)
    }

    pub async fn get_session(&self, id: &SessionId) -> Result<Session, NudgeError> {
        self.store
            .get_session(id)
            .await?
            .ok_or_else(|| NudgeError::SessionNotFound(id.clone()))
    }

    /// Analyzes a photo of the space and attaches the result to the session.
    pub async fn analyze_space(
        &self,
        id: &SessionId,
        image: &[u8],
    ) -> Result<Session, NudgeError> {
        let mut session = self.get_session(id).await?;

        let analysis = self.vision.analyze_space(image).await.map_err(|e| {
            warn!(session_id = %id, error = %e, "space analysis failed");
            e
        })?;

        session.attach_analysis(analysis);
        self.store.update_session(&session).await?;
        info!(session_id = %id, "space analyzed");
        Ok(session)
    }

    /// Generates a fresh task list from the session's analysis. Destructive:
    /// any existing tasks and their completion state are replaced.
    pub async fn generate_tasks(&self, id: &SessionId) -> Result<Session, NudgeError> {
        let mut session = self.get_session(id).await?;
        let Some(analysis) = session.analysis.clone() else {
            return Err(NudgeError::InvalidRequest(
                "space must be analyzed first".to_string(),
            ));
        };

        let drafts = self.vision.generate_tasks(&analysis).await.map_err(|e| {
            warn!(session_id = %id, error = %e, "task generation failed");
            e
        })?;

        let tasks: Vec<Task> = drafts
            .into_iter()
            .map(|d| {
                Task::new(
                    d.title,
                    d.description,
                    d.estimated_minutes,
                    d.category,
                    d.encouragement,
                )
            })
            .collect();

        session.replace_tasks(tasks)?;
        self.store.update_session(&session).await?;
        info!(session_id = %id, total_tasks = session.total_tasks, "tasks generated");
        Ok(session)
    }

    /// Flips one task's completion flag and persists the recomputed session.
    pub async fn set_task_completion(
        &self,
        id: &SessionId,
        task_id: &str,
        completed: bool,
    ) -> Result<Session, NudgeError> {
        let mut session = self.get_session(id).await?;
        session.set_task_completion(task_id, completed)?;
        self.store.update_session(&session).await?;
        info!(
            session_id = %id,
            task_id,
            completed,
            completed_tasks = session.completed_tasks,
            "task updated"
        );
        Ok(session)
    }

    /// Identifies items in a photo and attaches them to the session.
    /// Destructive for the item list; never touches tasks or status.
    pub async fn identify_items(
        &self,
        id: &SessionId,
        image: &[u8],
    ) -> Result<Session, NudgeError> {
        let mut session = self.get_session(id).await?;

        let drafts = self.vision.identify_items(image).await.map_err(|e| {
            warn!(session_id = %id, error = %e, "item identification failed");
            e
        })?;

        let items: Vec<Item> = drafts
            .into_iter()
            .map(|d| Item::new(d.name, d.description, d.category, d.suggestion, d.reason))
            .collect();

        session.replace_items(items);
        self.store.update_session(&session).await?;
        info!(session_id = %id, items = session.items.len(), "items identified");
        Ok(session)
    }

    /// Records the user's keep/sell/donate decision for one item.
    pub async fn set_item_decision(
        &self,
        id: &SessionId,
        item_id: &str,
        decision: SortDecision,
    ) -> Result<Session, NudgeError> {
        let mut session = self.get_session(id).await?;
        session.set_item_decision(item_id, decision)?;
        self.store.update_session(&session).await?;
        info!(session_id = %id, item_id, decision = ?decision, "item sorted");
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{
        InMemorySessionStore, ItemCategory, SessionStatus, SpaceAnalysis, TaskCategory, Zone,
    };
    use crate::vision::{ItemDraft, TaskDraft, VisionError};
    use async_trait::async_trait;

    /// Scripted provider: returns canned payloads, or fails everything.
    struct FakeVision {
        fail: bool,
    }

    impl FakeVision {
        fn ok() -> Arc<Self> {
            Arc::new(Self { fail: false })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self { fail: true })
        }

        fn err() -> VisionError {
            VisionError::Provider("model unavailable".to_string())
        }
    }

    #[async_trait]
    impl VisionProvider for FakeVision {
        async fn analyze_space(&self, _image: &[u8]) -> Result<SpaceAnalysis, VisionError> {
            if self.fail {
                return Err(Self::err());
            }
            Ok(SpaceAnalysis {
                overview: "A desk with papers and cups".to_string(),
                encouragement: "Small steps count".to_string(),
                difficulty: 2,
                quick_win: "The three cups".to_string(),
                zones: vec![Zone {
                    name: "Desk".to_string(),
                    description: "Papers and cups".to_string(),
                    priority: 1,
                    estimated_minutes: 10,
                }],
            })
        }

        async fn generate_tasks(
            &self,
            _analysis: &SpaceAnalysis,
        ) -> Result<Vec<TaskDraft>, VisionError> {
            if self.fail {
                return Err(Self::err());
            }
            Ok(vec![
                TaskDraft {
                    title: "Pick up the cups".to_string(),
                    description: "Carry them to the kitchen".to_string(),
                    estimated_minutes: 3,
                    category: TaskCategory::Pickup,
                    encouragement: "Easy win!".to_string(),
                },
                TaskDraft {
                    title: "Stack the papers".to_string(),
                    description: "One pile is fine".to_string(),
                    estimated_minutes: 5,
                    category: TaskCategory::Organize,
                    encouragement: "Nearly there".to_string(),
                },
            ])
        }

        async fn identify_items(&self, _image: &[u8]) -> Result<Vec<ItemDraft>, VisionError> {
            if self.fail {
                return Err(Self::err());
            }
            Ok(vec![ItemDraft {
                name: "Old charger".to_string(),
                description: "USB-A charger".to_string(),
                category: ItemCategory::Electronics,
                suggestion: SortDecision::Donate,
                reason: "Superseded".to_string(),
            }])
        }
    }

    fn app(vision: Arc<FakeVision>) -> Nudge {
        Nudge::new(Arc::new(InMemorySessionStore::new()), vision)
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let app = app(FakeVision::ok());
        let created = app.create_session(Some("Test".to_string())).await.unwrap();
        let fetched = app.get_session(&created.session_id).await.unwrap();
        assert_eq!(fetched.name, "Test");
        assert_eq!(fetched.status, SessionStatus::Created);
        assert_eq!(fetched.created_at, created.created_at);
    }

    #[tokio::test]
    async fn create_defaults_the_name() {
        let app = app(FakeVision::ok());
        let session = app.create_session(None).await.unwrap();
        assert_eq!(session.name, "My Space");
    }

    #[tokio::test]
    async fn unknown_session_is_not_found_everywhere() {
        let app = app(FakeVision::ok());
        let id = SessionId::new();
        assert!(matches!(
            app.get_session(&id).await.unwrap_err(),
            NudgeError::SessionNotFound(_)
        ));
        assert!(matches!(
            app.analyze_space(&id, b"img").await.unwrap_err(),
            NudgeError::SessionNotFound(_)
        ));
        assert!(matches!(
            app.generate_tasks(&id).await.unwrap_err(),
            NudgeError::SessionNotFound(_)
        ));
        assert!(matches!(
            app.identify_items(&id, b"img").await.unwrap_err(),
            NudgeError::SessionNotFound(_)
        ));
    }

    #[tokio::test]
    async fn full_decluttering_scenario() {
        let app = app(FakeVision::ok());
        let session = app.create_session(Some("Test".to_string())).await.unwrap();
        let id = session.session_id.clone();

        let session = app.analyze_space(&id, b"photo").await.unwrap();
        let analysis = session.analysis.as_ref().unwrap();
        assert!((1..=5).contains(&analysis.difficulty));
        assert!(!analysis.zones.is_empty());
        assert_eq!(session.status, SessionStatus::Analyzed);

        let session = app.generate_tasks(&id).await.unwrap();
        assert_eq!(session.status, SessionStatus::InProgress);
        assert_eq!(session.total_tasks, session.tasks.len());
        assert_eq!(session.completed_tasks, 0);

        let first = session.tasks[0].task_id.clone();
        let session = app.set_task_completion(&id, &first, true).await.unwrap();
        assert_eq!(session.completed_tasks, 1);
        assert_eq!(session.streak, 1);

        // Repeat completion bumps the streak again: current behavior.
        let session = app.set_task_completion(&id, &first, true).await.unwrap();
        assert_eq!(session.completed_tasks, 1);
        assert_eq!(session.streak, 2);

        let second = session.tasks[1].task_id.clone();
        let session = app.set_task_completion(&id, &second, true).await.unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.completed_tasks, session.total_tasks);
    }

    #[tokio::test]
    async fn generate_tasks_before_analysis_is_rejected() {
        let app = app(FakeVision::ok());
        let session = app.create_session(None).await.unwrap();
        let id = session.session_id.clone();

        let err = app.generate_tasks(&id).await.unwrap_err();
        assert!(matches!(err, NudgeError::InvalidRequest(_)));

        let session = app.get_session(&id).await.unwrap();
        assert!(session.tasks.is_empty());
        assert_eq!(session.status, SessionStatus::Created);
    }

    #[tokio::test]
    async fn regenerate_resets_progress() {
        let app = app(FakeVision::ok());
        let session = app.create_session(None).await.unwrap();
        let id = session.session_id.clone();

        app.analyze_space(&id, b"photo").await.unwrap();
        let session = app.generate_tasks(&id).await.unwrap();
        let first = session.tasks[0].task_id.clone();
        app.set_task_completion(&id, &first, true).await.unwrap();

        let session = app.generate_tasks(&id).await.unwrap();
        assert_eq!(session.completed_tasks, 0);
        assert_eq!(session.status, SessionStatus::InProgress);
        assert!(session.tasks.iter().all(|t| !t.completed));
        // The old task ids are gone: full overwrite, not a merge.
        assert!(session.tasks.iter().all(|t| t.task_id != first));
    }

    #[tokio::test]
    async fn failed_analysis_leaves_session_unchanged() {
        let app = app(FakeVision::failing());
        let session = app.create_session(None).await.unwrap();
        let id = session.session_id.clone();
        let before = app.get_session(&id).await.unwrap();

        let err = app.analyze_space(&id, b"photo").await.unwrap_err();
        assert!(matches!(err, NudgeError::Vision(_)));

        let after = app.get_session(&id).await.unwrap();
        assert!(after.analysis.is_none());
        assert_eq!(after.status, SessionStatus::Created);
        assert_eq!(after.updated_at, before.updated_at);
    }

    #[tokio::test]
    async fn failed_identification_leaves_items_unchanged() {
        let app = app(FakeVision::failing());
        let session = app.create_session(None).await.unwrap();
        let id = session.session_id.clone();

        let err = app.identify_items(&id, b"photo").await.unwrap_err();
        assert!(matches!(err, NudgeError::Vision(_)));
        assert!(app.get_session(&id).await.unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn item_sorting_round_trip() {
        let app = app(FakeVision::ok());
        let session = app.create_session(None).await.unwrap();
        let id = session.session_id.clone();

        let session = app.identify_items(&id, b"photo").await.unwrap();
        assert_eq!(session.items.len(), 1);
        assert_eq!(session.status, SessionStatus::Created);

        let item_id = session.items[0].item_id.clone();
        let session = app
            .set_item_decision(&id, &item_id, SortDecision::Sell)
            .await
            .unwrap();
        assert_eq!(session.items[0].decision, Some(SortDecision::Sell));
        assert_eq!(session.status, SessionStatus::Created);
        assert_eq!(session.streak, 0);

        let err = app
            .set_item_decision(&id, "item-missing", SortDecision::Keep)
            .await
            .unwrap_err();
        assert!(matches!(err, NudgeError::ItemNotFound(_)));
    }
}
