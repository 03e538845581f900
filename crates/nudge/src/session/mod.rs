use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::NudgeError;

mod in_memory;
mod sqlite;
mod store;

pub use in_memory::InMemorySessionStore;
pub use sqlite::SqliteSessionStore;
pub use store::{SessionStore, SessionStoreError};

/// A unique identifier for a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a new, random session ID.
    pub fn new() -> Self {
        SessionId(Uuid::new_v4().to_string())
    }

    /// Creates a session ID from a string.
    pub fn from_str(s: &str) -> Self {
        SessionId(s.to_string())
    }

    /// Returns the inner string representation of the session ID.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a session.
///
/// Transitions run forward only: `created` → `analyzed` → `in_progress` →
/// `completed`. Un-completing a task moves a completed session back to
/// `in_progress`; item sorting never changes the status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Created,
    Analyzed,
    InProgress,
    Completed,
}

/// Category of a generated cleaning task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskCategory {
    #[default]
    Pickup,
    Wipe,
    Organize,
    Sort,
    Celebrate,
}

/// Category of an identified physical item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemCategory {
    Clothing,
    Electronics,
    Books,
    Kitchenware,
    Decor,
    Toys,
    #[default]
    Misc,
}

/// Where an item should go: used both for the model's suggestion and for the
/// user's final decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDecision {
    #[default]
    Keep,
    Sell,
    Donate,
}

impl std::str::FromStr for SortDecision {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keep" => Ok(SortDecision::Keep),
            "sell" => Ok(SortDecision::Sell),
            "donate" => Ok(SortDecision::Donate),
            _ => Err(()),
        }
    }
}

/// A sub-area of the space identified by analysis. Not persisted outside the
/// analysis blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    pub name: String,
    pub description: String,
    pub priority: u32,
    pub estimated_minutes: u32,
}

/// Structured result of analyzing a photo of the space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpaceAnalysis {
    pub overview: String,
    pub encouragement: String,
    /// 1 = light tidying, 5 = major declutter.
    pub difficulty: u8,
    /// The suggested easiest starting point, advisory text only.
    pub quick_win: String,
    pub zones: Vec<Zone>,
}

/// A single small cleaning task within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub title: String,
    pub description: String,
    pub estimated_minutes: u32,
    pub category: TaskCategory,
    pub encouragement: String,
    pub completed: bool,
}

impl Task {
    /// Creates an incomplete task with a freshly assigned stable id.
    ///
    /// `estimated_minutes` is floored at one minute.
    pub fn new(
        title: String,
        description: String,
        estimated_minutes: u32,
        category: TaskCategory,
        encouragement: String,
    ) -> Self {
        Self {
            task_id: short_id("task"),
            title,
            description,
            estimated_minutes: estimated_minutes.max(1),
            category,
            encouragement,
            completed: false,
        }
    }
}

/// A discrete physical item identified in a photo, to be sorted by the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub item_id: String,
    pub name: String,
    pub description: String,
    pub category: ItemCategory,
    pub suggestion: SortDecision,
    pub reason: String,
    /// The user's decision; `None` until the item has been sorted.
    pub decision: Option<SortDecision>,
}

impl Item {
    /// Creates an unsorted item with a freshly assigned stable id.
    pub fn new(
        name: String,
        description: String,
        category: ItemCategory,
        suggestion: SortDecision,
        reason: String,
    ) -> Self {
        Self {
            item_id: short_id("item"),
            name,
            description,
            category,
            suggestion,
            reason,
            decision: None,
        }
    }
}

/// The aggregate root representing one decluttering engagement.
///
/// One document per session; every mutation refreshes `updated_at`. The
/// `completed_tasks`/`total_tasks` counters are derived from `tasks` by
/// [`task_progress`] after every task mutation and never drift.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub name: String,
    pub status: SessionStatus,
    pub analysis: Option<SpaceAnalysis>,
    pub tasks: Vec<Task>,
    pub items: Vec<Item>,
    pub completed_tasks: usize,
    pub total_tasks: usize,
    /// Monotonically non-decreasing. Incremented whenever a completion
    /// request asks for `completed=true`, including repeat requests against
    /// an already-complete task; never decremented on un-complete.
    pub streak: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Creates an empty session in the `created` state.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: SessionId::new(),
            name: name.into(),
            status: SessionStatus::Created,
            analysis: None,
            tasks: Vec::new(),
            items: Vec::new(),
            completed_tasks: 0,
            total_tasks: 0,
            streak: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Attaches a successful space analysis.
    ///
    /// Moves the session to `analyzed` unless tasks already exist; the status
    /// never moves backwards once the session is in its active phase.
    pub fn attach_analysis(&mut self, analysis: SpaceAnalysis) {
        self.analysis = Some(analysis);
        if self.tasks.is_empty() {
            self.status = SessionStatus::Analyzed;
        }
        self.touch();
    }

    /// Replaces the task list wholesale and enters the active phase.
    ///
    /// This is a destructive regenerate: any previous tasks and their
    /// completion state are discarded, counters reset, and the session is
    /// forced to `in_progress` even when zero tasks were generated. Requires
    /// an analysis to be present.
    pub fn replace_tasks(&mut self, tasks: Vec<Task>) -> Result<(), NudgeError> {
        if self.analysis.is_none() {
            return Err(NudgeError::InvalidRequest(
                "space must be analyzed before tasks can be generated".to_string(),
            ));
        }
        self.tasks = tasks;
        self.recompute_progress();
        self.touch();
        Ok(())
    }

    /// Sets the completion flag of one task and recomputes derived state.
    ///
    /// Idempotent for the flag itself, but the streak counts the *requested*
    /// value: asking for `completed=true` bumps it even when the task was
    /// already complete.
    pub fn set_task_completion(
        &mut self,
        task_id: &str,
        completed: bool,
    ) -> Result<(), NudgeError> {
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.task_id == task_id)
            .ok_or_else(|| NudgeError::TaskNotFound(task_id.to_string()))?;
        task.completed = completed;
        if completed {
            self.streak += 1;
        }
        self.recompute_progress();
        self.touch();
        Ok(())
    }

    /// Replaces the item list wholesale. Items are a side-track: this never
    /// touches the session status or the task counters.
    pub fn replace_items(&mut self, items: Vec<Item>) {
        self.items = items;
        self.touch();
    }

    /// Records the user's keep/sell/donate decision for one item.
    pub fn set_item_decision(
        &mut self,
        item_id: &str,
        decision: SortDecision,
    ) -> Result<(), NudgeError> {
        let item = self
            .items
            .iter_mut()
            .find(|i| i.item_id == item_id)
            .ok_or_else(|| NudgeError::ItemNotFound(item_id.to_string()))?;
        item.decision = Some(decision);
        self.touch();
        Ok(())
    }

    /// Recomputes `completed_tasks`, `total_tasks`, and `status` from the
    /// task list. Called after every task mutation.
    fn recompute_progress(&mut self) {
        let (completed, total) = task_progress(&self.tasks);
        self.completed_tasks = completed;
        self.total_tasks = total;
        self.status = if total > 0 && completed == total {
            SessionStatus::Completed
        } else {
            SessionStatus::InProgress
        };
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Derived progress counters: `(completed, total)` over a task list.
pub fn task_progress(tasks: &[Task]) -> (usize, usize) {
    (tasks.iter().filter(|t| t.completed).count(), tasks.len())
}

/// A short stable identifier with a type prefix, e.g. `task-9f3a21c0`.
fn short_id(prefix: &str) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", &hex[..8])
}
