use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::session::{ItemCategory, SortDecision, SpaceAnalysis, TaskCategory};

mod openai;
pub mod prompts;

pub use openai::OpenAiVision;

/// Error types that can occur when calling the vision provider.
#[derive(Debug, Error)]
pub enum VisionError {
    /// The provider rejected the request or returned a non-success status.
    #[error("vision provider error: {0}")]
    Provider(String),

    /// Transport-level failure talking to the provider.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The call exceeded the configured deadline.
    #[error("vision request timed out after {0}s")]
    Timeout(u64),

    /// The provider answered, but the payload was not the expected structure
    /// even after stripping markdown fences.
    #[error("response format error: {message}. raw response: '{raw_response}'")]
    ResponseFormat {
        message: String,
        raw_response: String,
    },

    /// The request could not be constructed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// The external vision/language capability consumed by the core.
///
/// Treated as a black box: it either returns the structured data below or
/// fails. Callers never retry and never partially apply a failed result.
#[async_trait]
pub trait VisionProvider: Send + Sync + 'static {
    /// Analyzes a photo of the space and proposes where to start.
    async fn analyze_space(&self, image: &[u8]) -> Result<SpaceAnalysis, VisionError>;

    /// Turns an analysis into a short list of small, manageable tasks.
    async fn generate_tasks(&self, analysis: &SpaceAnalysis)
        -> Result<Vec<TaskDraft>, VisionError>;

    /// Identifies discrete physical items in a photo for keep/sell/donate
    /// sorting.
    async fn identify_items(&self, image: &[u8]) -> Result<Vec<ItemDraft>, VisionError>;
}

/// A task as proposed by the model, before an id is assigned.
///
/// Fields the model omits fall back to per-field defaults; a payload that
/// fails to parse as a whole is a hard error, never defaulted.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskDraft {
    #[serde(default = "default_task_title")]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_estimated_minutes")]
    pub estimated_minutes: u32,
    #[serde(default)]
    pub category: TaskCategory,
    #[serde(default = "default_encouragement")]
    pub encouragement: String,
}

/// An item as proposed by the model, before an id is assigned.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemDraft {
    #[serde(default = "default_item_name")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: ItemCategory,
    #[serde(default)]
    pub suggestion: SortDecision,
    #[serde(default)]
    pub reason: String,
}

fn default_task_title() -> String {
    "Task".to_string()
}

fn default_estimated_minutes() -> u32 {
    5
}

fn default_encouragement() -> String {
    "You're doing amazing!".to_string()
}

fn default_item_name() -> String {
    "Item".to_string()
}

/// Strips a markdown code fence (```json ... ``` or ``` ... ```) wrapping the
/// model output, if present.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut cleaned = raw.trim();
    if let Some(rest) = cleaned.strip_prefix("```json") {
        cleaned = rest;
    } else if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest;
    }
    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest;
    }
    cleaned.trim()
}

/// Parses a model response after fence stripping. Malformed output is a hard
/// failure carrying the raw payload for diagnosis.
pub(crate) fn parse_response<T: DeserializeOwned>(raw: &str) -> Result<T, VisionError> {
    let cleaned = strip_code_fences(raw);
    serde_json::from_str(cleaned).map_err(|e| VisionError::ResponseFormat {
        message: e.to_string(),
        raw_response: raw.to_string(),
    })
}
