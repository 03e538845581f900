use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use super::{parse_response, prompts, ItemDraft, TaskDraft, VisionError, VisionProvider};
use crate::session::SpaceAnalysis;

const DEFAULT_TIMEOUT_SECONDS: u64 = 120;

/// Vision provider backed by an OpenAI-compatible chat-completions endpoint.
///
/// Images are attached as base64 data URLs; each call carries a per-request
/// deadline and surfaces a timeout instead of hanging.
pub struct OpenAiVision {
    api_key: String,
    base_url: Url,
    model: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl OpenAiVision {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: Self::default_base_url(),
            model: model.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = normalize_base_url(base_url);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn default_base_url() -> Url {
        Url::parse("https://api.openai.com/v1/").unwrap()
    }

    /// Sends one chat-completions round trip and returns the assistant text.
    async fn send_chat(&self, body: Value) -> Result<String, VisionError> {
        let url = self
            .base_url
            .join("chat/completions")
            .map_err(|e| VisionError::InvalidRequest(e.to_string()))?;

        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    VisionError::Timeout(self.timeout.as_secs())
                } else {
                    VisionError::Http(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(VisionError::Provider(format!(
                "upstream returned {status}: {text}"
            )));
        }

        let completion: ChatCompletion = resp
            .json()
            .await
            .map_err(|e| VisionError::Http(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| VisionError::ResponseFormat {
                message: "completion contained no assistant content".to_string(),
                raw_response: String::new(),
            })
    }

    fn image_part(image: &[u8]) -> Value {
        json!({
            "type": "image_url",
            "image_url": { "url": format!("data:image/jpeg;base64,{}", BASE64.encode(image)) }
        })
    }
}

#[async_trait]
impl VisionProvider for OpenAiVision {
    async fn analyze_space(&self, image: &[u8]) -> Result<SpaceAnalysis, VisionError> {
        debug!(model = %self.model, image_bytes = image.len(), "analyzing space");
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": prompts::ANALYZE_SYSTEM },
                { "role": "user", "content": [
                    { "type": "text", "text": prompts::ANALYZE_USER },
                    Self::image_part(image),
                ]},
            ],
        });
        let raw = self.send_chat(body).await?;
        parse_response(&raw)
    }

    async fn generate_tasks(
        &self,
        analysis: &SpaceAnalysis,
    ) -> Result<Vec<TaskDraft>, VisionError> {
        debug!(model = %self.model, "generating tasks");
        let analysis_json = serde_json::to_string(analysis)
            .map_err(|e| VisionError::InvalidRequest(e.to_string()))?;
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": prompts::TASKS_SYSTEM },
                { "role": "user", "content": prompts::tasks_user(&analysis_json) },
            ],
        });
        let raw = self.send_chat(body).await?;
        parse_response(&raw)
    }

    async fn identify_items(&self, image: &[u8]) -> Result<Vec<ItemDraft>, VisionError> {
        debug!(model = %self.model, image_bytes = image.len(), "identifying items");
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": prompts::ITEMS_SYSTEM },
                { "role": "user", "content": [
                    { "type": "text", "text": prompts::ITEMS_USER },
                    Self::image_part(image),
                ]},
            ],
        });
        let raw = self.send_chat(body).await?;
        parse_response(&raw)
    }
}

fn normalize_base_url(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let p = url.path().to_string();
        url.set_path(&(p + "/"));
    }
    url
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_trailing_slash() {
        let url = normalize_base_url(Url::parse("http://localhost:9000/v1").unwrap());
        assert_eq!(url.as_str(), "http://localhost:9000/v1/");
        assert_eq!(
            url.join("chat/completions").unwrap().as_str(),
            "http://localhost:9000/v1/chat/completions"
        );
    }

    #[test]
    fn image_part_is_a_data_url() {
        let part = OpenAiVision::image_part(b"img");
        let url = part["image_url"]["url"].as_str().unwrap();
        assert!(url.starts_with("data:image/jpeg;base64,"));
        assert!(url.ends_with(&BASE64.encode(b"img")));
    }
}
