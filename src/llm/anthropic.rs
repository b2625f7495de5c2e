// Anthropic Messages API adapter
// API Reference: https://docs.anthropic.com/en/api/messages

use crate::types::{PosterError, PosterResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

pub const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct Message {
    pub role: String,
    pub content: Vec<ContentBlock>,
}

impl Message {
    /// A user turn with a text block followed by a base64 image block.
    pub fn user_with_base64_image(
        text: impl Into<String>,
        data: impl Into<String>,
        media_type: impl Into<String>,
    ) -> Self {
        Self {
            role: "user".to_string(),
            content: vec![
                ContentBlock::Text { text: text.into() },
                ContentBlock::Image {
                    source: ImageSource {
                        source_type: "base64".to_string(),
                        media_type: media_type.into(),
                        data: data.into(),
                    },
                },
            ],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image")]
    Image { source: ImageSource },
}

#[derive(Debug, Serialize)]
pub struct ImageSource {
    #[serde(rename = "type")]
    pub source_type: String,
    pub media_type: String,
    pub data: String,
}

#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub content: Vec<ResponseBlock>,
}

/// Content returned by the model. Only text is of interest here.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ResponseBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

impl MessagesResponse {
    /// Trimmed, non-empty text blocks joined with single spaces.
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ResponseBlock::Text { text } => Some(text.trim()),
                ResponseBlock::Other => None,
            })
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string()
    }
}

#[derive(Deserialize)]
struct AnthropicErrorResponse {
    error: AnthropicError,
}

#[derive(Deserialize)]
struct AnthropicError {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

pub struct AnthropicAdapter {
    client: Client,
    api_key: String,
    base_url: String,
}

impl AnthropicAdapter {
    pub fn new(api_key: &str) -> Self {
        Self::with_base_url(api_key, ANTHROPIC_API_BASE)
    }

    /// Point the adapter at a different host (used by tests).
    pub fn with_base_url(api_key: &str, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn create_message(&self, request: &MessagesRequest) -> PosterResult<MessagesResponse> {
        let url = format!("{}/v1/messages", self.base_url);
        debug!(model = %request.model, "Sending request to Anthropic API");

        let response = self
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Claude API request failed");
                PosterError::Captioning(format!("Claude API call failed: {}", e))
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(status = %status, "Claude API returned an error");

            if let Ok(error_response) = serde_json::from_str::<AnthropicErrorResponse>(&error_text) {
                return Err(PosterError::Captioning(format!(
                    "Claude API call failed ({}): {} ({})",
                    status.as_u16(),
                    error_response.error.message,
                    error_response.error.error_type.as_deref().unwrap_or("unknown"),
                )));
            }

            return Err(PosterError::Captioning(format!(
                "Claude API call failed ({}): {}",
                status.as_u16(),
                error_text
            )));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| PosterError::Captioning(format!("Failed to parse Claude response: {}", e)))?;

        debug!(response_id = %parsed.id, blocks = parsed.content.len(), "Received Claude response");
        Ok(parsed)
    }
}
