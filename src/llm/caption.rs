//! Caption Generator
//!
//! Downloads the image behind a public URL and asks a vision model for a
//! one-line caption. Falls back to a configured string when the model
//! answers with no text.

use crate::llm::anthropic::{AnthropicAdapter, Message, MessagesRequest};
use crate::types::{PosterError, PosterResult};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use std::time::Duration;
use tracing::{info, warn};

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);
const ERROR_BODY_LIMIT: usize = 200;
const IMAGE_MEDIA_TYPE: &str = "image/png";

const CAPTION_PROMPT: &str = "You are a social media copywriter for Threads. \
Study the quote shown in the image and craft a single-line caption that resonates with it. \
Keep it under 18 words, use smart rich text (emojis, emphasis) sparingly but effectively, \
and avoid hashtags, quotation marks, or references to the analysis process. \
Respond with caption text only.";

/// Exactly what caption generation needs from the run settings.
#[derive(Debug, Clone)]
pub struct CaptionConfig {
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub fallback: String,
}

pub struct CaptionGenerator {
    http: Client,
    adapter: AnthropicAdapter,
    config: CaptionConfig,
}

impl CaptionGenerator {
    pub fn new(config: CaptionConfig) -> Self {
        let adapter = AnthropicAdapter::new(&config.api_key);
        Self {
            http: Client::new(),
            adapter,
            config,
        }
    }

    pub fn with_adapter(config: CaptionConfig, adapter: AnthropicAdapter) -> Self {
        Self {
            http: Client::new(),
            adapter,
            config,
        }
    }

    /// Caption the image at `image_url`.
    pub async fn generate(&self, image_url: &str) -> PosterResult<String> {
        let image_bytes = self.download_image(image_url).await?;
        let encoded = STANDARD.encode(&image_bytes);

        let request = MessagesRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            messages: vec![Message::user_with_base64_image(
                CAPTION_PROMPT,
                encoded,
                IMAGE_MEDIA_TYPE,
            )],
        };

        let response = self.adapter.create_message(&request).await?;
        let caption = response.joined_text();

        if caption.is_empty() {
            warn!("Claude returned no text content; using fallback caption");
            return Ok(self.config.fallback.clone());
        }

        info!(caption_len = caption.chars().count(), "Caption generated");
        Ok(caption)
    }

    async fn download_image(&self, url: &str) -> PosterResult<Vec<u8>> {
        let response = self
            .http
            .get(url)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                PosterError::Captioning(format!("Failed to download image for captioning: {}", e))
            })?;

        let status = response.status();
        if status.as_u16() >= 400 {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(ERROR_BODY_LIMIT).collect();
            return Err(PosterError::Captioning(format!(
                "Image download failed with status {}: {}",
                status.as_u16(),
                snippet
            )));
        }

        let bytes = response.bytes().await.map_err(|e| {
            PosterError::Captioning(format!("Failed to download image for captioning: {}", e))
        })?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CaptionConfig {
        CaptionConfig {
            api_key: "sk-ant-test".to_string(),
            model: "claude-test".to_string(),
            max_tokens: 120,
            fallback: "Fallback ✨".to_string(),
        }
    }

    fn generator(server: &mockito::ServerGuard) -> CaptionGenerator {
        CaptionGenerator::with_adapter(
            config(),
            AnthropicAdapter::with_base_url("sk-ant-test", &server.url()),
        )
    }

    #[test]
    fn test_prompt_limits() {
        assert!(CAPTION_PROMPT.contains("under 18 words"));
        assert!(CAPTION_PROMPT.contains("avoid hashtags"));
        assert!(CAPTION_PROMPT.ends_with("Respond with caption text only."));
    }

    #[tokio::test]
    async fn test_generate_joins_text_blocks() {
        let mut server = mockito::Server::new_async().await;
        let image = server
            .mock("GET", "/img.png")
            .with_status(200)
            .with_body(b"\x89PNG-bytes".to_vec())
            .create_async()
            .await;
        let claude = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "sk-ant-test")
            .match_header("anthropic-version", "2023-06-01")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"model":"claude-test","max_tokens":120}"#.to_string(),
            ))
            .with_status(200)
            .with_body(r#"{"id":"msg","content":[{"type":"text","text":" Nice "},{"type":"text","text":"view 🌄"}]}"#)
            .create_async()
            .await;

        let caption = generator(&server)
            .generate(&format!("{}/img.png", server.url()))
            .await
            .unwrap();

        assert_eq!(caption, "Nice view 🌄");
        image.assert_async().await;
        claude.assert_async().await;
    }

    #[tokio::test]
    async fn test_download_error_includes_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/missing.png")
            .with_status(404)
            .with_body("x".repeat(500))
            .create_async()
            .await;
        let claude = server
            .mock("POST", "/v1/messages")
            .expect(0)
            .create_async()
            .await;

        let err = generator(&server)
            .generate(&format!("{}/missing.png", server.url()))
            .await
            .unwrap_err();

        assert!(matches!(err, PosterError::Captioning(_)));
        let message = err.to_string();
        assert!(message.contains("404"), "{}", message);
        assert!(message.len() < 300);
        claude.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_response_uses_fallback() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/img.png")
            .with_status(200)
            .with_body("png")
            .create_async()
            .await;
        server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_body(r#"{"id":"msg","content":[{"type":"tool_use","id":"t","name":"n","input":{}}]}"#)
            .create_async()
            .await;

        let caption = generator(&server)
            .generate(&format!("{}/img.png", server.url()))
            .await
            .unwrap();
        assert_eq!(caption, "Fallback ✨");
    }

    #[tokio::test]
    async fn test_model_error_is_captioning_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/img.png")
            .with_status(200)
            .with_body("png")
            .create_async()
            .await;
        server
            .mock("POST", "/v1/messages")
            .with_status(529)
            .with_body(r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#)
            .create_async()
            .await;

        let err = generator(&server)
            .generate(&format!("{}/img.png", server.url()))
            .await
            .unwrap_err();
        assert!(matches!(err, PosterError::Captioning(_)));
        assert!(err.to_string().contains("Overloaded"));
    }
}
