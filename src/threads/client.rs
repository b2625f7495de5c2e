use crate::types::{PosterError, PosterResult, Profile};
use reqwest::{Client, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

pub const THREADS_API_BASE: &str = "https://graph.threads.net/v1.0";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Threads Graph API client for image posts.
pub struct ThreadsClient {
    client: Client,
    access_token: String,
    base_url: String,
}

impl ThreadsClient {
    pub fn new(access_token: &str) -> Self {
        Self::with_base_url(access_token, THREADS_API_BASE)
    }

    pub fn with_base_url(access_token: &str, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            access_token: access_token.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create an unpublished image container and return its id.
    pub async fn create_media_container(
        &self,
        user_id: &str,
        image_url: &str,
        caption: &str,
    ) -> PosterResult<String> {
        let url = format!("{}/{}/threads", self.base_url, user_id);
        let form = [
            ("media_type", "IMAGE"),
            ("image_url", image_url),
            ("text", caption),
            ("access_token", self.access_token.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .form(&form)
            .send()
            .await
            .map_err(transport_error)?;

        let data = handle_response(response).await?;
        let container_id = string_field(&data, "id").ok_or_else(|| {
            PosterError::Publishing(
                "Threads API response did not include a container ID".to_string(),
            )
        })?;

        debug!(container_id = %container_id, "Created media container");
        Ok(container_id)
    }

    /// Publish a container and return the resulting thread id.
    pub async fn publish_container(&self, user_id: &str, container_id: &str) -> PosterResult<String> {
        let url = format!("{}/{}/threads_publish", self.base_url, user_id);
        let form = [
            ("creation_id", container_id),
            ("access_token", self.access_token.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .form(&form)
            .send()
            .await
            .map_err(transport_error)?;

        let data = handle_response(response).await?;
        let thread_id = string_field(&data, "id").ok_or_else(|| {
            PosterError::Publishing("Threads API response did not include a thread ID".to_string())
        })?;

        debug!(container_id, thread_id = %thread_id, "Published container");
        Ok(thread_id)
    }

    /// Processing status of a container, if the API reports one.
    pub async fn check_container_status(&self, container_id: &str) -> PosterResult<Option<String>> {
        let url = format!("{}/{}", self.base_url, container_id);
        let data = self.get(&url, "status").await?;
        let status = string_field(&data, "status");
        debug!(container_id, status = ?status, "Container status");
        Ok(status)
    }

    /// Display name and handle of the posting account.
    pub async fn get_profile_details(&self, user_id: &str) -> PosterResult<Profile> {
        let url = format!("{}/{}", self.base_url, user_id);
        let data = self.get(&url, "id,username,name").await?;
        let profile: Profile = serde_json::from_value(data).map_err(|e| {
            PosterError::Publishing(format!("Unexpected Threads profile payload: {}", e))
        })?;
        debug!(user_id, username = ?profile.username, "Fetched Threads profile details");
        Ok(profile)
    }

    async fn get(&self, url: &str, fields: &str) -> PosterResult<Value> {
        let response = self
            .client
            .get(url)
            .timeout(REQUEST_TIMEOUT)
            .query(&[("fields", fields), ("access_token", self.access_token.as_str())])
            .send()
            .await
            .map_err(transport_error)?;
        handle_response(response).await
    }
}

/// Parse the JSON body, then map an error status to a publishing error.
async fn handle_response(response: Response) -> PosterResult<Value> {
    let status = response.status();
    let text = response.text().await.map_err(transport_error)?;

    let data: Value = serde_json::from_str(&text).map_err(|_| {
        PosterError::Publishing("Failed to parse Threads API response as JSON".to_string())
    })?;

    if status.as_u16() >= 400 {
        let message = data
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or(text);
        return Err(PosterError::Publishing(format!(
            "Threads API error ({}): {}",
            status.as_u16(),
            message
        )));
    }

    Ok(data)
}

/// A non-empty string field. Numeric ids are accepted and stringified.
fn string_field(data: &Value, name: &str) -> Option<String> {
    match data.get(name)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn transport_error(e: reqwest::Error) -> PosterError {
    PosterError::Publishing(format!("Threads API request failed: {}", e))
}
