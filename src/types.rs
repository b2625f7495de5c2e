// Shared value types and the crate error

use chrono::{DateTime, Utc};

/// A stored object, identified by bucket and key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    pub bucket: String,
    pub key: String,
}

impl ObjectRef {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Canonical `oci://bucket/key` form used in log and error text.
    pub fn uri(&self) -> String {
        format!("oci://{}/{}", self.bucket, self.key)
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.uri())
    }
}

/// A time-limited, read-only public link to one object.
///
/// Must be revoked when no longer needed; see `poster::RunState`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreauthenticatedLink {
    pub bucket: String,
    pub id: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Display name / handle pair for the posting account.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
pub struct Profile {
    #[serde(default, alias = "display_name")]
    pub name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl Profile {
    /// Human readable account label, falling back to the raw user id.
    pub fn label(profile: Option<&Profile>, user_id: &str) -> String {
        let name = profile
            .and_then(|p| p.name.as_deref())
            .filter(|s| !s.is_empty());
        let handle = profile
            .and_then(|p| p.username.as_deref())
            .filter(|s| !s.is_empty())
            .map(|u| format!("@{}", u));

        match (name, handle) {
            (Some(name), Some(handle)) => format!("{} ({})", name, handle),
            (Some(name), None) => name.to_string(),
            (None, Some(handle)) => handle,
            (None, None) => user_id.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PosterError {
    #[error("{0}")]
    Configuration(String),

    #[error("{0}")]
    Storage(String),

    #[error("{0}")]
    Captioning(String),

    #[error("{0}")]
    Publishing(String),
}

impl PosterError {
    pub fn kind(&self) -> &'static str {
        match self {
            PosterError::Configuration(_) => "configuration",
            PosterError::Storage(_) => "storage",
            PosterError::Captioning(_) => "captioning",
            PosterError::Publishing(_) => "publishing",
        }
    }
}

pub type PosterResult<T> = std::result::Result<T, PosterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_uri() {
        let obj = ObjectRef::new("quotes", "daily/a.png");
        assert_eq!(obj.uri(), "oci://quotes/daily/a.png");
        assert_eq!(obj.to_string(), "oci://quotes/daily/a.png");
    }

    #[test]
    fn test_profile_label_variants() {
        let full = Profile {
            name: Some("Quote Bot".to_string()),
            username: Some("quotebot".to_string()),
        };
        assert_eq!(Profile::label(Some(&full), "42"), "Quote Bot (@quotebot)");

        let name_only = Profile {
            name: Some("Quote Bot".to_string()),
            username: None,
        };
        assert_eq!(Profile::label(Some(&name_only), "42"), "Quote Bot");

        let handle_only = Profile {
            name: Some(String::new()),
            username: Some("quotebot".to_string()),
        };
        assert_eq!(Profile::label(Some(&handle_only), "42"), "@quotebot");

        assert_eq!(Profile::label(Some(&Profile::default()), "42"), "42");
        assert_eq!(Profile::label(None, "42"), "42");
    }

    #[test]
    fn test_error_display_is_message() {
        let err = PosterError::Storage("bucket gone".to_string());
        assert_eq!(err.to_string(), "bucket gone");
        assert_eq!(err.kind(), "storage");
    }
}
