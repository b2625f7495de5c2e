// Object storage layer (OCI Object Storage)

pub mod oci_client;
pub mod oci_config;
pub mod signer;

pub use oci_client::OciStorageClient;
pub use oci_config::OciProfile;
pub use signer::RequestSigner;

use crate::types::{ObjectRef, PosterError, PosterResult, PreauthenticatedLink};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;

/// Bucket operations the poster relies on.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// All `.png` objects (case-insensitive) under `prefix`, in listing order.
    async fn list_png_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
    ) -> PosterResult<Vec<ObjectRef>>;

    /// Issue a read-only public link to `object`, valid for at least one second.
    async fn create_preauthenticated_link(
        &self,
        object: &ObjectRef,
        expires_in_seconds: i64,
    ) -> PosterResult<PreauthenticatedLink>;

    /// Remove the link. A link that is already gone is not an error.
    async fn revoke_preauthenticated_link(&self, link: &PreauthenticatedLink) -> PosterResult<()>;

    async fn delete_object(&self, object: &ObjectRef) -> PosterResult<()>;

    async fn download_object(&self, object: &ObjectRef) -> PosterResult<Vec<u8>>;

    async fn upload_bytes(
        &self,
        object: &ObjectRef,
        data: Vec<u8>,
        content_type: &str,
    ) -> PosterResult<()>;
}

pub fn is_png(name: &str) -> bool {
    name.to_lowercase().ends_with(".png")
}

/// Pick one object uniformly at random.
pub fn choose_random_object(objects: &[ObjectRef]) -> PosterResult<ObjectRef> {
    objects
        .choose(&mut rand::thread_rng())
        .cloned()
        .ok_or_else(|| {
            PosterError::Storage("No PNG files found in the specified OCI bucket".to_string())
        })
}

/// Creation and expiry instants for a link lasting `expires_in_seconds`,
/// clamped to a one second minimum.
///
/// Windows that overflow the representable time range are rejected.
pub fn link_window(expires_in_seconds: i64) -> PosterResult<(DateTime<Utc>, DateTime<Utc>)> {
    let now = Utc::now();
    let expires_at = Duration::try_seconds(expires_in_seconds.max(1))
        .and_then(|window| now.checked_add_signed(window))
        .ok_or_else(|| {
            PosterError::Storage(format!(
                "Link expiration of {} seconds is out of range",
                expires_in_seconds
            ))
        })?;
    Ok((now, expires_at))
}

/// Unique link name derived from its creation time.
pub fn par_name(now: DateTime<Utc>) -> String {
    format!("temp-par-{}", now.format("%Y%m%d%H%M%S%6f"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_png() {
        assert!(is_png("a.png"));
        assert!(is_png("dir/B.PNG"));
        assert!(is_png("x.Png"));
        assert!(!is_png("a.png.txt"));
        assert!(!is_png("png"));
        assert!(!is_png("a.jpg"));
    }

    #[test]
    fn test_choose_from_empty_fails() {
        let err = choose_random_object(&[]).unwrap_err();
        assert!(matches!(err, PosterError::Storage(_)));
        assert!(err.to_string().contains("No PNG files"));
    }

    #[test]
    fn test_choose_returns_member() {
        let objects = vec![
            ObjectRef::new("b", "one.png"),
            ObjectRef::new("b", "two.png"),
            ObjectRef::new("b", "three.png"),
        ];
        for _ in 0..50 {
            let chosen = choose_random_object(&objects).unwrap();
            assert!(objects.contains(&chosen));
        }
    }

    #[test]
    fn test_link_window_clamps_to_one_second() {
        for requested in [-30, 0, 1] {
            let (created, expires) = link_window(requested).unwrap();
            assert_eq!(expires - created, Duration::seconds(1));
        }
        let (created, expires) = link_window(900).unwrap();
        assert!(expires > created);
        assert_eq!(expires - created, Duration::seconds(900));
    }

    #[test]
    fn test_link_window_overflow_is_an_error() {
        for requested in [i64::MAX, i64::MAX / 1000, 10_000_000_000_000] {
            let err = link_window(requested).unwrap_err();
            assert!(matches!(err, PosterError::Storage(_)));
            assert!(err.to_string().contains("out of range"));
        }
    }

    #[test]
    fn test_par_name_format() {
        let now = DateTime::parse_from_rfc3339("2024-05-01T12:34:56.123456Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(par_name(now), "temp-par-20240501123456123456");
    }
}
