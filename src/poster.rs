//! Posting pipeline
//!
//! ```text
//! profile (best effort)
//!      │
//!      ▼
//! storage ── list PNGs ── pick one ── issue link
//!      │
//!      ▼
//! caption (optional, non-fatal)
//!      │
//!      ▼
//! create container ── wait ── status (best effort) ── publish
//!      │
//!      ▼
//! delete object (best effort)
//!      │
//!      ▼
//! finish: revoke link, notify, exit code
//! ```
//!
//! Every gated step short-circuits to [`Poster::finish`], which runs on
//! every path once storage has been attempted.

use crate::config::{Settings, StorageSettings};
use crate::llm::CaptionGenerator;
use crate::notify::TelegramNotifier;
use crate::storage::{choose_random_object, ObjectStorage, OciStorageClient};
use crate::threads::ThreadsClient;
use crate::types::{ObjectRef, PosterError, PosterResult, PreauthenticatedLink, Profile};
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const SUCCESS_HEADING: &str = "✅ Threads post published";
pub const FAILURE_HEADING: &str = "❌ Threads poster failed";

/// Everything the pipeline learns while it runs.
#[derive(Debug, Default, Clone)]
pub struct RunState {
    pub selected: Option<ObjectRef>,
    pub link: Option<PreauthenticatedLink>,
    pub caption: Option<String>,
    pub container_id: Option<String>,
    pub thread_id: Option<String>,
    pub last_error: Option<String>,
}

/// Final outcome of one run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub success: bool,
    pub summary: String,
    pub state: RunState,
}

impl RunReport {
    pub fn exit_code(&self) -> i32 {
        if self.success {
            0
        } else {
            1
        }
    }
}

pub struct Poster {
    settings: Settings,
    threads: ThreadsClient,
    captioner: Option<CaptionGenerator>,
    notifier: TelegramNotifier,
}

impl Poster {
    /// A poster talking to the production endpoints.
    pub fn new(settings: Settings, notifier: TelegramNotifier) -> Self {
        let threads = ThreadsClient::new(&settings.threads.access_token);
        let captioner = settings
            .caption
            .enabled
            .then(|| CaptionGenerator::new(settings.caption_config()));
        Self::with_clients(settings, threads, captioner, notifier)
    }

    pub fn with_clients(
        settings: Settings,
        threads: ThreadsClient,
        captioner: Option<CaptionGenerator>,
        notifier: TelegramNotifier,
    ) -> Self {
        Self {
            settings,
            threads,
            captioner,
            notifier,
        }
    }

    /// Run against OCI Object Storage configured from the settings.
    pub async fn run_with_oci(&self) -> RunReport {
        self.run(|settings| {
            OciStorageClient::new(settings).map(|client| Box::new(client) as Box<dyn ObjectStorage>)
        })
        .await
    }

    /// Run the pipeline once. `connect` builds the storage backend.
    pub async fn run<F>(&self, connect: F) -> RunReport
    where
        F: FnOnce(&StorageSettings) -> PosterResult<Box<dyn ObjectStorage>>,
    {
        let account_label = self.account_label().await;
        let mut state = RunState::default();

        let storage = match connect(&self.settings.storage) {
            Ok(storage) => storage,
            Err(e) => {
                error!(kind = e.kind(), error = %e, "Failed to initialize OCI storage client");
                state.last_error = Some(e.to_string());
                return self.finish(None, state, &account_label).await;
            }
        };

        if let Err(e) = self.execute(storage.as_ref(), &mut state).await {
            warn!(kind = e.kind(), "Run stopped early");
            state.last_error = Some(e.to_string());
        }

        self.finish(Some(storage.as_ref()), state, &account_label).await
    }

    async fn account_label(&self) -> String {
        let user_id = &self.settings.threads.user_id;
        let profile = match self.threads.get_profile_details(user_id).await {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!(error = %e, "Failed to fetch Threads profile details");
                None
            }
        };
        Profile::label(profile.as_ref(), user_id)
    }

    async fn execute(&self, storage: &dyn ObjectStorage, state: &mut RunState) -> PosterResult<()> {
        let bucket = &self.settings.storage.bucket;
        let user_id = &self.settings.threads.user_id;
        let expires_in = self.settings.storage.presign_expiration_seconds;

        info!(bucket = %bucket, "Selecting random PNG from bucket");
        let objects = storage
            .list_png_objects(bucket, self.settings.storage.object_prefix.as_deref())
            .await
            .inspect_err(|e| error!(error = %e, "OCI operation failed"))?;
        let selected = choose_random_object(&objects)
            .inspect_err(|e| error!(error = %e, "OCI operation failed"))?;
        info!(key = %selected.key, "Selected object");
        state.selected = Some(selected.clone());

        let link = storage
            .create_preauthenticated_link(&selected, expires_in)
            .await
            .inspect_err(|e| error!(error = %e, "OCI operation failed"))?;
        let image_url = link.url.clone();
        state.link = Some(link);
        info!(expires_in, "Generated pre-authenticated URL");

        let caption = self.caption_for(&selected, &image_url).await;
        state.caption = Some(caption.clone());

        let container_id = self
            .threads
            .create_media_container(user_id, &image_url, &caption)
            .await
            .inspect_err(|e| error!(error = %e, "Failed to create media container"))?;
        info!(container_id = %container_id, "Created media container");
        state.container_id = Some(container_id.clone());

        let wait_seconds = self.settings.threads.media_wait_seconds.max(0) as u64;
        if wait_seconds > 0 {
            info!(wait_seconds, "Waiting for media processing");
            tokio::time::sleep(Duration::from_secs(wait_seconds)).await;
        }

        match self.threads.check_container_status(&container_id).await {
            Ok(Some(status)) => info!(status = %status, "Container status"),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Could not confirm container status"),
        }

        let thread_id = self
            .threads
            .publish_container(user_id, &container_id)
            .await
            .inspect_err(|e| error!(error = %e, "Failed to publish container"))?;
        info!(thread_id = %thread_id, "Published thread");
        state.thread_id = Some(thread_id);

        match storage.delete_object(&selected).await {
            Ok(()) => info!(key = %selected.key, bucket = %bucket, "Deleted object from bucket"),
            Err(e) => warn!(
                uri = %selected.uri(),
                error = %e,
                "Thread posted but failed to delete object"
            ),
        }

        Ok(())
    }

    /// Caption text for the post; any failure degrades to an empty caption.
    async fn caption_for(&self, selected: &ObjectRef, image_url: &str) -> String {
        let Some(captioner) = &self.captioner else {
            info!("Caption generation disabled; posting without caption");
            return String::new();
        };

        match captioner.generate(image_url).await {
            Ok(caption) => {
                info!(key = %selected.key, "Generated caption");
                caption
            }
            Err(e) => {
                error!(error = %e, "Failed to generate caption via Claude");
                info!("Caption generation failed; posting without caption");
                String::new()
            }
        }
    }

    /// The single exit funnel: release the link, report, compute the result.
    async fn finish(
        &self,
        storage: Option<&dyn ObjectStorage>,
        mut state: RunState,
        account_label: &str,
    ) -> RunReport {
        if let Some(link) = state.link.take() {
            if let Some(storage) = storage {
                if let Err(e) = storage.revoke_preauthenticated_link(&link).await {
                    warn!(par_id = %link.id, error = %e, "Failed to revoke pre-authenticated request");
                }
            }
        }

        let success = state.last_error.is_none();
        let summary = compose_summary(success, account_label, &state);
        if self.notifier.is_enabled() {
            self.notifier.send(&summary).await;
        } else {
            debug!("Telegram not configured; skipping run report");
        }

        RunReport {
            success,
            summary,
            state,
        }
    }
}

/// Report a failure that happened before settings could be loaded.
pub async fn report_configuration_error(
    notifier: &TelegramNotifier,
    err: &PosterError,
) -> RunReport {
    error!(kind = err.kind(), error = %err, "Configuration error");
    let summary = [FAILURE_HEADING.to_string(), format!("Error: {}", err)].join("\n");
    notifier.send(&summary).await;

    RunReport {
        success: false,
        summary,
        state: RunState {
            last_error: Some(err.to_string()),
            ..RunState::default()
        },
    }
}

/// Human readable run summary, one fact per line.
pub fn compose_summary(success: bool, account_label: &str, state: &RunState) -> String {
    let heading = if success { SUCCESS_HEADING } else { FAILURE_HEADING };
    let mut lines = vec![
        heading.to_string(),
        format!("Threads Account: {}", account_label),
    ];

    if let Some(selected) = &state.selected {
        lines.push(format!("Object Key: {}", selected.key));
    }
    if let Some(thread_id) = &state.thread_id {
        lines.push(format!("Thread ID: {}", thread_id));
    }
    if let Some(err) = &state.last_error {
        lines.push(format!("Error: {}", err));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_summary() {
        let state = RunState {
            selected: Some(ObjectRef::new("quotes", "a.png")),
            thread_id: Some("999".to_string()),
            ..RunState::default()
        };
        assert_eq!(
            compose_summary(true, "Quote Bot (@quotebot)", &state),
            "✅ Threads post published\nThreads Account: Quote Bot (@quotebot)\nObject Key: a.png\nThread ID: 999"
        );
    }

    #[test]
    fn test_failure_summary() {
        let state = RunState {
            last_error: Some("No PNG files found in the specified OCI bucket".to_string()),
            ..RunState::default()
        };
        let summary = compose_summary(false, "42", &state);
        assert_eq!(
            summary,
            "❌ Threads poster failed\nThreads Account: 42\nError: No PNG files found in the specified OCI bucket"
        );
    }

    #[test]
    fn test_exit_codes() {
        let ok = RunReport {
            success: true,
            summary: String::new(),
            state: RunState::default(),
        };
        let failed = RunReport {
            success: false,
            ..ok.clone()
        };
        assert_eq!(ok.exit_code(), 0);
        assert_eq!(failed.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_configuration_error_report() {
        let notifier = TelegramNotifier::new(&Default::default());
        let err = PosterError::Configuration(
            "Missing required environment variable: THREADS_BUCKET".to_string(),
        );
        let report = report_configuration_error(&notifier, &err).await;
        assert_eq!(report.exit_code(), 1);
        assert_eq!(
            report.summary,
            "❌ Threads poster failed\nError: Missing required environment variable: THREADS_BUCKET"
        );
    }
}
