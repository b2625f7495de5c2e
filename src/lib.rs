// Threads Poster - posts a random image from OCI Object Storage to Threads

pub mod config;
pub mod types;
pub mod llm;
pub mod storage;
pub mod threads;   // Threads Graph API publishing
pub mod notify;    // Telegram run reports
pub mod poster;
pub mod utils;

// Re-exports for convenience
pub use config::Settings;
pub use poster::{Poster, RunReport, RunState};
pub use types::{ObjectRef, PosterError, PosterResult, PreauthenticatedLink, Profile};
