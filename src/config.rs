use crate::llm::CaptionConfig;
use crate::types::{PosterError, PosterResult};
use std::env;
use std::path::{Path, PathBuf};

pub const DEFAULT_MEDIA_WAIT_SECONDS: i64 = 30;
pub const DEFAULT_PRESIGN_EXPIRATION_SECONDS: i64 = 900;
pub const DEFAULT_CLAUDE_MODEL: &str = "claude-sonnet-4-5-20250929";
pub const DEFAULT_CLAUDE_MAX_TOKENS: u32 = 120;
pub const DEFAULT_CAPTION_FALLBACK: &str = "Sharing today's inspiration ✨";

const TRUTHY: [&str; 4] = ["1", "true", "yes", "on"];
const FALSY: [&str; 4] = ["0", "false", "no", "off"];

/// Immutable run settings, built once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub threads: ThreadsSettings,
    pub storage: StorageSettings,
    pub caption: CaptionSettings,
    pub telegram: TelegramSettings,
}

#[derive(Debug, Clone)]
pub struct ThreadsSettings {
    pub access_token: String,
    pub user_id: String,
    pub media_wait_seconds: i64,
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub bucket: String,
    pub object_prefix: Option<String>,
    pub presign_expiration_seconds: i64,
    pub namespace: String,
    pub region: Option<String>,
    pub profile: Option<String>,
    pub config_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct CaptionSettings {
    pub enabled: bool,
    pub anthropic_api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub fallback: String,
}

#[derive(Debug, Clone, Default)]
pub struct TelegramSettings {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
}

impl TelegramSettings {
    /// Reads the Telegram credentials alone, for reporting failures that
    /// happen before the full settings exist.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            bot_token: optional(&lookup, "TELEGRAM_BOT_TOKEN"),
            chat_id: optional(&lookup, "TELEGRAM_CHAT_ID"),
        }
    }
}

impl Settings {
    /// Load settings from the process environment.
    ///
    /// Call [`load_env_file`] first to merge a `.env` file.
    pub fn from_env() -> PosterResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> PosterResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let media_wait_seconds =
            parse_number(&lookup, "THREADS_MEDIA_WAIT_SECONDS", DEFAULT_MEDIA_WAIT_SECONDS)?;
        let presign_expiration_seconds = parse_number(
            &lookup,
            "THREADS_PRESIGN_EXPIRATION_SECONDS",
            DEFAULT_PRESIGN_EXPIRATION_SECONDS,
        )?;
        let max_tokens =
            parse_number(&lookup, "THREADS_CLAUDE_MAX_TOKENS", DEFAULT_CLAUDE_MAX_TOKENS)?;
        let fallback = lookup("THREADS_CAPTION_FALLBACK")
            .unwrap_or_else(|| DEFAULT_CAPTION_FALLBACK.to_string());
        let enabled = parse_bool(&lookup, "THREADS_ENABLE_CAPTIONING", true)?;

        let anthropic_api_key = lookup("ANTHROPIC_API_KEY")
            .map(|k| k.trim().to_string())
            .unwrap_or_default();
        if enabled && anthropic_api_key.is_empty() {
            return Err(PosterError::Configuration(
                "ANTHROPIC_API_KEY must be set when THREADS_ENABLE_CAPTIONING is true".to_string(),
            ));
        }

        let bucket = required(&lookup, "THREADS_BUCKET")?;

        Ok(Self {
            threads: ThreadsSettings {
                access_token: required(&lookup, "THREADS_ACCESS_TOKEN")?,
                user_id: required(&lookup, "THREADS_USER_ID")?,
                media_wait_seconds,
            },
            storage: StorageSettings {
                bucket,
                object_prefix: optional(&lookup, "THREADS_PREFIX"),
                presign_expiration_seconds,
                namespace: required(&lookup, "OCI_NAMESPACE")?,
                region: optional(&lookup, "OCI_REGION"),
                profile: optional(&lookup, "OCI_PROFILE"),
                config_file: optional(&lookup, "OCI_CONFIG_FILE").map(PathBuf::from),
            },
            caption: CaptionSettings {
                enabled,
                anthropic_api_key,
                model: lookup("THREADS_CLAUDE_MODEL")
                    .unwrap_or_else(|| DEFAULT_CLAUDE_MODEL.to_string()),
                max_tokens,
                fallback,
            },
            telegram: TelegramSettings::from_lookup(&lookup),
        })
    }

    /// The narrow view the caption generator needs.
    pub fn caption_config(&self) -> CaptionConfig {
        CaptionConfig {
            api_key: self.caption.anthropic_api_key.clone(),
            model: self.caption.model.clone(),
            max_tokens: self.caption.max_tokens,
            fallback: self.caption.fallback.clone(),
        }
    }
}

/// Merge a dotenv file into the process environment.
///
/// With no explicit path the nearest `.env` is used if one exists. An
/// explicit path that cannot be read is a configuration error.
pub fn load_env_file(path: Option<&Path>) -> PosterResult<()> {
    match path {
        Some(path) => dotenvy::from_path(path).map_err(|e| {
            PosterError::Configuration(format!(
                "Failed to load env file {}: {}",
                path.display(),
                e
            ))
        }),
        None => {
            dotenvy::dotenv().ok();
            Ok(())
        }
    }
}

fn required<F>(lookup: &F, name: &str) -> PosterResult<String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(PosterError::Configuration(format!(
            "Missing required environment variable: {}",
            name
        ))),
    }
}

fn optional<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).filter(|v| !v.is_empty())
}

fn parse_number<F, T>(lookup: &F, name: &str, default: T) -> PosterResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e| {
            PosterError::Configuration(format!("Invalid value for {}: {:?} ({})", name, raw, e))
        }),
    }
}

fn parse_bool<F>(lookup: &F, name: &str, default: bool) -> PosterResult<bool>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Ok(default);
    };
    let value = raw.trim().to_lowercase();
    if TRUTHY.contains(&value.as_str()) {
        Ok(true)
    } else if FALSY.contains(&value.as_str()) {
        Ok(false)
    } else {
        Err(PosterError::Configuration(format!(
            "Invalid boolean value for {}: {}",
            name, value
        )))
    }
}
