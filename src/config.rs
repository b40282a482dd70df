//! Runtime configuration loaded from environment variables.
//!
//! - `TEARDOWN_API_KEY` (or `GEMINI_API_KEY`) - API key; without one the engine runs offline
//! - `TEARDOWN_API_URL` - API root (default: Gemini `v1beta/models`)
//! - `TEARDOWN_TEXT_MODEL` / `TEARDOWN_IMAGE_MODEL` - model names
//! - `TEARDOWN_TIMEOUT_SECS` - HTTP timeout (default: 120)
//! - `TEARDOWN_MODE` - `fast` or `full` (default: `full`)
//! - `TEARDOWN_STYLE` / `TEARDOWN_PERSPECTIVE` / `TEARDOWN_DETAIL` - generation hints
//! - `TEARDOWN_DB` - database path (default: platform data directory)

use std::path::PathBuf;
use std::time::Duration;

use crate::ai::{DEFAULT_IMAGE_MODEL, DEFAULT_TEXT_MODEL, DEFAULT_URL};
use crate::models::{GenerationConfig, GenerationMode};

const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Connection settings for the generative AI service.
#[derive(Clone, Debug)]
pub struct AiSettings {
    pub base_url: String,
    pub api_key: String,
    pub text_model: String,
    pub image_model: String,
    pub timeout: Duration,
}

/// Everything the binary needs to build an explorer.
#[derive(Clone, Debug, Default)]
pub struct Settings {
    /// `None` means offline: memory hits still work, generation does not.
    pub ai: Option<AiSettings>,
    pub generation: GenerationConfig,
    /// `None` means the platform default location.
    pub db_path: Option<PathBuf>,
}

impl Settings {
    /// Load settings from environment variables.
    pub fn from_env() -> Self {
        let api_key = env_var("TEARDOWN_API_KEY").or_else(|| env_var("GEMINI_API_KEY"));

        let ai = api_key.map(|api_key| AiSettings {
            base_url: env_var("TEARDOWN_API_URL").unwrap_or_else(|| DEFAULT_URL.to_string()),
            api_key,
            text_model: env_var("TEARDOWN_TEXT_MODEL")
                .unwrap_or_else(|| DEFAULT_TEXT_MODEL.to_string()),
            image_model: env_var("TEARDOWN_IMAGE_MODEL")
                .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
            timeout: Duration::from_secs(
                env_var("TEARDOWN_TIMEOUT_SECS")
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
        });

        let mode = env_var("TEARDOWN_MODE")
            .and_then(|s| match s.parse::<GenerationMode>() {
                Ok(mode) => Some(mode),
                Err(e) => {
                    tracing::warn!("{}, using full mode", e);
                    None
                }
            })
            .unwrap_or_default();

        Self {
            ai,
            generation: GenerationConfig {
                mode,
                style: env_var("TEARDOWN_STYLE"),
                perspective: env_var("TEARDOWN_PERSPECTIVE"),
                detail: env_var("TEARDOWN_DETAIL"),
            },
            db_path: env_var("TEARDOWN_DB").map(PathBuf::from),
        }
    }
}

/// Read a variable, treating an empty value as unset.
fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
