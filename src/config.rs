use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_MODEL: &str = "Qwen/Qwen2.5-72B-Instruct";
pub const DEFAULT_BASE_URL: &str = "https://router.huggingface.co/v1/chat/completions";
pub const DEFAULT_FIRST_CHUNK_TIMEOUT_SECS: u64 = 180;
pub const DEFAULT_MAX_TOKENS: u64 = 4000;
pub const DEFAULT_EXAMPLES_DIR: &str = "example_reports";

/// Everything the pipeline needs, resolved once at startup and passed in
/// explicitly. No process-global state.
#[derive(Clone)]
pub struct Config {
    /// Model identifier sent to the chat-completions endpoint.
    pub model: String,
    /// Bearer token for the endpoint. Empty means unauthenticated.
    pub api_key: String,
    /// Chat-completions URL.
    pub base_url: String,
    /// Budget for the first streamed chunk to arrive.
    pub first_chunk_timeout: Duration,
    /// Token cap for the report generation.
    pub max_tokens: u64,
    /// Directory of previous reports sampled for one-shot and few-shot.
    pub examples_dir: PathBuf,
}

/// Optional on-disk overrides, read from `trackside.toml` when present.
/// Environment variables win over the file; defaults fill the rest.
#[derive(Default, Deserialize)]
struct ConfigFile {
    model: Option<String>,
    base_url: Option<String>,
    first_chunk_timeout_secs: Option<u64>,
    max_tokens: Option<u64>,
    examples_dir: Option<String>,
}

impl Config {
    pub fn load() -> Self {
        let file = match std::fs::read_to_string("trackside.toml") {
            Ok(raw) => match toml::from_str::<ConfigFile>(&raw) {
                Ok(file) => file,
                Err(e) => {
                    tracing::warn!("ignoring malformed trackside.toml: {e}");
                    ConfigFile::default()
                }
            },
            Err(_) => ConfigFile::default(),
        };

        let api_key = env::var("HUGGINGFACE_TOKEN").unwrap_or_default();
        if api_key.is_empty() {
            tracing::warn!("HUGGINGFACE_TOKEN not set — requests will be unauthenticated");
        }

        let timeout_secs = env::var("TRACKSIDE_FIRST_CHUNK_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .or(file.first_chunk_timeout_secs)
            .unwrap_or(DEFAULT_FIRST_CHUNK_TIMEOUT_SECS);

        let max_tokens = env::var("TRACKSIDE_MAX_TOKENS")
            .ok()
            .and_then(|v| v.parse().ok())
            .or(file.max_tokens)
            .unwrap_or(DEFAULT_MAX_TOKENS);

        Config {
            model: env::var("TRACKSIDE_MODEL")
                .ok()
                .or(file.model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key,
            base_url: env::var("TRACKSIDE_BASE_URL")
                .ok()
                .or(file.base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            first_chunk_timeout: Duration::from_secs(timeout_secs),
            max_tokens,
            examples_dir: env::var("TRACKSIDE_EXAMPLES_DIR")
                .ok()
                .or(file.examples_dir)
                .unwrap_or_else(|| DEFAULT_EXAMPLES_DIR.to_string())
                .into(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("first_chunk_timeout", &self.first_chunk_timeout)
            .field("max_tokens", &self.max_tokens)
            .field("examples_dir", &self.examples_dir)
            .finish()
    }
}
