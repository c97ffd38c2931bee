//! Assistant configuration.
//!
//! Policy knobs for the pipeline plus secret loading from
//! `~/.config/mentor/secret.json`.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Completion endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Base URL of the completion API (e.g. `https://openrouter.ai/api/v1`).
    pub base_url: String,
    /// Bearer token for the completion API.
    pub api_key: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// Maximum tokens to generate per completion.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Referer identification header value.
    pub referer: String,
    /// Application title header value.
    pub app_title: String,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            api_key: String::new(),
            model: "openai/gpt-4o-mini".to_string(),
            max_tokens: 1024,
            temperature: 0.7,
            referer: "https://mentor-app.example".to_string(),
            app_title: "Mentor".to_string(),
        }
    }
}

/// Per-device sliding-window rate limit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum requests allowed within the window.
    pub max_requests: usize,
    /// Window length in seconds.
    pub window_secs: i64,
    /// Escalating block length in seconds once the window is exhausted.
    pub block_secs: i64,
    /// Whether a storage failure admits the request (availability) or
    /// denies it (enforcement).
    pub fail_open: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window_secs: 60,
            block_secs: 300,
            fail_open: true,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::seconds(self.window_secs)
    }

    pub fn block_duration(&self) -> Duration {
        Duration::seconds(self.block_secs)
    }
}

/// Session lifecycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Inactivity timeout in seconds after which a session expires.
    pub timeout_secs: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 * 60 }
    }
}

impl SessionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::seconds(self.timeout_secs)
    }
}

/// Conversation history configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Maximum messages retained in the conversation log.
    pub capacity: usize,
    /// Number of trailing messages sent as completion context.
    pub context_window: usize,
    /// Trailing debounce before the log is persisted, in milliseconds.
    pub persist_debounce_ms: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: crate::conversation::DEFAULT_CAPACITY,
            context_window: 10,
            persist_debounce_ms: 1000,
        }
    }
}

/// Content policy and request integrity configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Maximum accepted message length in characters.
    pub max_message_chars: usize,
    /// Static application secret mixed into request signatures.
    pub app_secret: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_message_chars: 10_000,
            app_secret: "mentor-integrity-v1".to_string(),
        }
    }
}

/// Root configuration for the assistant pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssistantConfig {
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub security: SecurityConfig,
}

/// Root structure for secret.json
#[derive(Debug, Clone, Deserialize)]
pub struct SecretConfig {
    pub api_key: String,
    #[serde(default)]
    pub model: Option<String>,
}

/// Loads the secret configuration file from ~/.config/mentor/secret.json
pub fn load_secret_config() -> Result<SecretConfig, String> {
    let config_path = get_secret_path()?;

    if !config_path.exists() {
        return Err(format!(
            "Configuration file not found at: {}",
            config_path.display()
        ));
    }

    let content = fs::read_to_string(&config_path).map_err(|e| {
        format!(
            "Failed to read configuration file at {}: {}",
            config_path.display(),
            e
        )
    })?;

    serde_json::from_str(&content).map_err(|e| {
        format!(
            "Failed to parse configuration file at {}: {}",
            config_path.display(),
            e
        )
    })
}

/// Returns the path to the secret file: ~/.config/mentor/secret.json
fn get_secret_path() -> Result<PathBuf, String> {
    let home = dirs::home_dir().ok_or_else(|| "Could not determine home directory".to_string())?;
    Ok(home.join(".config").join("mentor").join("secret.json"))
}
