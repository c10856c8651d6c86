use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// DEFAULT CLIENT CONSTANTS - Single source of truth for client defaults
// ============================================================================

/// Default backend base URL
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

/// Default timeout for a single backend request
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Quiescence window before a bias-words edit is persisted
pub const DEFAULT_BIAS_WORDS_DEBOUNCE_MS: u64 = 500;

/// Number of backend requests kept in the in-memory request log
pub const DEFAULT_REQUEST_LOG_CAPACITY: usize = 50;

/// Environment variable overriding the backend URL
pub const BACKEND_URL_ENV: &str = "CHAPTER_CLIENT_BACKEND_URL";

// ============================================================================
// DEFAULT ASR OPTIONS
// ============================================================================

/// Default trim setting for extracted chapter segments
pub const DEFAULT_TRIM: bool = true;

/// Default bias-words toggle
pub const DEFAULT_USE_BIAS_WORDS: bool = false;

/// Bias words used whenever the stored value is empty or explicitly reset.
pub const DEFAULT_BIAS_WORDS: &str = "Chapter
Prologue
Epilogue
Introduction
Preface
Foreword
Afterword
Interlude
Part
Book
Appendix
Acknowledgments
One, Two, Three, Four, Five, Six, Seven, Eight, Nine, Ten
Eleven, Twelve, Thirteen, Fourteen, Fifteen, Sixteen, Seventeen, Eighteen, Nineteen, Twenty
Thirty, Forty, Fifty, Sixty, Seventy, Eighty, Ninety, Hundred";

// ============================================================================

/// Errors raised while reading a config file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Client configuration (stored in config.json)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the chapter pipeline backend
    pub backend_url: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Debounce window for bias-words persistence, in milliseconds
    pub bias_words_debounce_ms: u64,
    /// How many backend requests the request log keeps
    pub request_log_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            bias_words_debounce_ms: DEFAULT_BIAS_WORDS_DEBOUNCE_MS,
            request_log_capacity: DEFAULT_REQUEST_LOG_CAPACITY,
        }
    }
}

impl ClientConfig {
    /// ~/.config/chapter-client/config.json
    pub fn default_path() -> PathBuf {
        let mut p = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        p.push("chapter-client");
        p.push("config.json");
        p
    }

    /// Load from a JSON file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Load from a JSON file, falling back to defaults if it is missing or invalid.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("Config: {} not found, using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                log::warn!("Config: {} ignored ({}), using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    /// Apply environment overrides on top of the loaded values.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(BACKEND_URL_ENV) {
            let trimmed = url.trim();
            if !trimmed.is_empty() {
                self.backend_url = trimmed.trim_end_matches('/').to_string();
            }
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        if self.request_timeout_secs == 0 {
            return Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS);
        }
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn bias_words_debounce(&self) -> Duration {
        Duration::from_millis(self.bias_words_debounce_ms)
    }
}
