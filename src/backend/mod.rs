//! Backend abstraction for the chapter pipeline API.
//!
//! The session only talks to the pipeline through the [`Backend`] trait, so
//! the transport can be swapped (HTTP in production, in-memory in tests).

mod http;

pub use http::HttpBackend;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

/// Errors that can occur while talking to the backend
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout: backend took too long to respond")]
    Timeout,
}

/// A language offered by an ASR variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AsrLanguage {
    pub code: String,
    pub english_name: String,
    pub native_name: Option<String>,
}

impl AsrLanguage {
    pub fn new(code: &str, english_name: &str, native_name: Option<&str>) -> Self {
        Self {
            code: code.to_string(),
            english_name: english_name.to_string(),
            native_name: native_name.map(str::to_string),
        }
    }
}

impl<'de> Deserialize<'de> for AsrLanguage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Languages arrive either as `[code, english, native]` or as an object.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum TupleOrObject {
            Tuple(String, String, Option<String>),
            Pair(String, String),
            Object {
                code: String,
                #[serde(alias = "name")]
                english_name: String,
                #[serde(default)]
                native_name: Option<String>,
            },
        }

        let (code, english_name, native_name) = match TupleOrObject::deserialize(deserializer)? {
            TupleOrObject::Tuple(code, english, native) => (code, english, native),
            TupleOrObject::Pair(code, english) => (code, english, None),
            TupleOrObject::Object {
                code,
                english_name,
                native_name,
            } => (code, english_name, native_name),
        };

        Ok(Self {
            code,
            english_name,
            native_name: native_name.filter(|n| !n.trim().is_empty()),
        })
    }
}

/// A model configuration offered by an ASR service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsrVariant {
    pub model_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// The first entry is the variant's default language.
    #[serde(default)]
    pub languages: Vec<AsrLanguage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsrService {
    pub service_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub uses_gpu: bool,
    #[serde(default)]
    pub supports_bias_words: bool,
    #[serde(default)]
    pub variants: Vec<AsrVariant>,
}

impl AsrService {
    pub fn variant(&self, model_id: &str) -> Option<&AsrVariant> {
        self.variants.iter().find(|v| v.model_id == model_id)
    }
}

/// The persisted (service, variant, language) selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsrPreferences {
    pub service_id: String,
    pub variant_id: String,
    pub language_code: String,
}

impl AsrPreferences {
    pub fn new(service_id: &str, variant_id: &str, language_code: &str) -> Self {
        Self {
            service_id: service_id.to_string(),
            variant_id: variant_id.to_string(),
            language_code: language_code.to_string(),
        }
    }
}

/// Response of `get_asr_preferences`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferencesSnapshot {
    pub available_services: Vec<AsrService>,
    pub current_service: Option<String>,
    pub current_variant: Option<String>,
    pub current_language: Option<String>,
    pub book_language: Option<String>,
}

impl PreferencesSnapshot {
    pub fn preferences(&self) -> AsrPreferences {
        AsrPreferences {
            service_id: self.current_service.clone().unwrap_or_default(),
            variant_id: self.current_variant.clone().unwrap_or_default(),
            language_code: self.current_language.clone().unwrap_or_default(),
        }
    }
}

/// Transcription-stage options, persisted separately from the preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AsrOptions {
    pub trim: bool,
    pub use_bias_words: bool,
    pub bias_words: String,
}

impl Default for AsrOptions {
    fn default() -> Self {
        Self {
            trim: crate::settings::DEFAULT_TRIM,
            use_bias_words: crate::settings::DEFAULT_USE_BIAS_WORDS,
            bias_words: crate::settings::DEFAULT_BIAS_WORDS.to_string(),
        }
    }
}

impl AsrOptions {
    /// Substitute the default bias words when the stored value is empty.
    pub fn normalized(mut self) -> Self {
        if self.bias_words.trim().is_empty() {
            self.bias_words = crate::settings::DEFAULT_BIAS_WORDS.to_string();
        }
        self
    }
}

/// How the pipeline should continue once the ASR stage is configured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AsrMode {
    Transcribe,
    Skip,
}

/// What the backend did in response to a cancel request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The in-progress session was deleted outright.
    Deleted,
    Other(String),
}

impl CancelOutcome {
    pub fn from_action(action: &str) -> Self {
        match action {
            "deleted" => CancelOutcome::Deleted,
            other => CancelOutcome::Other(other.to_string()),
        }
    }
}

/// Operations the chapter pipeline backend exposes to this client
#[async_trait]
pub trait Backend: Send + Sync {
    async fn get_asr_preferences(&self) -> Result<PreferencesSnapshot, BackendError>;

    /// Persist a preference triple. Any error means nothing changed server-side.
    async fn set_asr_preferences(&self, preferences: &AsrPreferences) -> Result<(), BackendError>;

    async fn get_asr_options(&self) -> Result<AsrOptions, BackendError>;

    async fn update_asr_options(&self, options: &AsrOptions) -> Result<(), BackendError>;

    async fn get_segment_count(&self) -> Result<u64, BackendError>;

    async fn configure_asr(&self, mode: AsrMode) -> Result<(), BackendError>;

    async fn cancel(&self) -> Result<CancelOutcome, BackendError>;

    /// Get the name of this backend
    fn name(&self) -> &'static str;
}
