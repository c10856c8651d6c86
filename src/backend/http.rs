//! REST implementation of the chapter pipeline backend.

use super::{
    AsrMode, AsrOptions, AsrPreferences, Backend, BackendError, CancelOutcome, PreferencesSnapshot,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::settings::ClientConfig;

const PREFERENCES_PATH: &str = "/api/asr/preferences";
const OPTIONS_PATH: &str = "/api/asr/options";
const SEGMENT_COUNT_PATH: &str = "/api/session/segment-count";
const CONFIGURE_ASR_PATH: &str = "/api/session/configure-asr";
const CANCEL_PATH: &str = "/api/session/cancel";

#[derive(Deserialize)]
struct OptionsEnvelope {
    #[serde(default)]
    options: AsrOptions,
}

#[derive(Serialize)]
struct OptionsUpdate<'a> {
    options: &'a AsrOptions,
}

#[derive(Deserialize)]
struct SegmentCountResponse {
    #[serde(default)]
    segment_count: u64,
}

#[derive(Serialize)]
struct ConfigureAsrRequest {
    mode: AsrMode,
}

#[derive(Deserialize)]
struct CancelResponse {
    #[serde(default)]
    action: String,
}

/// JSON-over-HTTP backend
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// Create a backend client for the configured base URL and timeout.
    pub fn new(config: &ClientConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self::with_client(client, &config.backend_url))
    }

    /// Create a backend with a custom HTTP client
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, BackendError> {
        let response = request
            .send()
            .await
            .map_err(|e| if e.is_timeout() { BackendError::Timeout } else { BackendError::Network(e) })?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(BackendError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    async fn json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, BackendError> {
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn get_asr_preferences(&self) -> Result<PreferencesSnapshot, BackendError> {
        let response = self.send(self.client.get(self.url(PREFERENCES_PATH))).await?;
        Self::json(response).await
    }

    async fn set_asr_preferences(&self, preferences: &AsrPreferences) -> Result<(), BackendError> {
        self.send(self.client.put(self.url(PREFERENCES_PATH)).json(preferences))
            .await
            .map(|_| ())
    }

    async fn get_asr_options(&self) -> Result<AsrOptions, BackendError> {
        let response = self.send(self.client.get(self.url(OPTIONS_PATH))).await?;
        let envelope: OptionsEnvelope = Self::json(response).await?;
        Ok(envelope.options)
    }

    async fn update_asr_options(&self, options: &AsrOptions) -> Result<(), BackendError> {
        self.send(
            self.client
                .put(self.url(OPTIONS_PATH))
                .json(&OptionsUpdate { options }),
        )
        .await
        .map(|_| ())
    }

    async fn get_segment_count(&self) -> Result<u64, BackendError> {
        let response = self.send(self.client.get(self.url(SEGMENT_COUNT_PATH))).await?;
        let count: SegmentCountResponse = Self::json(response).await?;
        Ok(count.segment_count)
    }

    async fn configure_asr(&self, mode: AsrMode) -> Result<(), BackendError> {
        self.send(
            self.client
                .post(self.url(CONFIGURE_ASR_PATH))
                .json(&ConfigureAsrRequest { mode }),
        )
        .await
        .map(|_| ())
    }

    async fn cancel(&self) -> Result<CancelOutcome, BackendError> {
        let response = self.send(self.client.post(self.url(CANCEL_PATH))).await?;
        let cancel: CancelResponse = Self::json(response).await?;
        Ok(CancelOutcome::from_action(&cancel.action))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
