//! Request logging for backend calls.
//!
//! Every call the session makes to the backend is recorded with:
//! - Request metadata (id, operation, timestamps)
//! - Redacted request payload, where one exists
//! - Outcome and error message, if any
//!
//! Backend failures are logged and swallowed by the session; this store is
//! where a degraded state can be inspected afterwards.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::backend::{
    AsrMode, AsrOptions, AsrPreferences, Backend, BackendError, CancelOutcome, PreferencesSnapshot,
};

/// Hard cap for request logs kept in memory.
const HARD_MAX_LOGS: usize = 1000;

/// Status of a request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Success,
    Error,
}

/// A single backend request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestLog {
    /// Unique ID for this request
    pub id: String,
    /// Backend operation name (e.g. "set_asr_preferences")
    pub operation: String,
    pub started_at: DateTime<Utc>,
    #[serde(rename = "ended_at")]
    pub completed_at: DateTime<Utc>,
    /// Payload sent to the backend, if the operation has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_json: Option<JsonValue>,
    pub status: RequestStatus,
    pub error_message: Option<String>,
    pub duration_ms: u64,
}

/// Bounded in-memory store of recent requests, newest first
#[derive(Clone)]
pub struct RequestLogStore {
    logs: Arc<Mutex<VecDeque<RequestLog>>>,
    max_logs: usize,
}

impl RequestLogStore {
    pub fn new(max_logs: usize) -> Self {
        let max_logs = max_logs.clamp(1, HARD_MAX_LOGS);
        Self {
            logs: Arc::new(Mutex::new(VecDeque::with_capacity(max_logs))),
            max_logs,
        }
    }

    fn push(&self, log: RequestLog) {
        if let Ok(mut logs) = self.logs.lock() {
            logs.push_front(log);
            while logs.len() > self.max_logs {
                logs.pop_back();
            }
        }
    }

    /// All stored logs, newest first
    pub fn get_logs(&self) -> Vec<RequestLog> {
        self.logs
            .lock()
            .map(|logs| logs.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn latest(&self) -> Option<RequestLog> {
        self.logs.lock().ok().and_then(|logs| logs.front().cloned())
    }

    /// Logged requests for one operation, newest first
    pub fn for_operation(&self, operation: &str) -> Vec<RequestLog> {
        self.logs
            .lock()
            .map(|logs| {
                logs.iter()
                    .filter(|l| l.operation == operation)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn failures(&self) -> Vec<RequestLog> {
        self.logs
            .lock()
            .map(|logs| {
                logs.iter()
                    .filter(|l| l.status == RequestStatus::Error)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.logs.lock().map(|logs| logs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut logs) = self.logs.lock() {
            logs.clear();
        }
    }
}

impl Default for RequestLogStore {
    fn default() -> Self {
        Self::new(crate::settings::DEFAULT_REQUEST_LOG_CAPACITY)
    }
}

/// Backend decorator that records every call into a [`RequestLogStore`].
pub struct RecordingBackend<B> {
    inner: B,
    store: RequestLogStore,
}

impl<B: Backend> RecordingBackend<B> {
    pub fn new(inner: B, store: RequestLogStore) -> Self {
        Self { inner, store }
    }

    pub fn store(&self) -> &RequestLogStore {
        &self.store
    }

    async fn record<T, F>(
        &self,
        operation: &str,
        request_json: Option<JsonValue>,
        call: F,
    ) -> Result<T, BackendError>
    where
        F: std::future::Future<Output = Result<T, BackendError>>,
    {
        let started_at = Utc::now();
        let result = call.await;
        let completed_at = Utc::now();

        let (status, error_message) = match &result {
            Ok(_) => (RequestStatus::Success, None),
            Err(e) => (RequestStatus::Error, Some(e.to_string())),
        };

        if let Some(error) = &error_message {
            log::debug!("Backend: {} failed: {}", operation, error);
        }

        self.store.push(RequestLog {
            id: Uuid::new_v4().to_string(),
            operation: operation.to_string(),
            started_at,
            completed_at,
            request_json,
            status,
            error_message,
            duration_ms: (completed_at - started_at).num_milliseconds().max(0) as u64,
        });

        result
    }
}

/// Bias words can be long free text; only their size is logged.
fn redact_options(options: &AsrOptions) -> JsonValue {
    serde_json::json!({
        "trim": options.trim,
        "use_bias_words": options.use_bias_words,
        "bias_words": format!("<{} chars>", options.bias_words.chars().count()),
    })
}

#[async_trait]
impl<B: Backend> Backend for RecordingBackend<B> {
    async fn get_asr_preferences(&self) -> Result<PreferencesSnapshot, BackendError> {
        self.record("get_asr_preferences", None, self.inner.get_asr_preferences())
            .await
    }

    async fn set_asr_preferences(&self, preferences: &AsrPreferences) -> Result<(), BackendError> {
        self.record(
            "set_asr_preferences",
            serde_json::to_value(preferences).ok(),
            self.inner.set_asr_preferences(preferences),
        )
        .await
    }

    async fn get_asr_options(&self) -> Result<AsrOptions, BackendError> {
        self.record("get_asr_options", None, self.inner.get_asr_options())
            .await
    }

    async fn update_asr_options(&self, options: &AsrOptions) -> Result<(), BackendError> {
        self.record(
            "update_asr_options",
            Some(redact_options(options)),
            self.inner.update_asr_options(options),
        )
        .await
    }

    async fn get_segment_count(&self) -> Result<u64, BackendError> {
        self.record("get_segment_count", None, self.inner.get_segment_count())
            .await
    }

    async fn configure_asr(&self, mode: AsrMode) -> Result<(), BackendError> {
        self.record(
            "configure_asr",
            serde_json::to_value(mode).ok(),
            self.inner.configure_asr(mode),
        )
        .await
    }

    async fn cancel(&self) -> Result<CancelOutcome, BackendError> {
        self.record("cancel", None, self.inner.cancel()).await
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::mock_backend::MockBackend;

    #[tokio::test]
    async fn test_records_success_and_failure() {
        let mock = MockBackend::new();
        mock.fail_next_set_preferences();
        let backend = RecordingBackend::new(mock.clone(), RequestLogStore::new(10));

        let prefs = AsrPreferences::new("whisper", "large-v3", "en");
        assert!(backend.set_asr_preferences(&prefs).await.is_err());
        assert!(backend.set_asr_preferences(&prefs).await.is_ok());

        let logs = backend.store().for_operation("set_asr_preferences");
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].status, RequestStatus::Success);
        assert_eq!(logs[1].status, RequestStatus::Error);
        assert!(logs[1].error_message.is_some());
        assert_eq!(
            logs[0].request_json,
            Some(serde_json::json!({
                "service_id": "whisper",
                "variant_id": "large-v3",
                "language_code": "en"
            }))
        );
        assert_eq!(backend.store().failures().len(), 1);
    }

    #[tokio::test]
    async fn test_store_is_bounded() {
        let backend = RecordingBackend::new(MockBackend::new(), RequestLogStore::new(3));
        for _ in 0..5 {
            backend.get_segment_count().await.unwrap();
        }
        assert_eq!(backend.store().len(), 3);
    }

    #[tokio::test]
    async fn test_bias_words_are_redacted() {
        let backend = RecordingBackend::new(MockBackend::new(), RequestLogStore::new(3));
        let options = AsrOptions {
            trim: true,
            use_bias_words: true,
            bias_words: "Prologue".to_string(),
        };
        backend.update_asr_options(&options).await.unwrap();

        let latest = backend.store().latest().unwrap();
        assert_eq!(latest.operation, "update_asr_options");
        assert_eq!(
            latest.request_json.unwrap()["bias_words"],
            serde_json::json!("<8 chars>")
        );
    }

    #[test]
    fn test_clear() {
        let store = RequestLogStore::default();
        assert!(store.is_empty());
        store.clear();
        assert!(store.latest().is_none());
    }
}
