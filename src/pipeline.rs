//! Client session for one chapter pipeline run.
//!
//! [`ClientSession`] owns everything the client knows about the remote
//! pipeline: the latest progress event, the connectivity signal, the ASR
//! configuration state and the one-shot action guard. User actions arrive as
//! [`Command`] values and transport traffic as [`FeedMessage`] values; all
//! derived views are recomputed on demand from the owned state.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

use crate::asr::{AsrReconciler, EditOutcome, OptionsEditor};
use crate::backend::{
    AsrLanguage, AsrOptions, AsrPreferences, AsrService, Backend, BackendError, HttpBackend,
};
use crate::controls::{ActionOutcome, PipelineControls};
use crate::progress::{ProgressEvent, ProgressTracker, ProgressView};
use crate::request_log::{RecordingBackend, RequestLogStore};
use crate::settings::ClientConfig;
use crate::state::{ConnectivityObserver, ConnectivityTransition};

/// A user action on the configuration or control surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SelectService(String),
    SelectVariant(String),
    SelectLanguage(String),
    SetTrim(bool),
    SetUseBiasWords(bool),
    EditBiasWords(String),
    ResetBiasWords,
    Proceed,
    Skip,
    Cancel,
}

/// Result of dispatching a [`Command`]
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// The committed preference triple after the change was handled.
    Preferences(AsrPreferences),
    Edit(EditOutcome),
    Action(ActionOutcome),
}

/// Traffic from the transport collaborator, in arrival order
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum FeedMessage {
    Progress(ProgressEvent),
    Connectivity(bool),
}

/// Snapshot of the ASR configuration surface
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigurationView {
    pub services: Vec<AsrService>,
    pub preferences: AsrPreferences,
    /// Languages of the active variant, default first
    pub languages: Vec<AsrLanguage>,
    pub book_language: Option<String>,
    pub options: AsrOptions,
    pub segment_count: u64,
    /// Whether the active service accepts bias words at all
    pub supports_bias_words: bool,
    pub options_loading: bool,
    pub options_saving: bool,
    /// A bias-words edit is waiting for its debounced write
    pub bias_words_pending: bool,
    pub reconciling: bool,
}

pub struct ClientSession {
    backend: Arc<dyn Backend>,
    request_log: RequestLogStore,
    progress: Mutex<ProgressTracker>,
    connectivity: ConnectivityObserver,
    reconciler: AsrReconciler,
    options: OptionsEditor,
    controls: PipelineControls,
    segment_count: AtomicU64,
}

impl ClientSession {
    /// Build a session around `backend`. Every backend call is recorded in
    /// the session's request log.
    pub fn new<B: Backend + 'static>(backend: B, config: &ClientConfig) -> Self {
        let request_log = RequestLogStore::new(config.request_log_capacity);
        let backend: Arc<dyn Backend> =
            Arc::new(RecordingBackend::new(backend, request_log.clone()));

        log::info!(
            "Session: Created with {} backend (bias words debounce {:?})",
            backend.name(),
            config.bias_words_debounce()
        );

        Self {
            reconciler: AsrReconciler::new(backend.clone()),
            options: OptionsEditor::new(backend.clone(), config.bias_words_debounce()),
            controls: PipelineControls::new(backend.clone()),
            backend,
            request_log,
            progress: Mutex::new(ProgressTracker::new()),
            connectivity: ConnectivityObserver::new(),
            segment_count: AtomicU64::new(0),
        }
    }

    /// Session talking to the HTTP backend at `config.backend_url`.
    pub fn connect(config: &ClientConfig) -> Result<Self, BackendError> {
        Ok(Self::new(HttpBackend::new(config)?, config))
    }

    fn progress(&self) -> MutexGuard<'_, ProgressTracker> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load preferences, options and the segment count concurrently.
    ///
    /// Each part degrades on its own: an empty service list, default options,
    /// or a zero segment count.
    pub async fn open_configuration(&self) -> ConfigurationView {
        let (preferences, options, segment_count) = tokio::join!(
            self.reconciler.load(),
            self.options.load(),
            self.backend.get_segment_count()
        );

        if let Err(e) = preferences {
            log::warn!("Session: Configuring without ASR services: {}", e);
        }
        log::debug!("Session: Options loaded (trim={})", options.trim);

        let segment_count = segment_count.unwrap_or_else(|e| {
            log::warn!("Session: Failed to load segment count: {}", e);
            0
        });
        self.segment_count.store(segment_count, Ordering::SeqCst);

        self.configuration()
    }

    pub fn configuration(&self) -> ConfigurationView {
        let supports_bias_words = self
            .reconciler
            .active_service()
            .is_some_and(|s| s.supports_bias_words);

        ConfigurationView {
            services: self.reconciler.services(),
            preferences: self.reconciler.preferences(),
            languages: self.reconciler.languages(),
            book_language: self.reconciler.book_language(),
            options: self.options.options(),
            segment_count: self.segment_count.load(Ordering::SeqCst),
            supports_bias_words,
            options_loading: self.options.is_loading(),
            options_saving: self.options.is_saving(),
            bias_words_pending: self.options.has_pending_edit(),
            reconciling: self.reconciler.is_reconciling(),
        }
    }

    pub async fn dispatch(&self, command: Command) -> CommandOutcome {
        log::debug!("Session: Dispatching {:?}", command);

        match command {
            Command::SelectService(id) => {
                self.preferences_outcome(self.reconciler.select_service(&id).await)
            }
            Command::SelectVariant(id) => {
                self.preferences_outcome(self.reconciler.select_variant(&id).await)
            }
            Command::SelectLanguage(code) => {
                self.preferences_outcome(self.reconciler.select_language(&code).await)
            }
            Command::SetTrim(trim) => CommandOutcome::Edit(self.options.set_trim(trim).await),
            Command::SetUseBiasWords(enabled) => {
                CommandOutcome::Edit(self.options.set_use_bias_words(enabled).await)
            }
            Command::EditBiasWords(text) => {
                CommandOutcome::Edit(self.options.edit_bias_words(&text))
            }
            Command::ResetBiasWords => CommandOutcome::Edit(self.options.reset_bias_words().await),
            Command::Proceed => {
                // The pipeline must see the text the operator typed last.
                let flush = async {
                    self.options.flush().await;
                };
                CommandOutcome::Action(self.controls.proceed_after(flush).await)
            }
            Command::Skip => CommandOutcome::Action(self.controls.skip().await),
            Command::Cancel => {
                let outcome = self.controls.cancel().await;
                if outcome == ActionOutcome::SessionDeleted {
                    self.reset_to_idle().await;
                }
                CommandOutcome::Action(outcome)
            }
        }
    }

    fn preferences_outcome(&self, result: Result<AsrPreferences, BackendError>) -> CommandOutcome {
        // Failures were logged by the reconciler; the committed triple is unchanged.
        CommandOutcome::Preferences(result.unwrap_or_else(|_| self.reconciler.preferences()))
    }

    /// Apply one message from the transport.
    pub fn apply_feed_message(&self, message: FeedMessage) -> Option<ConnectivityTransition> {
        match message {
            FeedMessage::Progress(event) => {
                self.progress().apply(event);
                None
            }
            FeedMessage::Connectivity(connected) => self.connectivity.update(connected),
        }
    }

    /// Apply transport messages in arrival order until the sender goes away.
    /// Returns the number of messages applied.
    pub async fn run_feed(&self, mut rx: mpsc::Receiver<FeedMessage>) -> u64 {
        let mut applied = 0;
        while let Some(message) = rx.recv().await {
            self.apply_feed_message(message);
            applied += 1;
        }
        log::info!("Session: Feed closed after {} messages", applied);
        applied
    }

    /// Back to the state of a fresh session. Connectivity and the request log
    /// belong to the transport and survive.
    async fn reset_to_idle(&self) {
        log::info!("Session: Resetting to idle");
        self.progress().reset();
        self.reconciler.reset().await;
        self.options.reset();
        self.segment_count.store(0, Ordering::SeqCst);
    }

    pub fn progress_view(&self) -> Option<ProgressView> {
        self.progress().view()
    }

    pub fn is_connected(&self) -> Option<bool> {
        self.connectivity.is_connected()
    }

    pub fn show_connection_warning(&self) -> bool {
        self.connectivity.show_connection_warning()
    }

    pub fn is_action_loading(&self) -> bool {
        self.controls.is_loading()
    }

    pub fn action_error(&self) -> Option<String> {
        self.controls.error()
    }

    pub fn clear_action_error(&self) {
        self.controls.clear_error();
    }

    pub fn request_log(&self) -> &RequestLogStore {
        &self.request_log
    }
}
