//! One-shot pipeline actions: proceed with transcription, skip it, or cancel.
//!
//! The three actions share a single `loading` flag. Invoking any of them while
//! another is in flight does nothing, which absorbs double clicks and repeated
//! key events. The flag is released however the call ends.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::backend::{AsrMode, Backend, BackendError, CancelOutcome};

/// Errors surfaced to the operator when an action fails
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("Failed to start transcription: {0}")]
    Proceed(#[source] BackendError),

    #[error("Failed to skip transcription: {0}")]
    Skip(#[source] BackendError),

    #[error("Failed to cancel: {0}")]
    Cancel(#[source] BackendError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Another action was already in flight.
    Ignored,
    Completed,
    /// Cancel removed the in-progress session entirely.
    SessionDeleted,
    /// The error message is also kept in [`PipelineControls::error`].
    Failed(String),
}

#[derive(Debug, Default)]
struct ControlState {
    loading: bool,
    error: Option<String>,
}

/// Clears the loading flag when dropped.
struct InFlight<'a> {
    state: &'a Mutex<ControlState>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        lock(self.state).loading = false;
    }
}

fn lock(state: &Mutex<ControlState>) -> MutexGuard<'_, ControlState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct PipelineControls {
    backend: Arc<dyn Backend>,
    state: Mutex<ControlState>,
}

impl PipelineControls {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            state: Mutex::new(ControlState::default()),
        }
    }

    fn begin(&self, action: &str) -> Option<InFlight<'_>> {
        let mut state = lock(&self.state);
        if state.loading {
            log::debug!("Controls: Ignoring {} while another action is in flight", action);
            return None;
        }
        state.loading = true;
        state.error = None;
        Some(InFlight { state: &self.state })
    }

    fn fail(&self, error: ActionError) -> ActionOutcome {
        let message = error.to_string();
        log::error!("Controls: {}", message);
        lock(&self.state).error = Some(message.clone());
        ActionOutcome::Failed(message)
    }

    /// Continue the pipeline with transcription.
    pub async fn proceed(&self) -> ActionOutcome {
        self.proceed_after(async {}).await
    }

    /// Like [`proceed`](Self::proceed), but awaits `prepare` first while
    /// already holding the loading flag. `prepare` is not polled at all when
    /// another action is in flight.
    pub async fn proceed_after<F>(&self, prepare: F) -> ActionOutcome
    where
        F: Future<Output = ()>,
    {
        let Some(_in_flight) = self.begin("proceed") else {
            return ActionOutcome::Ignored;
        };

        prepare.await;

        match self.backend.configure_asr(AsrMode::Transcribe).await {
            Ok(()) => {
                log::info!("Controls: Transcription started");
                ActionOutcome::Completed
            }
            Err(e) => self.fail(ActionError::Proceed(e)),
        }
    }

    /// Continue the pipeline without transcription.
    pub async fn skip(&self) -> ActionOutcome {
        let Some(_in_flight) = self.begin("skip") else {
            return ActionOutcome::Ignored;
        };

        match self.backend.configure_asr(AsrMode::Skip).await {
            Ok(()) => {
                log::info!("Controls: Transcription skipped");
                ActionOutcome::Completed
            }
            Err(e) => self.fail(ActionError::Skip(e)),
        }
    }

    pub async fn cancel(&self) -> ActionOutcome {
        let Some(_in_flight) = self.begin("cancel") else {
            return ActionOutcome::Ignored;
        };

        match self.backend.cancel().await {
            Ok(CancelOutcome::Deleted) => {
                log::info!("Controls: Session deleted by cancel");
                ActionOutcome::SessionDeleted
            }
            Ok(CancelOutcome::Other(action)) => {
                log::info!("Controls: Cancel acknowledged ({})", action);
                ActionOutcome::Completed
            }
            Err(e) => self.fail(ActionError::Cancel(e)),
        }
    }

    pub fn is_loading(&self) -> bool {
        lock(&self.state).loading
    }

    /// Last user-visible action error
    pub fn error(&self) -> Option<String> {
        lock(&self.state).error.clone()
    }

    pub fn clear_error(&self) {
        lock(&self.state).error = None;
    }
}
