//! ASR option edits (trim, bias-word toggle, bias-word text).
//!
//! Toggles are written immediately. The bias-word text is echoed locally on
//! every edit and written once the user stops typing for the debounce window.
//! Only one debounced write can be pending; a newer edit or a reset replaces it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::backend::{AsrOptions, Backend};
use crate::settings::DEFAULT_BIAS_WORDS;

/// What happened to an option edit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// Controls are disabled while the options bundle loads.
    Ignored,
    /// Applied locally; the write will happen after the debounce window.
    Scheduled,
    Persisted,
    /// Applied locally but the backend rejected the write.
    Failed,
}

#[derive(Debug, Default)]
struct OptionsState {
    options: AsrOptions,
    loading: bool,
    saving: bool,
    /// Generation and token of the pending debounced write, if any.
    pending: Option<(u64, CancellationToken)>,
    generation: u64,
}

struct Shared {
    backend: Arc<dyn Backend>,
    state: Mutex<OptionsState>,
    /// One options write in flight at a time.
    write_lock: tokio::sync::Mutex<()>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, OptionsState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write whatever the local options are at the moment the write starts.
    async fn persist(&self) -> EditOutcome {
        let _write = self.write_lock.lock().await;
        self.persist_locked().await
    }

    async fn persist_locked(&self) -> EditOutcome {
        let options = {
            let mut state = self.lock();
            state.saving = true;
            state.options.clone()
        };

        let result = self.backend.update_asr_options(&options).await;
        self.lock().saving = false;

        match result {
            Ok(()) => {
                log::debug!("Options: Saved (trim={}, use_bias_words={})", options.trim, options.use_bias_words);
                EditOutcome::Persisted
            }
            Err(e) => {
                log::error!("Options: Failed to save ASR options: {}", e);
                EditOutcome::Failed
            }
        }
    }
}

pub struct OptionsEditor {
    shared: Arc<Shared>,
    debounce: Duration,
}

impl OptionsEditor {
    pub fn new(backend: Arc<dyn Backend>, debounce: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                backend,
                state: Mutex::new(OptionsState::default()),
                write_lock: tokio::sync::Mutex::new(()),
            }),
            debounce,
        }
    }

    /// Load the options bundle. Falls back to defaults if the backend fails.
    pub async fn load(&self) -> AsrOptions {
        {
            let mut state = self.shared.lock();
            state.loading = true;
            cancel_pending(&mut state);
        }

        let options = match self.shared.backend.get_asr_options().await {
            Ok(options) => options.normalized(),
            Err(e) => {
                log::error!("Options: Failed to load ASR options, using defaults: {}", e);
                AsrOptions::default()
            }
        };

        let mut state = self.shared.lock();
        state.options = options.clone();
        state.loading = false;
        options
    }

    pub async fn set_trim(&self, trim: bool) -> EditOutcome {
        self.toggle(|options| options.trim = trim).await
    }

    pub async fn set_use_bias_words(&self, enabled: bool) -> EditOutcome {
        self.toggle(|options| options.use_bias_words = enabled).await
    }

    /// Optimistic local toggle followed by an immediate write. A failed write
    /// is logged and the local value stays as toggled.
    async fn toggle(&self, apply: impl FnOnce(&mut AsrOptions)) -> EditOutcome {
        {
            let mut state = self.shared.lock();
            if state.loading {
                log::debug!("Options: Ignoring toggle while options are loading");
                return EditOutcome::Ignored;
            }
            apply(&mut state.options);
        }
        self.shared.persist().await
    }

    /// Echo the new text locally and (re)start the debounce timer.
    pub fn edit_bias_words(&self, text: &str) -> EditOutcome {
        let (generation, token) = {
            let mut state = self.shared.lock();
            if state.loading {
                return EditOutcome::Ignored;
            }
            state.options.bias_words = text.to_string();
            cancel_pending(&mut state);

            state.generation += 1;
            let token = CancellationToken::new();
            state.pending = Some((state.generation, token.clone()));
            (state.generation, token)
        };

        let shared = self.shared.clone();
        let debounce = self.debounce;
        tokio::spawn(async move {
            tokio::select! {
                biased;

                _ = token.cancelled() => {
                    return;
                }

                _ = tokio::time::sleep(debounce) => {}
            }

            let _write = shared.write_lock.lock().await;
            {
                let mut state = shared.lock();
                // A reset or newer edit may have replaced us while we waited for the write slot.
                if token.is_cancelled() {
                    return;
                }
                if matches!(&state.pending, Some((g, _)) if *g == generation) {
                    state.pending = None;
                }
            }
            shared.persist_locked().await;
        });

        EditOutcome::Scheduled
    }

    /// Restore the default bias words and write them right away, dropping any pending edit.
    pub async fn reset_bias_words(&self) -> EditOutcome {
        {
            let mut state = self.shared.lock();
            if state.loading {
                return EditOutcome::Ignored;
            }
            cancel_pending(&mut state);
            state.options.bias_words = DEFAULT_BIAS_WORDS.to_string();
        }
        log::info!("Options: Bias words reset to defaults");
        self.shared.persist().await
    }

    /// Write a pending bias-words edit now instead of waiting for the timer.
    /// Returns `None` if nothing was pending.
    pub async fn flush(&self) -> Option<EditOutcome> {
        let had_pending = {
            let mut state = self.shared.lock();
            let had_pending = state.pending.is_some();
            cancel_pending(&mut state);
            had_pending
        };

        if had_pending {
            Some(self.shared.persist().await)
        } else {
            None
        }
    }

    pub fn options(&self) -> AsrOptions {
        self.shared.lock().options.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.shared.lock().loading
    }

    pub fn is_saving(&self) -> bool {
        self.shared.lock().saving
    }

    pub fn has_pending_edit(&self) -> bool {
        self.shared.lock().pending.is_some()
    }

    /// Back to defaults, dropping any pending edit.
    pub fn reset(&self) {
        let mut state = self.shared.lock();
        cancel_pending(&mut state);
        state.options = AsrOptions::default();
        state.loading = false;
    }
}

fn cancel_pending(state: &mut OptionsState) {
    if let Some((_, token)) = state.pending.take() {
        token.cancel();
    }
}
