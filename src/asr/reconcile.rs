//! Reconciliation of the persisted ASR (service, variant, language) triple
//! against the capabilities the backend reports.
//!
//! The local triple only ever changes after the backend acknowledged the
//! write. A pass is strictly sequential: the structural write (service and
//! variant) completes before the language write is issued, so the backend
//! never sees a half-updated triple from us.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::asr::matching::resolve_language;
use crate::backend::{AsrLanguage, AsrPreferences, AsrService, AsrVariant, Backend, BackendError};

/// Language code the backend treats as "detect automatically"
pub const AUTO_LANGUAGE: &str = "auto";

#[derive(Debug, Default)]
struct ReconcilerInner {
    services: Vec<AsrService>,
    book_language: Option<String>,
    committed: AsrPreferences,
    loaded: bool,
    reconciling: bool,
}

impl ReconcilerInner {
    fn service(&self, service_id: &str) -> Option<&AsrService> {
        self.services.iter().find(|s| s.service_id == service_id)
    }

    fn variant(&self, prefs: &AsrPreferences) -> Option<&AsrVariant> {
        self.service(&prefs.service_id)
            .and_then(|s| s.variant(&prefs.variant_id))
    }
}

/// Keeps the ASR preference triple consistent with the available services.
pub struct AsrReconciler {
    backend: Arc<dyn Backend>,
    inner: Mutex<ReconcilerInner>,
    /// Serializes passes so two user changes never interleave their writes.
    pass_lock: tokio::sync::Mutex<()>,
}

impl AsrReconciler {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            inner: Mutex::new(ReconcilerInner::default()),
            pass_lock: tokio::sync::Mutex::new(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ReconcilerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load services, current preferences and the book language, then reconcile.
    ///
    /// A failed load leaves an empty service list so the caller can still render.
    pub async fn load(&self) -> Result<AsrPreferences, BackendError> {
        let _pass = self.pass_lock.lock().await;

        let snapshot = match self.backend.get_asr_preferences().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::error!("Reconcile: Failed to load ASR preferences: {}", e);
                let mut inner = self.lock();
                *inner = ReconcilerInner {
                    loaded: true,
                    ..Default::default()
                };
                return Err(e);
            }
        };

        let candidate = snapshot.preferences();
        {
            let mut inner = self.lock();
            inner.services = snapshot.available_services;
            inner.book_language = snapshot
                .book_language
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty());
            inner.committed = candidate.clone();
            inner.loaded = true;
            log::info!(
                "Reconcile: Loaded {} ASR services, current {:?}, book language {:?}",
                inner.services.len(),
                inner.committed,
                inner.book_language
            );
        }

        self.run_pass(candidate).await
    }

    /// Switch to another service. Variant and language are re-derived for it.
    pub async fn select_service(&self, service_id: &str) -> Result<AsrPreferences, BackendError> {
        let _pass = self.pass_lock.lock().await;

        if self.lock().service(service_id).is_none() {
            log::warn!("Reconcile: Ignoring unknown service '{}'", service_id);
            return Ok(self.preferences());
        }

        self.run_pass(AsrPreferences::new(service_id, "", "")).await
    }

    /// Switch to another variant of the current service. The language is re-derived.
    pub async fn select_variant(&self, variant_id: &str) -> Result<AsrPreferences, BackendError> {
        let _pass = self.pass_lock.lock().await;

        let service_id = {
            let inner = self.lock();
            let service_id = inner.committed.service_id.clone();
            let known = inner
                .service(&service_id)
                .is_some_and(|s| s.variant(variant_id).is_some());
            if !known {
                log::warn!(
                    "Reconcile: Ignoring unknown variant '{}' for service '{}'",
                    variant_id,
                    service_id
                );
                return Ok(inner.committed.clone());
            }
            service_id
        };

        self.run_pass(AsrPreferences::new(&service_id, variant_id, ""))
            .await
    }

    /// Explicit language choice. No matching is applied.
    pub async fn select_language(&self, language_code: &str) -> Result<AsrPreferences, BackendError> {
        let _pass = self.pass_lock.lock().await;

        let target = {
            let inner = self.lock();
            let committed = inner.committed.clone();
            let offered = inner
                .variant(&committed)
                .is_some_and(|v| v.languages.iter().any(|l| l.code == language_code));
            if !offered && language_code != AUTO_LANGUAGE {
                log::warn!(
                    "Reconcile: Ignoring language '{}' not offered by variant '{}'",
                    language_code,
                    committed.variant_id
                );
                return Ok(committed);
            }
            if committed.language_code == language_code {
                return Ok(committed);
            }
            AsrPreferences {
                language_code: language_code.to_string(),
                ..committed
            }
        };

        self.persist(&target).await?;
        Ok(target)
    }

    /// Run one reconciliation pass starting from `candidate`.
    ///
    /// Callers must hold `pass_lock`.
    async fn run_pass(&self, mut candidate: AsrPreferences) -> Result<AsrPreferences, BackendError> {
        self.lock().reconciling = true;
        let result = self.reconcile(&mut candidate).await;
        self.lock().reconciling = false;

        if let Err(e) = &result {
            log::warn!(
                "Reconcile: Pass stopped, keeping {:?}: {}",
                self.preferences(),
                e
            );
        }
        result
    }

    async fn reconcile(&self, candidate: &mut AsrPreferences) -> Result<AsrPreferences, BackendError> {
        let (languages, hint, structural_write) = {
            let inner = self.lock();
            if inner.services.is_empty() {
                log::debug!("Reconcile: No ASR services available, nothing to reconcile");
                return Ok(inner.committed.clone());
            }

            let service = match inner.service(&candidate.service_id) {
                Some(service) => service,
                None => {
                    // Stored service no longer offered (or never set): first service wins.
                    if !candidate.service_id.is_empty() {
                        log::warn!(
                            "Reconcile: Service '{}' is not available, falling back",
                            candidate.service_id
                        );
                    }
                    let first = &inner.services[0];
                    *candidate = AsrPreferences::new(&first.service_id, "", "");
                    first
                }
            };

            if !candidate.variant_id.is_empty() && service.variant(&candidate.variant_id).is_none() {
                log::warn!(
                    "Reconcile: Variant '{}' is not offered by '{}', falling back",
                    candidate.variant_id,
                    service.service_id
                );
                candidate.variant_id.clear();
                candidate.language_code.clear();
            }

            if candidate.variant_id.is_empty() {
                if let Some(first) = service.variants.first() {
                    candidate.variant_id = first.model_id.clone();
                }
            }

            let languages: Vec<AsrLanguage> = service
                .variant(&candidate.variant_id)
                .map(|v| v.languages.clone())
                .unwrap_or_default();

            let structural_write = candidate.service_id != inner.committed.service_id
                || candidate.variant_id != inner.committed.variant_id;

            (languages, inner.book_language.clone(), structural_write)
        };

        if structural_write {
            self.persist(candidate).await?;
        }

        let current = &candidate.language_code;
        let stale = !current.is_empty()
            && current != AUTO_LANGUAGE
            && !languages.iter().any(|l| &l.code == current);
        if stale {
            log::warn!(
                "Reconcile: Language '{}' is not offered by variant '{}', re-matching",
                current,
                candidate.variant_id
            );
        }
        let current = if stale { "" } else { current.as_str() };

        let language = resolve_language(&languages, current, hint.as_deref());
        log::debug!(
            "Reconcile: Resolved language '{}' (stored '{}', book language {:?})",
            language,
            candidate.language_code,
            hint
        );

        if language != candidate.language_code {
            let target = AsrPreferences {
                language_code: language,
                ..candidate.clone()
            };
            self.persist(&target).await?;
            *candidate = target;
        } else if !structural_write && *candidate != self.preferences() {
            self.persist(candidate).await?;
        }

        Ok(candidate.clone())
    }

    /// Write `prefs` to the backend and commit them locally on success.
    async fn persist(&self, prefs: &AsrPreferences) -> Result<(), BackendError> {
        match self.backend.set_asr_preferences(prefs).await {
            Ok(()) => {
                log::info!(
                    "Reconcile: Committed service '{}', variant '{}', language '{}'",
                    prefs.service_id,
                    prefs.variant_id,
                    prefs.language_code
                );
                self.lock().committed = prefs.clone();
                Ok(())
            }
            Err(e) => {
                log::error!("Reconcile: Failed to persist {:?}: {}", prefs, e);
                Err(e)
            }
        }
    }

    /// The last triple the backend acknowledged
    pub fn preferences(&self) -> AsrPreferences {
        self.lock().committed.clone()
    }

    pub fn services(&self) -> Vec<AsrService> {
        self.lock().services.clone()
    }

    pub fn book_language(&self) -> Option<String> {
        self.lock().book_language.clone()
    }

    pub fn active_service(&self) -> Option<AsrService> {
        let inner = self.lock();
        inner.service(&inner.committed.service_id).cloned()
    }

    pub fn active_variant(&self) -> Option<AsrVariant> {
        let inner = self.lock();
        inner.variant(&inner.committed).cloned()
    }

    /// Languages offered by the active variant, default first
    pub fn languages(&self) -> Vec<AsrLanguage> {
        self.active_variant()
            .map(|v| v.languages)
            .unwrap_or_default()
    }

    pub fn is_loaded(&self) -> bool {
        self.lock().loaded
    }

    pub fn is_reconciling(&self) -> bool {
        self.lock().reconciling
    }

    /// Drop everything loaded for the current configuration session.
    ///
    /// Waits for a running pass to finish so its commit cannot land after the reset.
    pub async fn reset(&self) {
        let _pass = self.pass_lock.lock().await;
        *self.lock() = ReconcilerInner::default();
    }
}
