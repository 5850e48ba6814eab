//! Catalog resolution policy for a single provider.
//!
//! Each call decides from `(mode, credential state)`:
//!
//! | mode        | credential | action                                          |
//! |-------------|------------|-------------------------------------------------|
//! | silent      | present    | fetch remote catalog, merge over defaults       |
//! | silent      | absent     | return defaults, no fetch and no prompt         |
//! | interactive | present    | fetch remote catalog, merge over defaults       |
//! | interactive | absent     | prompt once; on success continue as present     |
//!
//! A failed fetch degrades to the defaults. A cancelled or failed prompt is
//! surfaced to the caller. Cancellation of the caller's token stops the call
//! before any merge happens.

use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
};

use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::{
    cancellation::CooperativeCancellationToken,
    catalog_fetcher::{CatalogFetchError, FetchedCatalog, RemoteCatalogFetcher},
    catalog_merge::merge_model_catalogs,
    credential_gate::{CredentialGate, CredentialPromptOutcome, CredentialStore},
    model_catalog::ModelCatalog,
    provider_profile::ProviderProfile,
    types::{CredentialState, InvocationMode, ProviderCredential},
};

/// Structured diagnostic sink for resolution decisions.
///
/// A sink that panics is isolated from the resolution; the panic is logged
/// and the event is dropped.
pub type ResolutionEventSink = Arc<dyn Fn(Value) + Send + Sync>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// Enumerates supported `CatalogResolveError` values.
pub enum CatalogResolveError {
    #[error("catalog resolution for provider '{provider}' was cancelled")]
    Cancelled { provider: String },
    #[error("credential entry for provider '{provider}' was cancelled")]
    CredentialAcquisitionCancelled { provider: String },
    #[error("credential entry for provider '{provider}' failed: {reason}")]
    CredentialAcquisitionFailed { provider: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventLevel {
    Info,
    Warn,
    Error,
}

impl EventLevel {
    fn as_str(self) -> &'static str {
        match self {
            EventLevel::Info => "info",
            EventLevel::Warn => "warn",
            EventLevel::Error => "error",
        }
    }
}

/// Public struct `CatalogResolver` used across BYOK components.
///
/// Bound to one provider profile at construction; the credential store and
/// remote fetcher are injected so tests can substitute them.
pub struct CatalogResolver {
    profile: ProviderProfile,
    gate: CredentialGate,
    fetcher: Arc<dyn RemoteCatalogFetcher>,
    event_sink: Option<ResolutionEventSink>,
}

impl CatalogResolver {
    pub fn new(
        profile: ProviderProfile,
        credential_store: Arc<dyn CredentialStore>,
        fetcher: Arc<dyn RemoteCatalogFetcher>,
    ) -> Self {
        Self {
            profile,
            gate: CredentialGate::new(credential_store),
            fetcher,
            event_sink: None,
        }
    }

    pub fn with_event_sink(mut self, event_sink: ResolutionEventSink) -> Self {
        self.event_sink = Some(event_sink);
        self
    }

    pub fn profile(&self) -> &ProviderProfile {
        &self.profile
    }

    /// Resolves the catalog advertised for this provider.
    ///
    /// Silent mode always yields a usable catalog unless cancelled. Interactive
    /// mode may prompt for a credential and reports a declined prompt as
    /// [`CatalogResolveError::CredentialAcquisitionCancelled`].
    pub async fn resolve_catalog(
        &self,
        mode: InvocationMode,
        cancellation: &CooperativeCancellationToken,
    ) -> Result<ModelCatalog, CatalogResolveError> {
        if cancellation.is_cancelled() {
            return Err(self.cancelled("start"));
        }

        let credential = self.gate.lookup(self.provider_id()).await;
        let credential_state = if credential.is_some() {
            CredentialState::Present
        } else {
            CredentialState::Absent
        };
        self.emit(
            EventLevel::Info,
            "credential_status",
            json!({ "mode": mode.as_str(), "credential": credential_state.as_str() }),
        );

        let credential = match (credential, mode) {
            (Some(credential), _) => credential,
            (None, InvocationMode::Silent) => {
                self.emit(
                    EventLevel::Info,
                    "fetch_skipped",
                    json!({ "reason": "credential_absent_silent_mode" }),
                );
                return Ok(self.finish(None));
            }
            (None, InvocationMode::Interactive) => self.acquire_credential(cancellation).await?,
        };

        let overrides = self.fetch_overrides(&credential, cancellation).await?;
        if cancellation.is_cancelled() {
            return Err(self.cancelled("merge"));
        }
        Ok(self.finish(overrides.as_ref()))
    }

    fn provider_id(&self) -> &str {
        self.profile.provider_id()
    }

    async fn acquire_credential(
        &self,
        cancellation: &CooperativeCancellationToken,
    ) -> Result<ProviderCredential, CatalogResolveError> {
        self.emit(EventLevel::Info, "credential_prompt", json!({}));
        let outcome = tokio::select! {
            biased;
            _ = cancellation.cancelled() => return Err(self.cancelled("credential_prompt")),
            outcome = self.gate.acquire(self.provider_id()) => outcome,
        };

        match outcome {
            Ok(CredentialPromptOutcome::Stored(credential)) => {
                self.emit(EventLevel::Info, "credential_acquired", json!({}));
                Ok(credential)
            }
            Ok(CredentialPromptOutcome::Cancelled) => {
                self.emit(
                    EventLevel::Error,
                    "credential_acquisition_cancelled",
                    json!({}),
                );
                Err(CatalogResolveError::CredentialAcquisitionCancelled {
                    provider: self.provider_id().to_string(),
                })
            }
            Err(error) => {
                let reason = format!("{error:#}");
                self.emit(
                    EventLevel::Error,
                    "credential_acquisition_failed",
                    json!({ "reason": reason }),
                );
                Err(CatalogResolveError::CredentialAcquisitionFailed {
                    provider: self.provider_id().to_string(),
                    reason,
                })
            }
        }
    }

    /// One fetch attempt; any failure other than caller cancellation yields
    /// `None` so the defaults are used.
    async fn fetch_overrides(
        &self,
        credential: &ProviderCredential,
        cancellation: &CooperativeCancellationToken,
    ) -> Result<Option<ModelCatalog>, CatalogResolveError> {
        let fetched = tokio::select! {
            biased;
            _ = cancellation.cancelled() => Err(CatalogFetchError::Cancelled),
            fetched = self.fetcher.fetch_catalog(self.provider_id(), credential, cancellation) => fetched,
        };

        match fetched {
            Ok(FetchedCatalog { catalog, dropped }) => {
                if !dropped.is_empty() {
                    let dropped = dropped
                        .iter()
                        .map(|entry| json!({ "id": entry.id, "reason": entry.reason }))
                        .collect::<Vec<_>>();
                    self.emit(
                        EventLevel::Warn,
                        "descriptors_dropped",
                        json!({ "dropped": dropped }),
                    );
                }
                self.emit(
                    EventLevel::Info,
                    "fetch_succeeded",
                    json!({ "models": catalog.len() }),
                );
                Ok(Some(catalog))
            }
            Err(_) if cancellation.is_cancelled() => Err(self.cancelled("fetch")),
            Err(error) => {
                self.emit(
                    EventLevel::Warn,
                    "fetch_failed",
                    json!({
                        "error_kind": error.kind(),
                        "status": error.status(),
                        "error": error.to_string(),
                        "fallback": "defaults",
                    }),
                );
                Ok(None)
            }
        }
    }

    fn finish(&self, overrides: Option<&ModelCatalog>) -> ModelCatalog {
        let resolved = merge_model_catalogs(self.profile.defaults(), overrides);
        let source = if overrides.is_some() {
            "merged"
        } else {
            "defaults"
        };
        self.emit(
            EventLevel::Info,
            "resolved",
            json!({ "source": source, "models": resolved.len() }),
        );
        resolved
    }

    fn cancelled(&self, stage: &str) -> CatalogResolveError {
        self.emit(
            EventLevel::Warn,
            "resolution_cancelled",
            json!({ "stage": stage }),
        );
        CatalogResolveError::Cancelled {
            provider: self.provider_id().to_string(),
        }
    }

    fn emit(&self, level: EventLevel, event: &str, fields: Value) {
        let provider = self.provider_id();
        match level {
            EventLevel::Info => tracing::info!(provider, event, details = %fields, "catalog resolution"),
            EventLevel::Warn => tracing::warn!(provider, event, details = %fields, "catalog resolution"),
            EventLevel::Error => tracing::error!(provider, event, details = %fields, "catalog resolution"),
        }

        let Some(sink) = &self.event_sink else {
            return;
        };
        let mut payload = Map::new();
        payload.insert("type".to_string(), json!("catalog_resolution"));
        payload.insert("event".to_string(), json!(event));
        payload.insert("level".to_string(), json!(level.as_str()));
        payload.insert("provider".to_string(), json!(provider));
        if let Value::Object(fields) = fields {
            payload.extend(fields);
        }
        let payload = Value::Object(payload);
        if catch_unwind(AssertUnwindSafe(|| sink(payload))).is_err() {
            tracing::warn!(provider, event, "resolution event sink panicked; event dropped");
        }
    }
}
