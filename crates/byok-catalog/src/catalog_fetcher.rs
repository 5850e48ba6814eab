//! Remote catalog fetcher contract and the OpenAI-compatible HTTP adapter.
//!
//! The adapter issues `GET {api_base}/models` with bearer auth and decodes the
//! `{ "data": [...] }` listing. `max_input_tokens` takes precedence over
//! `context_length`. An entry missing one or both limits takes the missing
//! values from the known descriptor for its id, while any explicit limit it
//! carries still wins. Entries with non-positive limits, or with missing
//! limits and no known descriptor, are dropped; an unparseable body or a
//! non-success status fails the whole fetch.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::{
    cancellation::CooperativeCancellationToken,
    model_catalog::{DroppedDescriptor, ModelCatalog, ModelDescriptor},
    types::ProviderCredential,
};

const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Error)]
/// Enumerates supported `CatalogFetchError` values.
pub enum CatalogFetchError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("catalog endpoint returned non-success status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("catalog fetch cancelled")]
    Cancelled,
}

impl CatalogFetchError {
    pub fn kind(&self) -> &'static str {
        match self {
            CatalogFetchError::Http(error) if error.is_timeout() => "timeout",
            CatalogFetchError::Http(_) => "transport",
            CatalogFetchError::HttpStatus { .. } => "http_status",
            CatalogFetchError::Serde(_) => "malformed_payload",
            CatalogFetchError::InvalidResponse(_) => "invalid_response",
            CatalogFetchError::Cancelled => "cancelled",
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            CatalogFetchError::HttpStatus { status, .. } => Some(*status),
            CatalogFetchError::Http(error) => error.status().map(|status| status.as_u16()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Catalog decoded from a remote source, with the entries that were rejected.
pub struct FetchedCatalog {
    pub catalog: ModelCatalog,
    pub dropped: Vec<DroppedDescriptor>,
}

#[async_trait]
/// Trait contract for `RemoteCatalogFetcher` behavior.
///
/// Implementations own transport, timeouts and payload decoding. They must
/// stop promptly and return [`CatalogFetchError::Cancelled`] once the token
/// is cancelled.
pub trait RemoteCatalogFetcher: Send + Sync {
    async fn fetch_catalog(
        &self,
        provider_id: &str,
        credential: &ProviderCredential,
        cancellation: &CooperativeCancellationToken,
    ) -> Result<FetchedCatalog, CatalogFetchError>;
}

#[derive(Debug, Clone)]
/// Public struct `OpenAiCompatibleFetcherConfig` used across BYOK components.
pub struct OpenAiCompatibleFetcherConfig {
    pub api_base: String,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone)]
/// Fetches `GET {api_base}/models` from an OpenAI-compatible endpoint.
pub struct OpenAiCompatibleCatalogFetcher {
    client: reqwest::Client,
    config: OpenAiCompatibleFetcherConfig,
    known_models: Arc<ModelCatalog>,
}

impl OpenAiCompatibleCatalogFetcher {
    /// `known_models` supplies metadata for listed ids that carry no limits.
    pub fn new(
        config: OpenAiCompatibleFetcherConfig,
        known_models: Arc<ModelCatalog>,
    ) -> Result<Self, CatalogFetchError> {
        if config.api_base.trim().is_empty() {
            return Err(CatalogFetchError::InvalidResponse(
                "catalog api base must not be empty".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()?;

        Ok(Self {
            client,
            config,
            known_models,
        })
    }

    fn models_url(&self) -> String {
        let base = self.config.api_base.trim().trim_end_matches('/');
        if base.ends_with("/models") {
            return base.to_string();
        }
        format!("{base}/models")
    }

    async fn request_catalog(
        &self,
        credential: &ProviderCredential,
    ) -> Result<FetchedCatalog, CatalogFetchError> {
        let response = self
            .client
            .get(self.models_url())
            .bearer_auth(credential.expose())
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(CatalogFetchError::HttpStatus {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }
        parse_models_response(&body, &self.known_models)
    }
}

#[async_trait]
impl RemoteCatalogFetcher for OpenAiCompatibleCatalogFetcher {
    async fn fetch_catalog(
        &self,
        provider_id: &str,
        credential: &ProviderCredential,
        cancellation: &CooperativeCancellationToken,
    ) -> Result<FetchedCatalog, CatalogFetchError> {
        tracing::debug!(
            provider = provider_id,
            url = %self.models_url(),
            "fetching remote model catalog"
        );
        tokio::select! {
            biased;
            _ = cancellation.cancelled() => Err(CatalogFetchError::Cancelled),
            result = self.request_catalog(credential) => result,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RemoteModelEntry {
    id: String,
    name: Option<String>,
    max_input_tokens: Option<i64>,
    context_length: Option<i64>,
    max_output_tokens: Option<i64>,
    supports_tool_calling: Option<bool>,
    supports_vision: Option<bool>,
}

/// Decodes an OpenAI-compatible `/models` listing into a catalog.
pub fn parse_models_response(
    payload: &str,
    known_models: &ModelCatalog,
) -> Result<FetchedCatalog, CatalogFetchError> {
    let response = serde_json::from_str::<ModelsResponse>(payload)?;

    let mut descriptors = Vec::with_capacity(response.data.len());
    let mut dropped = Vec::new();
    for raw_entry in response.data {
        let fallback_id = raw_entry
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or("<missing id>")
            .to_string();
        let entry = match serde_json::from_value::<RemoteModelEntry>(raw_entry) {
            Ok(entry) => entry,
            Err(error) => {
                dropped.push(DroppedDescriptor {
                    id: fallback_id,
                    reason: format!("unreadable model entry: {error}"),
                });
                continue;
            }
        };
        match remote_entry_descriptor(entry, known_models) {
            Ok(descriptor) => descriptors.push(descriptor),
            Err(dropped_entry) => dropped.push(dropped_entry),
        }
    }

    let (catalog, mut duplicates) = ModelCatalog::from_descriptors_lossy(descriptors);
    dropped.append(&mut duplicates);
    Ok(FetchedCatalog { catalog, dropped })
}

fn remote_entry_descriptor(
    entry: RemoteModelEntry,
    known_models: &ModelCatalog,
) -> Result<ModelDescriptor, DroppedDescriptor> {
    let id = entry.id.trim().to_string();
    let drop_entry = |reason: String| DroppedDescriptor {
        id: id.clone(),
        reason,
    };
    let max_input_tokens = entry.max_input_tokens.or(entry.context_length);

    if let (Some(max_input_tokens), Some(max_output_tokens)) =
        (max_input_tokens, entry.max_output_tokens)
    {
        return ModelDescriptor::from_raw_limits(
            &id,
            entry.name.as_deref(),
            max_input_tokens,
            max_output_tokens,
            entry.supports_tool_calling.unwrap_or(false),
            entry.supports_vision.unwrap_or(false),
        )
        .map_err(|error| drop_entry(error.to_string()));
    }

    let Some(known) = known_models.get(&id) else {
        return Err(drop_entry(
            "missing token limits and no known descriptor".to_string(),
        ));
    };
    ModelDescriptor::from_raw_limits(
        &id,
        Some(entry.name.as_deref().unwrap_or(&known.display_name)),
        max_input_tokens.unwrap_or_else(|| i64::from(known.max_input_tokens)),
        entry
            .max_output_tokens
            .unwrap_or_else(|| i64::from(known.max_output_tokens)),
        entry
            .supports_tool_calling
            .unwrap_or(known.supports_tool_calling),
        entry.supports_vision.unwrap_or(known.supports_vision),
    )
    .map_err(|error| drop_entry(error.to_string()))
}

fn truncate_body(body: &str) -> String {
    let flattened = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if flattened.chars().count() <= MAX_ERROR_BODY_CHARS {
        return flattened;
    }
    let mut truncated = flattened
        .chars()
        .take(MAX_ERROR_BODY_CHARS)
        .collect::<String>();
    truncated.push_str("...");
    truncated
}
