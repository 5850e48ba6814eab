//! Credential presence checks over an injected credential store.
//!
//! The gate never caches and never retries. A store read failure is logged
//! and reported as an absent credential (fail-closed), so discovery degrades
//! to the default catalog instead of blocking.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{CredentialState, ProviderCredential};

#[derive(Debug, Clone, PartialEq, Eq)]
/// Result of an interactive credential acquisition.
pub enum CredentialPromptOutcome {
    Stored(ProviderCredential),
    Cancelled,
}

#[async_trait]
/// Trait contract for the credential storage collaborator.
///
/// Implementations own persistence, caching and prompting UI.
pub trait CredentialStore: Send + Sync {
    async fn get(&self, provider_id: &str) -> Result<Option<ProviderCredential>>;

    /// Prompts the user for a credential and persists it on success.
    async fn prompt_and_store(&self, provider_id: &str) -> Result<CredentialPromptOutcome>;
}

#[derive(Clone)]
/// Public struct `CredentialGate` used across BYOK components.
pub struct CredentialGate {
    store: Arc<dyn CredentialStore>,
}

impl CredentialGate {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Reads the provider credential, treating read failures as absent.
    pub async fn lookup(&self, provider_id: &str) -> Option<ProviderCredential> {
        match self.store.get(provider_id).await {
            Ok(credential) => credential,
            Err(error) => {
                tracing::warn!(
                    provider = provider_id,
                    error = %format!("{error:#}"),
                    "credential store read failed; treating credential as absent"
                );
                None
            }
        }
    }

    pub async fn has_credential(&self, provider_id: &str) -> bool {
        self.lookup(provider_id).await.is_some()
    }

    pub async fn credential_state(&self, provider_id: &str) -> CredentialState {
        if self.has_credential(provider_id).await {
            CredentialState::Present
        } else {
            CredentialState::Absent
        }
    }

    pub(crate) async fn acquire(&self, provider_id: &str) -> Result<CredentialPromptOutcome> {
        self.store.prompt_and_store(provider_id).await
    }
}
