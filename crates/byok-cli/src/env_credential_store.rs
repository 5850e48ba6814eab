//! Environment-backed credential store for the host binary.
//!
//! Keys are read from `BYOK_<PROVIDER>_API_KEY`. Keys entered at the prompt
//! are kept for the lifetime of the process only.

use std::{
    collections::HashMap,
    io::Write,
    sync::{Mutex, MutexGuard},
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use byok_catalog::{CredentialPromptOutcome, CredentialStore, ProviderCredential};
use tokio::io::{AsyncBufReadExt, BufReader};

pub(crate) fn provider_api_key_env_var(provider_id: &str) -> String {
    let normalized = provider_id
        .trim()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() {
                ch.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect::<String>();
    format!("BYOK_{normalized}_API_KEY")
}

#[derive(Debug, Default)]
pub(crate) struct EnvCredentialStore {
    entered: Mutex<HashMap<String, ProviderCredential>>,
}

impl EnvCredentialStore {
    fn entered(&self) -> MutexGuard<'_, HashMap<String, ProviderCredential>> {
        match self.entered.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl CredentialStore for EnvCredentialStore {
    async fn get(&self, provider_id: &str) -> Result<Option<ProviderCredential>> {
        if let Some(credential) = self.entered().get(provider_id) {
            return Ok(Some(credential.clone()));
        }
        let Ok(value) = std::env::var(provider_api_key_env_var(provider_id)) else {
            return Ok(None);
        };
        if value.trim().is_empty() {
            return Ok(None);
        }
        ProviderCredential::new(value).map(Some)
    }

    async fn prompt_and_store(&self, provider_id: &str) -> Result<CredentialPromptOutcome> {
        {
            let mut stderr = std::io::stderr().lock();
            write!(
                stderr,
                "Enter API key for '{provider_id}' (empty line cancels): "
            )
            .context("failed to write credential prompt")?;
            stderr.flush().context("failed to flush credential prompt")?;
        }

        let mut line = String::new();
        let read = BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await
            .context("failed to read API key from stdin")?;
        if read == 0 || line.trim().is_empty() {
            return Ok(CredentialPromptOutcome::Cancelled);
        }

        let credential = ProviderCredential::new(line)?;
        self.entered()
            .insert(provider_id.to_string(), credential.clone());
        Ok(CredentialPromptOutcome::Stored(credential))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_provider_api_key_env_var_normalizes_provider_id() {
        assert_eq!(provider_api_key_env_var("iflow"), "BYOK_IFLOW_API_KEY");
        assert_eq!(provider_api_key_env_var(" my-provider.v2 "), "BYOK_MY_PROVIDER_V2_API_KEY");
    }

    #[tokio::test]
    async fn functional_env_store_reads_trimmed_key_from_environment() {
        let provider = "env-store-read-test";
        std::env::set_var(provider_api_key_env_var(provider), "  sk-env  ");
        let store = EnvCredentialStore::default();
        let credential = store.get(provider).await.expect("read").expect("credential");
        assert_eq!(credential.expose(), "sk-env");
        std::env::remove_var(provider_api_key_env_var(provider));
    }

    #[tokio::test]
    async fn unit_env_store_treats_missing_or_blank_key_as_absent() {
        let provider = "env-store-blank-test";
        let store = EnvCredentialStore::default();
        assert_eq!(store.get(provider).await.expect("read"), None);

        std::env::set_var(provider_api_key_env_var(provider), "   ");
        assert_eq!(store.get(provider).await.expect("read"), None);
        std::env::remove_var(provider_api_key_env_var(provider));
    }

    #[tokio::test]
    async fn unit_env_store_prefers_key_entered_during_process() {
        let provider = "env-store-entered-test";
        let store = EnvCredentialStore::default();
        store.entered().insert(
            provider.to_string(),
            ProviderCredential::new("sk-entered").expect("credential"),
        );
        let credential = store.get(provider).await.expect("read").expect("credential");
        assert_eq!(credential.expose(), "sk-entered");
    }
}
