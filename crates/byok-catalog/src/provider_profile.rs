//! Built-in provider profiles and their default catalogs.
//!
//! A profile's default catalog is the built-in catalog with the optional
//! known-models (CDN) catalog merged over it. It is built once and shared
//! read-only by every resolution for that provider.

use std::sync::{Arc, OnceLock};

use anyhow::{bail, Result};

use crate::{
    catalog_merge::merge_model_catalogs,
    model_catalog::{ModelCatalog, ModelDescriptor},
};

pub const IFLOW_PROVIDER_ID: &str = "iflow";
pub const IFLOW_API_BASE: &str = "https://apis.iflow.cn/v1";

const BUILT_IN_PROVIDER_IDS: &[&str] = &[IFLOW_PROVIDER_ID];

#[derive(Debug, Clone)]
/// Public struct `ProviderProfile` used across BYOK components.
pub struct ProviderProfile {
    provider_id: String,
    api_base: String,
    defaults: Arc<ModelCatalog>,
}

impl ProviderProfile {
    pub fn new(
        provider_id: impl Into<String>,
        api_base: impl Into<String>,
        built_in: &ModelCatalog,
        known_models: Option<&ModelCatalog>,
    ) -> Self {
        let provider_id = provider_id.into();
        let defaults = merge_model_catalogs(built_in, known_models);
        tracing::info!(
            provider = provider_id.as_str(),
            models = defaults.len(),
            known_models = known_models.map(ModelCatalog::len),
            "provider initialized with {} known models",
            defaults.len()
        );
        Self {
            provider_id,
            api_base: api_base.into(),
            defaults: Arc::new(defaults),
        }
    }

    pub fn iflow(known_models: Option<&ModelCatalog>) -> Self {
        Self::new(
            IFLOW_PROVIDER_ID,
            IFLOW_API_BASE,
            iflow_default_model_catalog(),
            known_models,
        )
    }

    /// Looks up a built-in profile by provider id (case-insensitive).
    pub fn built_in(provider_id: &str, known_models: Option<&ModelCatalog>) -> Result<Self> {
        match provider_id.trim().to_ascii_lowercase().as_str() {
            IFLOW_PROVIDER_ID => Ok(Self::iflow(known_models)),
            other => bail!(
                "unknown provider '{}' (supported: {})",
                other,
                BUILT_IN_PROVIDER_IDS.join(", ")
            ),
        }
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn defaults(&self) -> &Arc<ModelCatalog> {
        &self.defaults
    }
}

pub fn built_in_provider_ids() -> &'static [&'static str] {
    BUILT_IN_PROVIDER_IDS
}

/// Default iflow catalog, used when the known-models source has no entry.
pub fn iflow_default_model_catalog() -> &'static ModelCatalog {
    static CATALOG: OnceLock<ModelCatalog> = OnceLock::new();
    CATALOG.get_or_init(|| {
        let descriptors = ["Qwen3-Coder", "kimi-k2-0905"].map(|id| ModelDescriptor {
            id: id.to_string(),
            display_name: id.to_string(),
            max_input_tokens: 256_000,
            max_output_tokens: 64_000,
            supports_tool_calling: true,
            supports_vision: true,
        });
        match ModelCatalog::from_descriptors(descriptors) {
            Ok(catalog) => catalog,
            Err(error) => {
                tracing::error!(error = %format!("{error:#}"), "built-in iflow catalog failed to load");
                ModelCatalog::new()
            }
        }
    })
}
