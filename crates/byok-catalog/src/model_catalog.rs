//! Model descriptor and catalog types plus known-models payload parsing.
//!
//! Every descriptor held by a [`ModelCatalog`] has a non-empty id and positive
//! token limits. Invalid input is rejected (strict constructors) or dropped
//! and reported (lossy constructors); it is never coerced.

use std::collections::{btree_map::Entry, BTreeMap};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// Public struct `ModelDescriptor` used across BYOK components.
///
/// Identity is `id`; two descriptors with the same id describe the same model.
pub struct ModelDescriptor {
    pub id: String,
    pub display_name: String,
    pub max_input_tokens: u32,
    pub max_output_tokens: u32,
    #[serde(default)]
    pub supports_tool_calling: bool,
    #[serde(default)]
    pub supports_vision: bool,
}

impl ModelDescriptor {
    /// Builds a descriptor from raw (possibly signed) limits, rejecting
    /// non-positive values instead of clamping them.
    pub fn from_raw_limits(
        id: &str,
        display_name: Option<&str>,
        max_input_tokens: i64,
        max_output_tokens: i64,
        supports_tool_calling: bool,
        supports_vision: bool,
    ) -> Result<Self> {
        let id = id.trim();
        if id.is_empty() {
            bail!("model descriptor id must not be empty");
        }
        let display_name = display_name
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(id);
        let descriptor = Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            max_input_tokens: positive_token_limit(id, "max_input_tokens", max_input_tokens)?,
            max_output_tokens: positive_token_limit(id, "max_output_tokens", max_output_tokens)?,
            supports_tool_calling,
            supports_vision,
        };
        validate_model_descriptor(&descriptor)?;
        Ok(descriptor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Descriptor rejected while building a catalog from untrusted input.
pub struct DroppedDescriptor {
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Mapping from model id to [`ModelDescriptor`].
///
/// Only membership and per-id content are observable; iteration is by id.
pub struct ModelCatalog {
    models: BTreeMap<String, ModelDescriptor>,
}

impl ModelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog, failing on the first invalid or duplicate descriptor.
    pub fn from_descriptors(descriptors: impl IntoIterator<Item = ModelDescriptor>) -> Result<Self> {
        let mut catalog = Self::new();
        for descriptor in descriptors {
            let id = descriptor.id.clone();
            if catalog.contains(&id) {
                bail!("model catalog contains duplicate entry '{id}'");
            }
            catalog
                .insert(descriptor)
                .with_context(|| format!("invalid model catalog entry '{id}'"))?;
        }
        Ok(catalog)
    }

    /// Builds a catalog keeping every valid descriptor and reporting the rest.
    ///
    /// The first descriptor for an id wins; later duplicates are dropped.
    pub fn from_descriptors_lossy(
        descriptors: impl IntoIterator<Item = ModelDescriptor>,
    ) -> (Self, Vec<DroppedDescriptor>) {
        let mut catalog = Self::new();
        let mut dropped = Vec::new();
        for descriptor in descriptors {
            if let Err(error) = validate_model_descriptor(&descriptor) {
                dropped.push(DroppedDescriptor {
                    id: descriptor.id,
                    reason: error.to_string(),
                });
                continue;
            }
            match catalog.models.entry(descriptor.id.clone()) {
                Entry::Occupied(_) => dropped.push(DroppedDescriptor {
                    id: descriptor.id,
                    reason: "duplicate model id".to_string(),
                }),
                Entry::Vacant(slot) => {
                    slot.insert(descriptor);
                }
            }
        }
        (catalog, dropped)
    }

    /// Inserts a validated descriptor, returning the one it replaced.
    pub fn insert(&mut self, descriptor: ModelDescriptor) -> Result<Option<ModelDescriptor>> {
        validate_model_descriptor(&descriptor)?;
        Ok(self.models.insert(descriptor.id.clone(), descriptor))
    }

    pub fn get(&self, id: &str) -> Option<&ModelDescriptor> {
        self.models.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.models.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ModelDescriptor> {
        self.models.values()
    }

    pub(crate) fn extend_overriding(&mut self, other: &ModelCatalog) {
        for (id, descriptor) in &other.models {
            self.models.insert(id.clone(), descriptor.clone());
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KnownModelEntry {
    name: Option<String>,
    max_input_tokens: i64,
    max_output_tokens: i64,
    #[serde(default)]
    tool_calling: bool,
    #[serde(default)]
    vision: bool,
}

/// Public `fn` `validate_model_descriptor` in `byok-catalog`.
pub fn validate_model_descriptor(descriptor: &ModelDescriptor) -> Result<()> {
    if descriptor.id.trim().is_empty() {
        bail!("model descriptor id must not be empty");
    }
    if descriptor.max_input_tokens == 0 {
        bail!(
            "model '{}' has invalid max_input_tokens=0",
            descriptor.id
        );
    }
    if descriptor.max_output_tokens == 0 {
        bail!(
            "model '{}' has invalid max_output_tokens=0",
            descriptor.id
        );
    }
    Ok(())
}

/// Parses a known-models payload: a JSON object keyed by model id whose
/// values carry `name`, `maxInputTokens`, `maxOutputTokens`, `toolCalling`
/// and `vision`.
///
/// Individual malformed entries are dropped and reported; a payload that is
/// not a JSON object fails as a whole.
pub fn parse_known_models_payload(payload: &str) -> Result<(ModelCatalog, Vec<DroppedDescriptor>)> {
    let entries = serde_json::from_str::<Map<String, Value>>(payload)
        .context("failed to parse known-models payload as an object keyed by model id")?;

    let mut descriptors = Vec::with_capacity(entries.len());
    let mut dropped = Vec::new();
    for (id, raw_entry) in entries {
        let parsed = serde_json::from_value::<KnownModelEntry>(raw_entry)
            .map_err(anyhow::Error::from)
            .and_then(|entry| {
                ModelDescriptor::from_raw_limits(
                    &id,
                    entry.name.as_deref(),
                    entry.max_input_tokens,
                    entry.max_output_tokens,
                    entry.tool_calling,
                    entry.vision,
                )
            });
        match parsed {
            Ok(descriptor) => descriptors.push(descriptor),
            Err(error) => dropped.push(DroppedDescriptor {
                id,
                reason: format!("{error:#}"),
            }),
        }
    }

    let (catalog, mut duplicates) = ModelCatalog::from_descriptors_lossy(descriptors);
    dropped.append(&mut duplicates);
    Ok((catalog, dropped))
}

/// Renders a catalog as deterministic text lines sorted by model id.
pub fn render_model_catalog(provider_id: &str, catalog: &ModelCatalog) -> String {
    let mut lines = vec![format!(
        "models list: provider={} total={}",
        provider_id,
        catalog.len()
    )];
    if catalog.is_empty() {
        lines.push("models list: no models".to_string());
        return lines.join("\n");
    }
    for descriptor in catalog.descriptors() {
        lines.push(format!(
            "model: {} name={} max_input_tokens={} max_output_tokens={} tools={} vision={}",
            descriptor.id,
            descriptor.display_name,
            descriptor.max_input_tokens,
            descriptor.max_output_tokens,
            descriptor.supports_tool_calling,
            descriptor.supports_vision,
        ));
    }
    lines.join("\n")
}

/// JSON form of a resolved catalog.
pub fn model_catalog_json(provider_id: &str, catalog: &ModelCatalog) -> Value {
    serde_json::json!({
        "provider": provider_id,
        "models": catalog.descriptors().collect::<Vec<_>>(),
    })
}

fn positive_token_limit(id: &str, field: &str, value: i64) -> Result<u32> {
    if value <= 0 {
        bail!("model '{id}' has invalid {field}={value}");
    }
    u32::try_from(value).with_context(|| format!("model '{id}' has out-of-range {field}={value}"))
}
