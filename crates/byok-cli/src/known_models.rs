use std::path::Path;

use anyhow::{Context, Result};
use byok_catalog::{parse_known_models_payload, ModelCatalog};

/// Loads the optional known-models file; `None` means no override source.
pub(crate) fn load_known_models(path: Option<&Path>) -> Result<Option<ModelCatalog>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let payload = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read known-models file {}", path.display()))?;
    let (catalog, dropped) = parse_known_models_payload(&payload)
        .with_context(|| format!("invalid known-models file {}", path.display()))?;
    for entry in &dropped {
        tracing::warn!(
            path = %path.display(),
            model = entry.id.as_str(),
            reason = entry.reason.as_str(),
            "dropping malformed known-models entry"
        );
    }
    Ok(Some(catalog))
}
