use crate::model_catalog::ModelCatalog;

/// Merges a default catalog with an optional override catalog.
///
/// Absent override yields `defaults` unchanged. Otherwise the result is the
/// union of both id sets; on collision the override descriptor replaces the
/// default one as a whole (no field-level merge).
pub fn merge_model_catalogs(defaults: &ModelCatalog, overrides: Option<&ModelCatalog>) -> ModelCatalog {
    let mut merged = defaults.clone();
    if let Some(overrides) = overrides {
        merged.extend_overriding(overrides);
    }
    merged
}
