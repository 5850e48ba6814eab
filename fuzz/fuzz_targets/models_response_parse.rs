#![no_main]

use byok_catalog::{iflow_default_model_catalog, parse_models_response};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    if let Ok(fetched) = parse_models_response(&raw, iflow_default_model_catalog()) {
        for descriptor in fetched.catalog.descriptors() {
            assert!(!descriptor.id.trim().is_empty());
            assert!(descriptor.max_input_tokens > 0);
            assert!(descriptor.max_output_tokens > 0);
        }
    }
});
