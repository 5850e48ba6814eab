#![no_main]

use byok_catalog::{merge_model_catalogs, parse_known_models_payload};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    if let Ok((catalog, _dropped)) = parse_known_models_payload(&raw) {
        for descriptor in catalog.descriptors() {
            assert!(descriptor.max_input_tokens > 0);
            assert!(descriptor.max_output_tokens > 0);
        }
        let merged = merge_model_catalogs(&catalog, Some(&catalog));
        assert_eq!(merged, catalog);
    }
});
