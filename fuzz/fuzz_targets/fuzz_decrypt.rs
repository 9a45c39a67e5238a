#![no_main]

use std::sync::{Arc, OnceLock};

use libfuzzer_sys::fuzz_target;
use keyset::core::config::{FactoryConfig, KeySetSpec};
use keyset::{Factory, KeySet};

fn key_set() -> &'static KeySet {
    static KEY_SET: OnceLock<KeySet> = OnceLock::new();
    KEY_SET.get_or_init(|| {
        let config = FactoryConfig {
            keyset: KeySetSpec::interactive(),
            ..FactoryConfig::with_phrase("fuzz")
        };
        let factory = Arc::new(Factory::new(config).expect("valid config"));
        KeySet::build_from_secret(factory, b"fuzz secret", b"fuzz iv").expect("key set")
    })
}

fuzz_target!(|data: &[u8]| {
    // Arbitrary blobs must be rejected, never panic
    let _ = key_set().decrypt_bytes(data);
});
