#![no_main]

use std::sync::{Arc, OnceLock};

use libfuzzer_sys::fuzz_target;
use keyset::core::config::{FactoryConfig, HashSpec, KeySetSpec};
use keyset::{Factory, KeySetHash};

fn factory() -> &'static Arc<Factory> {
    static FACTORY: OnceLock<Arc<Factory>> = OnceLock::new();
    FACTORY.get_or_init(|| {
        let config = FactoryConfig {
            keyset: KeySetSpec::interactive(),
            hash: HashSpec { hash_iterations: 4 },
            ..FactoryConfig::with_phrase("fuzz")
        };
        Arc::new(Factory::new(config).expect("valid config"))
    })
}

fuzz_target!(|data: &str| {
    // Parsing and unlocking with a fixed password should never panic
    if let Ok(hash) = KeySetHash::try_from(data) {
        let _ = hash.try_unlock(factory(), b"fuzz password");
    }
});
