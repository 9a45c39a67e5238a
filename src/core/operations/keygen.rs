//! Deterministic key derivation from a shared secret.
//!
//! Each key type gets its own HMac digest (picked from the IV and the type's
//! ordinal) and its own domain (the type name). A key is built from sections
//! of one MAC output length each; a section is `key_iterations` chained MAC
//! rounds XOR-folded together.

use zeroize::Zeroizing;

use crate::core::algorithm::{Algorithm, DigestType, KeyType};
use crate::core::error::KeySetResult;
use crate::core::factory::Factory;
use crate::core::operations::primitives::{hmac_engine, MacEngine};
use crate::core::types::Key;

/// Multiplier spreading key type ordinals across the digest seed space.
pub const HASH_PRIME: u32 = 16_777_619;

/// Length of the big-endian section counter.
const SECTION_COUNTER_LENGTH: usize = 4;

/// Reads a big-endian `u32` at `offset`, treating missing bytes as zero.
pub(crate) fn seed_at(bytes: &[u8], offset: usize) -> u32 {
    let mut value = [0u8; 4];
    for (index, slot) in value.iter_mut().enumerate() {
        *slot = bytes.get(offset + index).copied().unwrap_or(0);
    }
    u32::from_be_bytes(value)
}

/// XORs `hash` into `result`, cycling `hash` when it is shorter.
pub(crate) fn fold_hash(result: &mut [u8], hash: &[u8]) {
    if hash.is_empty() {
        return;
    }
    for (index, byte) in result.iter_mut().enumerate() {
        *byte ^= hash[index % hash.len()];
    }
}

/// Runs `rounds` chained MAC rounds starting from `input`, folding each output.
///
/// The MAC may already hold a prefix; it is consumed by the first round.
pub(crate) fn stretch(
    mac: &mut dyn MacEngine,
    input: &[u8],
    rounds: u32,
) -> Zeroizing<Vec<u8>> {
    let mut result = Zeroizing::new(vec![0u8; mac.output_length()]);
    let mut previous = Zeroizing::new(input.to_vec());

    for _ in 0..rounds {
        mac.update(&previous);
        let hash = Zeroizing::new(mac.finish());
        fold_hash(&mut result, &hash);
        previous = hash;
    }
    result
}

fn increment(counter: &mut [u8; SECTION_COUNTER_LENGTH]) {
    for byte in counter.iter_mut().rev() {
        *byte = byte.wrapping_add(1);
        if *byte != 0 {
            break;
        }
    }
}

/// Derives keys from `(secret, iv)` under a factory's personalisation.
pub struct KeyGenerator<'a> {
    factory: &'a Factory,
}

impl<'a> KeyGenerator<'a> {
    #[must_use]
    pub const fn new(factory: &'a Factory) -> Self {
        Self { factory }
    }

    /// HMac digest used for `key_type` under this IV.
    pub fn digest_for<T: KeyType>(&self, key_type: T, iv: &[u8]) -> KeySetResult<DigestType> {
        let seed = seed_at(iv, 0).wrapping_add(key_type.ordinal().wrapping_mul(HASH_PRIME));
        self.factory.ids().seeded_type(seed)
    }

    /// Derives the key of `key_type` for `(secret, iv)`.
    ///
    /// The same inputs under the same personalisation always give the same key.
    pub fn generate_key_from_secret<T: KeyType>(
        &self,
        key_type: T,
        secret: &[u8],
        iv: &[u8],
    ) -> KeySetResult<Key<T>> {
        let digest = self.digest_for(key_type, iv)?;
        let mut mac = hmac_engine(digest, secret)?;
        let iterations = self.factory.keyset_spec().key_iterations;
        let length = key_type.key_length();

        let mut output = Zeroizing::new(Vec::with_capacity(length));
        let mut counter = [0u8; SECTION_COUNTER_LENGTH];

        while output.len() < length {
            increment(&mut counter);
            mac.update(self.factory.personalisation().as_bytes());
            mac.update(key_type.name().as_bytes());
            mac.update(&counter);

            let section = stretch(&mut *mac, iv, iterations);
            let take = section.len().min(length - output.len());
            output.extend_from_slice(&section[..take]);
        }

        Key::from_slice(key_type, &output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::algorithm::{MacType, StreamKeyType, SymKeyType};
    use crate::core::config::{FactoryConfig, KeySetSpec};

    fn factory(phrase: &str) -> Factory {
        let config = FactoryConfig {
            keyset: KeySetSpec {
                cipher_steps: 3,
                key_iterations: 8,
            },
            ..FactoryConfig::with_phrase(phrase)
        };
        Factory::new(config).expect("valid config")
    }

    #[test]
    fn test_seed_at_pads_with_zero() {
        assert_eq!(seed_at(&[0x01, 0x02, 0x03, 0x04, 0x05], 1), 0x0203_0405);
        assert_eq!(seed_at(&[0xAA], 0), 0xAA00_0000);
        assert_eq!(seed_at(&[], 4), 0);
    }

    #[test]
    fn test_fold_hash_cycles() {
        let mut result = [0u8; 5];
        fold_hash(&mut result, &[1, 2]);
        assert_eq!(result, [1, 2, 1, 2, 1]);
        fold_hash(&mut result, &[]);
        assert_eq!(result, [1, 2, 1, 2, 1]);
    }

    #[test]
    fn test_counter_carries() {
        let mut counter = [0x00, 0x00, 0x00, 0xFF];
        increment(&mut counter);
        assert_eq!(counter, [0x00, 0x00, 0x01, 0x00]);
    }

    #[test]
    fn test_derivation_is_deterministic() -> KeySetResult<()> {
        let factory = factory("determinism");
        let generator = factory.key_generator();
        let first = generator.generate_key_from_secret(SymKeyType::Aes, b"secret", b"iv-bytes")?;
        let second = generator.generate_key_from_secret(SymKeyType::Aes, b"secret", b"iv-bytes")?;
        assert_eq!(first, second);

        let other_iv =
            generator.generate_key_from_secret(SymKeyType::Aes, b"secret", b"iv-bytez")?;
        let other_secret =
            generator.generate_key_from_secret(SymKeyType::Aes, b"secreT", b"iv-bytes")?;
        assert_ne!(first, other_iv);
        assert_ne!(first, other_secret);
        Ok(())
    }

    #[test]
    fn test_known_derived_keys() -> KeySetResult<()> {
        let factory = factory("golden");
        let generator = factory.key_generator();
        let iv: Vec<u8> = (0u8..16).collect();

        assert_eq!(generator.digest_for(SymKeyType::Aes, &iv)?, DigestType::Sha2_512);
        let aes = generator.generate_key_from_secret(SymKeyType::Aes, b"golden secret", &iv)?;
        assert_eq!(
            hex::encode(aes.as_bytes()),
            "8deaed35b0b1f001f7ce796cd8159eb3559c7bdf310d5e57779d7f7121de830c"
        );

        assert_eq!(generator.digest_for(SymKeyType::Sm4, &iv)?, DigestType::Blake2b512);
        let sm4 = generator.generate_key_from_secret(SymKeyType::Sm4, b"golden secret", &iv)?;
        assert_eq!(hex::encode(sm4.as_bytes()), "0ac57f9b9c17548a87617e024d91a4f8");

        assert_eq!(
            generator.digest_for(StreamKeyType::ChaCha20, &iv)?,
            DigestType::Sha3_256
        );
        let chacha =
            generator.generate_key_from_secret(StreamKeyType::ChaCha20, b"golden secret", &iv)?;
        assert_eq!(
            hex::encode(chacha.as_bytes()),
            "4a245463261dcc80562d64805caf469ab496bae66908ac3cef751a4c9c717bf3"
        );
        Ok(())
    }

    #[test]
    fn test_derivation_depends_on_personalisation() -> KeySetResult<()> {
        let first = factory("one").key_generator().generate_key_from_secret(
            StreamKeyType::ChaCha20,
            b"secret",
            b"iv",
        )?;
        let second = factory("two").key_generator().generate_key_from_secret(
            StreamKeyType::ChaCha20,
            b"secret",
            b"iv",
        )?;
        assert_ne!(first.as_bytes(), second.as_bytes());
        Ok(())
    }

    #[test]
    fn test_types_get_distinct_keys() -> KeySetResult<()> {
        let factory = factory("types");
        let generator = factory.key_generator();
        let aes = generator.generate_key_from_secret(SymKeyType::Aes, b"s", b"iv")?;
        let serpent = generator.generate_key_from_secret(SymKeyType::Serpent, b"s", b"iv")?;
        assert_ne!(aes.as_bytes(), serpent.as_bytes());
        Ok(())
    }

    #[test]
    fn test_multi_section_keys() -> KeySetResult<()> {
        let factory = factory("sections");
        let generator = factory.key_generator();
        // 64-byte MAC keys need two sections whenever the digest is 32 bytes wide.
        for mac_type in [
            MacType::HMac(DigestType::Sha2_512),
            MacType::HMac(DigestType::Blake2b512),
        ] {
            let key = generator.generate_key_from_secret(mac_type, b"s", b"iv")?;
            assert_eq!(key.as_bytes().len(), 64);
        }
        Ok(())
    }
}
