//! Chained multi-cipher.
//!
//! Encryption pushes data through a stream cipher and then through every
//! block cipher of the parameters in order:
//!
//! | Step | Encrypt | Decrypt |
//! |------|---------|---------|
//! | stream | keystream | keystream (last) |
//! | block 0 | ECB, ISO 7816-4 padding | ECB, strips padding |
//! | block 1..N-1 | ECB, no padding | ECB, no padding |
//! | block N-1 | CTR | CTR (first) |
//!
//! Every cipher gets its own IV, derived by an HMac over the parameters'
//! digest keyed with that cipher's key.
//!
//! Key wrapping ([`MultiCipher::secure_bytes`]) uses the same keys but
//! replaces the block chain with one [`WrapCipher`] per block cipher.

use zeroize::{Zeroize, Zeroizing};

use crate::core::algorithm::{Algorithm, DigestType, KeyType, StreamKeyType, SymKeyType};
use crate::core::error::{KeySetError, KeySetResult};
use crate::core::operations::primitives::{
    counter_engine, hmac_engine, BlockEngine, StreamEngine,
};
use crate::core::operations::wrap::WrapCipher;
use crate::core::personalisation::Personalisation;
use crate::core::recipe::KeySetParameters;
use crate::core::types::{Key, KeySet};

/// ISO 7816-4 padding marker.
const PADDING_MARKER: u8 = 0x80;

/// Direction of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

/// Derives the IV of one cipher in a chain.
///
/// HMac over `digest`, keyed with the cipher's key, over the cipher name, the
/// base IV and the personalisation; the output is cycled or cut to `length`.
pub fn calculate_init_vector<T: KeyType>(
    digest: DigestType,
    key: &Key<T>,
    base_iv: &[u8],
    personalisation: &Personalisation,
    length: usize,
) -> KeySetResult<Vec<u8>> {
    let mut mac = hmac_engine(digest, key.as_bytes())?;
    mac.update(key.key_type().name().as_bytes());
    mac.update(base_iv);
    mac.update(personalisation.as_bytes());
    let hash = Zeroizing::new(mac.finish());

    Ok((0..length).map(|index| hash[index % hash.len()]).collect())
}

/// Checks parameters against a key set.
///
/// # Errors
///
/// - `InvalidRecipeLength` if the number of block ciphers differs from the
///   configured step count
/// - `DuplicateKeyType` if a block cipher appears twice
/// - `UnsupportedKeyType` if the key set holds no key for a cipher
pub fn check_parameters(key_set: &KeySet, parameters: &KeySetParameters) -> KeySetResult<()> {
    let expected = usize::from(key_set.factory().keyset_spec().cipher_steps);
    let types = parameters.sym_key_types();
    if types.len() != expected {
        return Err(KeySetError::InvalidRecipeLength {
            expected,
            actual: types.len(),
        });
    }

    let mut seen = 0u32;
    for key_type in types {
        let bit = 1u32 << key_type.index();
        if seen & bit != 0 {
            return Err(KeySetError::DuplicateKeyType {
                key_type: key_type.name().to_string(),
            });
        }
        seen |= bit;

        if key_set.sym_key(*key_type).is_none() {
            return Err(missing(*key_type));
        }
    }

    if key_set.stream_key(parameters.stream_key_type()).is_none() {
        return Err(missing(parameters.stream_key_type()));
    }
    Ok(())
}

fn missing<T: Algorithm>(key_type: T) -> KeySetError {
    KeySetError::UnsupportedKeyType {
        key_type: key_type.name().to_string(),
    }
}

fn sym_key(key_set: &KeySet, key_type: SymKeyType) -> KeySetResult<&Key<SymKeyType>> {
    key_set.sym_key(key_type).ok_or_else(|| missing(key_type))
}

fn stream_key(key_set: &KeySet, key_type: StreamKeyType) -> KeySetResult<&Key<StreamKeyType>> {
    key_set.stream_key(key_type).ok_or_else(|| missing(key_type))
}

/// Builds the keyed stream cipher of a parameter set.
fn keystream(key_set: &KeySet, parameters: &KeySetParameters) -> KeySetResult<Box<dyn StreamEngine>> {
    let key_type = parameters.stream_key_type();
    let key = stream_key(key_set, key_type)?;
    let iv = calculate_init_vector(
        parameters.digest_type(),
        key,
        parameters.init_vector(),
        key_set.factory().personalisation(),
        key_type.iv_length(),
    )?;
    key_set.factory().create_stream_cipher(key, &iv)
}

// =============================================================================
// Chain steps
// =============================================================================

trait ChainStep: Send {
    /// Transforms as much of `input` as possible, appending to `output`.
    fn update(&mut self, input: &[u8], output: &mut Vec<u8>) -> KeySetResult<()>;

    /// Flushes held-back data, appending to `output`.
    fn finish(&mut self, output: &mut Vec<u8>) -> KeySetResult<()>;
}

struct KeystreamStep {
    engine: Box<dyn StreamEngine>,
}

impl ChainStep for KeystreamStep {
    fn update(&mut self, input: &[u8], output: &mut Vec<u8>) -> KeySetResult<()> {
        let start = output.len();
        output.extend_from_slice(input);
        self.engine.apply_keystream(&mut output[start..]);
        Ok(())
    }

    fn finish(&mut self, _output: &mut Vec<u8>) -> KeySetResult<()> {
        Ok(())
    }
}

struct EcbStep {
    engine: Box<dyn BlockEngine>,
    direction: Direction,
    padded: bool,
    pending: Zeroizing<Vec<u8>>,
}

impl EcbStep {
    fn new(engine: Box<dyn BlockEngine>, direction: Direction, padded: bool) -> Self {
        Self {
            engine,
            direction,
            padded,
            pending: Zeroizing::new(Vec::new()),
        }
    }

    fn process(&self, block: &mut [u8]) -> KeySetResult<()> {
        match self.direction {
            Direction::Encrypt => self.engine.encrypt_block(block),
            Direction::Decrypt => self.engine.decrypt_block(block),
        }
    }
}

impl ChainStep for EcbStep {
    fn update(&mut self, input: &[u8], output: &mut Vec<u8>) -> KeySetResult<()> {
        self.pending.extend_from_slice(input);

        let block = self.engine.block_length();
        let mut ready = self.pending.len() / block * block;
        // The last full block may carry padding; hold it until `finish`.
        if self.padded && self.direction == Direction::Decrypt && ready == self.pending.len() {
            ready = ready.saturating_sub(block);
        }

        for chunk in self.pending[..ready].chunks_exact(block) {
            let start = output.len();
            output.extend_from_slice(chunk);
            self.process(&mut output[start..])?;
        }
        self.pending.drain(..ready);
        Ok(())
    }

    fn finish(&mut self, output: &mut Vec<u8>) -> KeySetResult<()> {
        let block = self.engine.block_length();

        match (self.direction, self.padded) {
            (Direction::Encrypt, true) => {
                self.pending.push(PADDING_MARKER);
                self.pending.resize(block, 0);
                let start = output.len();
                output.extend_from_slice(&self.pending);
                self.process(&mut output[start..])?;
            }
            (Direction::Decrypt, true) => {
                if self.pending.len() != block {
                    return Err(KeySetError::InvalidBlockLength {
                        block,
                        actual: self.pending.len(),
                    });
                }
                let mut last = Zeroizing::new(self.pending.to_vec());
                self.process(&mut last)?;

                let marker = last
                    .iter()
                    .rposition(|byte| *byte != 0)
                    .filter(|index| last[*index] == PADDING_MARKER)
                    .ok_or(KeySetError::InvalidPadding)?;
                output.extend_from_slice(&last[..marker]);
            }
            (_, false) => {
                if !self.pending.is_empty() {
                    return Err(KeySetError::InvalidBlockLength {
                        block,
                        actual: self.pending.len(),
                    });
                }
            }
        }

        self.pending.zeroize();
        Ok(())
    }
}

// =============================================================================
// MultiCipher
// =============================================================================

/// A keyed cipher chain for one direction.
///
/// Built per operation; `update` may be called any number of times before a
/// single `finish`.
pub struct MultiCipher {
    steps: Vec<Box<dyn ChainStep>>,
    ping: Vec<u8>,
    pong: Vec<u8>,
}

impl MultiCipher {
    /// Builds the chain for `parameters` over the keys of `key_set`.
    pub fn new(
        key_set: &KeySet,
        parameters: &KeySetParameters,
        direction: Direction,
    ) -> KeySetResult<Self> {
        check_parameters(key_set, parameters)?;

        let factory = key_set.factory();
        let types = parameters.sym_key_types();
        let mut steps: Vec<Box<dyn ChainStep>> = Vec::with_capacity(types.len() + 1);

        steps.push(Box::new(KeystreamStep {
            engine: keystream(key_set, parameters)?,
        }));

        for (index, key_type) in types.iter().enumerate() {
            let key = sym_key(key_set, *key_type)?;
            let step: Box<dyn ChainStep> = if index == 0 {
                Box::new(EcbStep::new(factory.create_sym_cipher(key)?, direction, true))
            } else if index == types.len() - 1 {
                let iv = calculate_init_vector(
                    parameters.digest_type(),
                    key,
                    parameters.init_vector(),
                    factory.personalisation(),
                    key_type.block_length(),
                )?;
                Box::new(KeystreamStep {
                    engine: counter_engine(*key_type, key.as_bytes(), &iv)?,
                })
            } else {
                Box::new(EcbStep::new(factory.create_sym_cipher(key)?, direction, false))
            };
            steps.push(step);
        }

        if direction == Direction::Decrypt {
            steps.reverse();
        }

        Ok(Self {
            steps,
            ping: Vec::new(),
            pong: Vec::new(),
        })
    }

    /// Pushes `data` through every step.
    pub fn update(&mut self, data: &[u8]) -> KeySetResult<&[u8]> {
        self.ping.clear();
        self.ping.extend_from_slice(data);

        for step in &mut self.steps {
            self.pong.clear();
            step.update(&self.ping, &mut self.pong)?;
            core::mem::swap(&mut self.ping, &mut self.pong);
        }
        Ok(&self.ping)
    }

    /// Flushes every step in order.
    pub fn finish(&mut self) -> KeySetResult<&[u8]> {
        self.ping.clear();

        for step in &mut self.steps {
            self.pong.clear();
            step.update(&self.ping, &mut self.pong)?;
            step.finish(&mut self.pong)?;
            core::mem::swap(&mut self.ping, &mut self.pong);
        }
        Ok(&self.ping)
    }

    /// Runs `data` through a fresh chain in one call.
    pub fn process(
        key_set: &KeySet,
        parameters: &KeySetParameters,
        direction: Direction,
        data: &[u8],
    ) -> KeySetResult<Vec<u8>> {
        let mut cipher = Self::new(key_set, parameters, direction)?;
        let mut output = cipher.update(data)?.to_vec();
        output.extend_from_slice(cipher.finish()?);
        Ok(output)
    }

    /// Wraps `data`: keystream, then one wrap per block cipher in order.
    pub fn secure_bytes(
        key_set: &KeySet,
        parameters: &KeySetParameters,
        data: &[u8],
    ) -> KeySetResult<Vec<u8>> {
        check_parameters(key_set, parameters)?;

        let mut buffer = Zeroizing::new(data.to_vec());
        keystream(key_set, parameters)?.apply_keystream(&mut buffer);

        for key_type in parameters.sym_key_types() {
            let key = sym_key(key_set, *key_type)?;
            let wrap = WrapCipher::new(key_set.factory().create_sym_cipher(key)?);
            buffer = Zeroizing::new(wrap.secure_bytes(&buffer)?);
        }
        Ok(core::mem::take(&mut *buffer))
    }

    /// Inverse of [`secure_bytes`](Self::secure_bytes).
    pub fn derive_bytes(
        key_set: &KeySet,
        parameters: &KeySetParameters,
        data: &[u8],
    ) -> KeySetResult<Zeroizing<Vec<u8>>> {
        check_parameters(key_set, parameters)?;

        let mut buffer = Zeroizing::new(data.to_vec());
        for key_type in parameters.sym_key_types().iter().rev() {
            let key = sym_key(key_set, *key_type)?;
            let wrap = WrapCipher::new(key_set.factory().create_sym_cipher(key)?);
            buffer = wrap.derive_bytes(&buffer)?;
        }

        keystream(key_set, parameters)?.apply_keystream(&mut buffer);
        Ok(buffer)
    }
}

impl Drop for MultiCipher {
    fn drop(&mut self) {
        self.ping.zeroize();
        self.pong.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::core::config::{FactoryConfig, KeySetSpec};
    use crate::core::factory::Factory;

    fn key_set(steps: u8) -> KeySet {
        let config = FactoryConfig {
            keyset: KeySetSpec {
                cipher_steps: steps,
                key_iterations: 4,
            },
            ..FactoryConfig::with_phrase("multi")
        };
        let factory = Arc::new(Factory::new(config).expect("valid config"));
        KeySet::build_from_secret(factory, b"multi secret", b"multi iv").expect("key set")
    }

    fn parameters(key_set: &KeySet, types: Vec<SymKeyType>) -> KeySetParameters {
        KeySetParameters::new(key_set.factory(), types, vec![0x42; 16]).expect("parameters")
    }

    fn sample(key_set: &KeySet) -> KeySetParameters {
        let steps = usize::from(key_set.factory().keyset_spec().cipher_steps);
        parameters(key_set, SymKeyType::catalog()[..steps].to_vec())
    }

    #[test]
    fn test_chain_roundtrip() -> KeySetResult<()> {
        for steps in 2u8..=6 {
            let key_set = key_set(steps);
            let params = sample(&key_set);
            for length in [0usize, 1, 15, 16, 17, 100] {
                let data: Vec<u8> = (0..length).map(|index| index as u8).collect();
                let encrypted = MultiCipher::process(&key_set, &params, Direction::Encrypt, &data)?;
                assert_eq!(encrypted.len(), (length / 16 + 1) * 16);
                let decrypted =
                    MultiCipher::process(&key_set, &params, Direction::Decrypt, &encrypted)?;
                assert_eq!(decrypted, data, "steps {steps}, length {length}");
            }
        }
        Ok(())
    }

    #[test]
    fn test_every_cipher_in_counter_position() -> KeySetResult<()> {
        let key_set = key_set(2);
        let data = b"every cipher may close the chain".to_vec();
        for last in SymKeyType::catalog() {
            let first = if *last == SymKeyType::Aes {
                SymKeyType::Twofish
            } else {
                SymKeyType::Aes
            };
            let params = parameters(&key_set, vec![first, *last]);
            let encrypted = MultiCipher::process(&key_set, &params, Direction::Encrypt, &data)?;
            let decrypted =
                MultiCipher::process(&key_set, &params, Direction::Decrypt, &encrypted)?;
            assert_eq!(decrypted, data, "{last} in counter position");
        }
        Ok(())
    }

    #[test]
    fn test_chunked_updates_match_one_shot() -> KeySetResult<()> {
        let key_set = key_set(3);
        let params = sample(&key_set);
        let data: Vec<u8> = (0u8..=200).collect();
        let one_shot = MultiCipher::process(&key_set, &params, Direction::Encrypt, &data)?;

        let mut cipher = MultiCipher::new(&key_set, &params, Direction::Encrypt)?;
        let mut chunked = Vec::new();
        for chunk in data.chunks(7) {
            chunked.extend_from_slice(cipher.update(chunk)?);
        }
        chunked.extend_from_slice(cipher.finish()?);
        assert_eq!(chunked, one_shot);

        let mut cipher = MultiCipher::new(&key_set, &params, Direction::Decrypt)?;
        let mut restored = Vec::new();
        for chunk in one_shot.chunks(16) {
            restored.extend_from_slice(cipher.update(chunk)?);
        }
        restored.extend_from_slice(cipher.finish()?);
        assert_eq!(restored, data);
        Ok(())
    }

    #[test]
    fn test_iv_changes_output() -> KeySetResult<()> {
        let key_set = key_set(2);
        let types = SymKeyType::catalog()[..2].to_vec();
        let first = KeySetParameters::new(key_set.factory(), types.clone(), vec![1; 16])?;
        let second = KeySetParameters::new(key_set.factory(), types, vec![2; 16])?;
        let data = [0u8; 48];
        assert_ne!(
            MultiCipher::process(&key_set, &first, Direction::Encrypt, &data)?,
            MultiCipher::process(&key_set, &second, Direction::Encrypt, &data)?
        );
        Ok(())
    }

    #[test]
    fn test_misaligned_ciphertext_rejected() -> KeySetResult<()> {
        let key_set = key_set(2);
        let params = sample(&key_set);
        let result = MultiCipher::process(&key_set, &params, Direction::Decrypt, &[0u8; 17]);
        assert!(matches!(
            result,
            Err(KeySetError::InvalidBlockLength { block: 16, .. })
        ));
        Ok(())
    }

    #[test]
    fn test_check_parameters() {
        let key_set = key_set(3);

        let short = parameters(&key_set, vec![SymKeyType::Aes, SymKeyType::Aria]);
        assert!(matches!(
            check_parameters(&key_set, &short),
            Err(KeySetError::InvalidRecipeLength {
                expected: 3,
                actual: 2
            })
        ));

        let repeated = parameters(
            &key_set,
            vec![SymKeyType::Aes, SymKeyType::Sm4, SymKeyType::Aes],
        );
        assert!(matches!(
            check_parameters(&key_set, &repeated),
            Err(KeySetError::DuplicateKeyType { .. })
        ));

        let fine = parameters(
            &key_set,
            vec![SymKeyType::Serpent, SymKeyType::Sm4, SymKeyType::Aes],
        );
        assert!(check_parameters(&key_set, &fine).is_ok());
    }

    #[test]
    fn test_missing_key_rejected() -> KeySetResult<()> {
        let source = key_set(2);
        let mut partial = KeySet::new(Arc::clone(source.factory_arc()));
        for key_type in source.factory().ids().stream_key_types() {
            if let Some(key) = source.stream_key(*key_type) {
                partial.declare_stream_key(key.clone())?;
            }
        }
        let aes = source.sym_key(SymKeyType::Aes).cloned();
        if let Some(key) = aes {
            partial.declare_sym_key(key)?;
        }

        let params = parameters(&source, vec![SymKeyType::Aes, SymKeyType::Twofish]);
        assert!(matches!(
            check_parameters(&partial, &params),
            Err(KeySetError::UnsupportedKeyType { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_wrap_roundtrip_and_length() -> KeySetResult<()> {
        let key_set = key_set(3);
        let params = sample(&key_set);
        let data = [0x5Au8; 17];

        let secured = MultiCipher::secure_bytes(&key_set, &params, &data)?;
        // 17 -> 32 -> 40 -> 48
        assert_eq!(secured.len(), 48);
        let derived = MultiCipher::derive_bytes(&key_set, &params, &secured)?;
        assert_eq!(derived.as_slice(), &data);
        Ok(())
    }

    #[test]
    fn test_wrap_tamper_detected() -> KeySetResult<()> {
        let key_set = key_set(2);
        let params = sample(&key_set);
        let mut secured = MultiCipher::secure_bytes(&key_set, &params, b"wrapped key bytes")?;
        secured[5] ^= 0x80;
        assert!(matches!(
            MultiCipher::derive_bytes(&key_set, &params, &secured),
            Err(KeySetError::IntegrityCheckFailed)
        ));
        Ok(())
    }

    #[test]
    fn test_init_vector_cycles() -> KeySetResult<()> {
        let key_set = key_set(2);
        let key = key_set
            .stream_key(StreamKeyType::XSalsa20)
            .ok_or(KeySetError::InvalidKey)?;
        let personal = key_set.factory().personalisation();

        let long = calculate_init_vector(DigestType::Sha2_256, key, b"iv", personal, 40)?;
        assert_eq!(&long[..8], &long[32..40]);
        let short = calculate_init_vector(DigestType::Sha2_256, key, b"iv", personal, 12)?;
        assert_eq!(&short[..], &long[..12]);
        Ok(())
    }
}
