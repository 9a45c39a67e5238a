//! `KeySet` - one key per supported cipher, composed into a single transform.

use std::collections::BTreeMap;
use std::sync::Arc;

use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::core::algorithm::{Algorithm, KeyType, StreamKeyType, SymKeyType};
use crate::core::config::KeySetSpec;
use crate::core::error::{KeySetError, KeySetResult};
use crate::core::factory::Factory;
use crate::core::operations::multi::{Direction, MultiCipher};
use crate::core::recipe::KeySetRecipe;
use crate::core::types::{Key, PrivateKeySpec};

/// Length of the random secret behind [`KeySet::generate`].
pub const GENERATED_SECRET_LENGTH: usize = 32;

/// Length of the random IV behind [`KeySet::generate`].
pub const GENERATED_IV_LENGTH: usize = 16;

/// Id marking wrapped private keys; outside every algorithm family.
const PRIVATE_KEY_ID: u32 = 0x500;

/// Length of the type id prefixing wrapped keys.
const TYPE_ID_LENGTH: usize = 8;

/// A set of block and stream cipher keys.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
///
/// use keyset::core::config::{FactoryConfig, KeySetSpec};
/// use keyset::core::factory::Factory;
/// use keyset::core::types::KeySet;
///
/// let config = FactoryConfig {
///     keyset: KeySetSpec::interactive(),
///     ..FactoryConfig::with_phrase("docs")
/// };
/// let factory = Arc::new(Factory::new(config).expect("valid config"));
/// let key_set = KeySet::build_from_secret(factory, b"shared secret", b"salt").expect("keys");
///
/// let blob = key_set.encrypt_bytes(b"The quick brown fox").expect("encrypt");
/// let plain = key_set.decrypt_bytes(&blob).expect("decrypt");
/// assert_eq!(plain, b"The quick brown fox");
/// ```
#[derive(Clone)]
pub struct KeySet {
    factory: Arc<Factory>,
    sym_keys: BTreeMap<SymKeyType, Key<SymKeyType>>,
    stream_keys: BTreeMap<StreamKeyType, Key<StreamKeyType>>,
}

impl KeySet {
    /// Creates an empty key set; keys are added with the `declare_*` methods.
    #[must_use]
    pub fn new(factory: Arc<Factory>) -> Self {
        Self {
            factory,
            sym_keys: BTreeMap::new(),
            stream_keys: BTreeMap::new(),
        }
    }

    /// Derives one key per supported cipher from `(secret, iv)`.
    ///
    /// The same secret and IV under the same factory personalisation always
    /// give the same key set.
    pub fn build_from_secret(factory: Arc<Factory>, secret: &[u8], iv: &[u8]) -> KeySetResult<Self> {
        let mut key_set = Self::new(factory);
        let factory = Arc::clone(&key_set.factory);
        let generator = factory.key_generator();

        for key_type in factory.ids().sym_key_types() {
            let key = generator.generate_key_from_secret(*key_type, secret, iv)?;
            key_set.sym_keys.insert(*key_type, key);
        }
        for key_type in factory.ids().stream_key_types() {
            let key = generator.generate_key_from_secret(*key_type, secret, iv)?;
            key_set.stream_keys.insert(*key_type, key);
        }

        tracing::debug!(
            sym_keys = key_set.sym_keys.len(),
            stream_keys = key_set.stream_keys.len(),
            "built key set from secret"
        );
        Ok(key_set)
    }

    /// Builds a key set from a fresh random secret and IV.
    pub fn generate(factory: Arc<Factory>) -> KeySetResult<Self> {
        let secret = Zeroizing::new(factory.random_bytes(GENERATED_SECRET_LENGTH)?);
        let iv = factory.random_bytes(GENERATED_IV_LENGTH)?;
        Self::build_from_secret(factory, &secret, &iv)
    }

    #[must_use]
    pub fn factory(&self) -> &Factory {
        &self.factory
    }

    /// The shared factory handle.
    #[must_use]
    pub const fn factory_arc(&self) -> &Arc<Factory> {
        &self.factory
    }

    #[must_use]
    pub fn spec(&self) -> &KeySetSpec {
        self.factory.keyset_spec()
    }

    #[must_use]
    pub fn sym_key(&self, key_type: SymKeyType) -> Option<&Key<SymKeyType>> {
        self.sym_keys.get(&key_type)
    }

    #[must_use]
    pub fn stream_key(&self, key_type: StreamKeyType) -> Option<&Key<StreamKeyType>> {
        self.stream_keys.get(&key_type)
    }

    // =========================================================================
    // Key declaration
    // =========================================================================

    /// Adds a block cipher key.
    ///
    /// Declaring the key already held is a no-op.
    ///
    /// # Errors
    ///
    /// `UnsupportedKeyType` if the factory excludes the type, `KeyConflict` if
    /// a different key is already held for it.
    pub fn declare_sym_key(&mut self, key: Key<SymKeyType>) -> KeySetResult<()> {
        if !self.factory.is_sym_key_supported(key.key_type()) {
            return Err(KeySetError::UnsupportedKeyType {
                key_type: key.key_type().name().to_string(),
            });
        }
        declare(&mut self.sym_keys, key)
    }

    /// Adds a stream cipher key. Same rules as [`declare_sym_key`](Self::declare_sym_key).
    pub fn declare_stream_key(&mut self, key: Key<StreamKeyType>) -> KeySetResult<()> {
        if !self.factory.is_stream_key_supported(key.key_type()) {
            return Err(KeySetError::UnsupportedKeyType {
                key_type: key.key_type().name().to_string(),
            });
        }
        declare(&mut self.stream_keys, key)
    }

    // =========================================================================
    // Encryption
    // =========================================================================

    /// Encrypts `data` under random ciphers and a fresh IV.
    pub fn encrypt_bytes(&self, data: &[u8]) -> KeySetResult<Vec<u8>> {
        let recipe = KeySetRecipe::build_random(&self.factory)?;
        let encrypted = MultiCipher::process(self, recipe.parameters(), Direction::Encrypt, data)?;
        let external = recipe.build_external(&self.factory, &encrypted)?;

        #[cfg(feature = "self-check")]
        {
            let check = self.decrypt_bytes(&external)?;
            if !bool::from(check.ct_eq(data)) {
                tracing::warn!("encryption self-check failed");
                return Err(KeySetError::SelfCheckFailed);
            }
        }

        Ok(external)
    }

    /// Decrypts a blob produced by [`encrypt_bytes`](Self::encrypt_bytes).
    pub fn decrypt_bytes(&self, blob: &[u8]) -> KeySetResult<Vec<u8>> {
        let (recipe, data) = KeySetRecipe::parse(&self.factory, blob)?;
        MultiCipher::process(self, recipe.parameters(), Direction::Decrypt, &data)
    }

    // =========================================================================
    // Key wrapping
    // =========================================================================

    /// Wraps a key together with its type.
    ///
    /// The blob length depends only on the key length and the step count.
    pub fn secure_key<T: KeyType>(&self, key: &Key<T>) -> KeySetResult<Vec<u8>> {
        let type_id = self.factory.ids().encode_type_id(key.key_type())?;
        self.secure_payload(type_id, key.as_bytes())
    }

    /// Unwraps a key produced by [`secure_key`](Self::secure_key).
    ///
    /// # Errors
    ///
    /// `IntegrityCheckFailed` for a tampered blob or a blob from another key
    /// set, `InvalidKey` if the blob holds a key of a different type.
    pub fn derive_key<T: KeyType>(&self, blob: &[u8], key_type: T) -> KeySetResult<Key<T>> {
        let (type_id, key) = self.derive_payload(blob)?;
        let wrapped_type: T = self.factory.ids().decode_type_id(type_id)?;
        if wrapped_type != key_type {
            return Err(KeySetError::InvalidKey);
        }
        Key::from_slice(key_type, &key)
    }

    /// Wraps encoded private key bytes.
    pub fn secure_private_key(&self, key: &PrivateKeySpec) -> KeySetResult<Vec<u8>> {
        let type_id = self.factory.ids().knuth().encode(PRIVATE_KEY_ID);
        self.secure_payload(type_id, key.as_bytes())
    }

    /// Unwraps private key bytes produced by [`secure_private_key`](Self::secure_private_key).
    pub fn derive_private_key_spec(&self, blob: &[u8]) -> KeySetResult<PrivateKeySpec> {
        let (type_id, key) = self.derive_payload(blob)?;
        if self.factory.ids().knuth().decode(type_id)? != PRIVATE_KEY_ID {
            return Err(KeySetError::InvalidKey);
        }
        Ok(PrivateKeySpec::from(key.as_slice()))
    }

    fn secure_payload(&self, type_id: u64, key: &[u8]) -> KeySetResult<Vec<u8>> {
        let mut payload = Zeroizing::new(Vec::with_capacity(TYPE_ID_LENGTH + key.len()));
        payload.extend_from_slice(&type_id.to_be_bytes());
        payload.extend_from_slice(key);

        let recipe = KeySetRecipe::build_random_without_iv(&self.factory)?;
        let secured = MultiCipher::secure_bytes(self, recipe.parameters(), &payload)?;
        recipe.build_external(&self.factory, &secured)
    }

    fn derive_payload(&self, blob: &[u8]) -> KeySetResult<(u64, Zeroizing<Vec<u8>>)> {
        let (recipe, data) = KeySetRecipe::parse(&self.factory, blob)?;
        let payload = MultiCipher::derive_bytes(self, recipe.parameters(), &data)?;
        if payload.len() < TYPE_ID_LENGTH {
            return Err(KeySetError::IntegrityCheckFailed);
        }

        let mut type_id = [0u8; TYPE_ID_LENGTH];
        type_id.copy_from_slice(&payload[..TYPE_ID_LENGTH]);
        Ok((
            u64::from_be_bytes(type_id),
            Zeroizing::new(payload[TYPE_ID_LENGTH..].to_vec()),
        ))
    }
}

fn declare<T: KeyType>(keys: &mut BTreeMap<T, Key<T>>, key: Key<T>) -> KeySetResult<()> {
    match keys.get(&key.key_type()) {
        Some(held) if bool::from(held.as_bytes().ct_eq(key.as_bytes())) => Ok(()),
        Some(_) => {
            tracing::warn!(key_type = key.key_type().name(), "conflicting key declared");
            Err(KeySetError::KeyConflict {
                key_type: key.key_type().name().to_string(),
            })
        }
        None => {
            keys.insert(key.key_type(), key);
            Ok(())
        }
    }
}

impl core::fmt::Debug for KeySet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KeySet")
            .field("sym_keys", &self.sym_keys.keys().collect::<Vec<_>>())
            .field("stream_keys", &self.stream_keys.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::algorithm::{DigestType, MacType};
    use crate::core::config::FactoryConfig;

    fn factory() -> Arc<Factory> {
        let config = FactoryConfig {
            keyset: KeySetSpec {
                cipher_steps: 3,
                key_iterations: 4,
            },
            ..FactoryConfig::with_phrase("key sets")
        };
        Arc::new(Factory::new(config).expect("valid config"))
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_key_set_is_send_sync() {
        assert_send_sync::<KeySet>();
    }

    #[test]
    fn test_one_key_per_supported_type() -> KeySetResult<()> {
        let key_set = KeySet::build_from_secret(factory(), b"secret", b"iv")?;
        for key_type in SymKeyType::catalog() {
            assert!(key_set.sym_key(*key_type).is_some(), "{key_type} missing");
        }
        for key_type in StreamKeyType::catalog() {
            assert!(key_set.stream_key(*key_type).is_some(), "{key_type} missing");
        }
        Ok(())
    }

    #[test]
    fn test_same_secret_same_keys() -> KeySetResult<()> {
        let factory = factory();
        let first = KeySet::build_from_secret(Arc::clone(&factory), b"secret", b"iv")?;
        let second = KeySet::build_from_secret(factory, b"secret", b"iv")?;
        for key_type in SymKeyType::catalog() {
            assert_eq!(first.sym_key(*key_type), second.sym_key(*key_type));
        }
        Ok(())
    }

    #[test]
    fn test_encrypt_roundtrip() -> KeySetResult<()> {
        let key_set = KeySet::generate(factory())?;
        let blob = key_set.encrypt_bytes(b"The quick brown fox")?;
        assert_eq!(key_set.decrypt_bytes(&blob)?, b"The quick brown fox".to_vec());
        Ok(())
    }

    #[test]
    fn test_encryption_is_randomised() -> KeySetResult<()> {
        let key_set = KeySet::generate(factory())?;
        assert_ne!(key_set.encrypt_bytes(b"same")?, key_set.encrypt_bytes(b"same")?);
        Ok(())
    }

    #[test]
    fn test_secure_key_roundtrip() -> KeySetResult<()> {
        let factory = factory();
        let key_set = KeySet::generate(Arc::clone(&factory))?;

        let mac = factory.generate_key(MacType::HMac(DigestType::Sha3_256))?;
        let blob = key_set.secure_key(&mac)?;
        assert_eq!(key_set.derive_key(&blob, mac.key_type())?, mac);

        let sym = factory.generate_key(SymKeyType::Sm4)?;
        let blob = key_set.secure_key(&sym)?;
        assert_eq!(key_set.derive_key(&blob, SymKeyType::Sm4)?, sym);
        Ok(())
    }

    #[test]
    fn test_derive_key_checks_type() -> KeySetResult<()> {
        let factory = factory();
        let key_set = KeySet::generate(Arc::clone(&factory))?;
        let key = factory.generate_key(SymKeyType::Aes)?;
        let blob = key_set.secure_key(&key)?;

        assert!(matches!(
            key_set.derive_key(&blob, SymKeyType::Camellia),
            Err(KeySetError::InvalidKey)
        ));
        assert!(matches!(
            key_set.derive_key(&blob, StreamKeyType::ChaCha20),
            Err(KeySetError::InvalidId { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_private_key_roundtrip() -> KeySetResult<()> {
        let key_set = KeySet::generate(factory())?;
        let spec = PrivateKeySpec::new((0u8..=120).collect());
        let blob = key_set.secure_private_key(&spec)?;
        assert_eq!(key_set.derive_private_key_spec(&blob)?, spec);
        Ok(())
    }

    #[test]
    fn test_declare_keys() -> KeySetResult<()> {
        let factory = factory();
        let mut key_set = KeySet::new(Arc::clone(&factory));
        let key = factory.generate_key(SymKeyType::Twofish)?;

        key_set.declare_sym_key(key.clone())?;
        key_set.declare_sym_key(key.clone())?;
        assert_eq!(key_set.sym_key(SymKeyType::Twofish), Some(&key));

        let other = factory.generate_key(SymKeyType::Twofish)?;
        assert!(matches!(
            key_set.declare_sym_key(other),
            Err(KeySetError::KeyConflict { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_declare_excluded_type() -> KeySetResult<()> {
        let config = FactoryConfig {
            excluded_stream_keys: vec![StreamKeyType::Salsa20],
            ..FactoryConfig::default()
        };
        let factory = Arc::new(Factory::new(config)?);
        let mut key_set = KeySet::new(Arc::clone(&factory));
        let key = factory.generate_key(StreamKeyType::Salsa20)?;
        assert!(matches!(
            key_set.declare_stream_key(key),
            Err(KeySetError::UnsupportedKeyType { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_debug_lists_types_only() -> KeySetResult<()> {
        let key_set = KeySet::build_from_secret(factory(), b"secret", b"iv")?;
        let debug_str = format!("{key_set:?}");
        assert!(debug_str.contains("Aes"));
        assert!(!debug_str.contains("bytes"));
        Ok(())
    }
}
