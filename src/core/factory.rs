//! The `Factory` - personalised capability surface for key sets.
//!
//! A factory owns everything a key set needs besides its keys: the validated
//! configuration, the personalisation, the shuffled catalogs and a CSPRNG.
//! All primitive construction goes through it.
//!
//! # Example
//!
//! ```rust
//! use keyset::core::config::FactoryConfig;
//! use keyset::core::factory::Factory;
//!
//! let factory = Factory::new(FactoryConfig::with_phrase("correct horse")).expect("valid config");
//! let bytes = factory.random_bytes(16).expect("rng");
//! assert_eq!(bytes.len(), 16);
//! ```

use std::sync::Mutex;

use digest::DynDigest;
use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rand_core::{OsRng, TryRngCore};
use zeroize::Zeroize;

use crate::core::algorithm::{Algorithm, DigestType, KeyType, MacType, StreamKeyType, SymKeyType};
use crate::core::config::{FactoryConfig, HashSpec, KeySetSpec};
use crate::core::error::{KeySetError, KeySetResult};
use crate::core::id_manager::IdManager;
use crate::core::operations::keygen::KeyGenerator;
use crate::core::operations::primitives::{
    block_engine, digest_engine, mac_engine, stream_engine, BlockEngine, MacEngine, StreamEngine,
};
use crate::core::personalisation::Personalisation;
use crate::core::types::Key;

/// Personalised source of primitives, ids and randomness.
///
/// `Factory` is `Send + Sync`; key sets share one through an `Arc`.
pub struct Factory {
    config: FactoryConfig,
    personalisation: Personalisation,
    ids: IdManager,
    random: Mutex<ChaCha20Rng>,
}

impl Factory {
    /// Builds a factory from a configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for out-of-range parameters, `InsufficientTypes`
    /// when the exclusions leave too few ciphers, or `RandomFailure` if the OS
    /// random source is unavailable.
    pub fn new(config: FactoryConfig) -> KeySetResult<Self> {
        config.validate()?;

        let personalisation =
            Personalisation::new(config.security_phrase.as_deref().map(str::as_bytes));
        let ids = IdManager::new(
            &personalisation,
            |key_type| !config.excluded_sym_keys.contains(key_type),
            |key_type| !config.excluded_stream_keys.contains(key_type),
        );

        let steps = usize::from(config.keyset.cipher_steps);
        if ids.sym_key_types().len() < steps {
            return Err(KeySetError::InsufficientTypes {
                required: steps,
                available: ids.sym_key_types().len(),
            });
        }
        if ids.stream_key_types().is_empty() {
            return Err(KeySetError::InsufficientTypes {
                required: 1,
                available: 0,
            });
        }

        let random = ChaCha20Rng::try_from_os_rng().map_err(|_| KeySetError::RandomFailure)?;

        tracing::debug!(
            cipher_steps = steps,
            sym_key_types = ids.sym_key_types().len(),
            stream_key_types = ids.stream_key_types().len(),
            personalised = config.security_phrase.is_some(),
            "created keyset factory"
        );

        Ok(Self {
            config,
            personalisation,
            ids,
            random: Mutex::new(random),
        })
    }

    /// Builds a factory with the default configuration and no phrase.
    pub fn with_defaults() -> KeySetResult<Self> {
        Self::new(FactoryConfig::default())
    }

    /// The configuration this factory was built with.
    #[must_use]
    pub const fn config(&self) -> &FactoryConfig {
        &self.config
    }

    /// Key set parameters.
    #[must_use]
    pub const fn keyset_spec(&self) -> &KeySetSpec {
        &self.config.keyset
    }

    /// Password hash parameters.
    #[must_use]
    pub const fn hash_spec(&self) -> &HashSpec {
        &self.config.hash
    }

    #[must_use]
    pub const fn personalisation(&self) -> &Personalisation {
        &self.personalisation
    }

    #[must_use]
    pub const fn ids(&self) -> &IdManager {
        &self.ids
    }

    /// A key generator bound to this factory.
    #[must_use]
    pub const fn key_generator(&self) -> KeyGenerator<'_> {
        KeyGenerator::new(self)
    }

    // =========================================================================
    // Randomness
    // =========================================================================

    /// Fills a fresh buffer with random bytes.
    pub fn random_bytes(&self, length: usize) -> KeySetResult<Vec<u8>> {
        let mut bytes = vec![0u8; length];
        self.random
            .lock()
            .map_err(|_| KeySetError::RandomFailure)?
            .fill_bytes(&mut bytes);
        Ok(bytes)
    }

    /// Draws a random `u32`.
    pub fn random_u32(&self) -> KeySetResult<u32> {
        Ok(self
            .random
            .lock()
            .map_err(|_| KeySetError::RandomFailure)?
            .next_u32())
    }

    /// Replaces the CSPRNG with one freshly seeded from the OS.
    pub fn reseed_random(&self) -> KeySetResult<()> {
        let mut seed = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut seed)
            .map_err(|_| KeySetError::RandomFailure)?;
        let fresh = ChaCha20Rng::from_seed(seed);
        seed.zeroize();

        *self.random.lock().map_err(|_| KeySetError::RandomFailure)? = fresh;
        tracing::debug!("reseeded keyset factory random source");
        Ok(())
    }

    // =========================================================================
    // Capabilities
    // =========================================================================

    /// Whether key sets from this factory may use `key_type`.
    #[must_use]
    pub fn is_sym_key_supported(&self, key_type: SymKeyType) -> bool {
        self.ids.sym_key_types().contains(&key_type)
    }

    /// Whether key sets from this factory may use `key_type`.
    #[must_use]
    pub fn is_stream_key_supported(&self, key_type: StreamKeyType) -> bool {
        self.ids.stream_key_types().contains(&key_type)
    }

    #[must_use]
    pub fn create_digest(&self, digest: DigestType) -> Box<dyn DynDigest + Send> {
        digest_engine(digest)
    }

    pub fn create_mac(&self, key: &Key<MacType>) -> KeySetResult<Box<dyn MacEngine>> {
        mac_engine(key.key_type(), key.as_bytes())
    }

    pub fn create_sym_cipher(&self, key: &Key<SymKeyType>) -> KeySetResult<Box<dyn BlockEngine>> {
        block_engine(key.key_type(), key.as_bytes())
    }

    pub fn create_stream_cipher(
        &self,
        key: &Key<StreamKeyType>,
        iv: &[u8],
    ) -> KeySetResult<Box<dyn StreamEngine>> {
        stream_engine(key.key_type(), key.as_bytes(), iv)
    }

    /// Generates a fresh random key.
    pub fn generate_key<T: KeyType>(&self, key_type: T) -> KeySetResult<Key<T>> {
        let bytes = self.random_bytes(key_type.key_length())?;
        tracing::trace!(key_type = key_type.name(), "generated random key");
        Key::new(key_type, bytes)
    }
}

impl core::fmt::Debug for Factory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Factory")
            .field("config", &self.config)
            .field("personalisation", &self.personalisation)
            .finish_non_exhaustive()
    }
}
