//! Factory and key set configuration.
//!
//! Parameter structs follow the usual three-profile shape:
//!
//! | Profile | Cipher steps | Key iterations | Hash iterations |
//! |---------|--------------|----------------|-----------------|
//! | `interactive()` | 2 | 256 | 512 |
//! | `moderate()` | 3 | 1024 | 2048 |
//! | `sensitive()` | 5 | 4096 | 8192 |

use crate::core::algorithm::{StreamKeyType, SymKeyType};
use crate::core::error::{KeySetError, KeySetResult};

/// Fewest block ciphers a key set chain may use.
pub const MIN_CIPHER_STEPS: u8 = 2;

/// Most block ciphers a key set chain may use.
pub const MAX_CIPHER_STEPS: u8 = 6;

/// Base string mixed into every personalisation.
pub const PERSONALISATION_BASE: &str = "keyset-personalisation.v1";

/// Key set parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KeySetSpec {
    /// Number of block ciphers chained per operation.
    pub cipher_steps: u8,
    /// HMac rounds per key section when deriving keys from a secret.
    pub key_iterations: u32,
}

impl Default for KeySetSpec {
    fn default() -> Self {
        Self::moderate()
    }
}

impl KeySetSpec {
    /// Interactive profile: two ciphers, light key stretching.
    #[must_use]
    pub const fn interactive() -> Self {
        Self {
            cipher_steps: 2,
            key_iterations: 256,
        }
    }

    /// Moderate profile: three ciphers.
    #[must_use]
    pub const fn moderate() -> Self {
        Self {
            cipher_steps: 3,
            key_iterations: 1024,
        }
    }

    /// Sensitive profile: five ciphers, heavy key stretching.
    #[must_use]
    pub const fn sensitive() -> Self {
        Self {
            cipher_steps: 5,
            key_iterations: 4096,
        }
    }

    /// Checks the parameters are within range.
    pub fn validate(&self) -> KeySetResult<()> {
        if !(MIN_CIPHER_STEPS..=MAX_CIPHER_STEPS).contains(&self.cipher_steps) {
            return Err(KeySetError::InvalidConfig(format!(
                "cipher steps must be in {MIN_CIPHER_STEPS}..={MAX_CIPHER_STEPS}, got {}",
                self.cipher_steps
            )));
        }
        if self.key_iterations == 0 {
            return Err(KeySetError::InvalidConfig(
                "key iterations must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Password hash parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HashSpec {
    /// Base number of HMac rounds; each hash adds a random adjustment of 0..16.
    pub hash_iterations: u32,
}

impl Default for HashSpec {
    fn default() -> Self {
        Self::moderate()
    }
}

impl HashSpec {
    /// Interactive profile.
    #[must_use]
    pub const fn interactive() -> Self {
        Self {
            hash_iterations: 512,
        }
    }

    /// Moderate profile.
    #[must_use]
    pub const fn moderate() -> Self {
        Self {
            hash_iterations: 2048,
        }
    }

    /// Sensitive profile.
    #[must_use]
    pub const fn sensitive() -> Self {
        Self {
            hash_iterations: 8192,
        }
    }
}

/// Configuration for a [`Factory`](crate::core::factory::Factory).
#[derive(Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FactoryConfig {
    /// Optional phrase personalising every shuffle and derivation.
    pub security_phrase: Option<String>,
    /// Key set parameters.
    pub keyset: KeySetSpec,
    /// Password hash parameters.
    pub hash: HashSpec,
    /// Block ciphers that must not be used inside key sets.
    pub excluded_sym_keys: Vec<SymKeyType>,
    /// Stream ciphers that must not be used inside key sets.
    pub excluded_stream_keys: Vec<StreamKeyType>,
}

impl FactoryConfig {
    /// Creates a configuration with the given security phrase.
    #[must_use]
    pub fn with_phrase(phrase: impl Into<String>) -> Self {
        Self {
            security_phrase: Some(phrase.into()),
            ..Self::default()
        }
    }

    /// Checks the configuration is usable.
    pub fn validate(&self) -> KeySetResult<()> {
        self.keyset.validate()?;
        if self.hash.hash_iterations == 0 {
            return Err(KeySetError::InvalidConfig(
                "hash iterations must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl core::fmt::Debug for FactoryConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FactoryConfig")
            .field(
                "security_phrase",
                &self.security_phrase.as_ref().map(|_| "[REDACTED]"),
            )
            .field("keyset", &self.keyset)
            .field("hash", &self.hash)
            .field("excluded_sym_keys", &self.excluded_sym_keys)
            .field("excluded_stream_keys", &self.excluded_stream_keys)
            .finish()
    }
}
