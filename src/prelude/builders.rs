//! Builder patterns for factories.
//!
//! This module provides a fluent builder over [`FactoryConfig`] with the
//! same preset profiles as the parameter structs.
//!
//! # Security Profiles
//!
//! | Profile | Cipher steps | Key iterations | Hash iterations | Use Case |
//! |---------|--------------|----------------|-----------------|----------|
//! | `interactive()` | 2 | 256 | 512 | Fast, interactive unlocks |
//! | `moderate()` | 3 | 1024 | 2048 | Balanced security (default) |
//! | `sensitive()` | 5 | 4096 | 8192 | Long-term storage |
//!
//! # Example
//!
//! ```rust
//! use keyset::prelude::*;
//!
//! // Use a preset profile
//! let factory = FactoryBuilder::interactive()
//!     .security_phrase("my application")
//!     .try_build()
//!     .expect("valid config");
//!
//! // Or customize parameters
//! let factory = FactoryBuilder::new()
//!     .cipher_steps(4)
//!     .key_iterations(2048)
//!     .exclude_sym_key(SymKeyType::Sm4)
//!     .try_build()
//!     .expect("valid config");
//! ```

use std::sync::Arc;

use crate::core::algorithm::{StreamKeyType, SymKeyType};
use crate::core::config::{FactoryConfig, HashSpec, KeySetSpec};
use crate::core::error::KeySetResult;
use crate::core::factory::Factory;

/// Builder for a [`Factory`].
///
/// # Example
///
/// ```rust
/// use keyset::prelude::*;
///
/// let factory = FactoryBuilder::moderate()
///     .hash_iterations(4096)
///     .try_build_shared()
///     .expect("valid config");
/// let key_set = KeySet::generate(factory).expect("keys");
/// # let _ = key_set;
/// ```
#[derive(Debug, Clone, Default)]
pub struct FactoryBuilder {
    config: FactoryConfig,
}

impl FactoryBuilder {
    /// Creates a new builder with default (moderate) parameters.
    ///
    /// Equivalent to calling `FactoryBuilder::moderate()`.
    #[must_use]
    pub fn new() -> Self {
        Self::moderate()
    }

    /// Interactive profile: two ciphers, light stretching.
    #[must_use]
    pub fn interactive() -> Self {
        Self::with_specs(KeySetSpec::interactive(), HashSpec::interactive())
    }

    /// Moderate profile: three ciphers.
    ///
    /// This is the recommended default for most applications.
    #[must_use]
    pub fn moderate() -> Self {
        Self::with_specs(KeySetSpec::moderate(), HashSpec::moderate())
    }

    /// Sensitive profile: five ciphers, heavy stretching.
    #[must_use]
    pub fn sensitive() -> Self {
        Self::with_specs(KeySetSpec::sensitive(), HashSpec::sensitive())
    }

    fn with_specs(keyset: KeySetSpec, hash: HashSpec) -> Self {
        Self {
            config: FactoryConfig {
                keyset,
                hash,
                ..FactoryConfig::default()
            },
        }
    }

    /// Sets the security phrase personalising the factory.
    ///
    /// Factories built with different phrases cannot read each other's blobs.
    #[must_use]
    pub fn security_phrase(mut self, phrase: impl Into<String>) -> Self {
        self.config.security_phrase = Some(phrase.into());
        self
    }

    /// Sets the number of block ciphers per chain.
    #[must_use]
    pub fn cipher_steps(mut self, steps: u8) -> Self {
        self.config.keyset.cipher_steps = steps;
        self
    }

    /// Sets the HMac rounds per key section.
    #[must_use]
    pub fn key_iterations(mut self, iterations: u32) -> Self {
        self.config.keyset.key_iterations = iterations;
        self
    }

    /// Sets the base password stretching rounds.
    #[must_use]
    pub fn hash_iterations(mut self, iterations: u32) -> Self {
        self.config.hash.hash_iterations = iterations;
        self
    }

    /// Keeps a block cipher out of key sets.
    #[must_use]
    pub fn exclude_sym_key(mut self, key_type: SymKeyType) -> Self {
        if !self.config.excluded_sym_keys.contains(&key_type) {
            self.config.excluded_sym_keys.push(key_type);
        }
        self
    }

    /// Keeps a stream cipher out of key sets.
    #[must_use]
    pub fn exclude_stream_key(mut self, key_type: StreamKeyType) -> Self {
        if !self.config.excluded_stream_keys.contains(&key_type) {
            self.config.excluded_stream_keys.push(key_type);
        }
        self
    }

    /// Returns the configuration built so far.
    #[must_use]
    pub const fn config(&self) -> &FactoryConfig {
        &self.config
    }

    /// Builds the factory.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn try_build(self) -> KeySetResult<Factory> {
        Factory::new(self.config)
    }

    /// Builds the factory behind an `Arc`, ready for key sets.
    pub fn try_build_shared(self) -> KeySetResult<Arc<Factory>> {
        self.try_build().map(Arc::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::KeySetError;

    #[test]
    fn test_presets() {
        assert_eq!(
            FactoryBuilder::interactive().config().keyset,
            KeySetSpec::interactive()
        );
        assert_eq!(FactoryBuilder::new().config().hash, HashSpec::moderate());
        assert_eq!(
            FactoryBuilder::sensitive().config().keyset.cipher_steps,
            5
        );
    }

    #[test]
    fn test_builder_chain() {
        let builder = FactoryBuilder::new()
            .security_phrase("phrase")
            .cipher_steps(4)
            .key_iterations(10)
            .hash_iterations(20)
            .exclude_sym_key(SymKeyType::Aria)
            .exclude_sym_key(SymKeyType::Aria)
            .exclude_stream_key(StreamKeyType::Salsa20);

        let config = builder.config();
        assert_eq!(config.security_phrase.as_deref(), Some("phrase"));
        assert_eq!(config.keyset.cipher_steps, 4);
        assert_eq!(config.keyset.key_iterations, 10);
        assert_eq!(config.hash.hash_iterations, 20);
        assert_eq!(config.excluded_sym_keys, vec![SymKeyType::Aria]);
        assert_eq!(config.excluded_stream_keys, vec![StreamKeyType::Salsa20]);
    }

    #[test]
    fn test_build() -> KeySetResult<()> {
        let factory = FactoryBuilder::interactive()
            .exclude_sym_key(SymKeyType::Twofish)
            .try_build()?;
        assert!(!factory.is_sym_key_supported(SymKeyType::Twofish));
        Ok(())
    }

    #[test]
    fn test_invalid_build() {
        let result = FactoryBuilder::new().cipher_steps(1).try_build();
        assert!(matches!(result, Err(KeySetError::InvalidConfig(_))));
    }
}
