//! Error types for key set operations.
//!
//! This module provides a unified error type for all key set operations.
//! Variants carry enough structured context (algorithm names, lengths, ids)
//! to diagnose a failure without re-running it, but never carry key material.

use thiserror::Error;

/// Errors that can occur when building or using key sets.
#[derive(Debug, Error)]
pub enum KeySetError {
    /// The algorithm is not available in the current catalog or provider.
    #[error("Unsupported algorithm: {name}")]
    UnsupportedAlgorithm {
        /// Name of the algorithm that was requested.
        name: String,
    },

    /// An external id does not map to any algorithm.
    #[error("Invalid algorithm id: {id}")]
    InvalidId {
        /// The offending external id.
        id: u64,
    },

    /// Not enough supported algorithms to satisfy a selection.
    #[error("Insufficient algorithm types: required {required}, available {available}")]
    InsufficientTypes {
        /// Number of types requested.
        required: usize,
        /// Number of types that passed the supported predicate.
        available: usize,
    },

    /// The factory configuration is inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The wrapped data failed its integrity check.
    /// Intentionally vague for security.
    #[error("Integrity check failed")]
    IntegrityCheckFailed,

    /// The input is shorter than its framing requires.
    #[error("Buffer too short: needed {needed} bytes, got {actual}")]
    BufferTooShort {
        /// Minimum number of bytes required.
        needed: usize,
        /// Number of bytes supplied.
        actual: usize,
    },

    /// The recipe header does not describe a valid recipe.
    #[error("Invalid recipe length: expected {expected}, got {actual}")]
    InvalidRecipeLength {
        /// Expected step count or length.
        expected: usize,
        /// Value found in the recipe.
        actual: usize,
    },

    /// ISO 7816-4 padding could not be removed.
    #[error("Invalid padding")]
    InvalidPadding,

    /// Unpadded block mode received a partial block.
    #[error("Data is not block aligned: block size {block}, length {actual}")]
    InvalidBlockLength {
        /// Block size of the cipher.
        block: usize,
        /// Length that was supplied.
        actual: usize,
    },

    /// Base64 decoding error.
    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// The password does not match the stored hash.
    #[error("Invalid credentials")]
    BadCredentials,

    /// A declared key contradicts the key already held for its type.
    #[error("Conflicting key declared for {key_type}")]
    KeyConflict {
        /// Name of the key type.
        key_type: String,
    },

    /// The key set holds no key for the requested type.
    #[error("Unsupported key type: {key_type}")]
    UnsupportedKeyType {
        /// Name of the key type.
        key_type: String,
    },

    /// A key type was selected more than once.
    #[error("Duplicate key type: {key_type}")]
    DuplicateKeyType {
        /// Name of the key type.
        key_type: String,
    },

    /// The key material is invalid (wrong size, wrong type).
    #[error("Invalid key material")]
    InvalidKey,

    /// The hash blob exceeds the maximum external size.
    #[error("Hash too large: {length} bytes exceeds {max}")]
    HashTooLarge {
        /// Computed blob length.
        length: usize,
        /// Maximum allowed length.
        max: usize,
    },

    /// The payload does not fit the wrapped length field.
    #[error("Payload too large: {length} bytes exceeds {max}")]
    PayloadTooLarge {
        /// Length of the payload.
        length: usize,
        /// Largest length that can be wrapped.
        max: usize,
    },

    /// The random source could not be used.
    #[error("Random source failure")]
    RandomFailure,

    /// Encryption did not survive its own decryption.
    #[error("Encryption self-check failed")]
    SelfCheckFailed,
}

impl KeySetError {
    pub(crate) fn unsupported(name: impl Into<String>) -> Self {
        Self::UnsupportedAlgorithm { name: name.into() }
    }
}

/// Result type alias for key set operations.
pub type KeySetResult<T> = Result<T, KeySetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = KeySetError::unsupported("Twofish");
        assert_eq!(err.to_string(), "Unsupported algorithm: Twofish");

        let err = KeySetError::InvalidId { id: 99 };
        assert_eq!(err.to_string(), "Invalid algorithm id: 99");

        let err = KeySetError::InsufficientTypes {
            required: 4,
            available: 2,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient algorithm types: required 4, available 2"
        );

        let err = KeySetError::IntegrityCheckFailed;
        assert_eq!(err.to_string(), "Integrity check failed");

        let err = KeySetError::BufferTooShort {
            needed: 18,
            actual: 3,
        };
        assert_eq!(err.to_string(), "Buffer too short: needed 18 bytes, got 3");

        let err = KeySetError::BadCredentials;
        assert_eq!(err.to_string(), "Invalid credentials");

        let err = KeySetError::KeyConflict {
            key_type: "Aes".to_string(),
        };
        assert_eq!(err.to_string(), "Conflicting key declared for Aes");

        let err = KeySetError::HashTooLarge {
            length: 120,
            max: 98,
        };
        assert_eq!(err.to_string(), "Hash too large: 120 bytes exceeds 98");
    }

    #[test]
    fn test_error_debug() {
        let err = KeySetError::InvalidPadding;
        let debug_str = format!("{err:?}");
        assert!(debug_str.contains("InvalidPadding"));
    }
}
