//! `Key` - keyed material tagged with its algorithm type.

use core::fmt::{self, Debug};

use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::core::algorithm::KeyType;
use crate::core::error::{KeySetError, KeySetResult};

/// Key bytes for a specific algorithm.
///
/// # Security
///
/// - Key material is zeroized on drop
/// - Debug output redacts the key
/// - Equality comparison uses constant-time comparison
///
/// # Example
///
/// ```rust
/// use keyset::core::algorithm::SymKeyType;
/// use keyset::core::types::Key;
///
/// let key = Key::new(SymKeyType::Aes, vec![0x42u8; 32]).expect("valid length");
/// assert_eq!(key.key_type(), SymKeyType::Aes);
/// assert_eq!(key.as_bytes().len(), 32);
/// ```
#[derive(Clone)]
pub struct Key<T: KeyType> {
    key_type: T,
    bytes: Vec<u8>,
}

impl<T: KeyType> Key<T> {
    /// Creates a key, checking the length matches the key type.
    pub fn new(key_type: T, mut bytes: Vec<u8>) -> KeySetResult<Self> {
        if bytes.len() != key_type.key_length() {
            bytes.zeroize();
            return Err(KeySetError::InvalidKey);
        }
        Ok(Self { key_type, bytes })
    }

    /// Creates a key from a slice.
    pub fn from_slice(key_type: T, bytes: &[u8]) -> KeySetResult<Self> {
        Self::new(key_type, bytes.to_vec())
    }

    /// Returns the algorithm type of this key.
    #[must_use]
    pub const fn key_type(&self) -> T {
        self.key_type
    }

    /// Returns a reference to the raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl<T: KeyType> AsRef<[u8]> for Key<T> {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl<T: KeyType> Drop for Key<T> {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

// =============================================================================
// Debug (security: don't expose key material)
// =============================================================================

impl<T: KeyType> Debug for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("key_type", &self.key_type)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

// =============================================================================
// PartialEq (constant-time comparison)
// =============================================================================

impl<T: KeyType> PartialEq for Key<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key_type == other.key_type && bool::from(self.bytes.ct_eq(&other.bytes))
    }
}

impl<T: KeyType> Eq for Key<T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::algorithm::{DigestType, MacType, StreamKeyType, SymKeyType};

    #[test]
    fn test_length_checked() {
        assert!(Key::new(SymKeyType::Sm4, vec![0u8; 16]).is_ok());
        assert!(matches!(
            Key::new(SymKeyType::Sm4, vec![0u8; 32]),
            Err(KeySetError::InvalidKey)
        ));
        assert!(Key::from_slice(MacType::HMac(DigestType::Sha2_512), &[1u8; 64]).is_ok());
    }

    #[test]
    fn test_equality() -> KeySetResult<()> {
        let first = Key::new(StreamKeyType::ChaCha20, vec![1u8; 32])?;
        let same = Key::new(StreamKeyType::ChaCha20, vec![1u8; 32])?;
        let other_bytes = Key::new(StreamKeyType::ChaCha20, vec![2u8; 32])?;
        let other_type = Key::new(StreamKeyType::Salsa20, vec![1u8; 32])?;
        assert_eq!(first, same);
        assert_ne!(first, other_bytes);
        assert_ne!(first, other_type);
        Ok(())
    }

    #[test]
    fn test_debug_redacts_key() -> KeySetResult<()> {
        let key = Key::new(SymKeyType::Aes, vec![0xABu8; 32])?;
        let debug_str = format!("{key:?}");
        assert!(debug_str.contains("[REDACTED]"));
        assert!(debug_str.contains("Aes"));
        assert!(!debug_str.contains("171"));
        Ok(())
    }
}
