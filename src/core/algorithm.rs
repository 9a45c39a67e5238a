//! Algorithm catalogs.
//!
//! Each algorithm family is a fixed, ordered catalog. The declaration order
//! below is part of the wire format: personalised shuffles permute these
//! slices, and a shuffled position is what ends up in a recipe. Catalogs are
//! capped at 16 entries so that a position always fits in one nibble.

use core::fmt::{self, Debug, Display};
use core::hash::Hash;

use crate::core::id_manager::IdManager;

mod private {
    pub trait Sealed {}
}

/// Maximum number of entries in any catalog.
pub const MAX_CATALOG_SIZE: usize = 16;

/// Block size shared by every symmetric key type in the catalog.
pub const SYM_BLOCK_LENGTH: usize = 16;

/// Family an algorithm belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// Block ciphers.
    Symmetric,
    /// Stream ciphers.
    Stream,
    /// Message digests.
    Digest,
    /// Message authentication codes.
    Mac,
}

impl Family {
    /// Tag stored alongside a position in family-qualified external ids.
    #[must_use]
    pub const fn tag(self) -> u32 {
        match self {
            Self::Symmetric => 1,
            Self::Stream => 2,
            Self::Digest => 3,
            Self::Mac => 4,
        }
    }

    /// Personalisation location used to seed this family's shuffle.
    #[must_use]
    pub const fn shuffle_location(self) -> usize {
        match self {
            Self::Symmetric => 0,
            Self::Stream => 1,
            Self::Digest => 2,
            Self::Mac => 3,
        }
    }

    const fn ordinal_base(self) -> u32 {
        self.tag() * MAX_CATALOG_SIZE as u32
    }
}

/// An entry of a fixed algorithm catalog.
///
/// This trait is sealed and cannot be implemented outside of this crate.
pub trait Algorithm:
    private::Sealed + Copy + Eq + Ord + Hash + Debug + Display + Send + Sync + 'static
{
    /// The family of this catalog.
    const FAMILY: Family;

    /// The full catalog in declaration order.
    fn catalog() -> &'static [Self];

    /// Stable name fed into derivations.
    fn name(&self) -> &'static str;

    /// This family's personalised catalog.
    #[doc(hidden)]
    fn shuffled(ids: &IdManager) -> &[Self];

    /// Index of this entry in the unshuffled catalog.
    fn index(&self) -> usize {
        Self::catalog()
            .iter()
            .position(|candidate| candidate == self)
            .unwrap_or(0)
    }

    /// Ordinal unique across all families.
    fn ordinal(&self) -> u32 {
        Self::FAMILY.ordinal_base() + self.index() as u32
    }
}

/// An algorithm that is keyed.
pub trait KeyType: Algorithm {
    /// Key length in bytes.
    fn key_length(&self) -> usize;
}

// =============================================================================
// Symmetric (block) key types
// =============================================================================

/// Block cipher key types. All have 128-bit blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SymKeyType {
    /// AES-256.
    Aes,
    /// Twofish-256.
    Twofish,
    /// Serpent-256.
    Serpent,
    /// Camellia-256.
    Camellia,
    /// SM4 (128-bit key).
    Sm4,
    /// ARIA-256.
    Aria,
}

impl SymKeyType {
    /// Block length in bytes.
    #[must_use]
    pub const fn block_length(self) -> usize {
        SYM_BLOCK_LENGTH
    }
}

impl private::Sealed for SymKeyType {}

impl Algorithm for SymKeyType {
    const FAMILY: Family = Family::Symmetric;

    fn shuffled(ids: &IdManager) -> &[Self] {
        ids.sym_key_types()
    }

    fn catalog() -> &'static [Self] {
        &[
            Self::Aes,
            Self::Twofish,
            Self::Serpent,
            Self::Camellia,
            Self::Sm4,
            Self::Aria,
        ]
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Aes => "AES",
            Self::Twofish => "Twofish",
            Self::Serpent => "Serpent",
            Self::Camellia => "Camellia",
            Self::Sm4 => "SM4",
            Self::Aria => "ARIA",
        }
    }
}

impl KeyType for SymKeyType {
    fn key_length(&self) -> usize {
        match self {
            Self::Sm4 => 16,
            _ => 32,
        }
    }
}

// =============================================================================
// Stream key types
// =============================================================================

/// Stream cipher key types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StreamKeyType {
    /// ChaCha20 (IETF, 96-bit nonce).
    ChaCha20,
    /// XChaCha20 (192-bit nonce).
    XChaCha20,
    /// Salsa20 (64-bit nonce).
    Salsa20,
    /// XSalsa20 (192-bit nonce).
    XSalsa20,
}

impl StreamKeyType {
    /// IV length in bytes.
    #[must_use]
    pub const fn iv_length(self) -> usize {
        match self {
            Self::ChaCha20 => 12,
            Self::XChaCha20 | Self::XSalsa20 => 24,
            Self::Salsa20 => 8,
        }
    }
}

impl private::Sealed for StreamKeyType {}

impl Algorithm for StreamKeyType {
    const FAMILY: Family = Family::Stream;

    fn shuffled(ids: &IdManager) -> &[Self] {
        ids.stream_key_types()
    }

    fn catalog() -> &'static [Self] {
        &[Self::ChaCha20, Self::XChaCha20, Self::Salsa20, Self::XSalsa20]
    }

    fn name(&self) -> &'static str {
        match self {
            Self::ChaCha20 => "ChaCha20",
            Self::XChaCha20 => "XChaCha20",
            Self::Salsa20 => "Salsa20",
            Self::XSalsa20 => "XSalsa20",
        }
    }
}

impl KeyType for StreamKeyType {
    fn key_length(&self) -> usize {
        32
    }
}

// =============================================================================
// Digest types
// =============================================================================

/// Message digest types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DigestType {
    /// SHA-256.
    Sha2_256,
    /// SHA-384.
    Sha2_384,
    /// SHA-512.
    Sha2_512,
    /// SHA3-256.
    Sha3_256,
    /// SHA3-512.
    Sha3_512,
    /// BLAKE2b with 512-bit output.
    Blake2b512,
    /// BLAKE2s with 256-bit output.
    Blake2s256,
}

impl DigestType {
    /// Output length in bytes.
    #[must_use]
    pub const fn output_length(self) -> usize {
        match self {
            Self::Sha2_256 | Self::Sha3_256 | Self::Blake2s256 => 32,
            Self::Sha2_384 => 48,
            Self::Sha2_512 | Self::Sha3_512 | Self::Blake2b512 => 64,
        }
    }
}

impl private::Sealed for DigestType {}

impl Algorithm for DigestType {
    const FAMILY: Family = Family::Digest;

    fn shuffled(ids: &IdManager) -> &[Self] {
        ids.digest_types()
    }

    fn catalog() -> &'static [Self] {
        &[
            Self::Sha2_256,
            Self::Sha2_384,
            Self::Sha2_512,
            Self::Sha3_256,
            Self::Sha3_512,
            Self::Blake2b512,
            Self::Blake2s256,
        ]
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Sha2_256 => "SHA2-256",
            Self::Sha2_384 => "SHA2-384",
            Self::Sha2_512 => "SHA2-512",
            Self::Sha3_256 => "SHA3-256",
            Self::Sha3_512 => "SHA3-512",
            Self::Blake2b512 => "BLAKE2b-512",
            Self::Blake2s256 => "BLAKE2s-256",
        }
    }
}

// =============================================================================
// MAC types
// =============================================================================

/// Message authentication code types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MacType {
    /// HMAC over the given digest.
    HMac(DigestType),
    /// Keyed BLAKE2b-512.
    Blake2bMac,
    /// Keyed BLAKE2s-256.
    Blake2sMac,
}

impl MacType {
    /// Output length in bytes.
    #[must_use]
    pub const fn output_length(self) -> usize {
        match self {
            Self::HMac(digest) => digest.output_length(),
            Self::Blake2bMac => 64,
            Self::Blake2sMac => 32,
        }
    }
}

impl private::Sealed for MacType {}

impl Algorithm for MacType {
    const FAMILY: Family = Family::Mac;

    fn shuffled(ids: &IdManager) -> &[Self] {
        ids.mac_types()
    }

    fn catalog() -> &'static [Self] {
        &[
            Self::HMac(DigestType::Sha2_256),
            Self::HMac(DigestType::Sha2_384),
            Self::HMac(DigestType::Sha2_512),
            Self::HMac(DigestType::Sha3_256),
            Self::HMac(DigestType::Sha3_512),
            Self::HMac(DigestType::Blake2b512),
            Self::HMac(DigestType::Blake2s256),
            Self::Blake2bMac,
            Self::Blake2sMac,
        ]
    }

    fn name(&self) -> &'static str {
        match self {
            Self::HMac(DigestType::Sha2_256) => "HMac-SHA2-256",
            Self::HMac(DigestType::Sha2_384) => "HMac-SHA2-384",
            Self::HMac(DigestType::Sha2_512) => "HMac-SHA2-512",
            Self::HMac(DigestType::Sha3_256) => "HMac-SHA3-256",
            Self::HMac(DigestType::Sha3_512) => "HMac-SHA3-512",
            Self::HMac(DigestType::Blake2b512) => "HMac-BLAKE2b-512",
            Self::HMac(DigestType::Blake2s256) => "HMac-BLAKE2s-256",
            Self::Blake2bMac => "BLAKE2bMac",
            Self::Blake2sMac => "BLAKE2sMac",
        }
    }
}

impl KeyType for MacType {
    fn key_length(&self) -> usize {
        match self {
            Self::HMac(digest) => digest.output_length(),
            Self::Blake2bMac | Self::Blake2sMac => 32,
        }
    }
}

macro_rules! display_by_name {
    ($($ty:ty),*) => {
        $(
            impl Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.name())
                }
            }
        )*
    };
}

display_by_name!(SymKeyType, StreamKeyType, DigestType, MacType);

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_catalog<T: Algorithm>() {
        let catalog = T::catalog();
        assert!(!catalog.is_empty());
        assert!(catalog.len() <= MAX_CATALOG_SIZE);
        for (index, entry) in catalog.iter().enumerate() {
            assert_eq!(entry.index(), index);
        }
    }

    #[test]
    fn test_catalog_bounds() {
        assert_catalog::<SymKeyType>();
        assert_catalog::<StreamKeyType>();
        assert_catalog::<DigestType>();
        assert_catalog::<MacType>();
    }

    #[test]
    fn test_ordinals_unique_across_families() {
        let mut ordinals: Vec<u32> = SymKeyType::catalog()
            .iter()
            .map(Algorithm::ordinal)
            .chain(StreamKeyType::catalog().iter().map(Algorithm::ordinal))
            .chain(DigestType::catalog().iter().map(Algorithm::ordinal))
            .chain(MacType::catalog().iter().map(Algorithm::ordinal))
            .collect();
        let total = ordinals.len();
        ordinals.sort_unstable();
        ordinals.dedup();
        assert_eq!(ordinals.len(), total);
    }

    #[test]
    fn test_key_lengths() {
        assert_eq!(SymKeyType::Aes.key_length(), 32);
        assert_eq!(SymKeyType::Sm4.key_length(), 16);
        assert_eq!(StreamKeyType::Salsa20.iv_length(), 8);
        assert_eq!(MacType::HMac(DigestType::Sha2_384).key_length(), 48);
    }

    #[test]
    fn test_display_uses_name() {
        assert_eq!(SymKeyType::Camellia.to_string(), "Camellia");
        assert_eq!(MacType::Blake2sMac.to_string(), "BLAKE2sMac");
    }
}
