//! Per-factory personalisation.
//!
//! A fixed 64-byte fingerprint derived from a constant base string and the
//! optional security phrase. Every shuffle, the Knuth prime and the cipher
//! indentation are read from it, so two factories built with the same phrase
//! agree on every external id and blob layout.

use core::fmt::{self, Debug};

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::core::algorithm::{Algorithm, DigestType};
use crate::core::config::PERSONALISATION_BASE;
use crate::core::operations::primitives::digest_engine;

/// Length of the personalisation in bytes.
pub const PERSONALISATION_LENGTH: usize = 64;

/// Location of the Knuth prime seed.
pub const KNUTH_LOCATION: usize = 4;

/// Location of the cipher indentation.
pub const INDENT_LOCATION: usize = 5;

/// Smallest cipher indentation, also the tail margin kept after an IV splice.
pub const MIN_INDENT: usize = 4;

/// Number of distinct indentation values above the minimum.
const INDENT_RANGE: u32 = 32;

/// Passes over the digest catalog.
const PERSONALISATION_ROUNDS: u32 = 4;

/// Fixed per-factory fingerprint.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Personalisation {
    bytes: [u8; PERSONALISATION_LENGTH],
}

impl Personalisation {
    /// Derives the personalisation for an optional security phrase.
    #[must_use]
    pub fn new(phrase: Option<&[u8]>) -> Self {
        let mut bytes = [0u8; PERSONALISATION_LENGTH];
        let mut previous: Vec<u8> = Vec::new();
        let mut offset = 0usize;

        for round in 0..PERSONALISATION_ROUNDS {
            for digest_type in DigestType::catalog() {
                let mut digest = digest_engine(*digest_type);
                digest.update(PERSONALISATION_BASE.as_bytes());
                if let Some(phrase) = phrase {
                    digest.update(phrase);
                }
                digest.update(&previous);
                digest.update(&round.to_be_bytes());
                let hash = digest.finalize();

                for (index, value) in hash.iter().enumerate() {
                    bytes[(offset + index) % PERSONALISATION_LENGTH] ^= value;
                }
                offset = (offset + hash.len()) % PERSONALISATION_LENGTH;

                previous.zeroize();
                previous = hash.into_vec();
            }
        }
        previous.zeroize();

        Self { bytes }
    }

    /// Returns the raw personalisation bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; PERSONALISATION_LENGTH] {
        &self.bytes
    }

    /// Reads the big-endian integer at `location`, wrapping at the end.
    #[must_use]
    pub fn int_at(&self, location: usize) -> u32 {
        let start = location * 4;
        let mut value = 0u32;
        for index in 0..4 {
            value = (value << 8) | u32::from(self.bytes[(start + index) % PERSONALISATION_LENGTH]);
        }
        value
    }

    /// Reads the byte at `location`, wrapping at the end.
    #[must_use]
    pub fn byte_at(&self, location: usize) -> u8 {
        self.bytes[location % PERSONALISATION_LENGTH]
    }

    /// Offset at which IVs are spliced into ciphertext.
    #[must_use]
    pub fn cipher_indentation(&self) -> usize {
        MIN_INDENT + (self.int_at(INDENT_LOCATION) % INDENT_RANGE) as usize
    }

    /// Seed for the Knuth obfuscation prime.
    #[must_use]
    pub fn knuth_seed(&self) -> u32 {
        self.int_at(KNUTH_LOCATION)
    }
}

impl Debug for Personalisation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Personalisation")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_phrase_same_bytes() {
        let first = Personalisation::new(Some(b"phrase"));
        let second = Personalisation::new(Some(b"phrase"));
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn test_known_personalisation() {
        let personal = Personalisation::new(Some(b"golden"));
        assert_eq!(
            hex::encode(personal.as_bytes()),
            "8128cf24a9f7c6e507817a18709f98a1d648baef26b725b0a21a1150634f6ddf\
             4e05e2a7bfb3e51075d4a390019ab0ddfc5bb81285f861438fffa97a1f22608d"
        );
        assert_eq!(personal.knuth_seed(), 0xD648_BAEF);
        assert_eq!(personal.cipher_indentation(), 20);

        let plain = Personalisation::new(None);
        assert_eq!(hex::encode(&plain.as_bytes()[..8]), "f37b029dda627aeb");
    }

    #[test]
    fn test_phrase_changes_bytes() {
        let plain = Personalisation::new(None);
        let phrased = Personalisation::new(Some(b"phrase"));
        let other = Personalisation::new(Some(b"phrase2"));
        assert_ne!(plain.as_bytes(), phrased.as_bytes());
        assert_ne!(phrased.as_bytes(), other.as_bytes());
    }

    #[test]
    fn test_int_at_wraps() {
        let personal = Personalisation::new(None);
        let bytes = personal.as_bytes();
        let expected = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        assert_eq!(personal.int_at(0), expected);
        assert_eq!(personal.int_at(PERSONALISATION_LENGTH / 4), expected);

        let tail = u32::from_be_bytes([bytes[60], bytes[61], bytes[62], bytes[63]]);
        assert_eq!(personal.int_at(15), tail);
        assert_eq!(personal.byte_at(PERSONALISATION_LENGTH + 1), bytes[1]);
    }

    #[test]
    fn test_indentation_range() {
        for phrase in [&b"a"[..], b"b", b"c", b"d", b"e"] {
            let indent = Personalisation::new(Some(phrase)).cipher_indentation();
            assert!((MIN_INDENT..MIN_INDENT + INDENT_RANGE as usize).contains(&indent));
        }
    }

    #[test]
    fn test_debug_redacts() {
        let debug_str = format!("{:?}", Personalisation::new(None));
        assert!(debug_str.contains("[REDACTED]"));
    }
}
