//! `PrivateKeySpec` - opaque encoded private key material.
//!
//! Asymmetric algorithms live outside this crate; a key set only protects
//! their encoded form (typically PKCS#8 DER).

use core::fmt::{self, Debug};

use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Encoded private key bytes.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKeySpec {
    encoded: Vec<u8>,
}

impl PrivateKeySpec {
    /// Wraps encoded private key bytes.
    #[must_use]
    pub fn new(encoded: Vec<u8>) -> Self {
        Self { encoded }
    }

    /// Returns the encoded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.encoded
    }
}

impl From<&[u8]> for PrivateKeySpec {
    fn from(encoded: &[u8]) -> Self {
        Self::new(encoded.to_vec())
    }
}

impl Debug for PrivateKeySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKeySpec")
            .field("length", &self.encoded.len())
            .field("encoded", &"[REDACTED]")
            .finish()
    }
}

impl PartialEq for PrivateKeySpec {
    fn eq(&self, other: &Self) -> bool {
        self.encoded.ct_eq(&other.encoded).into()
    }
}

impl Eq for PrivateKeySpec {}
