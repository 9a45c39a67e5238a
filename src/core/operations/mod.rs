//! Cryptographic operations for key sets.
//!
//! - [`primitives`] - Object-safe engines over the RustCrypto primitives
//! - [`keygen`] - Key derivation from a shared secret
//! - [`wrap`] - Key wrapping with integrity check
//! - [`multi`] - The chained multi-cipher

pub mod keygen;
pub mod multi;
pub mod primitives;
pub mod wrap;
