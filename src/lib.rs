//! Personalised multi-cipher key sets.
//!
//! A key set is derived from a shared secret (or a password) and holds one
//! key for every supported block cipher and stream cipher. Each operation
//! picks a random subset of them and chains them into a single transform;
//! the choice travels with the ciphertext as a compact *recipe*.
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use keyset::core::config::{FactoryConfig, KeySetSpec};
//! use keyset::{Factory, KeySet};
//!
//! let config = FactoryConfig {
//!     keyset: KeySetSpec::interactive(),
//!     ..FactoryConfig::with_phrase("my application")
//! };
//! let factory = Arc::new(Factory::new(config).expect("valid config"));
//!
//! // Both sides derive the same key set from the same secret
//! let key_set = KeySet::build_from_secret(factory, b"shared secret", b"salt").expect("keys");
//!
//! let blob = key_set.encrypt_bytes(b"The quick brown fox").expect("encrypt");
//! assert_eq!(key_set.decrypt_bytes(&blob).expect("decrypt"), b"The quick brown fox");
//! ```
//!
//! # Blob Layout
//!
//! | Operation | Layout |
//! |-----------|--------|
//! | `encrypt_bytes` | `[recipe][data ..o][IV 16][data o..]` |
//! | `secure_key` | `[recipe, NO-IV flag][wrapped type id + key]` |
//! | `KeySetHash` | `[recipe 2][check ..o][IV 32][check o..]` |
//!
//! The IV offset `o` is personalised. The recipe names the block ciphers by
//! their position in the factory's shuffled catalog; the stream cipher and
//! the IV derivation digest are picked from the IV.
//!
//! # Personalisation
//!
//! Every [`Factory`] is personalised by an optional security phrase. The
//! phrase permutes the algorithm catalogs, moves the IV and changes every
//! derived key, so factories with different phrases cannot read each
//! other's blobs.
//!
//! # Features
//!
//! ```toml
//! [dependencies]
//! keyset = { version = "0.1", features = ["prelude"] }     # FactoryBuilder
//! keyset = { version = "0.1", features = ["serde"] }       # serializable config
//! keyset = { version = "0.1", features = ["self-check"] }  # verify every encryption
//! ```
//!
//! # Security
//!
//! - Key material is zeroized on drop
//! - Debug output redacts sensitive key material
//! - Constant-time comparison for keys and password checks
//! - No unsafe code
//!
//! # Modules
//!
//! - [`core`] - Core types and operations
//! - [`prelude`] - Ergonomic imports (requires `prelude` feature)

#![forbid(unsafe_code)]

pub mod core;

#[cfg(feature = "prelude")]
pub mod prelude;

// Re-export commonly used items at crate root
pub use crate::core::algorithm::{DigestType, MacType, StreamKeyType, SymKeyType};
pub use crate::core::config::{FactoryConfig, HashSpec, KeySetSpec};
pub use crate::core::error::{KeySetError, KeySetResult};
pub use crate::core::factory::Factory;
pub use crate::core::types::{Key, KeySet, KeySetHash, PrivateKeySpec};
