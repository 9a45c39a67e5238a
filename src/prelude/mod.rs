//! Ergonomic layer for key set operations.
//!
//! The prelude module re-exports the everyday types together with the
//! [`FactoryBuilder`].
//!
//! # Usage
//!
//! ```rust
//! use keyset::prelude::*;
//! ```

mod builders;

pub use builders::FactoryBuilder;

pub use crate::core::algorithm::{
    Algorithm, DigestType, KeyType, MacType, StreamKeyType, SymKeyType,
};
pub use crate::core::config::{FactoryConfig, HashSpec, KeySetSpec};
pub use crate::core::error::{KeySetError, KeySetResult};
pub use crate::core::factory::Factory;
pub use crate::core::types::{Key, KeySet, KeySetHash, PrivateKeySpec};
