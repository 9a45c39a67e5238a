//! Core key set types and operations.
//!
//! This module provides the building blocks of a key set:
//!
//! - [`algorithm`] - Algorithm catalogs (block, stream, digest, MAC)
//! - [`error`] - Error types for key set operations
//! - [`config`] - Factory and key set parameters
//! - [`personalisation`] - Per-factory fingerprint
//! - [`id_manager`] - Shuffled catalogs and external ids
//! - [`factory`] - Capability surface for primitives and randomness
//! - [`recipe`] - Blob framing (key set and password hash recipes)
//! - [`operations`] - Key derivation, key wrapping and the cipher chain
//! - [`types`] - Keys, key sets and password hashes

pub mod algorithm;
pub mod config;
pub mod error;
pub mod factory;
pub mod id_manager;
pub mod operations;
pub mod personalisation;
pub mod recipe;
pub mod types;

// Re-export commonly used items
pub use error::{KeySetError, KeySetResult};
pub use factory::Factory;
