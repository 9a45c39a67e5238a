//! Key set types.
//!
//! - [`Key`] - Key bytes tagged with their algorithm
//! - [`PrivateKeySpec`] - Opaque encoded private key
//! - [`KeySet`] - One key per supported cipher, composed into one transform
//! - [`KeySetHash`] - A key set locked behind a password

mod hash;
mod key;
mod keyset;
mod private_key;

pub use hash::KeySetHash;
pub use key::Key;
pub use keyset::{KeySet, GENERATED_IV_LENGTH, GENERATED_SECRET_LENGTH};
pub use private_key::PrivateKeySpec;
