//! KeySetHash - a key set locked behind a password.
//!
//! The hash blob stores no key material. It carries the recipe, the IV and a
//! check hash; the key set secret is recomputed from the password on every
//! unlock.
//!
//! Format: `base64url([recipe 2][check ..o][IV 32][check o..])`

use core::fmt::{self, Debug, Display};
use std::sync::Arc;

use base64::prelude::*;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::core::algorithm::DigestType;
use crate::core::error::{KeySetError, KeySetResult};
use crate::core::factory::Factory;
use crate::core::operations::keygen::stretch;
use crate::core::operations::primitives::hmac_engine;
use crate::core::recipe::hash::check_bounds;
use crate::core::recipe::{HashParameters, HashRecipe};
use crate::core::types::KeySet;

/// Domain separation for the key set secret.
const SECRET_DOMAIN: &[u8] = b"keyset-hash.secret";

/// Domain separation for the check hash.
const CHECK_DOMAIN: &[u8] = b"keyset-hash.check";

/// A password hash unlocking a key set.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
///
/// use keyset::core::config::{FactoryConfig, HashSpec, KeySetSpec};
/// use keyset::core::factory::Factory;
/// use keyset::core::types::KeySetHash;
///
/// let config = FactoryConfig {
///     keyset: KeySetSpec::interactive(),
///     hash: HashSpec::interactive(),
///     ..FactoryConfig::with_phrase("docs")
/// };
/// let factory = Arc::new(Factory::new(config).expect("valid config"));
///
/// let (hash, key_set) = KeySetHash::try_create(&factory, b"password").expect("hash");
/// let stored = hash.to_string();
///
/// let parsed = KeySetHash::try_from(stored.as_str()).expect("parse");
/// let unlocked = parsed.try_unlock(&factory, b"password").expect("unlock");
/// # let _ = (key_set, unlocked);
/// ```
#[derive(Clone)]
pub struct KeySetHash {
    data: Vec<u8>,
}

impl KeySetHash {
    /// Hashes `password` and builds the key set it unlocks.
    pub fn try_create(factory: &Arc<Factory>, password: &[u8]) -> KeySetResult<(Self, KeySet)> {
        let recipe = HashRecipe::build_random(factory)?;
        let (secret, check) = compute(factory, recipe.parameters(), password)?;
        let data = recipe.build_external(&check, password.len())?;

        let key_set =
            KeySet::build_from_secret(Arc::clone(factory), &secret, recipe.parameters().init_vector())?;
        tracing::debug!(length = data.len(), "created keyset hash");
        Ok((Self { data }, key_set))
    }

    /// Recomputes the key set for `password`.
    ///
    /// # Errors
    ///
    /// `BadCredentials` if the password does not match.
    pub fn try_unlock(&self, factory: &Arc<Factory>, password: &[u8]) -> KeySetResult<KeySet> {
        let (recipe, stored) = HashRecipe::parse(factory, &self.data, password.len())?;
        let (secret, check) = compute(factory, recipe.parameters(), password)?;

        if !bool::from(check.ct_eq(&stored)) {
            tracing::warn!("keyset hash rejected credentials");
            return Err(KeySetError::BadCredentials);
        }

        KeySet::build_from_secret(Arc::clone(factory), &secret, recipe.parameters().init_vector())
    }

    /// Returns the raw hash bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// Derives `(secret, check)` from a password.
fn compute(
    factory: &Factory,
    parameters: &HashParameters,
    password: &[u8],
) -> KeySetResult<(Zeroizing<Vec<u8>>, Vec<u8>)> {
    let iterations = parameters.iterations(factory.hash_spec());
    let prime = stretch_password(factory, parameters.prime(), parameters, password, iterations)?;
    let alternate =
        stretch_password(factory, parameters.alternate(), parameters, password, iterations)?;

    // Secret: keyed with the prime result over the alternate result
    let mut mac = hmac_engine(parameters.secret(), &prime)?;
    mac.update(&alternate);
    mac.update(parameters.init_vector());
    mac.update(SECRET_DOMAIN);
    let secret = Zeroizing::new(mac.finish());

    // Check: keyed with the alternate result over the prime result
    let mut mac = hmac_engine(parameters.secret(), &alternate)?;
    mac.update(&prime);
    mac.update(parameters.init_vector());
    mac.update(CHECK_DOMAIN);
    let check = mac.finish();

    Ok((secret, check))
}

fn stretch_password(
    factory: &Factory,
    digest: DigestType,
    parameters: &HashParameters,
    password: &[u8],
    iterations: u32,
) -> KeySetResult<Zeroizing<Vec<u8>>> {
    let mut mac = hmac_engine(digest, password)?;
    mac.update(factory.personalisation().as_bytes());
    Ok(stretch(&mut *mac, parameters.init_vector(), iterations))
}

// =============================================================================
// Display (serialization to base64url)
// =============================================================================

impl Display for KeySetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", BASE64_URL_SAFE_NO_PAD.encode(&self.data))
    }
}

impl Debug for KeySetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySetHash")
            .field("data_len", &self.data.len())
            .finish()
    }
}

// =============================================================================
// TryFrom (parsing)
// =============================================================================

impl TryFrom<&[u8]> for KeySetHash {
    type Error = KeySetError;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        check_bounds(data.len())?;
        Ok(Self {
            data: data.to_vec(),
        })
    }
}

impl TryFrom<&str> for KeySetHash {
    type Error = KeySetError;

    fn try_from(encoded: &str) -> Result<Self, Self::Error> {
        let data = BASE64_URL_SAFE_NO_PAD.decode(encoded)?;
        Self::try_from(data.as_slice())
    }
}

impl TryFrom<String> for KeySetHash {
    type Error = KeySetError;

    fn try_from(encoded: String) -> Result<Self, Self::Error> {
        Self::try_from(encoded.as_str())
    }
}

impl PartialEq for KeySetHash {
    fn eq(&self, other: &Self) -> bool {
        self.data.ct_eq(&other.data).into()
    }
}

impl Eq for KeySetHash {}
