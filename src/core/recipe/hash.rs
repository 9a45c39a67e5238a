//! Password hash recipes.
//!
//! Two bytes over the shuffled digest catalog:
//!
//! ```text
//! [prime << 4 | alternate] [secret << 4 | adjustment]
//! ```
//!
//! The 32-byte IV is spliced into the check hash at an offset that depends
//! on the password length, so the blob layout itself is password dependent.

use crate::core::algorithm::DigestType;
use crate::core::config::HashSpec;
use crate::core::error::{KeySetError, KeySetResult};
use crate::core::factory::Factory;
use crate::core::recipe::{pack_nibbles, splice, unpack_nibbles, unsplice};

/// Length of the hash IV.
pub const HASH_IV_LENGTH: usize = 32;

/// Length of the hash recipe.
pub const HASH_RECIPE_LENGTH: usize = 2;

/// Largest external hash: recipe, IV and a 64-byte check.
pub const MAX_HASH_LENGTH: usize = 98;

const ADJUSTMENT_MASK: u8 = 0x0F;

/// Offset of the IV inside a check hash of `check_length` bytes.
#[must_use]
pub fn check_offset(password_length: usize, check_length: usize) -> usize {
    password_length % (check_length + 1)
}

/// Digests, iteration adjustment and IV of one password hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashParameters {
    prime: DigestType,
    alternate: DigestType,
    secret: DigestType,
    adjustment: u8,
    init_vector: Vec<u8>,
}

impl HashParameters {
    /// Digest stretching the password into the prime result.
    #[must_use]
    pub const fn prime(&self) -> DigestType {
        self.prime
    }

    /// Digest stretching the password into the alternate result.
    #[must_use]
    pub const fn alternate(&self) -> DigestType {
        self.alternate
    }

    /// Digest combining both results into the secret and the check.
    #[must_use]
    pub const fn secret(&self) -> DigestType {
        self.secret
    }

    #[must_use]
    pub const fn adjustment(&self) -> u8 {
        self.adjustment
    }

    #[must_use]
    pub fn init_vector(&self) -> &[u8] {
        &self.init_vector
    }

    /// Stretching rounds under `spec`.
    #[must_use]
    pub fn iterations(&self, spec: &HashSpec) -> u32 {
        spec.hash_iterations.saturating_add(u32::from(self.adjustment))
    }
}

/// A password hash recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashRecipe {
    recipe: [u8; HASH_RECIPE_LENGTH],
    parameters: HashParameters,
}

impl HashRecipe {
    /// Picks three distinct digests, an adjustment and a fresh IV.
    pub fn build_random(factory: &Factory) -> KeySetResult<Self> {
        let ids = factory.ids();
        let digests: Vec<DigestType> = ids.seeded_selection(factory.random_u32()?, 3)?;
        let adjustment = (factory.random_u32()? as u8) & ADJUSTMENT_MASK;
        let init_vector = factory.random_bytes(HASH_IV_LENGTH)?;

        let packed = pack_nibbles(&[
            ids.derive_external_id(digests[0])? as u8,
            ids.derive_external_id(digests[1])? as u8,
            ids.derive_external_id(digests[2])? as u8,
            adjustment,
        ]);

        Ok(Self {
            recipe: [packed[0], packed[1]],
            parameters: HashParameters {
                prime: digests[0],
                alternate: digests[1],
                secret: digests[2],
                adjustment,
                init_vector,
            },
        })
    }

    /// Splits an external hash into its recipe and check hash.
    ///
    /// # Errors
    ///
    /// - `BufferTooShort` if the blob cannot hold recipe and IV
    /// - `HashTooLarge` above [`MAX_HASH_LENGTH`]
    /// - `InvalidId` for a digest position outside the shuffled catalog
    pub fn parse(
        factory: &Factory,
        external: &[u8],
        password_length: usize,
    ) -> KeySetResult<(Self, Vec<u8>)> {
        check_bounds(external.len())?;

        let nibbles = unpack_nibbles(&external[..HASH_RECIPE_LENGTH]);
        let digest = |position: u8| {
            factory
                .ids()
                .derive_type_from_external_id::<DigestType>(u32::from(position))
        };
        let (prime, alternate, secret) = (digest(nibbles[0])?, digest(nibbles[1])?, digest(nibbles[2])?);

        let body = &external[HASH_RECIPE_LENGTH..];
        let check_length = body.len() - HASH_IV_LENGTH;
        let offset = check_offset(password_length, check_length);
        let (init_vector, check) = unsplice(body, HASH_IV_LENGTH, offset)?;

        tracing::trace!(check_length, "parsed hash recipe");

        Ok((
            Self {
                recipe: [external[0], external[1]],
                parameters: HashParameters {
                    prime,
                    alternate,
                    secret,
                    adjustment: nibbles[3],
                    init_vector,
                },
            },
            check,
        ))
    }

    /// Frames a check hash as an external blob.
    pub fn build_external(&self, check: &[u8], password_length: usize) -> KeySetResult<Vec<u8>> {
        let length = HASH_RECIPE_LENGTH + HASH_IV_LENGTH + check.len();
        if length > MAX_HASH_LENGTH {
            return Err(KeySetError::HashTooLarge {
                length,
                max: MAX_HASH_LENGTH,
            });
        }

        let offset = check_offset(password_length, check.len());
        let mut external = self.recipe.to_vec();
        external.extend_from_slice(&splice(check, &self.parameters.init_vector, offset)?);
        Ok(external)
    }

    #[must_use]
    pub const fn parameters(&self) -> &HashParameters {
        &self.parameters
    }
}

/// Checks an external hash length without decoding it.
pub(crate) fn check_bounds(length: usize) -> KeySetResult<()> {
    let needed = HASH_RECIPE_LENGTH + HASH_IV_LENGTH;
    if length < needed {
        return Err(KeySetError::BufferTooShort {
            needed,
            actual: length,
        });
    }
    if length > MAX_HASH_LENGTH {
        return Err(KeySetError::HashTooLarge {
            length,
            max: MAX_HASH_LENGTH,
        });
    }
    Ok(())
}
