//! Key set recipes.
//!
//! Layout of byte 0:
//!
//! ```text
//!  bit 7      bits 6..4     bits 3..0
//! [NO-IV]   [step count N] [position 0]
//! ```
//!
//! followed by the remaining positions packed two per byte. The recipe is
//! `1 + N / 2` bytes long; when `N` is even the last low nibble is reserved
//! and must be zero.
//!
//! The block cipher positions are the only algorithm choice carried
//! explicitly. The stream cipher and the HMac digest for IV derivation are
//! picked from the IV itself, so a blob without an IV always uses the same
//! pair.

use crate::core::algorithm::{DigestType, StreamKeyType, SymKeyType};
use crate::core::error::{KeySetError, KeySetResult};
use crate::core::factory::Factory;
use crate::core::operations::keygen::seed_at;
use crate::core::personalisation::MIN_INDENT;
use crate::core::recipe::{pack_nibbles, splice, unpack_nibbles, unsplice};

/// Length of the random IV carried by each key set blob.
pub const KEYSET_IV_LENGTH: usize = 16;

/// Flag on recipe byte 0 marking a blob without IV.
pub const NO_IV_FLAG: u8 = 0x80;

const STEP_SHIFT: u8 = 4;
const STEP_MASK: u8 = 0x07;

/// Offset of the IV inside the payload.
///
/// Never closer than [`MIN_INDENT`] bytes to the end of the payload, unless
/// the payload is shorter than that.
#[must_use]
pub fn iv_offset(indentation: usize, data_length: usize) -> usize {
    indentation.min(data_length.saturating_sub(MIN_INDENT))
}

/// The algorithms and IV of one key set operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySetParameters {
    sym_key_types: Vec<SymKeyType>,
    stream_key_type: StreamKeyType,
    digest_type: DigestType,
    init_vector: Vec<u8>,
}

impl KeySetParameters {
    /// Builds parameters, picking the stream cipher and digest from the IV.
    pub fn new(
        factory: &Factory,
        sym_key_types: Vec<SymKeyType>,
        init_vector: Vec<u8>,
    ) -> KeySetResult<Self> {
        let ids = factory.ids();
        let stream_key_type = ids.seeded_type(seed_at(&init_vector, 0))?;
        let digest_type = ids.seeded_type(seed_at(&init_vector, 4))?;
        Ok(Self {
            sym_key_types,
            stream_key_type,
            digest_type,
            init_vector,
        })
    }

    /// Block ciphers in chain order.
    #[must_use]
    pub fn sym_key_types(&self) -> &[SymKeyType] {
        &self.sym_key_types
    }

    #[must_use]
    pub const fn stream_key_type(&self) -> StreamKeyType {
        self.stream_key_type
    }

    /// Digest of the HMac deriving per-cipher IVs.
    #[must_use]
    pub const fn digest_type(&self) -> DigestType {
        self.digest_type
    }

    /// Base IV; empty for blobs without IV.
    #[must_use]
    pub fn init_vector(&self) -> &[u8] {
        &self.init_vector
    }

    #[must_use]
    pub fn has_iv(&self) -> bool {
        !self.init_vector.is_empty()
    }
}

/// A key set recipe and the parameters it encodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySetRecipe {
    recipe: Vec<u8>,
    parameters: KeySetParameters,
}

impl KeySetRecipe {
    /// Recipe length for `steps` block ciphers.
    #[must_use]
    pub const fn recipe_length(steps: usize) -> usize {
        1 + steps / 2
    }

    /// Picks random block ciphers and a fresh IV.
    pub fn build_random(factory: &Factory) -> KeySetResult<Self> {
        let iv = factory.random_bytes(KEYSET_IV_LENGTH)?;
        Self::build_seeded(factory, iv)
    }

    /// Picks random block ciphers for a blob without IV.
    pub fn build_random_without_iv(factory: &Factory) -> KeySetResult<Self> {
        Self::build_seeded(factory, Vec::new())
    }

    fn build_seeded(factory: &Factory, init_vector: Vec<u8>) -> KeySetResult<Self> {
        let steps = usize::from(factory.keyset_spec().cipher_steps);
        let sym_key_types = factory
            .ids()
            .seeded_selection(factory.random_u32()?, steps)?;
        let parameters = KeySetParameters::new(factory, sym_key_types, init_vector)?;
        Self::from_parameters(factory, parameters)
    }

    /// Encodes existing parameters.
    pub fn from_parameters(factory: &Factory, parameters: KeySetParameters) -> KeySetResult<Self> {
        let steps = parameters.sym_key_types.len();
        if steps == 0 || steps > usize::from(STEP_MASK) {
            return Err(KeySetError::InvalidRecipeLength {
                expected: usize::from(factory.keyset_spec().cipher_steps),
                actual: steps,
            });
        }

        let mut nibbles = Vec::with_capacity(steps + 1);
        nibbles.push(steps as u8);
        for key_type in &parameters.sym_key_types {
            nibbles.push(factory.ids().derive_external_id(*key_type)? as u8);
        }

        let mut recipe = pack_nibbles(&nibbles);
        if !parameters.has_iv() {
            recipe[0] |= NO_IV_FLAG;
        }

        Ok(Self { recipe, parameters })
    }

    /// Splits an external blob into its recipe and payload.
    ///
    /// # Errors
    ///
    /// - `BufferTooShort` if the blob cannot hold its recipe and IV
    /// - `InvalidRecipeLength` if the step count differs from the factory's
    ///   or the reserved nibble is set
    /// - `InvalidId` for a position outside the shuffled catalog
    pub fn parse(factory: &Factory, external: &[u8]) -> KeySetResult<(Self, Vec<u8>)> {
        let first = *external.first().ok_or(KeySetError::BufferTooShort {
            needed: 1,
            actual: 0,
        })?;

        let has_iv = first & NO_IV_FLAG == 0;
        let steps = usize::from((first >> STEP_SHIFT) & STEP_MASK);
        let expected = usize::from(factory.keyset_spec().cipher_steps);
        if steps != expected {
            return Err(KeySetError::InvalidRecipeLength {
                expected,
                actual: steps,
            });
        }

        let recipe_length = Self::recipe_length(steps);
        let needed = recipe_length + if has_iv { KEYSET_IV_LENGTH } else { 0 };
        if external.len() < needed {
            return Err(KeySetError::BufferTooShort {
                needed,
                actual: external.len(),
            });
        }

        let recipe = external[..recipe_length].to_vec();
        let nibbles = unpack_nibbles(&recipe);
        if nibbles[steps + 1..].iter().any(|nibble| *nibble != 0) {
            return Err(KeySetError::InvalidRecipeLength {
                expected: steps,
                actual: steps + 1,
            });
        }

        let sym_key_types = nibbles[1..=steps]
            .iter()
            .map(|position| {
                factory
                    .ids()
                    .derive_type_from_external_id::<SymKeyType>(u32::from(*position))
            })
            .collect::<KeySetResult<Vec<_>>>()?;

        let body = &external[recipe_length..];
        let (init_vector, data) = if has_iv {
            let data_length = body.len() - KEYSET_IV_LENGTH;
            let offset = iv_offset(factory.personalisation().cipher_indentation(), data_length);
            unsplice(body, KEYSET_IV_LENGTH, offset)?
        } else {
            (Vec::new(), body.to_vec())
        };

        let parameters = KeySetParameters::new(factory, sym_key_types, init_vector)?;
        tracing::trace!(
            steps,
            has_iv,
            data_length = data.len(),
            "parsed keyset recipe"
        );

        Ok((Self { recipe, parameters }, data))
    }

    /// Frames `data` as an external blob.
    pub fn build_external(&self, factory: &Factory, data: &[u8]) -> KeySetResult<Vec<u8>> {
        let mut external = self.recipe.clone();
        if self.parameters.has_iv() {
            let offset = iv_offset(factory.personalisation().cipher_indentation(), data.len());
            external.extend_from_slice(&splice(data, &self.parameters.init_vector, offset)?);
        } else {
            external.extend_from_slice(data);
        }
        Ok(external)
    }

    /// The encoded recipe prefix.
    #[must_use]
    pub fn recipe_bytes(&self) -> &[u8] {
        &self.recipe
    }

    #[must_use]
    pub const fn parameters(&self) -> &KeySetParameters {
        &self.parameters
    }
}
