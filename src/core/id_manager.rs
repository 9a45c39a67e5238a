//! Personalised algorithm ids.
//!
//! The id manager turns each fixed catalog into a personalised permutation
//! and maps between algorithm types and their external ids:
//!
//! - a *position* is the index of a type inside its shuffled catalog and is
//!   what recipes store (one nibble);
//! - a *key type id* is a family-tagged position passed through the Knuth
//!   multiplicative obfuscation and is what wrapped keys carry.
//!
//! Neither is cryptographic; they only keep algorithm choices from being
//! readable at a glance. Both must stay bit-exact across releases.

use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::core::algorithm::{
    Algorithm, DigestType, Family, MacType, StreamKeyType, SymKeyType,
};
use crate::core::error::{KeySetError, KeySetResult};
use crate::core::personalisation::Personalisation;

/// Permutes `catalog` under `seed` and keeps only the supported entries.
///
/// A Fisher–Yates pass driven by a ChaCha20 stream seeded from `seed`, with the
/// swap index reduced modulo the shrinking live range, followed by a stable
/// partition into supported prefix and rejected suffix. The prefix is
/// returned. The result depends only on the inputs.
pub fn shuffle<T: Copy>(catalog: &[T], seed: u32, supported: impl Fn(&T) -> bool) -> Vec<T> {
    let mut items = catalog.to_vec();
    let mut rng = ChaCha20Rng::seed_from_u64(u64::from(seed));

    for remaining in (2..=items.len()).rev() {
        let swap = (rng.next_u32() % remaining as u32) as usize;
        items.swap(remaining - 1, swap);
    }

    items.into_iter().filter(|item| supported(item)).collect()
}

/// Picks `count` distinct entries of `available` from a 32-bit seed.
///
/// Each step swaps `seed % remaining` into the front of the live range and
/// divides the seed by `remaining`.
pub fn seeded_types<T: Copy>(available: &[T], seed: u32, count: usize) -> KeySetResult<Vec<T>> {
    if available.len() < count {
        return Err(KeySetError::InsufficientTypes {
            required: count,
            available: available.len(),
        });
    }

    let mut live = available.to_vec();
    let mut seed = seed;
    let mut selected = Vec::with_capacity(count);

    for index in 0..count {
        let remaining = (live.len() - index) as u32;
        let pick = index + (seed % remaining) as usize;
        live.swap(index, pick);
        selected.push(live[index]);
        seed /= remaining;
    }

    Ok(selected)
}

// =============================================================================
// Knuth obfuscation
// =============================================================================

/// Reversible multiplicative obfuscation of 32-bit ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnuthCodec {
    prime: u64,
    inverse: u32,
}

impl KnuthCodec {
    /// Builds the codec from the next probable prime at or above a seed.
    ///
    /// Seeds below 3 start the search at 3 so the prime is odd. Seeds above
    /// the largest 32-bit prime give a prime just past `u32::MAX`.
    #[must_use]
    pub fn new(seed: u32) -> Self {
        let prime = next_probable_prime(u64::from(seed.max(3)));
        Self {
            prime,
            inverse: inverse_mod_2_32(prime as u32),
        }
    }

    /// The obfuscation prime.
    #[must_use]
    pub const fn prime(&self) -> u64 {
        self.prime
    }

    /// The inverse of the prime's low 32 bits modulo 2^32.
    #[must_use]
    pub const fn inverse(&self) -> u32 {
        self.inverse
    }

    /// Obfuscates an id.
    #[must_use]
    pub fn encode(&self, id: u32) -> u64 {
        u64::from(id).wrapping_mul(self.prime)
    }

    /// Recovers an id, rejecting values that are not a multiple of the prime.
    pub fn decode(&self, encoded: u64) -> KeySetResult<u32> {
        let id = (encoded as u32).wrapping_mul(self.inverse);
        if self.encode(id) == encoded {
            Ok(id)
        } else {
            Err(KeySetError::InvalidId { id: encoded })
        }
    }
}

fn inverse_mod_2_32(odd: u32) -> u32 {
    // Newton iteration; each pass doubles the number of correct low bits.
    let mut inverse = odd;
    for _ in 0..5 {
        inverse = inverse.wrapping_mul(2u32.wrapping_sub(odd.wrapping_mul(inverse)));
    }
    inverse
}

fn mul_mod(a: u64, b: u64, modulus: u64) -> u64 {
    ((u128::from(a) * u128::from(b)) % u128::from(modulus)) as u64
}

fn pow_mod(mut base: u64, mut exponent: u64, modulus: u64) -> u64 {
    let mut result = 1u64;
    base %= modulus;
    while exponent > 0 {
        if exponent & 1 == 1 {
            result = mul_mod(result, base, modulus);
        }
        base = mul_mod(base, base, modulus);
        exponent >>= 1;
    }
    result
}

/// Miller–Rabin; the witness set is deterministic for every `u64` below 3.3e24.
pub fn is_probable_prime(candidate: u64) -> bool {
    const WITNESSES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

    if candidate < 2 {
        return false;
    }
    for witness in WITNESSES {
        if candidate % witness == 0 {
            return candidate == witness;
        }
    }

    let mut odd = candidate - 1;
    let mut twos = 0u32;
    while odd % 2 == 0 {
        odd /= 2;
        twos += 1;
    }

    'witness: for witness in WITNESSES {
        let mut x = pow_mod(witness, odd, candidate);
        if x == 1 || x == candidate - 1 {
            continue;
        }
        for _ in 1..twos {
            x = mul_mod(x, x, candidate);
            if x == candidate - 1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

/// Smallest probable prime at or above `start`.
pub fn next_probable_prime(start: u64) -> u64 {
    if start <= 2 {
        return 2;
    }
    let mut candidate = start | 1;
    while !is_probable_prime(candidate) {
        candidate += 2;
    }
    candidate
}

// =============================================================================
// Id manager
// =============================================================================

/// Personalised catalogs and id conversions for one factory.
#[derive(Debug, Clone)]
pub struct IdManager {
    sym_keys: Vec<SymKeyType>,
    stream_keys: Vec<StreamKeyType>,
    digests: Vec<DigestType>,
    macs: Vec<MacType>,
    knuth: KnuthCodec,
}

impl IdManager {
    /// Builds the shuffled catalogs.
    ///
    /// The predicates restrict which symmetric and stream key types may take
    /// part in key sets; digests and MACs are always fully supported.
    pub fn new(
        personalisation: &Personalisation,
        sym_supported: impl Fn(&SymKeyType) -> bool,
        stream_supported: impl Fn(&StreamKeyType) -> bool,
    ) -> Self {
        let seed = |family: Family| personalisation.int_at(family.shuffle_location());

        Self {
            sym_keys: shuffle(
                SymKeyType::catalog(),
                seed(Family::Symmetric),
                sym_supported,
            ),
            stream_keys: shuffle(
                StreamKeyType::catalog(),
                seed(Family::Stream),
                stream_supported,
            ),
            digests: shuffle(DigestType::catalog(), seed(Family::Digest), |_| true),
            macs: shuffle(MacType::catalog(), seed(Family::Mac), |_| true),
            knuth: KnuthCodec::new(personalisation.knuth_seed()),
        }
    }

    /// Shuffled, supported symmetric key types.
    #[must_use]
    pub fn sym_key_types(&self) -> &[SymKeyType] {
        &self.sym_keys
    }

    /// Shuffled, supported stream key types.
    #[must_use]
    pub fn stream_key_types(&self) -> &[StreamKeyType] {
        &self.stream_keys
    }

    /// Shuffled digest types.
    #[must_use]
    pub fn digest_types(&self) -> &[DigestType] {
        &self.digests
    }

    /// Shuffled MAC types.
    #[must_use]
    pub fn mac_types(&self) -> &[MacType] {
        &self.macs
    }

    /// The Knuth codec.
    #[must_use]
    pub const fn knuth(&self) -> &KnuthCodec {
        &self.knuth
    }

    /// Position of `algorithm` in its shuffled catalog.
    pub fn derive_external_id<T: Algorithm>(&self, algorithm: T) -> KeySetResult<u32> {
        T::shuffled(self)
            .iter()
            .position(|candidate| *candidate == algorithm)
            .map(|position| position as u32)
            .ok_or_else(|| KeySetError::unsupported(algorithm.name()))
    }

    /// Algorithm at `id` in its shuffled catalog.
    pub fn derive_type_from_external_id<T: Algorithm>(&self, id: u32) -> KeySetResult<T> {
        T::shuffled(self)
            .get(id as usize)
            .copied()
            .ok_or(KeySetError::InvalidId { id: u64::from(id) })
    }

    /// Family-tagged, Knuth-encoded id of a type.
    pub fn encode_type_id<T: Algorithm>(&self, algorithm: T) -> KeySetResult<u64> {
        let position = self.derive_external_id(algorithm)?;
        Ok(self.knuth.encode((T::FAMILY.tag() << 8) | position))
    }

    /// Inverse of [`encode_type_id`](Self::encode_type_id), checking the family.
    pub fn decode_type_id<T: Algorithm>(&self, encoded: u64) -> KeySetResult<T> {
        let id = self.knuth.decode(encoded)?;
        if id >> 8 != T::FAMILY.tag() {
            return Err(KeySetError::InvalidId { id: encoded });
        }
        self.derive_type_from_external_id(id & 0xFF)
    }

    /// Picks `count` distinct types of a family from a seed.
    pub fn seeded_selection<T: Algorithm>(&self, seed: u32, count: usize) -> KeySetResult<Vec<T>> {
        seeded_types(T::shuffled(self), seed, count)
    }

    /// Picks a single type of a family from a seed.
    pub fn seeded_type<T: Algorithm>(&self, seed: u32) -> KeySetResult<T> {
        let mut selected = self.seeded_selection::<T>(seed, 1)?;
        selected.pop().ok_or(KeySetError::InsufficientTypes {
            required: 1,
            available: 0,
        })
    }
}
