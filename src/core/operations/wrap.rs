//! Key wrapping with integrity check.
//!
//! An RFC 5649-style wrap over any block engine: the payload is padded to
//! whole half-blocks behind an integrity half-block carrying a fixed pattern
//! and the payload length, then mixed through six rounds of the block cipher.
//! Unwrapping recovers the integrity half-block and rejects any blob whose
//! pattern, length or padding does not check out.
//!
//! With a 16-byte block cipher the half-block is 8 bytes and the layout is
//! bit-compatible with RFC 5649 for payloads longer than one half-block.

use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::core::error::{KeySetError, KeySetResult};
use crate::core::operations::primitives::BlockEngine;

/// Integrity pattern repeated over the leading bytes of the integrity half-block.
pub const INTEGRITY_PATTERN: [u8; 4] = [0xA6, 0x59, 0x59, 0xA6];

/// Mixing rounds over the whole payload.
pub const WRAP_ROUNDS: usize = 6;

/// Bytes of the integrity half-block holding the payload length.
const LENGTH_FIELD: usize = 4;

/// Wraps and unwraps byte strings with one block cipher.
pub struct WrapCipher {
    engine: Box<dyn BlockEngine>,
}

impl WrapCipher {
    #[must_use]
    pub fn new(engine: Box<dyn BlockEngine>) -> Self {
        Self { engine }
    }

    /// Half the engine's block length.
    #[must_use]
    pub fn half_block(&self) -> usize {
        self.engine.block_length() / 2
    }

    /// Length of the wrapped form of a `length`-byte payload.
    #[must_use]
    pub fn wrapped_length(&self, length: usize) -> usize {
        let half = self.half_block();
        (length.div_ceil(half).max(1) + 1) * half
    }

    fn integrity_block(&self, length: usize) -> KeySetResult<Vec<u8>> {
        let half = self.half_block();
        let declared = u32::try_from(length).map_err(|_| KeySetError::PayloadTooLarge {
            length,
            max: u32::MAX as usize,
        })?;

        let mut block = Vec::with_capacity(half);
        for index in 0..half - LENGTH_FIELD {
            block.push(INTEGRITY_PATTERN[index % INTEGRITY_PATTERN.len()]);
        }
        block.extend_from_slice(&declared.to_be_bytes());
        Ok(block)
    }

    /// Wraps `data`.
    pub fn secure_bytes(&self, data: &[u8]) -> KeySetResult<Vec<u8>> {
        let half = self.half_block();
        let blocks = data.len().div_ceil(half).max(1);

        let mut integrity = self.integrity_block(data.len())?;
        let mut payload = Zeroizing::new(vec![0u8; blocks * half]);
        payload[..data.len()].copy_from_slice(data);
        let mut buffer = Zeroizing::new(vec![0u8; 2 * half]);

        let mut counter = 1u64;
        for _ in 0..WRAP_ROUNDS {
            for chunk in payload.chunks_exact_mut(half) {
                buffer[..half].copy_from_slice(&integrity);
                buffer[half..].copy_from_slice(chunk);
                self.engine.encrypt_block(&mut buffer)?;

                xor_counter(&mut buffer[..half], counter);
                counter += 1;

                integrity.copy_from_slice(&buffer[..half]);
                chunk.copy_from_slice(&buffer[half..]);
            }
        }

        let mut wrapped = integrity;
        wrapped.extend_from_slice(&payload);
        Ok(wrapped)
    }

    /// Unwraps `data`, checking the integrity half-block.
    ///
    /// # Errors
    ///
    /// `BufferTooShort` when fewer than two half-blocks are given, and
    /// `IntegrityCheckFailed` for any tampered or misaligned blob.
    pub fn derive_bytes(&self, data: &[u8]) -> KeySetResult<Zeroizing<Vec<u8>>> {
        let half = self.half_block();
        if data.len() < 2 * half {
            return Err(KeySetError::BufferTooShort {
                needed: 2 * half,
                actual: data.len(),
            });
        }
        if data.len() % half != 0 {
            tracing::warn!(length = data.len(), "wrapped blob is not half-block aligned");
            return Err(KeySetError::IntegrityCheckFailed);
        }

        let blocks = data.len() / half - 1;
        let mut integrity = data[..half].to_vec();
        let mut payload = Zeroizing::new(data[half..].to_vec());
        let mut buffer = Zeroizing::new(vec![0u8; 2 * half]);

        let mut counter = (WRAP_ROUNDS * blocks) as u64;
        for _ in 0..WRAP_ROUNDS {
            for chunk in payload.chunks_exact_mut(half).rev() {
                xor_counter(&mut integrity, counter);
                counter -= 1;

                buffer[..half].copy_from_slice(&integrity);
                buffer[half..].copy_from_slice(chunk);
                self.engine.decrypt_block(&mut buffer)?;

                integrity.copy_from_slice(&buffer[..half]);
                chunk.copy_from_slice(&buffer[half..]);
            }
        }

        // Check pattern, declared length and zero padding together
        let expected = self.integrity_block(0)?;
        let pattern_ok = integrity[..half - LENGTH_FIELD].ct_eq(&expected[..half - LENGTH_FIELD]);

        let mut declared = [0u8; LENGTH_FIELD];
        declared.copy_from_slice(&integrity[half - LENGTH_FIELD..]);
        let declared = u32::from_be_bytes(declared) as usize;

        let padded = blocks * half;
        let length_ok = declared <= padded && declared + half >= padded;
        let padding_ok = length_ok && payload[declared..].iter().all(|byte| *byte == 0);

        if !bool::from(pattern_ok) || !length_ok || !padding_ok {
            tracing::warn!("wrapped blob failed its integrity check");
            return Err(KeySetError::IntegrityCheckFailed);
        }

        payload.truncate(declared);
        Ok(payload)
    }
}

/// XORs the big-endian `counter` into the trailing bytes of `block`.
fn xor_counter(block: &mut [u8], counter: u64) {
    let mut remaining = counter;
    for byte in block.iter_mut().rev() {
        if remaining == 0 {
            break;
        }
        *byte ^= remaining as u8;
        remaining >>= 8;
    }
}
