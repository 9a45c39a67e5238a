//! Recipe framing for external blobs.
//!
//! A recipe is a short byte prefix naming the algorithms a blob was produced
//! with, as nibble-packed positions in the factory's shuffled catalogs. The
//! initialisation vector is not prepended but spliced into the payload at a
//! personalised offset.
//!
//! - [`keyset`] - key set blobs (`[recipe][data..o][IV][data o..]`)
//! - [`hash`] - password hash blobs

pub mod hash;
pub mod keyset;

pub use hash::{HashParameters, HashRecipe};
pub use keyset::{KeySetParameters, KeySetRecipe};

use crate::core::error::{KeySetError, KeySetResult};

/// Packs nibbles two per byte, high nibble first.
///
/// An odd count leaves the low nibble of the last byte zero.
#[must_use]
pub fn pack_nibbles(nibbles: &[u8]) -> Vec<u8> {
    nibbles
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair.get(1).map_or(0, |low| low & 0x0F))
        .collect()
}

/// Splits every byte into its high and low nibble.
#[must_use]
pub fn unpack_nibbles(bytes: &[u8]) -> Vec<u8> {
    bytes
        .iter()
        .flat_map(|byte| [byte >> 4, byte & 0x0F])
        .collect()
}

/// Inserts `iv` into `data` at `offset`.
///
/// # Errors
///
/// `BufferTooShort` if `offset` lies past the end of `data`.
pub fn splice(data: &[u8], iv: &[u8], offset: usize) -> KeySetResult<Vec<u8>> {
    if offset > data.len() {
        return Err(KeySetError::BufferTooShort {
            needed: offset,
            actual: data.len(),
        });
    }

    let mut spliced = Vec::with_capacity(data.len() + iv.len());
    spliced.extend_from_slice(&data[..offset]);
    spliced.extend_from_slice(iv);
    spliced.extend_from_slice(&data[offset..]);
    Ok(spliced)
}

/// Removes the `iv_length` bytes at `offset`, returning `(iv, data)`.
///
/// # Errors
///
/// `BufferTooShort` if `spliced` ends before `offset + iv_length`.
pub fn unsplice(
    spliced: &[u8],
    iv_length: usize,
    offset: usize,
) -> KeySetResult<(Vec<u8>, Vec<u8>)> {
    let end = offset.saturating_add(iv_length);
    if end > spliced.len() {
        return Err(KeySetError::BufferTooShort {
            needed: end,
            actual: spliced.len(),
        });
    }

    let iv = spliced[offset..end].to_vec();
    let mut data = Vec::with_capacity(spliced.len() - iv_length);
    data.extend_from_slice(&spliced[..offset]);
    data.extend_from_slice(&spliced[end..]);
    Ok((iv, data))
}
