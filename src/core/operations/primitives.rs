//! Object-safe engines over the RustCrypto primitives.
//!
//! The chained ciphers pick their algorithms at run time, so each primitive
//! family is exposed as a small trait object:
//!
//! - [`BlockEngine`] - single-block ECB encryption/decryption
//! - [`StreamEngine`] - keystream application (stream ciphers and CTR mode)
//! - [`MacEngine`] - keyed MAC that resets to its keyed state on `finish`
//!
//! Digests use [`digest::DynDigest`] directly.

use cipher::generic_array::GenericArray;
use cipher::consts::U16;
use cipher::{
    BlockCipher, BlockDecrypt, BlockEncrypt, BlockEncryptMut, BlockSizeUser, InnerIvInit, KeyInit,
    KeyIvInit, StreamCipher, StreamCipherCoreWrapper,
};
use ctr::{flavors, CtrCore};
use digest::{DynDigest, Mac};
use hmac::SimpleHmac;

use crate::core::algorithm::{DigestType, MacType, StreamKeyType, SymKeyType};
use crate::core::error::{KeySetError, KeySetResult};

/// A block cipher keyed for single-block operation.
pub trait BlockEngine: Send + Sync {
    /// Block length in bytes.
    fn block_length(&self) -> usize;

    /// Encrypts exactly one block in place.
    fn encrypt_block(&self, block: &mut [u8]) -> KeySetResult<()>;

    /// Decrypts exactly one block in place.
    fn decrypt_block(&self, block: &mut [u8]) -> KeySetResult<()>;
}

/// A keystream generator.
pub trait StreamEngine: Send {
    /// XORs the next keystream bytes into `data`.
    fn apply_keystream(&mut self, data: &mut [u8]);
}

/// A keyed MAC.
pub trait MacEngine: Send {
    /// Output length in bytes.
    fn output_length(&self) -> usize;

    /// Absorbs `data`.
    fn update(&mut self, data: &[u8]);

    /// Returns the tag and resets to the freshly keyed state.
    fn finish(&mut self) -> Vec<u8>;
}

struct Block<C>(C);

impl<C> BlockEngine for Block<C>
where
    C: BlockEncrypt + BlockDecrypt + Send + Sync,
{
    fn block_length(&self) -> usize {
        <C as BlockSizeUser>::block_size()
    }

    fn encrypt_block(&self, block: &mut [u8]) -> KeySetResult<()> {
        check_block(self.block_length(), block)?;
        self.0.encrypt_block(GenericArray::from_mut_slice(block));
        Ok(())
    }

    fn decrypt_block(&self, block: &mut [u8]) -> KeySetResult<()> {
        check_block(self.block_length(), block)?;
        self.0.decrypt_block(GenericArray::from_mut_slice(block));
        Ok(())
    }
}

fn check_block(expected: usize, block: &[u8]) -> KeySetResult<()> {
    if block.len() == expected {
        Ok(())
    } else {
        Err(KeySetError::InvalidBlockLength {
            block: expected,
            actual: block.len(),
        })
    }
}

struct Stream<S>(S);

impl<S> StreamEngine for Stream<S>
where
    S: StreamCipher + Send,
{
    fn apply_keystream(&mut self, data: &mut [u8]) {
        self.0.apply_keystream(data);
    }
}

struct Keyed<M> {
    initial: M,
    current: M,
}

impl<M> MacEngine for Keyed<M>
where
    M: Mac + Clone + Send,
{
    fn output_length(&self) -> usize {
        <M as digest::OutputSizeUser>::output_size()
    }

    fn update(&mut self, data: &[u8]) {
        Mac::update(&mut self.current, data);
    }

    fn finish(&mut self) -> Vec<u8> {
        let done = core::mem::replace(&mut self.current, self.initial.clone());
        Mac::finalize(done).into_bytes().to_vec()
    }
}

// =============================================================================
// Constructors
// =============================================================================

pub(crate) fn block<C>(key: &[u8]) -> KeySetResult<Box<dyn BlockEngine>>
where
    C: KeyInit + BlockEncrypt + BlockDecrypt + Send + Sync + 'static,
{
    let cipher = C::new_from_slice(key).map_err(|_| KeySetError::InvalidKey)?;
    Ok(Box::new(Block(cipher)))
}

fn stream<S>(key: &[u8], iv: &[u8]) -> KeySetResult<Box<dyn StreamEngine>>
where
    S: KeyIvInit + StreamCipher + Send + 'static,
{
    let cipher = S::new_from_slices(key, iv).map_err(|_| KeySetError::InvalidKey)?;
    Ok(Box::new(Stream(cipher)))
}

/// Big-endian 128-bit counter mode over a block cipher.
///
/// The cipher is keyed on its own through `KeyInit`, so ciphers with variable
/// key sizes (Serpent, Twofish) accept every length they support.
fn counter<C>(key: &[u8], iv: &[u8]) -> KeySetResult<Box<dyn StreamEngine>>
where
    C: KeyInit + BlockCipher<BlockSize = U16> + BlockEncryptMut + Send + 'static,
{
    let cipher = C::new_from_slice(key).map_err(|_| KeySetError::InvalidKey)?;
    let core = CtrCore::<C, flavors::Ctr128BE>::inner_iv_slice_init(cipher, iv)
        .map_err(|_| KeySetError::InvalidKey)?;
    Ok(Box::new(Stream(StreamCipherCoreWrapper::from_core(core))))
}

fn keyed<M>(key: &[u8]) -> KeySetResult<Box<dyn MacEngine>>
where
    M: Mac + KeyInit + Clone + Send + 'static,
{
    let mac = <M as KeyInit>::new_from_slice(key).map_err(|_| KeySetError::InvalidKey)?;
    Ok(Box::new(Keyed {
        initial: mac.clone(),
        current: mac,
    }))
}

/// Creates a single-block engine for a symmetric key type.
pub fn block_engine(key_type: SymKeyType, key: &[u8]) -> KeySetResult<Box<dyn BlockEngine>> {
    match key_type {
        SymKeyType::Aes => block::<aes::Aes256>(key),
        SymKeyType::Twofish => block::<twofish::Twofish>(key),
        SymKeyType::Serpent => block::<serpent::Serpent>(key),
        SymKeyType::Camellia => block::<camellia::Camellia256>(key),
        SymKeyType::Sm4 => block::<sm4::Sm4>(key),
        SymKeyType::Aria => block::<aria::Aria256>(key),
    }
}

/// Creates a big-endian 128-bit counter mode (SIC) engine for a symmetric key type.
pub fn counter_engine(
    key_type: SymKeyType,
    key: &[u8],
    iv: &[u8],
) -> KeySetResult<Box<dyn StreamEngine>> {
    match key_type {
        SymKeyType::Aes => counter::<aes::Aes256>(key, iv),
        SymKeyType::Twofish => counter::<twofish::Twofish>(key, iv),
        SymKeyType::Serpent => counter::<serpent::Serpent>(key, iv),
        SymKeyType::Camellia => counter::<camellia::Camellia256>(key, iv),
        SymKeyType::Sm4 => counter::<sm4::Sm4>(key, iv),
        SymKeyType::Aria => counter::<aria::Aria256>(key, iv),
    }
}

/// Creates a stream cipher engine.
pub fn stream_engine(
    key_type: StreamKeyType,
    key: &[u8],
    iv: &[u8],
) -> KeySetResult<Box<dyn StreamEngine>> {
    match key_type {
        StreamKeyType::ChaCha20 => stream::<chacha20::ChaCha20>(key, iv),
        StreamKeyType::XChaCha20 => stream::<chacha20::XChaCha20>(key, iv),
        StreamKeyType::Salsa20 => stream::<salsa20::Salsa20>(key, iv),
        StreamKeyType::XSalsa20 => stream::<salsa20::XSalsa20>(key, iv),
    }
}

/// Creates a keyed MAC engine.
pub fn mac_engine(mac_type: MacType, key: &[u8]) -> KeySetResult<Box<dyn MacEngine>> {
    match mac_type {
        MacType::HMac(digest) => hmac_engine(digest, key),
        MacType::Blake2bMac => keyed::<blake2::Blake2bMac512>(key),
        MacType::Blake2sMac => keyed::<blake2::Blake2sMac256>(key),
    }
}

/// Creates an HMac engine over the given digest.
pub fn hmac_engine(digest: DigestType, key: &[u8]) -> KeySetResult<Box<dyn MacEngine>> {
    match digest {
        DigestType::Sha2_256 => keyed::<SimpleHmac<sha2::Sha256>>(key),
        DigestType::Sha2_384 => keyed::<SimpleHmac<sha2::Sha384>>(key),
        DigestType::Sha2_512 => keyed::<SimpleHmac<sha2::Sha512>>(key),
        DigestType::Sha3_256 => keyed::<SimpleHmac<sha3::Sha3_256>>(key),
        DigestType::Sha3_512 => keyed::<SimpleHmac<sha3::Sha3_512>>(key),
        DigestType::Blake2b512 => keyed::<SimpleHmac<blake2::Blake2b512>>(key),
        DigestType::Blake2s256 => keyed::<SimpleHmac<blake2::Blake2s256>>(key),
    }
}

/// Creates a digest.
#[must_use]
pub fn digest_engine(digest: DigestType) -> Box<dyn DynDigest + Send> {
    match digest {
        DigestType::Sha2_256 => Box::new(sha2::Sha256::default()),
        DigestType::Sha2_384 => Box::new(sha2::Sha384::default()),
        DigestType::Sha2_512 => Box::new(sha2::Sha512::default()),
        DigestType::Sha3_256 => Box::new(sha3::Sha3_256::default()),
        DigestType::Sha3_512 => Box::new(sha3::Sha3_512::default()),
        DigestType::Blake2b512 => Box::new(blake2::Blake2b512::default()),
        DigestType::Blake2s256 => Box::new(blake2::Blake2s256::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::algorithm::{Algorithm, KeyType};

    #[test]
    fn test_every_block_engine_roundtrips() -> KeySetResult<()> {
        for key_type in SymKeyType::catalog() {
            let key = vec![0x42u8; key_type.key_length()];
            let engine = block_engine(*key_type, &key)?;
            assert_eq!(engine.block_length(), key_type.block_length());

            let original = [0x13u8; 16];
            let mut block = original;
            engine.encrypt_block(&mut block)?;
            assert_ne!(block, original, "{key_type} left block unchanged");
            engine.decrypt_block(&mut block)?;
            assert_eq!(block, original, "{key_type} failed roundtrip");
        }
        Ok(())
    }

    #[test]
    fn test_block_engine_rejects_partial_block() -> KeySetResult<()> {
        let engine = block_engine(SymKeyType::Aes, &[0u8; 32])?;
        let mut short = [0u8; 15];
        assert!(matches!(
            engine.encrypt_block(&mut short),
            Err(KeySetError::InvalidBlockLength {
                block: 16,
                actual: 15
            })
        ));
        Ok(())
    }

    #[test]
    fn test_block_engine_rejects_bad_key() {
        assert!(matches!(
            block_engine(SymKeyType::Sm4, &[0u8; 32]),
            Err(KeySetError::InvalidKey)
        ));
    }

    #[test]
    fn test_every_stream_engine_is_symmetric() -> KeySetResult<()> {
        for key_type in StreamKeyType::catalog() {
            let key = [0x24u8; 32];
            let iv = vec![0x11u8; key_type.iv_length()];
            let original = b"stream cipher payload".to_vec();

            let mut data = original.clone();
            stream_engine(*key_type, &key, &iv)?.apply_keystream(&mut data);
            assert_ne!(data, original);
            stream_engine(*key_type, &key, &iv)?.apply_keystream(&mut data);
            assert_eq!(data, original);
        }
        Ok(())
    }

    #[test]
    fn test_counter_engine_matches_ctr_crate() -> KeySetResult<()> {
        use aes::cipher::{KeyIvInit, StreamCipher};

        let key = [0x01u8; 32];
        let iv = [0x02u8; 16];
        let mut expected = [0u8; 40];
        let mut reference = ctr::Ctr128BE::<aes::Aes256>::new(&key.into(), &iv.into());
        reference.apply_keystream(&mut expected);

        let mut actual = [0u8; 40];
        counter_engine(SymKeyType::Aes, &key, &iv)?.apply_keystream(&mut actual);
        assert_eq!(actual, expected);
        Ok(())
    }

    #[test]
    fn test_every_counter_engine_encrypts_counter_blocks() -> KeySetResult<()> {
        let mut iv = [0u8; 16];
        iv[15] = 0xFF;
        let mut next = iv;
        next[14] = 0x01;
        next[15] = 0x00;

        for key_type in SymKeyType::catalog() {
            let key = vec![0x42u8; key_type.key_length()];
            let mut keystream = [0u8; 32];
            counter_engine(*key_type, &key, &iv)?.apply_keystream(&mut keystream);

            let engine = block_engine(*key_type, &key)?;
            let mut first = iv;
            engine.encrypt_block(&mut first)?;
            let mut second = next;
            engine.encrypt_block(&mut second)?;

            assert_eq!(keystream[..16], first, "{key_type} first counter block");
            assert_eq!(keystream[16..], second, "{key_type} carried counter block");
        }
        Ok(())
    }

    #[test]
    fn test_counter_engine_accepts_serpent_key() -> KeySetResult<()> {
        let mut data = [0u8; 20];
        counter_engine(SymKeyType::Serpent, &[0x42; 32], &[0u8; 16])?.apply_keystream(&mut data);
        assert_ne!(data, [0u8; 20]);
        Ok(())
    }

    #[test]
    fn test_counter_engine_rejects_bad_iv() {
        assert!(matches!(
            counter_engine(SymKeyType::Twofish, &[0u8; 32], &[0u8; 12]),
            Err(KeySetError::InvalidKey)
        ));
    }

    #[test]
    fn test_mac_engine_resets_after_finish() -> KeySetResult<()> {
        for mac_type in MacType::catalog() {
            let key = vec![0x07u8; mac_type.key_length()];
            let mut mac = mac_engine(*mac_type, &key)?;
            assert_eq!(mac.output_length(), mac_type.output_length());

            mac.update(b"message");
            let first = mac.finish();
            mac.update(b"message");
            let second = mac.finish();
            assert_eq!(first, second, "{mac_type} did not reset");
            assert_eq!(first.len(), mac_type.output_length());
        }
        Ok(())
    }

    #[test]
    fn test_hmac_sha256_known_answer() -> KeySetResult<()> {
        // RFC 4231 test case 2
        let mut mac = hmac_engine(DigestType::Sha2_256, b"Jefe")?;
        mac.update(b"what do ya want for nothing?");
        assert_eq!(
            hex::encode(mac.finish()),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
        Ok(())
    }

    #[test]
    fn test_digest_output_lengths() {
        for digest in DigestType::catalog() {
            assert_eq!(digest_engine(*digest).output_size(), digest.output_length());
        }
    }
}
