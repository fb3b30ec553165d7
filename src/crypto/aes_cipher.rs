//! # AES Stream Transform
//!
//! Keystream XOR transform keyed by a shared 32-byte AES key and a per-direction
//! 4-byte rolling value.
//!
//! The keystream is generated as follows:
//! 1. A 16-byte morph key is seeded once by tiling the rolling value four times.
//! 2. The data is cut into segments: the first is at most `0x5B0` bytes, every
//!    later one at most `0x5B4` bytes.
//! 3. Each 16-byte block of a segment (blocks restart at every segment start)
//!    first runs the morph key through one AES-256 ECB encryption, then XORs the
//!    block with the refreshed morph key.
//!
//! The morph key carries over from one segment to the next. XOR is its own
//! inverse, so the same call encrypts and decrypts.

use std::fmt;

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes256;
use tracing::debug;

use crate::error::{ProtocolError, Result};

/// Required length of the shared AES key
pub const AES_KEY_LEN: usize = 32;

/// AES block length, and the length of the morph key
pub const AES_BLOCK_LEN: usize = 16;

/// Length of the rolling value
pub const IV_LEN: usize = 4;

/// Maximum length of the first keystream segment
pub const FIRST_SEGMENT_LEN: usize = 0x5B0;

/// Maximum length of every following keystream segment
pub const SEGMENT_LEN: usize = 0x5B4;

/// Keyed stream transform.
///
/// Immutable once constructed: `transform` takes `&self` and is a pure function
/// of the key, the rolling value and the data, so a single instance can be
/// shared (`Arc<AesCipher>`) by both directions of a session and across sessions.
#[derive(Clone)]
pub struct AesCipher {
    cipher: Aes256,
}

impl AesCipher {
    /// Key the transform. Fails unless `key` is exactly 32 bytes.
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.len() != AES_KEY_LEN {
            return Err(ProtocolError::InvalidKeyLength(key.len()));
        }
        let cipher =
            Aes256::new_from_slice(key).map_err(|_| ProtocolError::InvalidKeyLength(key.len()))?;
        debug!("AES stream transform keyed");
        Ok(Self { cipher })
    }

    /// Encrypt a single 16-byte block in place (ECB, no padding)
    #[inline]
    pub fn encrypt_block(&self, block: &mut [u8; AES_BLOCK_LEN]) {
        self.cipher
            .encrypt_block(GenericArray::from_mut_slice(&mut block[..]));
    }

    /// XOR `data` in place with the keystream derived from `iv`
    pub fn transform(&self, data: &mut [u8], iv: [u8; IV_LEN]) {
        let mut morph_key = tile(iv);
        let mut start = 0;
        let mut segment = FIRST_SEGMENT_LEN;

        while start < data.len() {
            let end = (start + segment).min(data.len());
            for block in data[start..end].chunks_mut(AES_BLOCK_LEN) {
                self.encrypt_block(&mut morph_key);
                for (byte, key) in block.iter_mut().zip(morph_key.iter()) {
                    *byte ^= key;
                }
            }
            start = end;
            segment = SEGMENT_LEN;
        }
    }
}

/// Spread a rolling value over a full block: byte `i` is `iv[i % 4]`
pub(crate) fn tile(iv: [u8; IV_LEN]) -> [u8; AES_BLOCK_LEN] {
    let mut block = [0u8; AES_BLOCK_LEN];
    for (i, byte) in block.iter_mut().enumerate() {
        *byte = iv[i % IV_LEN];
    }
    block
}

impl fmt::Debug for AesCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AesCipher").finish_non_exhaustive()
    }
}
