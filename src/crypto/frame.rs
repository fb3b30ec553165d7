//! # Packet Framing Cipher
//!
//! Per-direction cipher that the session engine drives for encrypted traffic.
//!
//! The session only depends on the [`FrameCipher`] contract: transform a packet
//! body in place, produce the 4-byte length header for an outgoing packet, and
//! recover the body length from the 4-byte header of an incoming one. Protocol
//! versions that obfuscate the header differently plug in their own
//! implementation.
//!
//! [`MapleCipher`] is the implementation used by default:
//! ```text
//! a = LE16(iv[2], iv[3]) ^ mask      mask = version (to server) | !version (to client)
//! b = a ^ length
//! header = [a_lo, a_hi, b_lo, b_hi]
//! length = LE16(h[0], h[1]) ^ LE16(h[2], h[3])
//! ```
//! Its rolling value advances after every transformed packet, so two packets
//! with the same plaintext never share a keystream.

use std::sync::Arc;

use crate::core::Endian;
use crate::crypto::aes_cipher::{tile, AesCipher, IV_LEN};
use crate::error::{ProtocolError, Result};

/// Length of the obfuscated length header that precedes every encrypted packet
pub const PACKET_HEADER_SIZE: usize = 4;

/// Which way a packet travels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client to server
    ToServer,
    /// Server to client
    ToClient,
}

/// Contract between the session engine and a versioned packet cipher
pub trait FrameCipher: Send + Sync + Sized + 'static {
    /// Build the cipher for one direction of a session
    fn new(version: u16, iv: [u8; IV_LEN], aes: Arc<AesCipher>) -> Self;

    /// Encrypt or decrypt a packet body in place and advance the cipher state
    fn transform(&mut self, data: &mut [u8]);

    /// Obfuscated length header for an outgoing packet of `length` bytes
    fn encode_header(&self, length: usize, direction: Direction) -> Result<[u8; PACKET_HEADER_SIZE]>;

    /// Body length announced by the first four buffered bytes
    fn decode_length(header: &[u8; PACKET_HEADER_SIZE]) -> usize;
}

/// Default versioned packet cipher built on the shared AES stream transform
#[derive(Debug, Clone)]
pub struct MapleCipher {
    version: u16,
    iv: [u8; IV_LEN],
    aes: Arc<AesCipher>,
}

impl MapleCipher {
    pub fn version(&self) -> u16 {
        self.version
    }

    /// Current rolling value
    pub fn iv(&self) -> [u8; IV_LEN] {
        self.iv
    }

    fn roll_iv(&mut self) {
        let mut block = tile(self.iv);
        self.aes.encrypt_block(&mut block);
        self.iv.copy_from_slice(&block[..IV_LEN]);
    }
}

impl FrameCipher for MapleCipher {
    fn new(version: u16, iv: [u8; IV_LEN], aes: Arc<AesCipher>) -> Self {
        Self { version, iv, aes }
    }

    fn transform(&mut self, data: &mut [u8]) {
        self.aes.transform(data, self.iv);
        self.roll_iv();
    }

    fn encode_header(&self, length: usize, direction: Direction) -> Result<[u8; PACKET_HEADER_SIZE]> {
        let length = u16::try_from(length).map_err(|_| ProtocolError::OversizedPacket(length))?;
        let mask = match direction {
            Direction::ToServer => self.version,
            Direction::ToClient => !self.version,
        };
        let a = Endian::Little.compose(&self.iv[2..4]) as u16 ^ mask;
        let b = a ^ length;

        let mut header = [0u8; PACKET_HEADER_SIZE];
        Endian::Little.decompose(u64::from(a), &mut header[..2]);
        Endian::Little.decompose(u64::from(b), &mut header[2..]);
        Ok(header)
    }

    fn decode_length(header: &[u8; PACKET_HEADER_SIZE]) -> usize {
        let a = Endian::Little.compose(&header[..2]);
        let b = Endian::Little.compose(&header[2..]);
        (a ^ b) as usize
    }
}
