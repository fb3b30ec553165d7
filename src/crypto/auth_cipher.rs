//! # Authentication Cipher
//!
//! Static-table XOR obfuscation and header framing for the pre-session
//! authentication exchange.
//!
//! The payload is processed as little-endian 32-bit words. Word `n` is XORed with
//! `seed ^ previous ^ XOR_TABLE[n % 16]`, where `previous` is the plaintext of
//! word `n - 1` (zero for the first word). Trailing bytes that do not fill a
//! whole word pass through untouched.
//!
//! ## Frame Layout
//! ```text
//! [total: u16 BE = 16 + len] [opcode: u16 BE] [0x18 0x00]
//! [secondary: u16 BE = 12 + len] [0x02 0x00]
//! [len: u16 BE] [seed: u32 BE] [static key: 4] [payload: len]
//! ```

use crate::core::reader::PacketReader;
use crate::core::writer::PacketWriter;
use crate::core::Endian;
use crate::error::{ProtocolError, Result};

/// Length of the fixed primary header (total length and opcode)
pub const PRIMARY_LENGTH: u16 = 4;

/// Length of the fixed secondary header that follows the primary header
pub const SECONDARY_LENGTH: u16 = 16;

/// Offset of the payload in a framed packet
pub const HEADER_LENGTH: usize = (PRIMARY_LENGTH + SECONDARY_LENGTH) as usize;

const MARKER_PRIMARY: [u8; 2] = [0x18, 0x00];
const MARKER_SECONDARY: [u8; 2] = [0x02, 0x00];

const XOR_TABLE: [u32; 16] = [
    0x40FC_1578, 0x113B_6C1F, 0x8389_CA19, 0xE219_6CD8,
    0x7490_1489, 0x4AAB_1566, 0x7B8C_12A0, 0x0018_FFCD,
    0xCCAB_704B, 0x7B5A_8C0F, 0xAA13_B891, 0xDE41_9807,
    0x12FF_BCAE, 0x5F5F_BA34, 0x10F5_AC99, 0xB1C1_DD01,
];

#[inline]
fn load(word: &[u8]) -> u32 {
    Endian::Little.compose(word) as u32
}

#[inline]
fn store(word: &mut [u8], value: u32) {
    Endian::Little.decompose(u64::from(value), word);
}

/// Obfuscate `buffer` in place
pub fn encrypt(buffer: &mut [u8], seed: u32) {
    let mut prev = 0u32;
    for (n, word) in buffer.chunks_exact_mut(4).enumerate() {
        let plain = load(word);
        store(word, plain ^ seed ^ prev ^ XOR_TABLE[n % 16]);
        prev = plain;
    }
}

/// Reverse [`encrypt`] in place
pub fn decrypt(buffer: &mut [u8], seed: u32) {
    let mut prev = 0u32;
    for (n, word) in buffer.chunks_exact_mut(4).enumerate() {
        let plain = load(word) ^ seed ^ prev ^ XOR_TABLE[n % 16];
        store(word, plain);
        prev = plain;
    }
}

/// Encrypt `payload` with `seed` and wrap it in the authentication header
pub fn write_header(opcode: u16, code: [u8; 4], mut payload: Vec<u8>, seed: u32) -> Result<Vec<u8>> {
    let length = u16::try_from(payload.len())
        .ok()
        .filter(|len| len.checked_add(SECONDARY_LENGTH).is_some())
        .ok_or(ProtocolError::OversizedPacket(payload.len()))?;

    encrypt(&mut payload, seed);

    let mut writer = PacketWriter::with_capacity(HEADER_LENGTH + payload.len());
    writer.write_u16_be(SECONDARY_LENGTH + length);
    writer.write_u16_be(opcode);
    writer.write_bytes(&MARKER_PRIMARY);
    writer.write_u16_be(SECONDARY_LENGTH - PRIMARY_LENGTH + length);
    writer.write_bytes(&MARKER_SECONDARY);
    writer.write_u16_be(length);
    writer.write_u32_be(seed);
    writer.write_bytes(&code);
    writer.write_bytes(&payload);

    Ok(writer.to_vec())
}

/// A parsed authentication frame with its payload already decrypted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthFrame {
    pub opcode: u16,
    pub seed: u32,
    pub code: [u8; 4],
    pub payload: Vec<u8>,
}

/// Parse an authentication frame and decrypt its payload
pub fn parse_frame(packet: &[u8]) -> Result<AuthFrame> {
    let mut reader = PacketReader::new(packet);
    reader.skip(2)?;
    let opcode = reader.read_u16_be()?;
    // markers and secondary length
    reader.skip(6)?;
    let length = reader.read_u16_be()? as usize;
    let seed = reader.read_u32_be()?;
    let code = reader.read_array::<4>()?;
    let mut payload = reader.read_bytes(length)?.to_vec();

    decrypt(&mut payload, seed);

    Ok(AuthFrame {
        opcode,
        seed,
        code,
        payload,
    })
}

/// Extract and decrypt the payload of an authentication frame
pub fn read_header(packet: &[u8]) -> Result<Vec<u8>> {
    parse_frame(packet).map(|frame| frame.payload)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn test_first_word_uses_table_and_seed() {
        let mut data = [0u8; 4];
        encrypt(&mut data, 0);
        assert_eq!(data, XOR_TABLE[0].to_le_bytes());

        let mut data = [0u8; 4];
        encrypt(&mut data, 0xFFFF_FFFF);
        assert_eq!(data, (!XOR_TABLE[0]).to_le_bytes());
    }

    #[test]
    fn test_chaining_uses_plaintext_of_previous_word() {
        let mut data = [1, 0, 0, 0, 0, 0, 0, 0];
        encrypt(&mut data, 0);
        let second = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        assert_eq!(second, 1 ^ XOR_TABLE[1]);
    }

    #[test]
    fn test_round_trip() {
        for len in [0usize, 4, 8, 64, 128] {
            let original: Vec<u8> = (0..len).map(|i| (i * 7 + 3) as u8).collect();
            let mut data = original.clone();
            encrypt(&mut data, 0xDEAD_BEEF);
            if len > 0 {
                assert_ne!(data, original);
            }
            decrypt(&mut data, 0xDEAD_BEEF);
            assert_eq!(data, original);
        }
    }

    #[test]
    fn test_trailing_bytes_untouched() {
        for tail in 1..=3 {
            let original: Vec<u8> = (0..8 + tail).map(|i| i as u8).collect();
            let mut data = original.clone();
            encrypt(&mut data, 0x1234_5678);
            assert_eq!(data[8..], original[8..]);
            decrypt(&mut data, 0x1234_5678);
            assert_eq!(data, original);
        }
    }

    #[test]
    fn test_header_layout() {
        let frame = write_header(0x33, [0xAA, 0xBB, 0xCC, 0xDD], vec![0; 8], 0x0102_0304).unwrap();
        assert_eq!(frame.len(), HEADER_LENGTH + 8);
        assert_eq!(
            &frame[..HEADER_LENGTH],
            &[
                0x00, 0x18, // 16 + 8
                0x00, 0x33, // opcode
                0x18, 0x00, //
                0x00, 0x14, // 12 + 8
                0x02, 0x00, //
                0x00, 0x08, // payload length
                0x01, 0x02, 0x03, 0x04, // seed
                0xAA, 0xBB, 0xCC, 0xDD, // static key
            ]
        );
    }

    #[test]
    fn test_parse_recovers_payload() {
        let payload: Vec<u8> = (0..22).collect();
        let frame = write_header(0x2D, [1, 2, 3, 4], payload.clone(), 42).unwrap();
        let parsed = parse_frame(&frame).unwrap();
        assert_eq!(parsed.opcode, 0x2D);
        assert_eq!(parsed.seed, 42);
        assert_eq!(parsed.code, [1, 2, 3, 4]);
        assert_eq!(parsed.payload, payload);
        assert_eq!(read_header(&frame).unwrap(), payload);
    }

    #[test]
    fn test_parse_truncated_frame() {
        let frame = write_header(0x35, [0; 4], vec![9; 16], 7).unwrap();
        assert!(matches!(
            read_header(&frame[..frame.len() - 1]),
            Err(ProtocolError::OutOfRange { .. })
        ));
        assert!(read_header(&frame[..10]).is_err());
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let result = write_header(0x33, [0; 4], vec![0; 0xFFF0], 1);
        assert!(matches!(result, Err(ProtocolError::OversizedPacket(_))));
    }
}
