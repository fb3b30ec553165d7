//! Handshake payload.
//!
//! The first frame on a game connection is sent in the clear:
//! ```text
//! [length: u16 LE] [version: u16 LE] [subversion: maple string]
//! [send iv: 4] [recv iv: 4] [locale: u8]
//! ```
//! Both IVs are named from the client's point of view: the client encrypts with
//! `send_iv` and decrypts with `recv_iv`. An acceptor uses them the other way round.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::reader::PacketReader;
use crate::core::writer::PacketWriter;
use crate::crypto::aes_cipher::IV_LEN;
use crate::error::{constants, ProtocolError, Result};
use crate::utils::rng;

/// Length of the plain length prefix in front of the handshake body
pub const HANDSHAKE_HEADER_SIZE: usize = 2;

/// Negotiated session parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub version: u16,
    pub subversion: String,
    pub send_iv: [u8; IV_LEN],
    pub recv_iv: [u8; IV_LEN],
    pub locale: u8,
}

impl ServerInfo {
    /// Handshake parameters with fresh random IVs, for the accepting side
    pub fn generate<R: Rng + ?Sized>(
        version: u16,
        subversion: impl Into<String>,
        locale: u8,
        rng: &mut R,
    ) -> Self {
        Self {
            version,
            subversion: subversion.into(),
            send_iv: rng::random_iv(rng),
            recv_iv: rng::random_iv(rng),
            locale,
        }
    }

    /// Decode a handshake body (the bytes after the length prefix)
    pub fn decode(body: &[u8]) -> Result<Self> {
        let mut reader = PacketReader::new(body);
        Self::read(&mut reader).map_err(|e| {
            ProtocolError::HandshakeError(format!("{}: {e}", constants::ERR_MALFORMED_HANDSHAKE))
        })
    }

    fn read(reader: &mut PacketReader<'_>) -> Result<Self> {
        Ok(Self {
            version: reader.read_u16()?,
            subversion: reader.read_maple_string()?,
            send_iv: reader.read_array()?,
            recv_iv: reader.read_array()?,
            locale: reader.read_u8()?,
        })
    }

    /// Encode the handshake body without its length prefix
    pub fn encode_body(&self) -> Result<Vec<u8>> {
        let mut writer = PacketWriter::with_capacity(16);
        writer.write_u16(self.version);
        writer.write_maple_string(&self.subversion)?;
        writer.write_bytes(&self.send_iv);
        writer.write_bytes(&self.recv_iv);
        writer.write_u8(self.locale);
        Ok(writer.to_vec())
    }

    /// Encode the complete handshake frame, length prefix included
    pub fn to_frame(&self) -> Result<Vec<u8>> {
        let body = self.encode_body()?;
        let length = u16::try_from(body.len()).map_err(|_| ProtocolError::OversizedPacket(body.len()))?;

        let mut writer = PacketWriter::with_capacity(HANDSHAKE_HEADER_SIZE + body.len());
        writer.write_u16(length);
        writer.write_bytes(&body);
        Ok(writer.to_vec())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sample() -> ServerInfo {
        ServerInfo {
            version: 12,
            subversion: "1".to_string(),
            send_iv: [1, 2, 3, 4],
            recv_iv: [5, 6, 7, 8],
            locale: 2,
        }
    }

    #[test]
    fn test_frame_layout() {
        let frame = sample().to_frame().unwrap();
        assert_eq!(
            frame,
            vec![
                0x0E, 0x00, // body length 14
                0x0C, 0x00, // version
                0x01, 0x00, b'1', // subversion
                1, 2, 3, 4, // send iv
                5, 6, 7, 8, // recv iv
                2, // locale
            ]
        );
    }

    #[test]
    fn test_decode_body() {
        let frame = sample().to_frame().unwrap();
        let info = ServerInfo::decode(&frame[HANDSHAKE_HEADER_SIZE..]).unwrap();
        assert_eq!(info, sample());
    }

    #[test]
    fn test_decode_truncated_body() {
        let frame = sample().to_frame().unwrap();
        let result = ServerInfo::decode(&frame[HANDSHAKE_HEADER_SIZE..frame.len() - 1]);
        assert!(matches!(result, Err(ProtocolError::HandshakeError(_))));
    }

    #[test]
    fn test_generate_uses_fresh_ivs() {
        let mut rng = StdRng::seed_from_u64(1);
        let a = ServerInfo::generate(12, "1", 2, &mut rng);
        let b = ServerInfo::generate(12, "1", 2, &mut rng);
        assert_ne!((a.send_iv, a.recv_iv), (b.send_iv, b.recv_iv));
    }
}
