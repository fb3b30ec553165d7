//! # Core Packet Components
//!
//! Low-level packet handling: sequential binary reads and writes, and the
//! receive-side accumulation buffer.
//!
//! This module provides the foundation for the protocol. Every multi-byte field
//! on the wire is composed and decomposed with explicit byte shifts through
//! [`Endian`], so the encoding never depends on the host byte order.
//!
//! ## Components
//! - **PacketReader**: bounds-checked cursor over a received packet
//! - **PacketWriter**: growable builder for outgoing packets
//! - **RecvBuffer**: growable holding area for bytes not yet delimited into frames
//!
//! ## String Encodings
//! ```text
//! unicode string: [count: i16 LE] [count * 2 bytes UTF-16LE]
//! maple string:   [count: i16 LE] [count bytes UTF-8]
//! ```

pub mod buffer;
pub mod reader;
pub mod writer;

/// Byte order of a multi-byte wire field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    /// Least significant byte first (the default for packet bodies)
    Little,
    /// Most significant byte first (used by authentication headers)
    Big,
}

impl Endian {
    /// Compose an unsigned integer from up to eight bytes.
    #[inline]
    pub fn compose(self, bytes: &[u8]) -> u64 {
        debug_assert!(bytes.len() <= 8);
        match self {
            Endian::Little => bytes
                .iter()
                .enumerate()
                .fold(0u64, |acc, (i, &b)| acc | (u64::from(b) << (8 * i))),
            Endian::Big => bytes
                .iter()
                .fold(0u64, |acc, &b| (acc << 8) | u64::from(b)),
        }
    }

    /// Decompose the low `out.len()` bytes of `value` into `out`.
    #[inline]
    pub fn decompose(self, value: u64, out: &mut [u8]) {
        debug_assert!(out.len() <= 8);
        let width = out.len();
        for (i, slot) in out.iter_mut().enumerate() {
            let shift = match self {
                Endian::Little => 8 * i,
                Endian::Big => 8 * (width - 1 - i),
            };
            *slot = (value >> shift) as u8;
        }
    }
}

/// Render bytes as upper-case hex separated by single spaces.
pub fn to_hex_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| hex::encode_upper([*b]))
        .collect::<Vec<_>>()
        .join(" ")
}
