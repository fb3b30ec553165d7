//! # Packet Reader
//!
//! Sequential, bounds-checked decoding over a received packet.
//!
//! Every read checks the requested length against the remaining bytes before it
//! touches the position. A failed read, including a failed composite read such as
//! a length-prefixed string, leaves the position exactly where it was.

use std::fmt;

use crate::core::{to_hex_string, Endian};
use crate::error::{constants, ProtocolError, Result};

/// Cursor over a borrowed packet buffer
#[derive(Clone)]
pub struct PacketReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> PacketReader<'a> {
    /// Create a reader positioned at the start of `buffer`
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    /// Create a reader that starts `skip` bytes into `buffer`
    pub fn with_skip(buffer: &'a [u8], skip: usize) -> Result<Self> {
        let mut reader = Self::new(buffer);
        reader.check_length(skip)?;
        reader.position = skip;
        Ok(reader)
    }

    /// The whole underlying buffer
    pub fn buffer(&self) -> &'a [u8] {
        self.buffer
    }

    /// Current read offset
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bytes left between the position and the end of the buffer
    pub fn available(&self) -> usize {
        self.buffer.len() - self.position
    }

    fn check_length(&self, length: usize) -> Result<()> {
        if length > self.available() {
            return Err(ProtocolError::OutOfRange {
                requested: length,
                available: self.available(),
            });
        }
        Ok(())
    }

    /// Run a composite read, rewinding to the starting position if any step fails.
    fn atomically<T>(&mut self, read: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let start = self.position;
        let result = read(self);
        if result.is_err() {
            self.position = start;
        }
        result
    }

    fn read_uint(&mut self, width: usize, endian: Endian) -> Result<u64> {
        let bytes = self.read_bytes(width)?;
        Ok(endian.compose(bytes))
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.check_length(1)?;
        let value = self.buffer[self.position];
        self.position += 1;
        Ok(value)
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        self.read_u8().map(|v| v as i8)
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        self.read_u8().map(|v| v != 0)
    }

    /// Borrow the next `count` bytes
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        self.check_length(count)?;
        let bytes = &self.buffer[self.position..self.position + count];
        self.position += count;
        Ok(bytes)
    }

    /// Read exactly `N` bytes into an array
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.read_uint(2, Endian::Little).map(|v| v as u16)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        self.read_u16().map(|v| v as i16)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_uint(4, Endian::Little).map(|v| v as u32)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.read_u32().map(|v| v as i32)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.read_uint(8, Endian::Little)
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        self.read_u64().map(|v| v as i64)
    }

    pub fn read_u16_be(&mut self) -> Result<u16> {
        self.read_uint(2, Endian::Big).map(|v| v as u16)
    }

    pub fn read_i16_be(&mut self) -> Result<i16> {
        self.read_u16_be().map(|v| v as i16)
    }

    pub fn read_u32_be(&mut self) -> Result<u32> {
        self.read_uint(4, Endian::Big).map(|v| v as u32)
    }

    pub fn read_i32_be(&mut self) -> Result<i32> {
        self.read_u32_be().map(|v| v as i32)
    }

    pub fn read_u64_be(&mut self) -> Result<u64> {
        self.read_uint(8, Endian::Big)
    }

    pub fn read_i64_be(&mut self) -> Result<i64> {
        self.read_u64_be().map(|v| v as i64)
    }

    /// Read `count` bytes as UTF-8
    pub fn read_string(&mut self, count: usize) -> Result<String> {
        self.atomically(|r| {
            let bytes = r.read_bytes(count)?;
            String::from_utf8(bytes.to_vec()).map_err(|_| {
                ProtocolError::InvalidString(constants::ERR_INVALID_UTF8.to_string())
            })
        })
    }

    /// Read an `i16` count followed by `count` UTF-16LE code units
    pub fn read_unicode_string(&mut self) -> Result<String> {
        self.atomically(|r| {
            let count = r.read_string_count()?;
            let bytes = r.read_bytes(count * 2)?;
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|pair| Endian::Little.compose(pair) as u16)
                .collect();
            String::from_utf16(&units).map_err(|_| {
                ProtocolError::InvalidString(constants::ERR_INVALID_UTF16.to_string())
            })
        })
    }

    /// Read an `i16` count followed by `count` UTF-8 bytes
    pub fn read_maple_string(&mut self) -> Result<String> {
        self.atomically(|r| {
            let count = r.read_string_count()?;
            r.read_string(count)
        })
    }

    fn read_string_count(&mut self) -> Result<usize> {
        let count = self.read_i16()?;
        usize::try_from(count)
            .map_err(|_| ProtocolError::InvalidString(constants::ERR_NEGATIVE_LENGTH.to_string()))
    }

    /// Read `count` bytes and render them as spaced hex
    pub fn read_hex_string(&mut self, count: usize) -> Result<String> {
        self.read_bytes(count).map(to_hex_string)
    }

    /// Move the position by `count` bytes, forward or backward
    pub fn skip(&mut self, count: isize) -> Result<()> {
        match self.position.checked_add_signed(count) {
            Some(target) if target <= self.buffer.len() => {
                self.position = target;
                Ok(())
            }
            _ => Err(ProtocolError::OutOfRange {
                requested: count.unsigned_abs(),
                available: if count < 0 {
                    self.position
                } else {
                    self.available()
                },
            }),
        }
    }

    /// Advance to just past the next occurrence of `byte`
    pub fn next(&mut self, byte: u8) -> Result<()> {
        match self.buffer[self.position..].iter().position(|&b| b == byte) {
            Some(offset) => {
                self.position += offset + 1;
                Ok(())
            }
            None => Err(ProtocolError::OutOfRange {
                requested: self.available() + 1,
                available: self.available(),
            }),
        }
    }

    /// Copy the whole underlying buffer
    pub fn to_vec(&self) -> Vec<u8> {
        self.buffer.to_vec()
    }
}

impl fmt::Display for PacketReader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_hex_string(self.buffer))
    }
}

impl fmt::Debug for PacketReader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacketReader")
            .field("position", &self.position)
            .field("length", &self.buffer.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn test_read_little_endian_widths() {
        let data = [
            0x01, 0x34, 0x12, 0x78, 0x56, 0x34, 0x12, 0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02,
            0x01,
        ];
        let mut reader = PacketReader::new(&data);
        assert_eq!(reader.read_u8().unwrap(), 0x01);
        assert_eq!(reader.read_u16().unwrap(), 0x1234);
        assert_eq!(reader.read_u32().unwrap(), 0x1234_5678);
        assert_eq!(reader.read_u64().unwrap(), 0x0102_0304_0506_0708);
        assert_eq!(reader.available(), 0);
    }

    #[test]
    fn test_read_big_endian() {
        let data = [0x12, 0x34, 0xDE, 0xAD, 0xBE, 0xEF];
        let mut reader = PacketReader::new(&data);
        assert_eq!(reader.read_u16_be().unwrap(), 0x1234);
        assert_eq!(reader.read_u32_be().unwrap(), 0xDEAD_BEEF);
    }

    #[test]
    fn test_signed_reads() {
        let data = [0xFF, 0xFE, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
        let mut reader = PacketReader::new(&data);
        assert_eq!(reader.read_i8().unwrap(), -1);
        assert_eq!(reader.read_i16().unwrap(), -2);
        assert_eq!(reader.read_i32().unwrap(), -1);
    }

    #[test]
    fn test_out_of_range_does_not_advance() {
        let data = [0x01, 0x02, 0x03];
        let mut reader = PacketReader::new(&data);
        reader.read_u8().unwrap();

        let err = reader.read_u32().unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::OutOfRange {
                requested: 4,
                available: 2
            }
        ));
        assert_eq!(reader.position(), 1);

        // A valid read from the unchanged position still succeeds
        assert_eq!(reader.read_u16().unwrap(), 0x0302);
    }

    #[test]
    fn test_truncated_string_rewinds() {
        // Claims 5 UTF-16 units but only carries one
        let data = [0x05, 0x00, 0x41, 0x00];
        let mut reader = PacketReader::new(&data);
        assert!(reader.read_unicode_string().is_err());
        assert_eq!(reader.position(), 0);
        assert!(reader.read_maple_string().is_err());
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn test_unicode_string() {
        let data = [0x03, 0x00, b'a', 0x00, b'b', 0x00, 0x60, 0x4F];
        let mut reader = PacketReader::new(&data);
        assert_eq!(reader.read_unicode_string().unwrap(), "ab\u{4F60}");
    }

    #[test]
    fn test_negative_string_count() {
        let data = [0xFF, 0xFF, 0x00];
        let mut reader = PacketReader::new(&data);
        assert!(matches!(
            reader.read_maple_string(),
            Err(ProtocolError::InvalidString(_))
        ));
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn test_maple_string() {
        let data = [0x02, 0x00, b'1', b'2', 0x07];
        let mut reader = PacketReader::new(&data);
        assert_eq!(reader.read_maple_string().unwrap(), "12");
        assert_eq!(reader.read_u8().unwrap(), 7);
    }

    #[test]
    fn test_skip_forward_and_backward() {
        let data = [0u8, 1, 2, 3, 4];
        let mut reader = PacketReader::new(&data);
        reader.skip(3).unwrap();
        assert_eq!(reader.read_u8().unwrap(), 3);
        reader.skip(-2).unwrap();
        assert_eq!(reader.read_u8().unwrap(), 2);
        assert!(reader.skip(-10).is_err());
        assert!(reader.skip(10).is_err());
        assert!(matches!(
            reader.skip(isize::MAX),
            Err(ProtocolError::OutOfRange { available: 2, .. })
        ));
        assert!(reader.skip(isize::MIN).is_err());
        assert_eq!(reader.position(), 3);
        reader.skip(2).unwrap();
        assert_eq!(reader.available(), 0);
    }

    #[test]
    fn test_next_byte() {
        let data = [0x10, 0x20, 0xFF, 0x30];
        let mut reader = PacketReader::new(&data);
        reader.next(0xFF).unwrap();
        assert_eq!(reader.read_u8().unwrap(), 0x30);

        let mut reader = PacketReader::new(&data);
        assert!(reader.next(0xAB).is_err());
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn test_with_skip() {
        let data = [0u8; 4];
        assert_eq!(PacketReader::with_skip(&data, 4).unwrap().available(), 0);
        assert!(PacketReader::with_skip(&data, 5).is_err());
    }

    #[test]
    fn test_hex_string_and_display() {
        let data = [0xAB, 0x01];
        let mut reader = PacketReader::new(&data);
        assert_eq!(reader.read_hex_string(2).unwrap(), "AB 01");
        assert_eq!(reader.to_string(), "AB 01");
    }
}
