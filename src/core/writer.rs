//! # Packet Writer
//!
//! Growable builder for outgoing packets.
//!
//! The backing buffer starts at a fixed capacity and doubles, as many times as a
//! single write needs, whenever a write would run past the end. Growth copies the
//! bytes written so far unchanged. The write position doubles as the logical
//! length: [`PacketWriter::to_vec`] returns exactly the bytes written, never the
//! spare capacity.

use std::fmt;

use bytes::Bytes;

use crate::core::{to_hex_string, Endian};
use crate::error::{constants, ProtocolError, Result};

/// Initial capacity of a writer created with [`PacketWriter::new`]
pub const DEFAULT_WRITER_CAPACITY: usize = 64;

/// Builder for outgoing packets
#[derive(Clone)]
pub struct PacketWriter {
    buffer: Vec<u8>,
    position: usize,
}

impl PacketWriter {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_WRITER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: vec![0u8; capacity.max(1)],
            position: 0,
        }
    }

    /// Create a writer that already holds a little-endian opcode
    pub fn with_opcode(opcode: u16) -> Self {
        Self::with_opcode_and_capacity(opcode, DEFAULT_WRITER_CAPACITY)
    }

    pub fn with_opcode_and_capacity(opcode: u16, capacity: usize) -> Self {
        let mut writer = Self::with_capacity(capacity);
        writer.write_u16(opcode);
        writer
    }

    /// Size of the backing buffer
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Number of bytes written so far
    pub fn len(&self) -> usize {
        self.position
    }

    pub fn is_empty(&self) -> bool {
        self.position == 0
    }

    fn ensure_capacity(&mut self, length: usize) {
        let required = self.position + length;
        if required <= self.buffer.len() {
            return;
        }
        let mut new_size = self.buffer.len() * 2;
        while new_size < required {
            new_size *= 2;
        }
        self.buffer.resize(new_size, 0);
    }

    fn write_uint(&mut self, value: u64, width: usize, endian: Endian) {
        self.ensure_capacity(width);
        endian.decompose(value, &mut self.buffer[self.position..self.position + width]);
        self.position += width;
    }

    pub fn write_u8(&mut self, value: u8) {
        self.ensure_capacity(1);
        self.buffer[self.position] = value;
        self.position += 1;
    }

    pub fn write_i8(&mut self, value: i8) {
        self.write_u8(value as u8);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(u8::from(value));
    }

    pub fn write_bytes(&mut self, value: &[u8]) {
        self.ensure_capacity(value.len());
        self.buffer[self.position..self.position + value.len()].copy_from_slice(value);
        self.position += value.len();
    }

    /// Write `count` zero bytes
    pub fn write_zero(&mut self, count: usize) {
        self.ensure_capacity(count);
        self.buffer[self.position..self.position + count].fill(0);
        self.position += count;
    }

    pub fn write_u16(&mut self, value: u16) {
        self.write_uint(u64::from(value), 2, Endian::Little);
    }

    pub fn write_i16(&mut self, value: i16) {
        self.write_u16(value as u16);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.write_uint(u64::from(value), 4, Endian::Little);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.write_u32(value as u32);
    }

    pub fn write_u64(&mut self, value: u64) {
        self.write_uint(value, 8, Endian::Little);
    }

    pub fn write_i64(&mut self, value: i64) {
        self.write_u64(value as u64);
    }

    pub fn write_u16_be(&mut self, value: u16) {
        self.write_uint(u64::from(value), 2, Endian::Big);
    }

    pub fn write_i16_be(&mut self, value: i16) {
        self.write_u16_be(value as u16);
    }

    pub fn write_u32_be(&mut self, value: u32) {
        self.write_uint(u64::from(value), 4, Endian::Big);
    }

    pub fn write_i32_be(&mut self, value: i32) {
        self.write_u32_be(value as u32);
    }

    pub fn write_u64_be(&mut self, value: u64) {
        self.write_uint(value, 8, Endian::Big);
    }

    pub fn write_i64_be(&mut self, value: i64) {
        self.write_u64_be(value as u64);
    }

    /// Write the UTF-8 bytes of `value` with no length prefix
    pub fn write_string(&mut self, value: &str) {
        self.write_bytes(value.as_bytes());
    }

    /// Write `value` as UTF-8, then pad with zero bytes up to `length`
    pub fn write_padded_string(&mut self, value: &str, length: usize) {
        self.write_string(value);
        self.write_zero(length.saturating_sub(value.len()));
    }

    /// Write an `i16` count of UTF-16 code units followed by the UTF-16LE text
    pub fn write_unicode_string(&mut self, value: &str) -> Result<()> {
        let units: Vec<u16> = value.encode_utf16().collect();
        let count = string_count(units.len())?;
        self.ensure_capacity(2 + units.len() * 2);
        self.write_i16(count);
        for unit in units {
            self.write_u16(unit);
        }
        Ok(())
    }

    /// Write an `i16` byte count followed by the UTF-8 text
    pub fn write_maple_string(&mut self, value: &str) -> Result<()> {
        let count = string_count(value.len())?;
        self.write_i16(count);
        self.write_string(value);
        Ok(())
    }

    /// Write bytes given as hex digits; whitespace between bytes is ignored
    pub fn write_hex_string(&mut self, value: &str) -> Result<()> {
        let digits: String = value.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = hex::decode(digits).map_err(|e| {
            ProtocolError::InvalidString(format!("{}: {e}", constants::ERR_INVALID_HEX))
        })?;
        self.write_bytes(&bytes);
        Ok(())
    }

    /// The bytes written so far
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer[..self.position]
    }

    /// Copy out exactly the bytes written so far
    pub fn to_vec(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }

    /// Consume the writer, keeping only the written bytes
    pub fn into_bytes(mut self) -> Bytes {
        self.buffer.truncate(self.position);
        Bytes::from(self.buffer)
    }
}

fn string_count(len: usize) -> Result<i16> {
    i16::try_from(len).map_err(|_| ProtocolError::OversizedPacket(len))
}

impl Default for PacketWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PacketWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_hex_string(self.as_slice()))
    }
}

impl fmt::Debug for PacketWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacketWriter")
            .field("position", &self.position)
            .field("capacity", &self.buffer.len())
            .finish()
    }
}
