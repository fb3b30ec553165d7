//! # Receive Buffer
//!
//! Holding area for bytes received from the socket but not yet delimited into
//! complete frames.
//!
//! Capacity only grows, by doubling, and never shrinks for the lifetime of the
//! buffer. The cursor counts the valid pending bytes (`0 <= cursor <= capacity`).
//! Consuming a frame shifts whatever follows it to the front; there is no ring
//! wraparound.

/// Initial capacity of the receive buffer, and the size of a single socket read
pub const RECEIVE_SIZE: usize = 1024;

#[derive(Debug, Clone)]
pub struct RecvBuffer {
    buffer: Vec<u8>,
    cursor: usize,
}

impl RecvBuffer {
    pub fn new() -> Self {
        Self::with_capacity(RECEIVE_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: vec![0u8; capacity.max(1)],
            cursor: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Number of valid pending bytes
    pub fn len(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.cursor == 0
    }

    /// The valid pending bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer[..self.cursor]
    }

    /// Append freshly received bytes, doubling the capacity as often as needed
    pub fn append(&mut self, data: &[u8]) {
        let required = self.cursor + data.len();
        if required > self.buffer.len() {
            let mut new_size = self.buffer.len() * 2;
            while new_size < required {
                new_size *= 2;
            }
            self.buffer.resize(new_size, 0);
        }
        self.buffer[self.cursor..required].copy_from_slice(data);
        self.cursor = required;
    }

    /// Drop the first `count` pending bytes and move the rest to the front
    pub fn consume(&mut self, count: usize) {
        let count = count.min(self.cursor);
        self.buffer.copy_within(count..self.cursor, 0);
        self.cursor -= count;
    }

    /// Forget all pending bytes; capacity is kept
    pub fn clear(&mut self) {
        self.cursor = 0;
    }
}

impl Default for RecvBuffer {
    fn default() -> Self {
        Self::new()
    }
}
