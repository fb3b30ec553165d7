//! Receive-side framing state machine.
//!
//! [`FrameDecoder`] owns the accumulation buffer and the inbound cipher. It knows
//! nothing about sockets: bytes go in through [`FrameDecoder::extend`] and
//! complete frames come out of [`FrameDecoder::next_frame`].
//!
//! Before the handshake a frame is `[length: u16 LE][body]` and its body is a
//! [`ServerInfo`]. Decoding it builds the inbound cipher, switches to encrypted
//! mode and discards everything else still buffered. From then on a frame is
//! `[obfuscated length: 4][encrypted body]`.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, trace};

use crate::core::buffer::RecvBuffer;
use crate::core::Endian;
use crate::crypto::{AesCipher, FrameCipher, PACKET_HEADER_SIZE};
use crate::error::Result;
use crate::protocol::server_info::{ServerInfo, HANDSHAKE_HEADER_SIZE};

/// A complete unit delimited from the byte stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Handshake(ServerInfo),
    Packet(Bytes),
}

pub struct FrameDecoder<C: FrameCipher> {
    buffer: RecvBuffer,
    aes: Arc<AesCipher>,
    cipher: Option<C>,
}

impl<C: FrameCipher> FrameDecoder<C> {
    /// A decoder waiting for the plain handshake frame
    pub fn new(aes: Arc<AesCipher>, capacity: usize) -> Self {
        Self {
            buffer: RecvBuffer::with_capacity(capacity),
            aes,
            cipher: None,
        }
    }

    /// A decoder that starts in encrypted mode with an existing inbound cipher
    pub fn encrypted(aes: Arc<AesCipher>, capacity: usize, cipher: C) -> Self {
        Self {
            buffer: RecvBuffer::with_capacity(capacity),
            aes,
            cipher: Some(cipher),
        }
    }

    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }

    /// Bytes received but not yet delivered
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.append(data);
    }

    /// Drop buffered bytes and the inbound cipher
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.cipher = None;
    }

    /// Take the next complete frame, or `None` until more bytes arrive
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.cipher.is_some() {
            self.next_packet()
        } else {
            self.next_handshake()
        }
    }

    fn next_handshake(&mut self) -> Result<Option<Frame>> {
        let pending = self.buffer.as_slice();
        if pending.len() < HANDSHAKE_HEADER_SIZE {
            return Ok(None);
        }

        let length = Endian::Little.compose(&pending[..HANDSHAKE_HEADER_SIZE]) as usize;
        if pending.len() < HANDSHAKE_HEADER_SIZE + length {
            trace!(buffered = pending.len(), length, "Waiting for complete handshake");
            return Ok(None);
        }

        let info = ServerInfo::decode(&pending[HANDSHAKE_HEADER_SIZE..HANDSHAKE_HEADER_SIZE + length])?;
        self.cipher = Some(C::new(info.version, info.recv_iv, Arc::clone(&self.aes)));
        // the handshake is one-shot; nothing buffered behind it is kept
        self.buffer.clear();

        debug!(version = info.version, locale = info.locale, "Handshake decoded");
        Ok(Some(Frame::Handshake(info)))
    }

    fn next_packet(&mut self) -> Result<Option<Frame>> {
        let pending = self.buffer.as_slice();
        if pending.len() < PACKET_HEADER_SIZE {
            return Ok(None);
        }

        let mut header = [0u8; PACKET_HEADER_SIZE];
        header.copy_from_slice(&pending[..PACKET_HEADER_SIZE]);
        let length = C::decode_length(&header);
        let total = PACKET_HEADER_SIZE + length;
        if pending.len() < total {
            trace!(buffered = pending.len(), length, "Waiting for complete packet");
            return Ok(None);
        }

        let mut body = pending[PACKET_HEADER_SIZE..total].to_vec();
        self.buffer.consume(total);

        if let Some(cipher) = self.cipher.as_mut() {
            cipher.transform(&mut body);
        }
        Ok(Some(Frame::Packet(Bytes::from(body))))
    }
}
