//! # Error Types
//!
//! Error handling for the session engine and its ciphers.
//!
//! This module defines all error variants that can occur while reading or building
//! packets, keying ciphers, running the handshake and moving bytes over the socket.
//!
//! ## Error Categories
//! - **Configuration Errors**: wrong key length, bad payload length on send, bad config files
//! - **Buffer Errors**: reads past the end of a packet, undecodable strings
//! - **Session Errors**: not connected, handshake still pending, malformed handshake
//! - **Network Errors**: I/O failures, closed connections, connect timeouts
//!
//! All errors implement `std::error::Error` for interoperability.
//!
//! ## Example Usage
//! ```rust
//! use maple_session::core::reader::PacketReader;
//! use maple_session::error::{ProtocolError, Result};
//! use tracing::{error, info};
//!
//! fn read_opcode(packet: &[u8]) -> Result<u16> {
//!     PacketReader::new(packet).read_u16()
//! }
//!
//! fn main() {
//!     match read_opcode(&[0x01]) {
//!         Ok(opcode) => info!(opcode, "Read opcode"),
//!         Err(ProtocolError::OutOfRange { requested, available }) => {
//!             error!(requested, available, "Packet too short")
//!         }
//!         Err(e) => error!(error = %e, "Unexpected error"),
//!     }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Handshake decoding errors
    pub const ERR_MALFORMED_HANDSHAKE: &str = "Malformed handshake frame";

    /// Connection errors
    pub const ERR_NO_ENDPOINT: &str = "No endpoint configured";

    /// String decoding errors
    pub const ERR_INVALID_UTF8: &str = "Invalid UTF-8 string";
    pub const ERR_INVALID_UTF16: &str = "Invalid UTF-16 string";
    pub const ERR_NEGATIVE_LENGTH: &str = "Negative string length prefix";
    pub const ERR_INVALID_HEX: &str = "Invalid hex string";

    /// Logging errors
    pub const ERR_LOGGING_INIT: &str = "Failed to install tracing subscriber";
}

// ProtocolError is the primary error type for all session operations
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    #[serde(skip_serializing, skip_deserializing)]
    Io(#[from] io::Error),

    #[error("Not enough space in packet: requested {requested} bytes, {available} available")]
    OutOfRange { requested: usize, available: usize },

    #[error("Invalid string: {0}")]
    InvalidString(String),

    #[error("Invalid key length: {0} bytes (expected 32)")]
    InvalidKeyLength(usize),

    #[error("Socket is not connected")]
    NotConnected,

    #[error("Handshake has not been received yet")]
    HandshakePending,

    #[error("Packet length must be at least 2 bytes, got {0}")]
    PacketTooShort(usize),

    #[error("Packet too large: {0} bytes")]
    OversizedPacket(usize),

    #[error("Handshake failed: {0}")]
    HandshakeError(String),

    #[error("Authentication rejected")]
    AuthRejected,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Timeout occurred")]
    Timeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_message() {
        let err = ProtocolError::OutOfRange {
            requested: 4,
            available: 1,
        };
        assert_eq!(
            err.to_string(),
            "Not enough space in packet: requested 4 bytes, 1 available"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io_err = io::Error::new(io::ErrorKind::BrokenPipe, "pipe");
        let err: ProtocolError = io_err.into();
        assert!(matches!(err, ProtocolError::Io(_)));
    }
}
