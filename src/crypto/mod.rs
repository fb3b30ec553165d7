//! # Ciphers
//!
//! - **AesCipher**: AES-256 keystream transform shared by both directions of a session
//! - **FrameCipher / MapleCipher**: per-direction packet cipher driven by the session
//! - **auth_cipher**: table-XOR obfuscation and framing for the login exchange
//!
//! ## Security
//! None of these provide integrity protection. They exist to speak the wire
//! format of the remote service, not to secure arbitrary traffic.

pub mod aes_cipher;
pub mod auth_cipher;
pub mod frame;

pub use aes_cipher::AesCipher;
pub use frame::{Direction, FrameCipher, MapleCipher, PACKET_HEADER_SIZE};
