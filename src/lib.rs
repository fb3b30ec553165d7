//! # maple-session
//!
//! Client-side engine for the stream-ciphered TCP protocol spoken by MapleStory 2
//! style game servers.
//!
//! ## Layers
//! - [`core`]: bounds-checked packet reader/writer and the receive buffer
//! - [`crypto`]: AES keystream transform, versioned packet framing cipher,
//!   and the table-XOR cipher used by the login service
//! - [`protocol`]: handshake payload and the three-step login exchange
//! - [`transport`]: session lifecycle, framing state machine and connector
//! - [`utils`]: logging, metrics, randomness and timeouts
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use maple_session::{AesCipher, Connector, SessionEvent};
//!
//! # async fn run() -> maple_session::Result<()> {
//! let aes = Arc::new(AesCipher::new(&[0u8; 32])?);
//! let connector = Connector::new("127.0.0.1:20001".parse().map_err(|_| {
//!     maple_session::ProtocolError::ConfigError("bad address".into())
//! })?, aes);
//!
//! let (session, mut events) = connector.connect().await?;
//! while let Some(event) = events.recv().await {
//!     match event {
//!         SessionEvent::Handshake(info) => println!("server version {}", info.version),
//!         SessionEvent::Packet(packet) => session.send(&packet).await?,
//!         SessionEvent::Disconnected => break,
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod crypto;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod utils;

pub use crate::core::reader::PacketReader;
pub use crate::core::writer::PacketWriter;
pub use config::NetworkConfig;
pub use crypto::{AesCipher, Direction, FrameCipher, MapleCipher};
pub use error::{ProtocolError, Result};
pub use protocol::{AuthClient, AuthRequest, ServerInfo};
pub use transport::{Connector, Session, SessionEvent, SessionEvents, SessionRole};
