//! # Protocol Layer
//!
//! Messages exchanged outside the encrypted packet stream.
//!
//! ## Components
//! - **ServerInfo**: Plain handshake frame that seeds both session ciphers
//! - **Auth**: Three-step login exchange framed by the authentication cipher

pub mod auth;
pub mod server_info;

pub use auth::{AuthClient, AuthRequest, Credentials};
pub use server_info::ServerInfo;

#[cfg(test)]
mod tests;
