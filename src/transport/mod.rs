//! # Transport Layer
//!
//! TCP plumbing for game sessions.
//!
//! ## Components
//! - **Framer**: Socket-free receive state machine (handshake, then encrypted frames)
//! - **Session**: Connection lifecycle, send path and event delivery
//! - **Connector**: Timed outbound connect that yields a running client session

pub mod connector;
pub mod framer;
pub mod session;

pub use connector::Connector;
pub use framer::{Frame, FrameDecoder};
pub use session::{Session, SessionEvent, SessionEvents, SessionOptions, SessionRole};
