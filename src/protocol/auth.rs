//! Three-step login exchange with the authentication service.
//!
//! Each step opens a short-lived TCP connection to the first reachable endpoint,
//! sends one framed request (see [`crate::crypto::auth_cipher`]) and reads a
//! single response of at most [`RESPONSE_BUFFER_SIZE`] bytes.
//!
//! 1. Login with credentials and a random nonce. An empty response means the
//!    credentials were rejected; otherwise the response carries the token.
//! 2. Confirm the token.
//! 3. Finish with the token and the trailing protocol bytes.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use rand::Rng;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, instrument, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::config::AuthConfig;
use crate::core::reader::PacketReader;
use crate::core::writer::PacketWriter;
use crate::crypto::auth_cipher;
use crate::error::{constants, ProtocolError, Result};
use crate::utils::metrics::Timer;
use crate::utils::rng;
use crate::utils::timeout::with_timeout_error;

/// Opcode of the login request
pub const AUTH_FIRST: u16 = 0x33;
/// Opcode of the token confirmation
pub const AUTH_SECOND: u16 = 0x2D;
/// Opcode of the closing request
pub const AUTH_THIRD: u16 = 0x35;

const KEY_FIRST: [u8; 4] = [0x1D, 0x6A, 0x20, 0xCE];
const KEY_SECOND: [u8; 4] = [0xEB, 0x29, 0x72, 0x32];
const KEY_THIRD: [u8; 4] = [0xF7, 0xDD, 0xB3, 0x35];

/// Characters in a login nonce
pub const NONCE_LENGTH: usize = 23;

/// Size of the buffer each response is read into
pub const RESPONSE_BUFFER_SIZE: usize = 1024;

const LOGIN_MAGIC: i32 = 8;
const FINISH_MAGIC: i32 = 2;
const PROTOCOL_BYTES: [u8; 8] = [0x00, 0x00, 0x13, 0x22, 0x00, 0x02, 0x01, 0x00];
const TRAILER: [u8; 4] = [0x13, 0x22, 0x00, 0x02];
const TOKEN_OFFSET: isize = 10;

/// Login credentials, wiped from memory on drop
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub nonce: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("nonce", &self.nonce)
            .finish()
    }
}

/// One request of the login exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthRequest {
    Login(Credentials),
    Confirm { token: String },
    Finish { token: String },
}

impl AuthRequest {
    /// A login request with a fresh nonce drawn from `rng`
    pub fn login<R: Rng + ?Sized>(username: &str, password: &str, rng: &mut R) -> Self {
        AuthRequest::Login(Credentials {
            username: username.to_string(),
            password: password.to_string(),
            nonce: rng::random_string(rng, NONCE_LENGTH),
        })
    }

    pub fn opcode(&self) -> u16 {
        match self {
            AuthRequest::Login(_) => AUTH_FIRST,
            AuthRequest::Confirm { .. } => AUTH_SECOND,
            AuthRequest::Finish { .. } => AUTH_THIRD,
        }
    }

    /// The static key carried in the frame header
    pub fn static_key(&self) -> [u8; 4] {
        match self {
            AuthRequest::Login(_) => KEY_FIRST,
            AuthRequest::Confirm { .. } => KEY_SECOND,
            AuthRequest::Finish { .. } => KEY_THIRD,
        }
    }

    /// The plain request payload, before obfuscation
    pub fn payload(&self) -> Result<Vec<u8>> {
        let mut writer = PacketWriter::new();
        match self {
            AuthRequest::Login(credentials) => {
                writer.write_i32(LOGIN_MAGIC);
                writer.write_unicode_string(&credentials.username)?;
                writer.write_unicode_string(&credentials.password)?;
                writer.write_bytes(&PROTOCOL_BYTES);
                writer.write_zero(10);
                writer.write_unicode_string(&credentials.nonce)?;
                writer.write_i32(1);
                writer.write_zero(2);
            }
            AuthRequest::Confirm { token } => {
                writer.write_unicode_string(token)?;
            }
            AuthRequest::Finish { token } => {
                writer.write_i32(FINISH_MAGIC);
                writer.write_unicode_string(token)?;
                writer.write_bytes(&TRAILER);
            }
        }
        Ok(writer.to_vec())
    }

    /// The complete obfuscated frame for `seed`
    pub fn to_frame(&self, seed: u32) -> Result<Vec<u8>> {
        auth_cipher::write_header(self.opcode(), self.static_key(), self.payload()?, seed)
    }

    /// Decode a request from a complete frame
    pub fn decode(frame: &[u8]) -> Result<Self> {
        let parsed = auth_cipher::parse_frame(frame)?;
        let mut reader = PacketReader::new(&parsed.payload);

        let request = match parsed.opcode {
            AUTH_FIRST => {
                reader.skip(4)?;
                let username = reader.read_unicode_string()?;
                let password = reader.read_unicode_string()?;
                reader.skip((PROTOCOL_BYTES.len() + 10) as isize)?;
                let nonce = reader.read_unicode_string()?;
                AuthRequest::Login(Credentials {
                    username,
                    password,
                    nonce,
                })
            }
            AUTH_SECOND => AuthRequest::Confirm {
                token: reader.read_unicode_string()?,
            },
            AUTH_THIRD => {
                reader.skip(4)?;
                AuthRequest::Finish {
                    token: reader.read_unicode_string()?,
                }
            }
            other => {
                return Err(ProtocolError::Custom(format!(
                    "Unknown authentication opcode: 0x{other:02X}"
                )))
            }
        };

        Ok(request)
    }
}

/// Recover the token from a login response frame
pub fn parse_auth_token(response: &[u8]) -> Result<String> {
    let payload = auth_cipher::read_header(response)?;
    let mut reader = PacketReader::new(&payload);
    reader.skip(TOKEN_OFFSET)?;
    reader.read_unicode_string()
}

/// Client for the login exchange
#[derive(Debug, Clone)]
pub struct AuthClient {
    endpoints: Vec<SocketAddr>,
    timeout: Duration,
}

impl AuthClient {
    pub fn new(config: &AuthConfig) -> Result<Self> {
        Ok(Self::with_endpoints(config.socket_addrs()?, config.timeout))
    }

    pub fn with_endpoints(endpoints: Vec<SocketAddr>, timeout: Duration) -> Self {
        Self { endpoints, timeout }
    }

    pub fn endpoints(&self) -> &[SocketAddr] {
        &self.endpoints
    }

    /// Run all three steps and return the authentication token
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<String> {
        let _timer = Timer::start("auth_login");
        let request = AuthRequest::login(username, password, &mut rng::os_seeded());
        let response = self.exchange(&request).await?;
        if response.is_empty() {
            warn!("Login rejected by authentication service");
            return Err(ProtocolError::AuthRejected);
        }

        let token = parse_auth_token(&response)?;
        debug!(token_len = token.len(), "Received authentication token");

        self.exchange(&AuthRequest::Confirm {
            token: token.clone(),
        })
        .await?;
        self.exchange(&AuthRequest::Finish {
            token: token.clone(),
        })
        .await?;

        info!("Authentication complete");
        Ok(token)
    }

    /// Send one request on a fresh connection and read the reply
    #[instrument(skip(self, request), fields(opcode = request.opcode()))]
    pub async fn exchange(&self, request: &AuthRequest) -> Result<Vec<u8>> {
        if self.endpoints.is_empty() {
            return Err(ProtocolError::ConfigError(
                constants::ERR_NO_ENDPOINT.to_string(),
            ));
        }

        let frame = request.to_frame(rng::secure_seed()?)?;
        let endpoints = self.endpoints.clone();

        with_timeout_error(
            async move {
                let mut stream = TcpStream::connect(&endpoints[..]).await?;
                stream.write_all(&frame).await?;

                let mut buffer = vec![0u8; RESPONSE_BUFFER_SIZE];
                let read = stream.read(&mut buffer).await?;
                buffer.truncate(read);

                // the peer may already have closed its side
                let _ = stream.shutdown().await;
                debug!(sent = frame.len(), received = read, "Authentication step complete");
                Ok(buffer)
            },
            self.timeout,
        )
        .await
    }
}
