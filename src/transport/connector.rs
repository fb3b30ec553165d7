//! Outbound connection setup for client sessions.

use std::marker::PhantomData;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tracing::{info, instrument, warn};

use crate::config::ClientConfig;
use crate::crypto::{AesCipher, FrameCipher, MapleCipher};
use crate::error::{ProtocolError, Result};
use crate::transport::session::{Session, SessionEvents, SessionOptions};
use crate::utils::global_metrics;
use crate::utils::metrics::Timer;
use crate::utils::timeout::{with_timeout_error, DEFAULT_TIMEOUT};

/// Connects to a game server and starts a client [`Session`] on the socket
pub struct Connector<C: FrameCipher = MapleCipher> {
    addr: SocketAddr,
    aes: Arc<AesCipher>,
    timeout: Duration,
    options: SessionOptions,
    _cipher: PhantomData<fn() -> C>,
}

impl Connector {
    pub fn new(addr: SocketAddr, aes: Arc<AesCipher>) -> Self {
        Self::with_cipher(addr, aes)
    }

    /// Connector for the address and timeouts in `config`
    pub fn from_config(config: &ClientConfig, aes: Arc<AesCipher>) -> Result<Self> {
        let addr = config.address.parse::<SocketAddr>().map_err(|_| {
            ProtocolError::ConfigError(format!("Invalid client address: '{}'", config.address))
        })?;
        Ok(Self::new(addr, aes)
            .with_timeout(config.connection_timeout)
            .with_options(SessionOptions::from(config)))
    }
}

impl<C: FrameCipher> Connector<C> {
    /// Connector that drives sessions with a custom framing cipher
    pub fn with_cipher(addr: SocketAddr, aes: Arc<AesCipher>) -> Self {
        Self {
            addr,
            aes,
            timeout: DEFAULT_TIMEOUT,
            options: SessionOptions::default(),
            _cipher: PhantomData,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Connect within the configured timeout.
    ///
    /// On expiry the pending socket is dropped and [`ProtocolError::Timeout`]
    /// is returned. On success the session's receive task is already running.
    #[instrument(skip(self), fields(addr = %self.addr))]
    pub async fn connect(&self) -> Result<(Session<C>, SessionEvents)> {
        let _timer = Timer::start("session_connect");
        let addr = self.addr;
        let stream = with_timeout_error(
            async { TcpStream::connect(addr).await.map_err(ProtocolError::from) },
            self.timeout,
        )
        .await
        .map_err(|e| {
            warn!(error = %e, "Connect failed");
            global_metrics().connection_error();
            e
        })?;

        info!("Connected to game server");
        Session::client(stream, Arc::clone(&self.aes), self.options).await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use tokio::net::TcpListener;

    fn aes() -> Arc<AesCipher> {
        let key: Vec<u8> = (0u8..32).collect();
        Arc::new(AesCipher::new(&key).unwrap())
    }

    #[tokio::test]
    async fn test_connect_starts_client_session() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let connector = Connector::new(listener.local_addr().unwrap(), aes());

        let (session, _events) = connector.connect().await.unwrap();
        assert!(session.is_connected());
        assert!(!session.is_encrypted());
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = Connector::new(addr, aes()).connect().await;
        assert!(result.is_err());
    }

    #[test]
    fn test_from_config_rejects_bad_address() {
        let config = ClientConfig {
            address: "not an address".into(),
            ..ClientConfig::default()
        };
        assert!(matches!(
            Connector::from_config(&config, aes()),
            Err(ProtocolError::ConfigError(_))
        ));
    }
}
