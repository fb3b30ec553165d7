//! # Game Session
//!
//! One [`Session`] per TCP connection to (or from) a game server.
//!
//! ## Lifecycle
//! ```text
//! connected, awaiting handshake --(handshake)--> connected, encrypted
//!            |                                          |
//!            +-------------(disconnect)-----------------+--> disconnected
//! ```
//! [`Session::reconnect`] tears down the current socket without finishing the
//! session and starts over in the "awaiting handshake" state.
//!
//! ## Concurrency
//! A single receive task per connection reads, buffers and decodes frames
//! strictly in order; the next read is only issued once the previous chunk has
//! been fully processed. Sends may come from any task: header generation,
//! encryption and the socket write of one packet happen under one async mutex.
//! The receive task and the send path use separate cipher instances and separate
//! socket halves.
//!
//! Everything the session observes is delivered through [`SessionEvents`]. When
//! the receiving side of the events channel is dropped, decoded frames stay
//! buffered until the connection ends.

use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use crate::config::ClientConfig;
use crate::crypto::{AesCipher, Direction, FrameCipher, MapleCipher, PACKET_HEADER_SIZE};
use crate::error::{ProtocolError, Result};
use crate::protocol::server_info::ServerInfo;
use crate::transport::framer::{Frame, FrameDecoder};
use crate::utils::global_metrics;
use crate::utils::timeout::with_timeout_error;

/// Smallest payload accepted by [`Session::send`]
pub const MIN_PACKET_SIZE: usize = 2;

/// Which end of the connection this session is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRole {
    /// Connected out to a server and waits for its handshake
    Initiator,
    /// Accepted a connection and offered the handshake itself
    Acceptor,
}

impl SessionRole {
    /// Direction of outgoing packets
    pub fn direction(self) -> Direction {
        match self {
            SessionRole::Initiator => Direction::ToServer,
            SessionRole::Acceptor => Direction::ToClient,
        }
    }
}

/// Notifications produced by a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The peer's handshake arrived; the session is now encrypted
    Handshake(ServerInfo),
    /// A decrypted packet body
    Packet(Bytes),
    /// The session ended. Sent at most once per connection.
    Disconnected,
}

/// Ordered stream of [`SessionEvent`]s for a single consumer
#[derive(Debug)]
pub struct SessionEvents {
    receiver: mpsc::UnboundedReceiver<SessionEvent>,
}

impl SessionEvents {
    /// Next event, or `None` once the session is gone and the queue is drained
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        self.receiver.recv().await
    }

    /// Stop consuming. Frames received afterwards are no longer decoded.
    pub fn close(&mut self) {
        self.receiver.close();
    }
}

impl Stream for SessionEvents {
    type Item = SessionEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// Tunables for a session, usually taken from [`ClientConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub reconnect_timeout: Duration,
    pub receive_buffer_size: usize,
    pub max_reconnect_attempts: u32,
}

impl From<&ClientConfig> for SessionOptions {
    fn from(config: &ClientConfig) -> Self {
        Self {
            reconnect_timeout: config.reconnect_timeout,
            receive_buffer_size: config.receive_buffer_size,
            max_reconnect_attempts: config.max_reconnect_attempts,
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

/// Send-side state, guarded by the send mutex
struct Link<C> {
    writer: Option<OwnedWriteHalf>,
    cipher: Option<C>,
    peer: Option<SocketAddr>,
    reader: Option<CancellationToken>,
}

struct Shared<C> {
    role: SessionRole,
    aes: Arc<AesCipher>,
    options: SessionOptions,
    connected: AtomicBool,
    encrypted: AtomicBool,
    /// Set by `disconnect`; a closed session never attaches another socket
    closed: AtomicBool,
    link: Mutex<Link<C>>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

/// Handle to a game session. Clones share the same connection.
pub struct Session<C: FrameCipher = MapleCipher> {
    shared: Arc<Shared<C>>,
}

impl<C: FrameCipher> Clone for Session<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: FrameCipher> std::fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("role", &self.shared.role)
            .field("connected", &self.is_connected())
            .field("encrypted", &self.is_encrypted())
            .finish()
    }
}

impl<C: FrameCipher> Session<C> {
    fn create(role: SessionRole, aes: Arc<AesCipher>, options: SessionOptions) -> (Self, SessionEvents) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            role,
            aes,
            options,
            connected: AtomicBool::new(false),
            encrypted: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            link: Mutex::new(Link {
                writer: None,
                cipher: None,
                peer: None,
                reader: None,
            }),
            events: sender,
        });
        (Self { shared }, SessionEvents { receiver })
    }

    /// Start a client session on a freshly connected socket.
    ///
    /// The receive task is running when this returns; the first event will be
    /// the server's handshake.
    #[instrument(skip(stream, aes, options))]
    pub async fn client(
        stream: TcpStream,
        aes: Arc<AesCipher>,
        options: SessionOptions,
    ) -> Result<(Self, SessionEvents)> {
        let (session, events) = Self::create(SessionRole::Initiator, aes, options);
        session.shared.attach(stream, None).await?;
        Ok((session, events))
    }

    /// Start a session on an accepted socket by offering `info` as the handshake.
    ///
    /// The session is encrypted immediately: it sends with `info.recv_iv` and
    /// receives with `info.send_iv`, mirroring the client.
    #[instrument(skip(stream, aes, info, options))]
    pub async fn accept(
        stream: TcpStream,
        aes: Arc<AesCipher>,
        info: &ServerInfo,
        options: SessionOptions,
    ) -> Result<(Self, SessionEvents)> {
        let (session, events) = Self::create(SessionRole::Acceptor, aes, options);
        session.shared.attach(stream, Some(info)).await?;
        Ok((session, events))
    }

    pub fn role(&self) -> SessionRole {
        self.shared.role
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    pub fn is_encrypted(&self) -> bool {
        self.shared.encrypted.load(Ordering::Acquire)
    }

    /// Remote endpoint of the current connection
    pub async fn peer_addr(&self) -> Option<SocketAddr> {
        self.shared.link.lock().await.peer
    }

    /// Encrypt and send one packet.
    ///
    /// # Errors
    /// - [`ProtocolError::NotConnected`] when the session is down
    /// - [`ProtocolError::HandshakePending`] before the handshake
    /// - [`ProtocolError::PacketTooShort`] for payloads under two bytes
    /// - [`ProtocolError::ConnectionClosed`] when the write fails; the session
    ///   is disconnected first
    #[instrument(skip(self, packet), fields(len = packet.len()))]
    pub async fn send(&self, packet: &[u8]) -> Result<()> {
        let shared = &self.shared;
        if !shared.connected.load(Ordering::Acquire) {
            return Err(ProtocolError::NotConnected);
        }
        if !shared.encrypted.load(Ordering::Acquire) {
            return Err(ProtocolError::HandshakePending);
        }
        if packet.len() < MIN_PACKET_SIZE {
            return Err(ProtocolError::PacketTooShort(packet.len()));
        }

        let mut link = shared.link.lock().await;
        let Link { writer, cipher, .. } = &mut *link;
        let (Some(writer), Some(cipher)) = (writer.as_mut(), cipher.as_mut()) else {
            return Err(ProtocolError::NotConnected);
        };

        let header = cipher.encode_header(packet.len(), shared.role.direction())?;
        let mut frame = Vec::with_capacity(PACKET_HEADER_SIZE + packet.len());
        frame.extend_from_slice(&header);
        frame.extend_from_slice(packet);
        cipher.transform(&mut frame[PACKET_HEADER_SIZE..]);

        let written = writer.write_all(&frame).await;
        if let Err(e) = written {
            drop(link);
            warn!(error = %e, "Write failed, disconnecting");
            global_metrics().connection_error();
            shared.disconnect().await;
            return Err(ProtocolError::ConnectionClosed);
        }

        trace!(bytes = frame.len(), "Packet sent");
        global_metrics().packet_sent(frame.len() as u64);
        Ok(())
    }

    /// Drop the current connection and connect to `addr` again.
    ///
    /// Only permitted while connected. Returns whether the session is connected
    /// afterwards; on failure the session is disconnected for good.
    pub async fn reconnect(&self, addr: SocketAddr, timeout: Duration) -> bool {
        self.reconnect_with(addr, timeout, None).await
    }

    /// Like [`Session::reconnect`], offering `handshake` on the new connection
    #[instrument(skip(self, handshake))]
    pub async fn reconnect_with(
        &self,
        addr: SocketAddr,
        timeout: Duration,
        handshake: Option<&ServerInfo>,
    ) -> bool {
        self.shared.reconnect(addr, timeout, handshake).await
    }

    /// Close the connection. Calling it again is a no-op.
    pub async fn disconnect(&self) {
        self.shared.disconnect().await;
    }
}

impl<C: FrameCipher> Shared<C> {
    /// Install `stream` as the current connection and start reading from it
    async fn attach(
        self: &Arc<Self>,
        stream: TcpStream,
        handshake: Option<&ServerInfo>,
    ) -> Result<()> {
        let peer = stream.peer_addr()?;
        let (read_half, mut write_half) = stream.into_split();
        let capacity = self.options.receive_buffer_size;

        let mut link = self.link.lock().await;
        if self.closed.load(Ordering::Acquire) {
            return Err(ProtocolError::NotConnected);
        }
        let decoder = match handshake {
            Some(info) => {
                write_half.write_all(&info.to_frame()?).await?;
                link.cipher = Some(C::new(info.version, info.recv_iv, Arc::clone(&self.aes)));
                let inbound = C::new(info.version, info.send_iv, Arc::clone(&self.aes));
                self.encrypted.store(true, Ordering::Release);
                global_metrics().handshake();
                debug!(version = info.version, "Handshake offered");
                FrameDecoder::encrypted(Arc::clone(&self.aes), capacity, inbound)
            }
            None => {
                self.encrypted.store(false, Ordering::Release);
                FrameDecoder::new(Arc::clone(&self.aes), capacity)
            }
        };

        let token = CancellationToken::new();
        link.writer = Some(write_half);
        link.peer = Some(peer);
        link.reader = Some(token.clone());
        self.connected.store(true, Ordering::Release);
        drop(link);

        global_metrics().connection_established();
        info!(%peer, role = ?self.role, "Session connected");
        self.start_reader(read_half, decoder, token, peer);
        Ok(())
    }

    fn start_reader(
        self: &Arc<Self>,
        reader: OwnedReadHalf,
        decoder: FrameDecoder<C>,
        token: CancellationToken,
        peer: SocketAddr,
    ) {
        tokio::spawn(read_loop(Arc::clone(self), reader, decoder, token, peer));
    }

    /// Hand every complete frame to the consumer
    async fn deliver(&self, decoder: &mut FrameDecoder<C>) -> Result<()> {
        while !self.events.is_closed() && self.connected.load(Ordering::Acquire) {
            let Some(frame) = decoder.next_frame()? else {
                break;
            };
            match frame {
                Frame::Handshake(info) => self.complete_handshake(info).await,
                Frame::Packet(packet) => {
                    trace!(len = packet.len(), "Packet received");
                    global_metrics().packet_received();
                    let _ = self.events.send(SessionEvent::Packet(packet));
                }
            }
        }
        Ok(())
    }

    async fn complete_handshake(&self, info: ServerInfo) {
        self.link.lock().await.cipher =
            Some(C::new(info.version, info.send_iv, Arc::clone(&self.aes)));
        self.encrypted.store(true, Ordering::Release);

        global_metrics().handshake();
        info!(
            version = info.version,
            subversion = %info.subversion,
            locale = info.locale,
            "Handshake received"
        );
        let _ = self.events.send(SessionEvent::Handshake(info));
    }

    async fn reconnect(
        self: &Arc<Self>,
        addr: SocketAddr,
        timeout: Duration,
        handshake: Option<&ServerInfo>,
    ) -> bool {
        if !self.connected.swap(false, Ordering::AcqRel) {
            return false;
        }
        self.encrypted.store(false, Ordering::Release);
        self.release(false).await;

        let connected = self.reopen(addr, timeout, handshake).await;
        if !connected {
            self.abandon().await;
        }
        connected
    }

    /// Reconnect to the same peer after the connection failed before its
    /// handshake. Every failure gets the full retry budget.
    async fn resume(self: &Arc<Self>, peer: SocketAddr) {
        if !self.connected.swap(false, Ordering::AcqRel) {
            return;
        }
        self.encrypted.store(false, Ordering::Release);
        self.release(false).await;

        let timeout = self.options.reconnect_timeout;
        for attempt in 1..=self.options.max_reconnect_attempts {
            if self.closed.load(Ordering::Acquire) {
                break;
            }
            if self.reopen(peer, timeout, None).await {
                return;
            }
            debug!(attempt, %peer, "Reconnect attempt failed");
        }
        self.abandon().await;
    }

    /// Open and attach a new connection to `addr`
    async fn reopen(
        self: &Arc<Self>,
        addr: SocketAddr,
        timeout: Duration,
        handshake: Option<&ServerInfo>,
    ) -> bool {
        info!(%addr, "Reconnecting");
        let attempt = with_timeout_error(
            async { TcpStream::connect(addr).await.map_err(ProtocolError::from) },
            timeout,
        )
        .await;

        let connected = match attempt {
            Ok(stream) => match self.attach(stream, handshake).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, %addr, "Reconnected socket could not be started");
                    false
                }
            },
            Err(e) => {
                warn!(error = %e, %addr, "Reconnect failed");
                false
            }
        };
        global_metrics().reconnect(connected);
        connected
    }

    /// Finish a session whose reconnect did not succeed
    async fn abandon(&self) {
        global_metrics().connection_error();
        self.link.lock().await.cipher = None;
        self.notify_disconnected();
    }

    async fn disconnect(&self) {
        {
            let _link = self.link.lock().await;
            self.closed.store(true, Ordering::Release);
        }
        if !self.connected.swap(false, Ordering::AcqRel) {
            return;
        }
        self.encrypted.store(false, Ordering::Release);
        self.release(true).await;
        self.notify_disconnected();
    }

    /// Stop the receive task and shut the socket down
    async fn release(&self, clear_cipher: bool) {
        let mut link = self.link.lock().await;
        if let Some(token) = link.reader.take() {
            token.cancel();
        }
        if let Some(mut writer) = link.writer.take() {
            // the peer may already be gone
            let _ = writer.shutdown().await;
        }
        if clear_cipher {
            link.cipher = None;
        }
        drop(link);
        global_metrics().connection_closed();
    }

    fn notify_disconnected(&self) {
        global_metrics().disconnected();
        info!(role = ?self.role, "Session disconnected");
        let _ = self.events.send(SessionEvent::Disconnected);
    }
}

async fn read_loop<C: FrameCipher>(
    shared: Arc<Shared<C>>,
    mut reader: OwnedReadHalf,
    mut decoder: FrameDecoder<C>,
    token: CancellationToken,
    peer: SocketAddr,
) {
    let mut chunk = vec![0u8; shared.options.receive_buffer_size.max(1)];

    loop {
        let read = tokio::select! {
            biased;
            _ = token.cancelled() => return,
            read = reader.read(&mut chunk) => read,
        };
        if token.is_cancelled() {
            return;
        }

        match read {
            Ok(n) if n > 0 => {
                global_metrics().bytes_read(n as u64);
                decoder.extend(&chunk[..n]);
                if let Err(e) = shared.deliver(&mut decoder).await {
                    warn!(error = %e, %peer, "Dropping connection on malformed frame");
                    global_metrics().protocol_error();
                    shared.disconnect().await;
                    return;
                }
            }
            result => {
                match result {
                    Err(e) => debug!(error = %e, %peer, "Read failed"),
                    Ok(_) => debug!(%peer, "Peer closed the connection"),
                }

                let retry = shared.options.max_reconnect_attempts > 0;
                if retry && !shared.encrypted.load(Ordering::Acquire) {
                    shared.resume(peer).await;
                } else {
                    shared.disconnect().await;
                }
                return;
            }
        }
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

    async fn client_pair() -> (Session, SessionEvents, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let stream = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        let (session, events) = Session::client(stream, aes(), SessionOptions::default())
            .await
            .unwrap();
        (session, events, server)
    }

    #[test]
    fn test_role_direction() {
        assert_eq!(SessionRole::Initiator.direction(), Direction::ToServer);
        assert_eq!(SessionRole::Acceptor.direction(), Direction::ToClient);
    }

    #[tokio::test]
    async fn test_send_before_handshake() {
        let (session, _events, _server) = client_pair().await;
        assert!(session.is_connected());
        assert!(!session.is_encrypted());
        assert!(matches!(
            session.send(&[1, 2, 3]).await,
            Err(ProtocolError::HandshakePending)
        ));
    }

    #[tokio::test]
    async fn test_send_after_disconnect() {
        let (session, mut events, _server) = client_pair().await;
        session.disconnect().await;

        assert!(!session.is_connected());
        assert_eq!(events.recv().await, Some(SessionEvent::Disconnected));
        assert!(matches!(
            session.send(&[1, 2, 3]).await,
            Err(ProtocolError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_closed_session_refuses_new_socket() {
        let (session, mut events, _server) = client_pair().await;
        session.disconnect().await;
        assert_eq!(events.recv().await, Some(SessionEvent::Disconnected));

        // a reconnect racing the disconnect lands here with a fresh socket
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let stream = TcpStream::connect(listener.local_addr().unwrap()).await.unwrap();
        assert!(matches!(
            session.shared.attach(stream, None).await,
            Err(ProtocolError::NotConnected)
        ));
        assert!(!session.is_connected());
        assert!(session.shared.link.lock().await.writer.is_none());
    }
}
