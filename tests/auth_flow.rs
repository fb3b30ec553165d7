#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Login exchange against a scripted authentication service on loopback.

use maple_session::core::writer::PacketWriter;
use maple_session::crypto::auth_cipher;
use maple_session::error::ProtocolError;
use maple_session::protocol::auth::{AuthClient, AuthRequest, AUTH_FIRST, AUTH_SECOND, AUTH_THIRD};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const TOKEN: &str = "0123456789abcdef-token";

async fn read_frame(stream: &mut TcpStream) -> Vec<u8> {
    let mut total = [0u8; 2];
    stream.read_exact(&mut total).await.unwrap();
    let rest = u16::from_be_bytes(total) as usize + 2;

    let mut frame = total.to_vec();
    frame.resize(2 + rest, 0);
    stream.read_exact(&mut frame[2..]).await.unwrap();
    frame
}

fn token_response() -> Vec<u8> {
    let mut writer = PacketWriter::new();
    writer.write_zero(10);
    writer.write_unicode_string(TOKEN).unwrap();
    auth_cipher::write_header(0x34, [0; 4], writer.to_vec(), 7).unwrap()
}

#[tokio::test]
async fn test_three_step_login() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let service = tokio::spawn(async move {
        let mut opcodes = Vec::new();

        let (mut stream, _) = listener.accept().await.unwrap();
        let frame = read_frame(&mut stream).await;
        match AuthRequest::decode(&frame).unwrap() {
            AuthRequest::Login(credentials) => {
                assert_eq!(credentials.username, "alice");
                assert_eq!(credentials.password, "secret");
                assert_eq!(credentials.nonce.len(), 23);
            }
            other => panic!("Expected login, got {other:?}"),
        }
        opcodes.push(auth_cipher::parse_frame(&frame).unwrap().opcode);
        stream.write_all(&token_response()).await.unwrap();

        for expected in [AUTH_SECOND, AUTH_THIRD] {
            let (mut stream, _) = listener.accept().await.unwrap();
            let frame = read_frame(&mut stream).await;
            let request = AuthRequest::decode(&frame).unwrap();
            assert_eq!(request.opcode(), expected);
            match request {
                AuthRequest::Confirm { token } | AuthRequest::Finish { token } => {
                    assert_eq!(token, TOKEN)
                }
                other => panic!("Unexpected request {other:?}"),
            }
            opcodes.push(expected);
            stream.write_all(&[0x00, 0x01]).await.unwrap();
        }
        opcodes
    });

    let client = AuthClient::with_endpoints(vec![addr], Duration::from_secs(5));
    let token = client.login("alice", "secret").await.unwrap();

    assert_eq!(token, TOKEN);
    assert_eq!(service.await.unwrap(), vec![AUTH_FIRST, AUTH_SECOND, AUTH_THIRD]);
}

#[tokio::test]
async fn test_empty_first_response_is_rejection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let service = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_frame(&mut stream).await;
        // close without answering
        drop(stream);

        // no further steps are attempted
        tokio::time::timeout(Duration::from_millis(300), listener.accept())
            .await
            .is_err()
    });

    let client = AuthClient::with_endpoints(vec![addr], Duration::from_secs(5));
    let result = client.login("alice", "wrong").await;

    assert!(matches!(result, Err(ProtocolError::AuthRejected)));
    assert!(service.await.unwrap());
}

#[tokio::test]
async fn test_silent_service_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let _service = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(stream);
    });

    let client = AuthClient::with_endpoints(vec![addr], Duration::from_millis(200));
    let result = client.login("alice", "secret").await;
    assert!(matches!(result, Err(ProtocolError::Timeout)));
}

#[tokio::test]
async fn test_falls_through_to_reachable_endpoint() {
    let dead = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_addr = dead.local_addr().unwrap();
    drop(dead);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let service = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let frame = read_frame(&mut stream).await;
        stream.write_all(&[0xAB]).await.unwrap();
        frame
    });

    let client = AuthClient::with_endpoints(vec![dead_addr, addr], Duration::from_secs(5));
    let request = AuthRequest::Confirm { token: TOKEN.into() };
    let response = client.exchange(&request).await.unwrap();

    assert_eq!(response, vec![0xAB]);
    assert_eq!(
        AuthRequest::decode(&service.await.unwrap()).unwrap(),
        request
    );
}
