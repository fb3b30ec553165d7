// test-only module included via protocol/mod.rs
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use crate::crypto::auth_cipher;
use crate::protocol::auth::*;

const LOGIN_FRAME: &str = concat!(
    "007600331800007202000066123456781d6a20ce0843c8526a3a6e03089cb591",
    "af3a21f09442b2667d438f58cf44be69b3a9491254049fdc65f86e6be8ee27b8",
    "7fce75ccc1ea8a0019ec694de7fac7027b8bf7a30e43c652653a0d03679cbb91",
    "a23a2ff0ef42ba661c439d58de44be69b7a92e126426c8de0000",
);

fn alice() -> AuthRequest {
    AuthRequest::Login(Credentials {
        username: "alice".to_string(),
        password: "secret".to_string(),
        nonce: "ABCDEFGHIJKLMNOPQRSTUVW".to_string(),
    })
}

#[test]
fn test_login_frame_matches_recorded_bytes() {
    let frame = alice().to_frame(0x1234_5678).expect("frame should encode");

    assert_eq!(frame.len(), auth_cipher::HEADER_LENGTH + 102);
    assert_eq!(hex::encode(&frame), LOGIN_FRAME);
}

#[test]
fn test_login_frame_round_trip() {
    let frame = hex::decode(LOGIN_FRAME).unwrap();
    let parsed = auth_cipher::parse_frame(&frame).unwrap();
    assert_eq!(parsed.opcode, AUTH_FIRST);
    assert_eq!(parsed.seed, 0x1234_5678);
    assert_eq!(parsed.payload, alice().payload().unwrap());

    match AuthRequest::decode(&frame).unwrap() {
        AuthRequest::Login(credentials) => {
            assert_eq!(credentials.username, "alice");
            assert_eq!(credentials.password, "secret");
            assert_eq!(credentials.nonce, "ABCDEFGHIJKLMNOPQRSTUVW");
        }
        other => panic!("Expected login request, got {other:?}"),
    }
}

#[test]
fn test_seed_changes_every_obfuscated_word() {
    let a = alice().to_frame(1).unwrap();
    let b = alice().to_frame(2).unwrap();

    let payload_a = &a[auth_cipher::HEADER_LENGTH..];
    let payload_b = &b[auth_cipher::HEADER_LENGTH..];
    for (word_a, word_b) in payload_a.chunks_exact(4).zip(payload_b.chunks_exact(4)) {
        assert_ne!(word_a, word_b);
    }
    // the two trailing bytes are not a full word and stay in the clear
    assert_eq!(&payload_a[100..], &[0, 0]);
}
