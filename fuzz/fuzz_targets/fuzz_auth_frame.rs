#![no_main]

use libfuzzer_sys::fuzz_target;
use maple_session::crypto::auth_cipher;
use maple_session::protocol::auth::{parse_auth_token, AuthRequest};

fuzz_target!(|data: &[u8]| {
    // Arbitrary responses from the login service must never panic the parser
    let _ = auth_cipher::parse_frame(data);
    let _ = parse_auth_token(data);
    let _ = AuthRequest::decode(data);
});
