#![no_main]

use libfuzzer_sys::fuzz_target;
use maple_session::protocol::ServerInfo;

fuzz_target!(|data: &[u8]| {
    // Decoding arbitrary bodies must fail cleanly, never panic
    if let Ok(info) = ServerInfo::decode(data) {
        // Anything that decodes re-encodes to a body that decodes the same way
        if let Ok(body) = info.encode_body() {
            assert_eq!(ServerInfo::decode(&body).ok(), Some(info));
        }
    }
});
