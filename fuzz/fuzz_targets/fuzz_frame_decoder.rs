#![no_main]

use libfuzzer_sys::fuzz_target;
use maple_session::crypto::{AesCipher, MapleCipher};
use maple_session::transport::FrameDecoder;
use std::sync::Arc;

fuzz_target!(|data: &[u8]| {
    let Ok(aes) = AesCipher::new(&[0x5A; 32]) else {
        return;
    };
    let aes = Arc::new(aes);

    // Feed the stream in uneven chunks, as a socket would
    let mut decoder = FrameDecoder::<MapleCipher>::new(Arc::clone(&aes), 16);
    for chunk in data.chunks(7) {
        decoder.extend(chunk);
        loop {
            match decoder.next_frame() {
                Ok(Some(_)) => continue,
                Ok(None) | Err(_) => break,
            }
        }
    }
});
