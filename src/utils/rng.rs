//! Randomness sources.
//!
//! There is no shared, process-wide generator. Each call site either receives a
//! generator from its caller or owns a fresh OS-seeded one, so concurrent
//! sessions never contend on (or correlate through) a common seed.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::crypto::aes_cipher::IV_LEN;
use crate::error::{ProtocolError, Result};

/// Characters used for login nonces
pub const NONCE_ALPHABET: &[u8] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz_~";

/// A fresh generator seeded from the operating system
pub fn os_seeded() -> StdRng {
    StdRng::from_os_rng()
}

/// A random per-direction initialization vector
pub fn random_iv<R: Rng + ?Sized>(rng: &mut R) -> [u8; IV_LEN] {
    let mut iv = [0u8; IV_LEN];
    rng.fill(&mut iv);
    iv
}

/// A random string of `length` characters drawn from [`NONCE_ALPHABET`]
pub fn random_string<R: Rng + ?Sized>(rng: &mut R, length: usize) -> String {
    (0..length)
        .map(|_| NONCE_ALPHABET[rng.random_range(0..NONCE_ALPHABET.len())] as char)
        .collect()
}

/// A 32-bit seed taken directly from the operating system
pub fn secure_seed() -> Result<u32> {
    getrandom::u32().map_err(|e| ProtocolError::Custom(format!("OS randomness unavailable: {e}")))
}
