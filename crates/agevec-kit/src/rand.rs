//! Deterministic byte source
//!
//! Vectors are checked into version control, so "random" values (ephemeral
//! shares, salts, stream nonces, garbage) must be identical on every run.
//! Nothing here is suitable for real key generation.

use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::ChaCha20;

/// Supplier of reproducible pseudorandom bytes for a builder session.
pub trait ByteSource: Send {
    /// Return the next `n` bytes, advancing the source.
    fn next_bytes(&mut self, n: usize) -> Vec<u8>;
}

/// ChaCha20 keystream with a fixed key and an all-zero nonce.
///
/// Successive calls continue the same keystream, so the output depends only
/// on the seed and the sequence of requested lengths.
pub struct KeystreamSource {
    cipher: ChaCha20,
}

impl KeystreamSource {
    pub fn new(seed: &[u8; 32]) -> Self {
        let nonce = [0u8; 12];
        Self {
            cipher: ChaCha20::new(seed.into(), &nonce.into()),
        }
    }
}

impl ByteSource for KeystreamSource {
    fn next_bytes(&mut self, n: usize) -> Vec<u8> {
        let mut out = vec![0u8; n];
        self.cipher.apply_keystream(&mut out);
        out
    }
}

impl std::fmt::Debug for KeystreamSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeystreamSource").finish_non_exhaustive()
    }
}
