//! STREAM payload engine
//!
//! Payload key and per-chunk nonce:
//! ```text
//! payload_key = HKDF-SHA256(ikm = file_key, salt = stream_nonce[16], info = "payload")
//! chunk nonce = counter (11 bytes, big-endian) || last_flag (1 byte: 0x00 or 0x01)
//! chunk       = ChaCha20-Poly1305(payload_key, chunk nonce, plaintext <= 64 KiB)
//! ```
//!
//! The counter advances by one after every sealed chunk. Sealing after a final
//! chunk is permitted so that malformed streams (two final chunks, trailing
//! chunks) can be produced; the phase still records that it happened.

use chacha20::cipher::{KeyIvInit, StreamCipher, StreamCipherSeek};
use chacha20::ChaCha20;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use thiserror::Error;

use crate::keys::{hkdf_derive, FileKey};
use crate::{CHUNK_SIZE, KEY_SIZE, STREAM_NONCE_SIZE, TAG_SIZE};

/// Bytes of the big-endian chunk counter.
pub const COUNTER_SIZE: usize = 11;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StreamError {
    #[error("STREAM counter overflow after chunk {0}")]
    CounterOverflow(u128),

    #[error("payload key not derived: write the stream nonce first")]
    NotKeyed,

    #[error("chunk sealing failed")]
    Seal,
}

/// Lifecycle of a payload stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    /// No nonce yet
    Idle,
    /// Nonce written, payload key derived, no chunks
    Keyed,
    /// One or more non-final chunks
    Streaming,
    /// A final-flagged chunk has been sealed
    Finalized,
}

/// Where a sealed chunk landed in the output, for fault bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRecord {
    /// Position in the chunk sequence (equals the counter it was sealed with)
    pub index: u64,
    /// Byte offset of the ciphertext in the container
    pub offset: usize,
    pub plaintext_len: usize,
    pub last: bool,
}

impl ChunkRecord {
    pub fn ciphertext_len(&self) -> usize {
        self.plaintext_len + TAG_SIZE
    }

    pub fn end(&self) -> usize {
        self.offset + self.ciphertext_len()
    }

    pub fn is_full(&self) -> bool {
        self.plaintext_len == CHUNK_SIZE
    }
}

/// Payload key plus the 12-byte nonce for the next chunk.
pub struct StreamState {
    key: [u8; KEY_SIZE],
    nonce: [u8; 12],
    phase: StreamPhase,
    sealed: u64,
    /// The counter carried out of its 11 bytes; no further chunk can be sealed
    exhausted: bool,
}

impl StreamState {
    /// Derive the payload key from the file key and the 16-byte stream nonce.
    pub fn new(file_key: &FileKey, stream_nonce: &[u8; STREAM_NONCE_SIZE]) -> anyhow::Result<Self> {
        let key = hkdf_derive(file_key.as_bytes(), Some(stream_nonce), b"payload")?;
        Ok(Self {
            key,
            nonce: [0u8; 12],
            phase: StreamPhase::Keyed,
            sealed: 0,
            exhausted: false,
        })
    }

    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    pub fn payload_key(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }

    /// Nonce that the next chunk will be sealed with.
    pub fn nonce(&self) -> &[u8; 12] {
        &self.nonce
    }

    pub fn counter(&self) -> [u8; COUNTER_SIZE] {
        let mut c = [0u8; COUNTER_SIZE];
        c.copy_from_slice(&self.nonce[..COUNTER_SIZE]);
        c
    }

    /// Number of chunks sealed so far.
    pub fn chunks_sealed(&self) -> u64 {
        self.sealed
    }

    /// Set the last-chunk flag for this and every following chunk.
    pub fn set_last(&mut self) {
        self.nonce[COUNTER_SIZE] = 1;
    }

    pub fn is_last(&self) -> bool {
        self.nonce[COUNTER_SIZE] == 1
    }

    /// Deterministic chunk plaintext: ChaCha20 keystream under the payload key
    /// and current nonce, starting at block 1 (block 0 would be the Poly1305
    /// key of the AEAD).
    pub fn keystream_plaintext(&self, size: usize) -> Vec<u8> {
        let mut out = vec![0u8; size];
        let mut cipher = ChaCha20::new((&self.key).into(), (&self.nonce).into());
        cipher.seek(64u64);
        cipher.apply_keystream(&mut out);
        out
    }

    /// Seal one chunk with the current nonce, then advance the counter.
    ///
    /// The chunk sealed with the largest counter is still returned; the call
    /// after it fails with [`StreamError::CounterOverflow`].
    pub fn seal_chunk(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, StreamError> {
        if self.exhausted {
            return Err(StreamError::CounterOverflow(u128::from(self.sealed)));
        }
        if self.phase == StreamPhase::Finalized {
            tracing::debug!(index = self.sealed, "sealing chunk after final chunk");
        }
        if plaintext.len() > CHUNK_SIZE {
            tracing::debug!(len = plaintext.len(), "sealing oversized chunk");
        }

        let cipher = ChaCha20Poly1305::new((&self.key).into());
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&self.nonce), plaintext)
            .map_err(|_| StreamError::Seal)?;

        let last = self.is_last();
        self.exhausted = !increment_be(&mut self.nonce[..COUNTER_SIZE]);
        self.sealed += 1;
        self.phase = if last {
            StreamPhase::Finalized
        } else {
            StreamPhase::Streaming
        };

        tracing::trace!(
            index = self.sealed - 1,
            len = plaintext.len(),
            last,
            "sealed chunk"
        );
        Ok(ciphertext)
    }
}

impl std::fmt::Debug for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamState")
            .field("key", &"[REDACTED]")
            .field("nonce", &hex::encode(self.nonce))
            .field("phase", &self.phase)
            .finish()
    }
}

/// Increment a big-endian counter in place, carrying from the last byte
/// towards the first. Returns `false` (and leaves the counter wrapped to zero)
/// on carry out of the first byte.
pub fn increment_be(counter: &mut [u8]) -> bool {
    for byte in counter.iter_mut().rev() {
        *byte = byte.wrapping_add(1);
        if *byte != 0 {
            return true;
        }
    }
    false
}

/// Split `plaintext` into STREAM chunks.
///
/// Every chunk but the last is exactly `CHUNK_SIZE`. An empty payload is one
/// empty chunk; a payload that is an exact multiple of `CHUNK_SIZE` ends with
/// a full chunk, never with an extra empty one.
pub fn split_chunks(plaintext: &[u8]) -> Vec<&[u8]> {
    if plaintext.is_empty() {
        return vec![plaintext];
    }
    plaintext.chunks(CHUNK_SIZE).collect()
}
