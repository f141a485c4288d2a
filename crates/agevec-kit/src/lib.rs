//! agevec-kit: deterministic builder for age-encryption.org/v1 test vectors
//!
//! A [`VectorBuilder`] session writes an age file top-down in one pass:
//!
//! ```text
//! age-encryption.org/v1                      version line      (header)
//! -> X25519 <b64 share>                      stanza args line  (stanza)
//! <b64 wrapped file key>                     stanza body
//! --- <b64 HMAC-SHA-256>                     MAC line          (header)
//! [16 bytes: stream nonce]                                     (stream)
//! [chunk 0: ChaCha20-Poly1305(payload_key, counter=0 || 0x00)]
//! ...
//! [chunk n: ChaCha20-Poly1305(payload_key, counter=n || 0x01)]
//! ```
//!
//! optionally wrapped in ASCII armor (`armor`), with faults injected at any
//! layer (`faults`) and the expected decryptor outcome tracked alongside.
//! [`emit`] serializes the result into the vector file format.
//!
//! Randomness comes from an injected [`ByteSource`]; the stock source is a
//! fixed-seed ChaCha20 keystream so output is stable across runs.

pub mod armor;
pub mod builder;
pub mod emit;
pub mod faults;
pub mod header;
pub mod keys;
pub mod rand;
pub mod stanza;
pub mod stream;

pub use armor::{armor, dearmor, ArmorError, ArmorOptions, Padding};
pub use builder::VectorBuilder;
pub use emit::{encode_vector, parse_vector, write_vector, EmitOptions};
pub use faults::StreamOutcome;
pub use keys::{FileKey, Fixtures};
pub use rand::{ByteSource, KeystreamSource};
pub use stanza::Stanza;
pub use stream::{ChunkRecord, StreamError, StreamPhase, StreamState};

/// STREAM plaintext chunk size (64 KiB)
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Size of a Poly1305 authentication tag
pub const TAG_SIZE: usize = 16;

/// Size of derived symmetric keys (wrap, MAC, payload)
pub const KEY_SIZE: usize = 32;

/// Size of the random STREAM nonce written after the header
pub const STREAM_NONCE_SIZE: usize = 16;

/// Size of a conformant file key
pub const FILE_KEY_SIZE: usize = 16;
