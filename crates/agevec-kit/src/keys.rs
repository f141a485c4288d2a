//! Fixed key material: file keys, bech32 identities, X25519 helpers

use anyhow::Context;
use bech32::{FromBase32, ToBase32, Variant};
use hkdf::Hkdf;
use sha2::Sha256;
use x25519_dalek::X25519_BASEPOINT_BYTES;
use zeroize::Zeroize;

use agevec_core::config::FixturesConfig;

use crate::KEY_SIZE;

/// Bech32 human-readable part of X25519 identities.
const IDENTITY_HRP: &str = "age-secret-key-";

/// A file key. Zeroized on drop.
///
/// Conformant files use 16 bytes; other lengths are accepted so that
/// "long file key" vectors can be built.
#[derive(Clone, PartialEq, Eq)]
pub struct FileKey {
    bytes: Vec<u8>,
}

impl FileKey {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl Drop for FileKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for FileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileKey")
            .field("len", &self.bytes.len())
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Test constants injected into each builder session.
#[derive(Debug, Clone)]
pub struct Fixtures {
    pub file_key: FileKey,
    /// X25519 identity scalar (unclamped, as encoded in bech32)
    pub identity: [u8; 32],
    /// Seed of the deterministic byte source
    pub seed: [u8; 32],
}

impl Fixtures {
    /// Resolve configured strings into key material.
    pub fn from_config(config: &FixturesConfig) -> anyhow::Result<Self> {
        let identity = decode_identity(&config.identity).context("decoding fixtures.identity")?;
        let seed: [u8; 32] = config.seed.as_bytes().try_into().map_err(|_| {
            anyhow::anyhow!(
                "fixtures.seed must be 32 bytes, got {}",
                config.seed.len()
            )
        })?;
        Ok(Self {
            file_key: FileKey::from_bytes(config.file_key.as_bytes()),
            identity,
            seed,
        })
    }

    /// The stock fixtures ("YELLOW SUBMARINE" file key and test identity).
    pub fn standard() -> anyhow::Result<Self> {
        Self::from_config(&FixturesConfig::default())
    }

    /// Public key matching `identity`.
    pub fn recipient(&self) -> [u8; 32] {
        public_key(&self.identity)
    }
}

/// Encode a 32-byte scalar as an uppercase `AGE-SECRET-KEY-1…` string.
pub fn encode_identity(scalar: &[u8; 32]) -> anyhow::Result<String> {
    let encoded = bech32::encode(IDENTITY_HRP, scalar.to_base32(), Variant::Bech32)
        .map_err(|e| anyhow::anyhow!("bech32 encode: {e}"))?;
    Ok(encoded.to_uppercase())
}

/// Decode an `AGE-SECRET-KEY-1…` string into its 32-byte scalar.
pub fn decode_identity(s: &str) -> anyhow::Result<[u8; 32]> {
    let (hrp, data, variant) = bech32::decode(s).map_err(|e| anyhow::anyhow!("bech32 decode: {e}"))?;
    if hrp != IDENTITY_HRP {
        anyhow::bail!("unexpected bech32 prefix {hrp:?} (want {IDENTITY_HRP:?})");
    }
    if variant != Variant::Bech32 {
        anyhow::bail!("identity must use bech32, not bech32m");
    }
    let bytes = Vec::<u8>::from_base32(&data).map_err(|e| anyhow::anyhow!("bech32 data: {e}"))?;
    bytes.try_into().map_err(|b: Vec<u8>| {
        anyhow::anyhow!("identity must be 32 bytes, got {}", b.len())
    })
}

/// X25519(scalar, point).
///
/// Low-order points yield the all-zero string instead of an error, so vectors
/// exercising them stay reproducible. Callers decide whether that matters.
pub fn x25519(scalar: &[u8; 32], point: &[u8; 32]) -> [u8; 32] {
    let secret = x25519_dalek::x25519(*scalar, *point);
    if secret == [0u8; 32] {
        tracing::debug!(point = %hex::encode(point), "low-order point, shared secret is zero");
    }
    secret
}

/// X25519(scalar, basepoint).
pub fn public_key(scalar: &[u8; 32]) -> [u8; 32] {
    x25519_dalek::x25519(*scalar, X25519_BASEPOINT_BYTES)
}

/// Borrow `bytes` as a 32-byte array, or fail with `what` in the message.
pub fn array32(bytes: &[u8], what: &str) -> anyhow::Result<[u8; 32]> {
    bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("{what} must be 32 bytes, got {}", bytes.len()))
}

/// HKDF-SHA256 expand into a 32-byte key.
pub fn hkdf_derive(ikm: &[u8], salt: Option<&[u8]>, info: &[u8]) -> anyhow::Result<[u8; KEY_SIZE]> {
    let hkdf = Hkdf::<Sha256>::new(salt, ikm);
    let mut okm = [0u8; KEY_SIZE];
    hkdf.expand(info, &mut okm)
        .map_err(|e| anyhow::anyhow!("HKDF expand failed: {e}"))?;
    Ok(okm)
}

/// Little-endian encodings of Curve25519 points whose X25519 product with any
/// clamped scalar is the all-zero string.
pub const LOW_ORDER_POINTS: [[u8; 32]; 7] = [
    // 0 (the identity)
    [0; 32],
    // 1 (order 4)
    [
        0x01, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        0, 0, 0,
    ],
    // order 8
    [
        0xe0, 0xeb, 0x7a, 0x7c, 0x3b, 0x41, 0xb8, 0xae, 0x16, 0x56, 0xe3, 0xfa, 0xf1, 0x9f, 0xc4,
        0x6a, 0xda, 0x09, 0x8d, 0xeb, 0x9c, 0x32, 0xb1, 0xfd, 0x86, 0x62, 0x05, 0x16, 0x5f, 0x49,
        0xb8, 0x00,
    ],
    // order 8
    [
        0x5f, 0x9c, 0x95, 0xbc, 0xa3, 0x50, 0x8c, 0x24, 0xb1, 0xd0, 0xb1, 0x55, 0x9c, 0x83, 0xef,
        0x5b, 0x04, 0x44, 0x5c, 0xc4, 0x58, 0x1c, 0x8e, 0x86, 0xd8, 0x22, 0x4e, 0xdd, 0xd0, 0x9f,
        0x11, 0x57,
    ],
    // p - 1 (order 2)
    [
        0xec, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0x7f,
    ],
    // p (non-canonical 0)
    [
        0xed, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0x7f,
    ],
    // p + 1 (non-canonical 1)
    [
        0xee, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0x7f,
    ],
];
