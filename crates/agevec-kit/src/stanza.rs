//! Recipient stanzas: X25519 and scrypt wrapping of the file key
//!
//! Both stanza types seal the file key with ChaCha20-Poly1305 under a derived
//! 32-byte wrap key and an all-zero nonce:
//!
//! ```text
//! X25519:  wrap = HKDF-SHA256(ikm = X25519(identity, share),
//!                             salt = share || recipient,
//!                             info = "age-encryption.org/v1/X25519")
//! scrypt:  wrap = scrypt(passphrase, "age-encryption.org/v1/scrypt" || salt,
//!                        N = 2^work_factor, r = 8, p = 1)
//! ```
//!
//! DH and KDF failures never abort generation: a low-order share produces the
//! all-zero secret and unusable scrypt parameters produce an all-zero wrap
//! key, so malformed-input vectors remain reproducible.

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};

use crate::keys::{self, FileKey};
use crate::KEY_SIZE;

const X25519_LABEL: &[u8] = b"age-encryption.org/v1/X25519";
const SCRYPT_LABEL: &[u8] = b"age-encryption.org/v1/scrypt";

/// Largest work factor the builder will actually run scrypt for.
/// 2^22 * 1 KiB = 4 GiB of memory; anything above is treated as a KDF failure.
pub const SCRYPT_MAX_WORK_FACTOR: u8 = 22;

/// A recipient stanza as written to the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stanza {
    X25519 {
        share: [u8; 32],
        body: Vec<u8>,
    },
    Scrypt {
        salt: Vec<u8>,
        work_factor: u8,
        body: Vec<u8>,
    },
    /// Grease or hand-built stanzas
    Other {
        args: Vec<String>,
        body: Vec<u8>,
    },
}

impl Stanza {
    /// Arguments following `->`, type tag first.
    pub fn args(&self) -> Vec<String> {
        match self {
            Stanza::X25519 { share, .. } => vec!["X25519".into(), STANDARD_NO_PAD.encode(share)],
            Stanza::Scrypt {
                salt, work_factor, ..
            } => vec![
                "scrypt".into(),
                STANDARD_NO_PAD.encode(salt),
                work_factor.to_string(),
            ],
            Stanza::Other { args, .. } => args.clone(),
        }
    }

    pub fn body(&self) -> &[u8] {
        match self {
            Stanza::X25519 { body, .. } | Stanza::Scrypt { body, .. } | Stanza::Other { body, .. } => {
                body
            }
        }
    }

    pub fn type_tag(&self) -> &str {
        match self {
            Stanza::X25519 { .. } => "X25519",
            Stanza::Scrypt { .. } => "scrypt",
            Stanza::Other { args, .. } => args.first().map(String::as_str).unwrap_or(""),
        }
    }
}

/// Build an X25519 stanza for `identity` with ephemeral `share`.
///
/// The secret is computed as `[identity]share` rather than `[ephemeral]recipient`
/// so that shares without a known discrete log (low-order or non-canonical
/// encodings) can be used.
pub fn x25519_stanza(
    share: &[u8; 32],
    identity: &[u8; 32],
    file_key: &FileKey,
) -> anyhow::Result<Stanza> {
    let wrap_key = x25519_wrap_key(share, identity)?;
    let body = seal_file_key(&wrap_key, file_key)?;
    tracing::debug!(share = %hex::encode(share), "X25519 stanza");
    Ok(Stanza::X25519 {
        share: *share,
        body,
    })
}

/// Build an scrypt stanza for `passphrase`.
pub fn scrypt_stanza(
    passphrase: &str,
    work_factor: u8,
    salt: &[u8],
    file_key: &FileKey,
) -> anyhow::Result<Stanza> {
    let wrap_key = scrypt_wrap_key(passphrase, work_factor, salt);
    let body = seal_file_key(&wrap_key, file_key)?;
    tracing::debug!(work_factor, salt_len = salt.len(), "scrypt stanza");
    Ok(Stanza::Scrypt {
        salt: salt.to_vec(),
        work_factor,
        body,
    })
}

/// Derive the X25519 stanza wrap key.
pub fn x25519_wrap_key(share: &[u8; 32], identity: &[u8; 32]) -> anyhow::Result<[u8; KEY_SIZE]> {
    let recipient = keys::public_key(identity);
    let secret = keys::x25519(identity, share);

    let mut salt = Vec::with_capacity(64);
    salt.extend_from_slice(share);
    salt.extend_from_slice(&recipient);

    keys::hkdf_derive(&secret, Some(&salt), X25519_LABEL)
}

/// Derive the scrypt stanza wrap key, or all zeroes if scrypt cannot run
/// with these parameters.
pub fn scrypt_wrap_key(passphrase: &str, work_factor: u8, salt: &[u8]) -> [u8; KEY_SIZE] {
    let mut key = [0u8; KEY_SIZE];
    if work_factor == 0 || work_factor > SCRYPT_MAX_WORK_FACTOR {
        tracing::warn!(work_factor, "scrypt work factor out of range, using zero wrap key");
        return key;
    }

    let mut full_salt = Vec::with_capacity(SCRYPT_LABEL.len() + salt.len());
    full_salt.extend_from_slice(SCRYPT_LABEL);
    full_salt.extend_from_slice(salt);

    let derived = scrypt::Params::new(work_factor, 8, 1, KEY_SIZE)
        .map_err(|e| e.to_string())
        .and_then(|params| {
            scrypt::scrypt(passphrase.as_bytes(), &full_salt, &params, &mut key)
                .map_err(|e| e.to_string())
        });
    if let Err(e) = derived {
        tracing::warn!(work_factor, error = %e, "scrypt failed, using zero wrap key");
        key = [0u8; KEY_SIZE];
    }
    key
}

/// ChaCha20-Poly1305 seal with an all-zero nonce.
pub fn seal_file_key(wrap_key: &[u8; KEY_SIZE], file_key: &FileKey) -> anyhow::Result<Vec<u8>> {
    seal_zero_nonce(wrap_key, file_key.as_bytes())
}

pub(crate) fn seal_zero_nonce(key: &[u8; KEY_SIZE], plaintext: &[u8]) -> anyhow::Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(key.into());
    cipher
        .encrypt(&Nonce::default(), plaintext)
        .map_err(|e| anyhow::anyhow!("stanza body encryption failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::public_key;
    use crate::TAG_SIZE;

    fn file_key() -> FileKey {
        FileKey::from_bytes(b"YELLOW SUBMARINE".to_vec())
    }

    fn open(key: &[u8; KEY_SIZE], body: &[u8]) -> Option<Vec<u8>> {
        ChaCha20Poly1305::new(key.into())
            .decrypt(&Nonce::default(), body)
            .ok()
    }

    #[test]
    fn test_x25519_stanza_unwraps_with_recipient_side_derivation() {
        let identity = [0x42u8; 32];
        let ephemeral = [0x17u8; 32];
        let share = public_key(&ephemeral);

        let stanza = x25519_stanza(&share, &identity, &file_key()).unwrap();

        // Sender side computes [ephemeral]recipient; it must agree with [identity]share
        let recipient = public_key(&identity);
        let secret = keys::x25519(&ephemeral, &recipient);
        let mut salt = share.to_vec();
        salt.extend_from_slice(&recipient);
        let wrap = keys::hkdf_derive(&secret, Some(&salt), X25519_LABEL).unwrap();

        assert_eq!(open(&wrap, stanza.body()).unwrap(), b"YELLOW SUBMARINE");
    }

    #[test]
    fn test_x25519_stanza_args() {
        let stanza = x25519_stanza(&public_key(&[1u8; 32]), &[2u8; 32], &file_key()).unwrap();
        let args = stanza.args();
        assert_eq!(args.len(), 2);
        assert_eq!(args[0], "X25519");
        assert_eq!(args[1].len(), 43, "32 bytes unpadded base64");
        assert_eq!(stanza.body().len(), 16 + TAG_SIZE);
    }

    #[test]
    fn test_low_order_share_uses_zero_secret() {
        let identity = [0x42u8; 32];
        let share = crate::keys::LOW_ORDER_POINTS[2];
        let wrap = x25519_wrap_key(&share, &identity).unwrap();

        let mut salt = share.to_vec();
        salt.extend_from_slice(&public_key(&identity));
        let expected = keys::hkdf_derive(&[0u8; 32], Some(&salt), X25519_LABEL).unwrap();
        assert_eq!(wrap, expected);
    }

    #[test]
    fn test_scrypt_deterministic_and_salted() {
        let a = scrypt_wrap_key("password", 4, &[1u8; 16]);
        let b = scrypt_wrap_key("password", 4, &[1u8; 16]);
        let c = scrypt_wrap_key("password", 4, &[2u8; 16]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, [0u8; KEY_SIZE]);
    }

    #[test]
    fn test_scrypt_out_of_range_is_zero_key() {
        assert_eq!(scrypt_wrap_key("password", 0, &[1u8; 16]), [0u8; KEY_SIZE]);
        assert_eq!(scrypt_wrap_key("password", 40, &[1u8; 16]), [0u8; KEY_SIZE]);
    }

    #[test]
    fn test_scrypt_stanza_args() {
        let stanza = scrypt_stanza("password", 4, &[0xAAu8; 16], &file_key()).unwrap();
        assert_eq!(stanza.type_tag(), "scrypt");
        let args = stanza.args();
        assert_eq!(args[0], "scrypt");
        assert_eq!(args[1].len(), 22, "16 bytes unpadded base64");
        assert_eq!(args[2], "4");

        let wrap = scrypt_wrap_key("password", 4, &[0xAAu8; 16]);
        assert_eq!(open(&wrap, stanza.body()).unwrap(), b"YELLOW SUBMARINE");
    }

    #[test]
    fn test_other_stanza_tag() {
        let stanza = Stanza::Other {
            args: vec!["grease".into(), "x".into()],
            body: vec![],
        };
        assert_eq!(stanza.type_tag(), "grease");
        assert!(stanza.body().is_empty());
    }
}
