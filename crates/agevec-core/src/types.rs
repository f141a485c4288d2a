use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AgevecError;

/// Outcome a conformant decryptor must reach for a vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    /// Decrypts fully; the recorded digest covers the whole plaintext
    #[default]
    Success,
    /// Rejected while parsing the header (before any chunk is read)
    HeaderFailure,
    /// Rejected by the armor decoder
    ArmorFailure,
    /// At least one STREAM chunk fails; a plaintext prefix may be released
    PayloadFailure,
    /// Header parses but its MAC does not verify
    HmacFailure,
    /// No stanza matches the recorded identities/passphrases
    NoMatch,
}

impl Expectation {
    pub const ALL: [Expectation; 6] = [
        Expectation::Success,
        Expectation::HeaderFailure,
        Expectation::ArmorFailure,
        Expectation::PayloadFailure,
        Expectation::HmacFailure,
        Expectation::NoMatch,
    ];

    /// The tag written on the `expect:` line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Expectation::Success => "success",
            Expectation::HeaderFailure => "header failure",
            Expectation::ArmorFailure => "armor failure",
            Expectation::PayloadFailure => "payload failure",
            Expectation::HmacFailure => "HMAC failure",
            Expectation::NoMatch => "no match",
        }
    }

    /// Whether a plaintext digest is recorded for this outcome.
    pub fn records_payload(&self) -> bool {
        matches!(self, Expectation::Success | Expectation::PayloadFailure)
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Expectation {
    type Err = AgevecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Expectation::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| AgevecError::UnknownExpectation(s.to_string()))
    }
}

/// A finished test vector: the container plus everything a harness needs
/// to check a decryptor against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vector {
    pub name: String,
    pub expect: Expectation,
    /// SHA-256 of the plaintext a decryptor should release
    /// (present only when `expect.records_payload()`)
    pub payload_digest: Option<[u8; 32]>,
    pub file_key: Vec<u8>,
    /// Bech32 `AGE-SECRET-KEY-1…` strings, in stanza order
    pub identities: Vec<String>,
    pub passphrases: Vec<String>,
    pub armored: bool,
    pub comment: Option<String>,
    /// The age file, armored or binary
    pub body: Vec<u8>,
}

/// One row of the generated `index.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub expect: Expectation,
    pub armored: bool,
    pub compressed: bool,
    /// Container size before compression
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}
