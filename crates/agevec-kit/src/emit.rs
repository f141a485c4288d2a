//! Vector file format
//!
//! ```text
//! expect: <outcome>
//! payload: <hex sha256>          (success / payload failure only)
//! file key: <hex>
//! identity: AGE-SECRET-KEY-1...  (zero or more)
//! passphrase: ...                (zero or more)
//! armored: yes                   (optional)
//! comment: ...                   (optional)
//! compressed: zlib               (container above the threshold)
//!
//! <container bytes, zlib-compressed if flagged>
//! ```

use std::io::{Read, Write};
use std::path::Path;

use anyhow::Context;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use agevec_core::config::GeneratorConfig;
use agevec_core::{AgevecError, AgevecResult, Expectation, ManifestEntry, Vector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmitOptions {
    /// Containers strictly larger than this are compressed
    pub compress_threshold: usize,
    /// zlib level 0-9
    pub level: u32,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            compress_threshold: 1024,
            level: 9,
        }
    }
}

impl From<&GeneratorConfig> for EmitOptions {
    fn from(config: &GeneratorConfig) -> Self {
        Self {
            compress_threshold: config.compress_threshold,
            level: config.compression_level,
        }
    }
}

impl EmitOptions {
    pub fn compresses(&self, vector: &Vector) -> bool {
        vector.body.len() > self.compress_threshold
    }
}

/// Serialize `vector` into the vector file format.
pub fn encode_vector(vector: &Vector, options: &EmitOptions) -> anyhow::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(vector.body.len() + 256);
    writeln!(out, "expect: {}", vector.expect)?;
    if vector.expect.records_payload() {
        let digest = vector
            .payload_digest
            .with_context(|| format!("{}: {} without payload digest", vector.name, vector.expect))?;
        writeln!(out, "payload: {}", hex::encode(digest))?;
    }
    writeln!(out, "file key: {}", hex::encode(&vector.file_key))?;
    for id in &vector.identities {
        writeln!(out, "identity: {id}")?;
    }
    for p in &vector.passphrases {
        writeln!(out, "passphrase: {p}")?;
    }
    if vector.armored {
        writeln!(out, "armored: yes")?;
    }
    if let Some(comment) = &vector.comment {
        writeln!(out, "comment: {comment}")?;
    }

    if options.compresses(vector) {
        writeln!(out, "compressed: zlib")?;
        writeln!(out)?;
        let mut encoder = ZlibEncoder::new(out, Compression::new(options.level));
        encoder.write_all(&vector.body)?;
        out = encoder.finish().context("zlib compression failed")?;
    } else {
        writeln!(out)?;
        out.extend_from_slice(&vector.body);
    }
    Ok(out)
}

/// Write `vector` to `dir/<name>` and return its manifest entry.
pub fn write_vector(dir: &Path, vector: &Vector, options: &EmitOptions) -> anyhow::Result<ManifestEntry> {
    let encoded = encode_vector(vector, options)?;
    let path = dir.join(&vector.name);
    std::fs::write(&path, &encoded).with_context(|| format!("writing {}", path.display()))?;
    tracing::debug!(path = %path.display(), bytes = encoded.len(), "wrote vector");

    Ok(ManifestEntry {
        name: vector.name.clone(),
        expect: vector.expect,
        armored: vector.armored,
        compressed: options.compresses(vector),
        size: vector.body.len() as u64,
        comment: vector.comment.clone(),
    })
}

fn malformed(msg: impl Into<String>) -> AgevecError {
    AgevecError::MalformedVector(msg.into())
}

/// Parse a vector file back into a [`Vector`] named `name`.
pub fn parse_vector(name: &str, data: &[u8]) -> AgevecResult<Vector> {
    let mut vector = Vector {
        name: name.to_string(),
        expect: Expectation::Success,
        payload_digest: None,
        file_key: Vec::new(),
        identities: Vec::new(),
        passphrases: Vec::new(),
        armored: false,
        comment: None,
        body: Vec::new(),
    };
    let mut seen_expect = false;
    let mut compressed = false;
    let mut rest = data;

    loop {
        let nl = rest
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| malformed("metadata not terminated by a blank line"))?;
        let line = std::str::from_utf8(&rest[..nl])
            .map_err(|_| malformed("metadata line is not UTF-8"))?;
        rest = &rest[nl + 1..];
        if line.is_empty() {
            break;
        }

        let (key, value) = line
            .split_once(": ")
            .ok_or_else(|| malformed(format!("bad metadata line {line:?}")))?;
        match key {
            "expect" => {
                vector.expect = value.parse()?;
                seen_expect = true;
            }
            "payload" => {
                let bytes = hex::decode(value).map_err(|e| malformed(format!("payload: {e}")))?;
                let digest: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| malformed("payload digest must be 32 bytes"))?;
                vector.payload_digest = Some(digest);
            }
            "file key" => {
                vector.file_key =
                    hex::decode(value).map_err(|e| malformed(format!("file key: {e}")))?;
            }
            "identity" => vector.identities.push(value.to_string()),
            "passphrase" => vector.passphrases.push(value.to_string()),
            "armored" => vector.armored = value == "yes",
            "comment" => vector.comment = Some(value.to_string()),
            "compressed" if value == "zlib" => compressed = true,
            _ => return Err(malformed(format!("unknown metadata {key:?}"))),
        }
    }

    if !seen_expect {
        return Err(malformed("missing expect line"));
    }
    vector.body = if compressed {
        let mut body = Vec::new();
        ZlibDecoder::new(rest).read_to_end(&mut body)?;
        body
    } else {
        rest.to_vec()
    };
    Ok(vector)
}
