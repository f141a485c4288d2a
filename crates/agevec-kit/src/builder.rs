//! One builder session per vector
//!
//! The container is written top-down. Until the first binary write (stream
//! nonce or raw bytes) it is a [`HeaderAssembler`] line log that supports
//! unread/restore; after that the header is frozen into the byte buffer and
//! only binary and fault operations are accepted.

use anyhow::{bail, Context};
use sha2::{Digest, Sha256};

use agevec_core::{Expectation, Vector};

use crate::armor::{armor_with, ArmorOptions};
use crate::header::{self, HeaderAssembler};
use crate::keys::{self, FileKey, Fixtures};
use crate::rand::{ByteSource, KeystreamSource};
use crate::stanza::{self, Stanza};
use crate::stream::{split_chunks, ChunkRecord, StreamState};
use crate::{KEY_SIZE, STREAM_NONCE_SIZE};

/// A sealed chunk and the plaintext it carries.
#[derive(Debug, Clone)]
pub(crate) struct SealedChunk {
    pub(crate) record: ChunkRecord,
    pub(crate) plaintext: Vec<u8>,
    /// Ciphertext bytes altered after sealing
    pub(crate) tampered: bool,
}

pub struct VectorBuilder {
    pub(crate) file_key: FileKey,
    source: Box<dyn ByteSource>,

    pub(crate) header: HeaderAssembler,
    /// Container bytes, populated once the header is frozen
    pub(crate) buf: Vec<u8>,
    /// Length of the frozen header; `None` while it is still editable
    pub(crate) header_len: Option<usize>,
    /// Index of the MAC line in the header log
    pub(crate) mac_line: Option<usize>,
    pub(crate) mac: Option<[u8; 32]>,

    stanzas: Vec<Stanza>,
    pub(crate) stream: Option<StreamState>,
    /// Offset of the 16-byte stream nonce in `buf`
    pub(crate) nonce_offset: Option<usize>,
    pub(crate) chunks: Vec<SealedChunk>,

    // ── expectation ──
    pub(crate) expect: Expectation,
    pub(crate) payload: Vec<u8>,
    identities: Vec<String>,
    passphrases: Vec<String>,
    comment: Option<String>,
    armored: bool,
    armor: Option<ArmorOptions>,
}

impl VectorBuilder {
    /// Start a session with the fixture file key and the stock keystream.
    pub fn new(fixtures: &Fixtures) -> Self {
        Self::with_source(fixtures, Box::new(KeystreamSource::new(&fixtures.seed)))
    }

    pub fn with_source(fixtures: &Fixtures, source: Box<dyn ByteSource>) -> Self {
        Self {
            file_key: fixtures.file_key.clone(),
            source,
            header: HeaderAssembler::new(),
            buf: Vec::new(),
            header_len: None,
            mac_line: None,
            mac: None,
            stanzas: Vec::new(),
            stream: None,
            nonce_offset: None,
            chunks: Vec::new(),
            expect: Expectation::Success,
            payload: Vec::new(),
            identities: Vec::new(),
            passphrases: Vec::new(),
            comment: None,
            armored: false,
            armor: None,
        }
    }

    /// Draw `n` bytes from the session's byte source.
    pub fn rand(&mut self, n: usize) -> Vec<u8> {
        self.source.next_bytes(n)
    }

    /// Replace the file key used by every later stanza, MAC and nonce.
    pub fn set_file_key(&mut self, key: impl Into<Vec<u8>>) {
        self.file_key = FileKey::from_bytes(key);
    }

    pub fn file_key(&self) -> &FileKey {
        &self.file_key
    }

    pub fn stanzas(&self) -> &[Stanza] {
        &self.stanzas
    }

    pub fn chunk_records(&self) -> Vec<ChunkRecord> {
        self.chunks.iter().map(|c| c.record).collect()
    }

    pub fn expectation(&self) -> Expectation {
        self.expect
    }

    // ── header lines ──────────────────────────────────────────────────────

    fn header_mut(&mut self) -> anyhow::Result<&mut HeaderAssembler> {
        if self.header_len.is_some() {
            bail!("header operation after binary data");
        }
        Ok(&mut self.header)
    }

    pub fn text_line(&mut self, line: impl Into<String>) -> anyhow::Result<()> {
        self.header_mut()?.push_line(line);
        Ok(())
    }

    /// Remove the last header line and return it without its terminator.
    pub fn unread_line(&mut self) -> anyhow::Result<String> {
        let line = self.header_mut()?.unread_line();
        if self.mac_line.is_some_and(|i| i >= self.header.lines().len()) {
            self.mac_line = None;
        }
        line.context("no header line to unread")
    }

    /// Put the last unread line back unchanged.
    pub fn restore_line(&mut self) -> anyhow::Result<()> {
        self.header_mut()?
            .restore_line()
            .context("no unread line to restore")?;
        Ok(())
    }

    pub fn version_line(&mut self, version: &str) -> anyhow::Result<()> {
        self.text_line(format!("{}{version}", header::VERSION_PREFIX))
    }

    pub fn args_line(&mut self, args: &[&str]) -> anyhow::Result<()> {
        self.text_line(header::args_line(args))
    }

    /// Unread the last line as a stanza args line, type tag first.
    pub fn unread_args_line(&mut self) -> anyhow::Result<Vec<String>> {
        let line = self.unread_line()?;
        Ok(header::split_args_line(&line))
    }

    /// Write `body` as stanza body lines.
    pub fn body(&mut self, body: &[u8]) -> anyhow::Result<()> {
        let h = self.header_mut()?;
        for line in header::body_lines(body) {
            h.push_line(line);
        }
        Ok(())
    }

    /// Rewrite the last line with `=` padding appended.
    pub fn base64_padding(&mut self) -> anyhow::Result<()> {
        let line = self.unread_line()?;
        self.text_line(header::with_padding(&line))
    }

    /// Seal `plaintext` under `key` with a zero nonce and write it as a body.
    pub fn aead_body(&mut self, key: &[u8; KEY_SIZE], plaintext: &[u8]) -> anyhow::Result<()> {
        let sealed = stanza::seal_zero_nonce(key, plaintext)?;
        self.body(&sealed)
    }

    fn write_stanza(&mut self, stanza: Stanza) -> anyhow::Result<()> {
        let args = stanza.args();
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.args_line(&refs)?;
        self.body(stanza.body())?;
        self.stanzas.push(stanza);
        Ok(())
    }

    // ── recipient stanzas ─────────────────────────────────────────────────

    /// Record `identity` and add a stanza for it with a fresh ephemeral share.
    pub fn x25519(&mut self, identity: &[u8; 32]) -> anyhow::Result<()> {
        self.x25519_record_identity(identity)?;
        self.x25519_no_record_identity(identity)
    }

    pub fn x25519_record_identity(&mut self, identity: &[u8; 32]) -> anyhow::Result<()> {
        self.identities.push(keys::encode_identity(identity)?);
        Ok(())
    }

    pub fn x25519_no_record_identity(&mut self, identity: &[u8; 32]) -> anyhow::Result<()> {
        let ephemeral = keys::array32(&self.rand(32), "ephemeral scalar")?;
        let share = keys::public_key(&ephemeral);
        self.x25519_stanza(&share, identity)
    }

    /// Stanza for `identity` with a caller-supplied share (possibly low order).
    pub fn x25519_stanza(&mut self, share: &[u8; 32], identity: &[u8; 32]) -> anyhow::Result<()> {
        self.header_mut()?;
        let stanza = stanza::x25519_stanza(share, identity, &self.file_key)?;
        self.write_stanza(stanza)
    }

    /// Record `passphrase` and add a stanza for it with a fresh salt.
    pub fn scrypt(&mut self, passphrase: &str, work_factor: u8) -> anyhow::Result<()> {
        self.scrypt_record_passphrase(passphrase);
        self.scrypt_no_record_passphrase(passphrase, work_factor)
    }

    pub fn scrypt_record_passphrase(&mut self, passphrase: &str) {
        self.passphrases.push(passphrase.to_string());
    }

    pub fn scrypt_no_record_passphrase(
        &mut self,
        passphrase: &str,
        work_factor: u8,
    ) -> anyhow::Result<()> {
        let salt = self.rand(16);
        self.scrypt_no_record_passphrase_with_salt(passphrase, work_factor, &salt)
    }

    pub fn scrypt_no_record_passphrase_with_salt(
        &mut self,
        passphrase: &str,
        work_factor: u8,
        salt: &[u8],
    ) -> anyhow::Result<()> {
        self.header_mut()?;
        let stanza = stanza::scrypt_stanza(passphrase, work_factor, salt, &self.file_key)?;
        self.write_stanza(stanza)
    }

    // ── MAC ───────────────────────────────────────────────────────────────

    /// Compute the header MAC over everything written so far and append it.
    pub fn hmac(&mut self) -> anyhow::Result<()> {
        self.header_mut()?;
        let mac = self.header.mac(&self.file_key)?;
        self.hmac_line(&mac)
    }

    /// Append a MAC line carrying arbitrary bytes.
    pub fn hmac_line(&mut self, mac: &[u8]) -> anyhow::Result<()> {
        self.text_line(header::mac_line(mac))?;
        self.mac_line = Some(self.header.lines().len() - 1);
        self.mac = keys::array32(mac, "MAC").ok();
        Ok(())
    }

    // ── binary section ────────────────────────────────────────────────────

    fn freeze_header(&mut self) {
        if self.header_len.is_none() {
            self.buf = self.header.bytes();
            self.header_len = Some(self.buf.len());
        }
    }

    /// Append raw bytes after the header.
    pub fn raw(&mut self, data: &[u8]) {
        self.freeze_header();
        self.buf.extend_from_slice(data);
    }

    /// Draw and write the 16-byte stream nonce, deriving the payload key.
    pub fn nonce(&mut self) -> anyhow::Result<()> {
        let nonce: [u8; STREAM_NONCE_SIZE] = self
            .rand(STREAM_NONCE_SIZE)
            .try_into()
            .map_err(|_| anyhow::anyhow!("byte source returned a short nonce"))?;
        self.freeze_header();
        self.stream = Some(StreamState::new(&self.file_key, &nonce)?);
        self.nonce_offset = Some(self.buf.len());
        self.buf.extend_from_slice(&nonce);
        Ok(())
    }

    fn stream_mut(&mut self) -> anyhow::Result<&mut StreamState> {
        self.stream
            .as_mut()
            .context("payload chunk before stream nonce")
    }

    fn seal_chunk(&mut self, plaintext: Vec<u8>) -> anyhow::Result<()> {
        let stream = self.stream_mut()?;
        let index = stream.chunks_sealed();
        let last = stream.is_last();
        let ciphertext = stream.seal_chunk(&plaintext)?;

        let record = ChunkRecord {
            index,
            offset: self.buf.len(),
            plaintext_len: plaintext.len(),
            last,
        };
        tracing::debug!(index, len = plaintext.len(), last, "payload chunk");
        self.buf.extend_from_slice(&ciphertext);
        self.payload.extend_from_slice(&plaintext);
        self.chunks.push(SealedChunk {
            record,
            plaintext,
            tampered: false,
        });
        Ok(())
    }

    /// Seal a `size`-byte keystream plaintext with the current nonce.
    pub fn payload_chunk(&mut self, size: usize) -> anyhow::Result<()> {
        let plaintext = self.stream_mut()?.keystream_plaintext(size);
        self.seal_chunk(plaintext)
    }

    /// Set the last-chunk flag, then [`payload_chunk`](Self::payload_chunk).
    pub fn payload_chunk_final(&mut self, size: usize) -> anyhow::Result<()> {
        self.stream_mut()?.set_last();
        self.payload_chunk(size)
    }

    /// Nonce followed by `plaintext` as a single final chunk of any length.
    pub fn payload(&mut self, plaintext: &[u8]) -> anyhow::Result<()> {
        self.nonce()?;
        self.stream_mut()?.set_last();
        self.seal_chunk(plaintext.to_vec())
    }

    /// Nonce followed by `plaintext` framed into conformant chunks.
    pub fn payload_stream(&mut self, plaintext: &[u8]) -> anyhow::Result<()> {
        self.nonce()?;
        let chunks = split_chunks(plaintext);
        let n = chunks.len();
        for (i, chunk) in chunks.into_iter().enumerate() {
            if i + 1 == n {
                self.stream_mut()?.set_last();
            }
            self.seal_chunk(chunk.to_vec())?;
        }
        Ok(())
    }

    // ── expectations ──────────────────────────────────────────────────────

    pub fn expect_header_failure(&mut self) {
        self.expect = Expectation::HeaderFailure;
    }

    /// Also marks the vector as armored, since only armored input can fail
    /// armor decoding.
    pub fn expect_armor_failure(&mut self) {
        self.armored = true;
        self.expect = Expectation::ArmorFailure;
    }

    /// No plaintext is released.
    pub fn expect_payload_failure(&mut self) {
        self.expect = Expectation::PayloadFailure;
        self.payload.clear();
    }

    /// The first `good_bytes` of plaintext are released before the failure.
    pub fn expect_partial_payload(&mut self, good_bytes: usize) {
        self.expect = Expectation::PayloadFailure;
        self.payload.truncate(good_bytes);
    }

    pub fn expect_hmac_failure(&mut self) {
        self.expect = Expectation::HmacFailure;
    }

    pub fn expect_no_match(&mut self) {
        self.expect = Expectation::NoMatch;
    }

    pub fn comment(&mut self, comment: impl Into<String>) {
        self.comment = Some(comment.into());
    }

    /// Wrap the output in ASCII armor.
    pub fn armor(&mut self, options: ArmorOptions) {
        self.armored = true;
        self.armor = Some(options);
    }

    // ── output ────────────────────────────────────────────────────────────

    /// The unarmored container written so far.
    pub fn bytes(&self) -> Vec<u8> {
        match self.header_len {
            Some(_) => self.buf.clone(),
            None => self.header.bytes(),
        }
    }

    /// Close the session into an immutable [`Vector`].
    pub fn finish(self, name: &str) -> anyhow::Result<Vector> {
        let raw = self.bytes();
        let body = match &self.armor {
            Some(options) => armor_with(&raw, options)
                .with_context(|| format!("armoring {name}"))?
                .into_bytes(),
            None => raw,
        };

        let payload_digest = self
            .expect
            .records_payload()
            .then(|| Sha256::digest(&self.payload).into());

        tracing::debug!(
            name,
            expect = %self.expect,
            size = body.len(),
            stanzas = self.stanzas.len(),
            chunks = self.chunks.len(),
            "vector built"
        );

        Ok(Vector {
            name: name.to_string(),
            expect: self.expect,
            payload_digest,
            file_key: self.file_key.as_bytes().to_vec(),
            identities: self.identities,
            passphrases: self.passphrases,
            armored: self.armored,
            comment: self.comment,
            body,
        })
    }
}

impl std::fmt::Debug for VectorBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorBuilder")
            .field("expect", &self.expect)
            .field("header_lines", &self.header.lines().len())
            .field("len", &self.buf.len())
            .field("chunks", &self.chunks.len())
            .finish_non_exhaustive()
    }
}
