//! Fault injection on a builder session
//!
//! Structural faults (`flip_chunk_bit`, `truncate`, `duplicate_chunk`,
//! `swap_chunks`) re-derive the expectation from a model of a conformant
//! STREAM reader: the payload is read in pieces of `CHUNK_SIZE + TAG_SIZE`,
//! a full piece is tried as non-final and then as final, a short piece only as
//! final, an empty final chunk is only valid as the first chunk, and nothing
//! may follow the final chunk. The released plaintext is what the reader
//! emits before its first error.
//!
//! `flip_bit` and `flip_last_byte` only touch bytes; the caller sets the
//! expectation.

use anyhow::{bail, Context};

use agevec_core::Expectation;

use crate::builder::{SealedChunk, VectorBuilder};
use crate::header::{self, STANZA_PREFIX};
use crate::{CHUNK_SIZE, STREAM_NONCE_SIZE, TAG_SIZE};

/// What a conformant reader does with the current payload section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOutcome {
    pub complete: bool,
    pub released: Vec<u8>,
}

impl VectorBuilder {
    fn payload_start(&self) -> Option<usize> {
        self.nonce_offset.map(|o| o + STREAM_NONCE_SIZE)
    }

    fn container_mut(&mut self) -> &mut Vec<u8> {
        if self.header_len.is_none() {
            self.buf = self.header.bytes();
            self.header_len = Some(self.buf.len());
        }
        &mut self.buf
    }

    fn mark_tampered(&mut self, offset: usize) {
        let in_nonce = self
            .nonce_offset
            .is_some_and(|n| (n..n + STREAM_NONCE_SIZE).contains(&offset));
        for chunk in &mut self.chunks {
            let r = &chunk.record;
            if in_nonce || (r.offset..r.end()).contains(&offset) {
                chunk.tampered = true;
            }
        }
    }

    /// XOR `mask` into the byte at `offset`.
    pub fn flip_bit(&mut self, offset: usize, mask: u8) -> anyhow::Result<()> {
        let buf = self.container_mut();
        let len = buf.len();
        let byte = buf
            .get_mut(offset)
            .with_context(|| format!("flip offset {offset} beyond container length {len}"))?;
        *byte ^= mask;
        self.mark_tampered(offset);
        Ok(())
    }

    pub fn flip_last_byte(&mut self, mask: u8) -> anyhow::Result<()> {
        let len = self.container_mut().len();
        if len == 0 {
            bail!("flip on an empty container");
        }
        self.flip_bit(len - 1, mask)
    }

    /// Flip the least significant bit of the MAC and rewrite its line.
    ///
    /// The MAC stays canonically encoded, so the header still parses and only
    /// verification fails.
    pub fn flip_mac_bit(&mut self) -> anyhow::Result<()> {
        let index = self.mac_line.context("no MAC line written")?;
        let mut mac = self.mac.context("MAC line does not hold 32 bytes")?;
        mac[31] ^= 0x01;
        let line = header::mac_line(&mac);

        match self.header_len {
            None => {
                self.header.replace_line(index, line);
            }
            Some(_) => {
                let offset = self
                    .header
                    .line_offset(index)
                    .context("MAC line outside header")?;
                let len = self.buf.len();
                let slot = self
                    .buf
                    .get_mut(offset..offset + line.len())
                    .with_context(|| {
                        format!("MAC line at offset {offset} cut off (container is {len} bytes)")
                    })?;
                slot.copy_from_slice(line.as_bytes());
                self.header.replace_line(index, line);
            }
        }
        self.mac = Some(mac);
        self.expect = Expectation::HmacFailure;
        Ok(())
    }

    /// XOR `mask` into byte `offset` of chunk `index`'s ciphertext.
    pub fn flip_chunk_bit(&mut self, index: usize, offset: usize, mask: u8) -> anyhow::Result<()> {
        let record = self
            .chunks
            .get(index)
            .with_context(|| format!("no chunk {index}"))?
            .record;
        if offset >= record.ciphertext_len() {
            bail!(
                "offset {offset} beyond chunk {index} ({} bytes)",
                record.ciphertext_len()
            );
        }
        self.flip_bit(record.offset + offset, mask)?;
        self.expect_stream_outcome()
    }

    /// Cut the container to `len` bytes.
    ///
    /// Cutting into the header or the stream nonce is a header failure;
    /// anything later is judged by the STREAM model.
    pub fn truncate(&mut self, len: usize) -> anyhow::Result<()> {
        let total = self.container_mut().len();
        if len > total {
            bail!("truncate to {len} beyond container length {total}");
        }
        self.buf.truncate(len);

        match self.payload_start() {
            Some(start) if len >= start => {
                self.chunks.retain(|c| c.record.offset < len);
                if let Some(last) = self.chunks.last_mut() {
                    if last.record.end() > len {
                        last.tampered = true;
                    }
                }
                self.expect_stream_outcome()
            }
            _ => {
                tracing::debug!(len, "truncated inside header");
                self.chunks.clear();
                self.expect_header_failure();
                Ok(())
            }
        }
    }

    /// Insert a copy of chunk `index` right after it.
    pub fn duplicate_chunk(&mut self, index: usize) -> anyhow::Result<()> {
        if index >= self.chunks.len() {
            bail!("no chunk {index}");
        }
        let mut order: Vec<usize> = (0..self.chunks.len()).collect();
        order.insert(index + 1, index);
        self.reorder_chunks(&order)?;
        self.expect_stream_outcome()
    }

    /// Exchange the positions of chunks `i` and `j`.
    pub fn swap_chunks(&mut self, i: usize, j: usize) -> anyhow::Result<()> {
        let n = self.chunks.len();
        if i >= n || j >= n {
            bail!("swap {i} <-> {j} out of range ({n} chunks)");
        }
        let mut order: Vec<usize> = (0..n).collect();
        order.swap(i, j);
        self.reorder_chunks(&order)?;
        self.expect_stream_outcome()
    }

    /// Rewrite the chunk region so that position `k` holds old chunk
    /// `order[k]`. Bytes after the last chunk are kept.
    fn reorder_chunks(&mut self, order: &[usize]) -> anyhow::Result<()> {
        let start = self.payload_start().context("no stream nonce written")?;
        let mut expected = start;
        for c in &self.chunks {
            if c.record.offset != expected {
                bail!("chunks are not contiguous at offset {}", c.record.offset);
            }
            expected = c.record.end();
        }
        let tail = self.buf.split_off(expected);

        let old: Vec<(SealedChunk, Vec<u8>)> = self
            .chunks
            .iter()
            .map(|c| (c.clone(), self.buf[c.record.offset..c.record.end()].to_vec()))
            .collect();
        self.buf.truncate(start);
        self.chunks.clear();

        for &k in order {
            let (mut chunk, ciphertext) = old[k].clone();
            chunk.record.offset = self.buf.len();
            self.buf.extend_from_slice(&ciphertext);
            self.chunks.push(chunk);
        }
        self.buf.extend_from_slice(&tail);
        Ok(())
    }

    /// Replace argument `pos` (0 = type tag) of the most recent stanza.
    pub fn replace_stanza_arg(&mut self, pos: usize, value: &str) -> anyhow::Result<()> {
        if self.header_len.is_some() {
            bail!("header operation after binary data");
        }
        let index = self
            .header
            .rfind_line(STANZA_PREFIX)
            .context("no stanza written")?;
        let mut args = header::split_args_line(&self.header.lines()[index]);
        let slot = args
            .get_mut(pos)
            .with_context(|| format!("stanza has no argument {pos}"))?;
        *slot = value.to_string();
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.header.replace_line(index, header::args_line(&refs));
        self.expect_header_failure();
        Ok(())
    }

    /// Model a conformant STREAM reader over the current payload section.
    pub fn stream_outcome(&self) -> Option<StreamOutcome> {
        let start = self.payload_start()?;
        let end = self.buf.len();
        if end < start {
            return None;
        }

        let mut released = Vec::new();
        let mut pos = start;
        let mut counter = 0u64;
        loop {
            let remaining = end - pos;
            if remaining == 0 {
                // Stream ended without a final chunk
                return Some(StreamOutcome {
                    complete: false,
                    released,
                });
            }
            let take = remaining.min(CHUNK_SIZE + TAG_SIZE);
            let full = take == CHUNK_SIZE + TAG_SIZE;

            let accepted = self.chunks.iter().find(|c| {
                c.record.offset == pos
                    && c.record.ciphertext_len() == take
                    && c.record.index == counter
                    && !c.tampered
                    && (c.record.last || full)
                    && !(c.record.last && c.plaintext.is_empty() && counter > 0)
            });
            let Some(chunk) = accepted else {
                return Some(StreamOutcome {
                    complete: false,
                    released,
                });
            };

            released.extend_from_slice(&chunk.plaintext);
            pos += take;
            counter += 1;
            if chunk.record.last {
                return Some(StreamOutcome {
                    complete: pos == end,
                    released,
                });
            }
        }
    }

    /// Set the expectation from [`stream_outcome`](Self::stream_outcome).
    pub fn expect_stream_outcome(&mut self) -> anyhow::Result<()> {
        let outcome = self
            .stream_outcome()
            .context("no stream nonce written")?;
        if outcome.complete {
            self.expect = Expectation::Success;
        } else {
            self.expect = Expectation::PayloadFailure;
        }
        self.payload = outcome.released;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::Fixtures;
    use agevec_core::Vector;
    use sha2::{Digest, Sha256};

    fn session() -> (Fixtures, VectorBuilder) {
        let fx = Fixtures::standard().unwrap();
        let mut f = VectorBuilder::new(&fx);
        f.version_line("v1").unwrap();
        f.x25519(&fx.identity).unwrap();
        f.hmac().unwrap();
        (fx, f)
    }

    fn digest(data: &[u8]) -> Option<[u8; 32]> {
        Some(Sha256::digest(data).into())
    }

    fn finish(f: VectorBuilder) -> Vector {
        f.finish("t").unwrap()
    }

    #[test]
    fn test_conformant_streams_complete() {
        let (_, mut f) = session();
        f.payload_stream(&vec![1u8; 2 * CHUNK_SIZE + 5]).unwrap();
        let outcome = f.stream_outcome().unwrap();
        assert!(outcome.complete);
        assert_eq!(outcome.released, vec![1u8; 2 * CHUNK_SIZE + 5]);

        let (_, mut f) = session();
        f.payload_stream(&[]).unwrap();
        assert!(f.stream_outcome().unwrap().complete);
    }

    #[test]
    fn test_scenario_empty_plaintext() {
        let (_, mut f) = session();
        f.payload_stream(&[]).unwrap();
        let records = f.chunk_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ciphertext_len(), TAG_SIZE);
        let v = finish(f);
        assert_eq!(v.expect, Expectation::Success);
        assert_eq!(v.payload_digest, digest(b""));
    }

    #[test]
    fn test_scenario_exact_chunk_single_final() {
        let (_, mut f) = session();
        f.payload_stream(&vec![0u8; CHUNK_SIZE]).unwrap();
        let records = f.chunk_records();
        assert_eq!(records.len(), 1);
        assert!(records[0].last && records[0].is_full());
        assert!(f.stream_outcome().unwrap().complete);
    }

    #[test]
    fn test_trailing_empty_final_chunk_is_payload_failure() {
        let (_, mut f) = session();
        f.nonce().unwrap();
        f.payload_chunk(CHUNK_SIZE).unwrap();
        let first = f.payload.clone();
        f.payload_chunk_final(0).unwrap();

        let outcome = f.stream_outcome().unwrap();
        assert!(!outcome.complete);
        assert_eq!(outcome.released, first);
    }

    #[test]
    fn test_scenario_mac_flip() {
        let (_, mut f) = session();
        f.payload(b"hello").unwrap();
        let before = f.bytes();
        f.flip_mac_bit().unwrap();
        let after = f.bytes();

        assert_eq!(before.len(), after.len());
        assert_ne!(before, after);
        let v = finish(f);
        assert_eq!(v.expect, Expectation::HmacFailure);
        assert!(v.payload_digest.is_none());
    }

    #[test]
    fn test_mac_flip_before_binary() {
        let (_, mut f) = session();
        f.flip_mac_bit().unwrap();
        let text = String::from_utf8(f.bytes()).unwrap();
        let mac_line = text.lines().last().unwrap();
        assert_eq!(mac_line.len(), 4 + 43);
        assert_eq!(f.expectation(), Expectation::HmacFailure);
    }

    #[test]
    fn test_mac_flip_after_truncation_into_header() {
        let (_, mut f) = session();
        f.payload(b"hello").unwrap();
        f.truncate(30).unwrap();
        assert!(f.flip_mac_bit().is_err());
        assert_eq!(f.bytes().len(), 30);
        assert_eq!(f.expectation(), Expectation::HeaderFailure);
    }

    #[test]
    fn test_scenario_two_final_chunks() {
        let (_, mut f) = session();
        f.nonce().unwrap();
        f.payload_chunk(CHUNK_SIZE).unwrap();
        let first = f.payload.clone();
        f.payload_chunk_final(100).unwrap();
        f.payload_chunk_final(100).unwrap();
        f.expect_stream_outcome().unwrap();

        let v = finish(f);
        assert_eq!(v.expect, Expectation::PayloadFailure);
        assert_eq!(v.payload_digest, digest(&first));
    }

    #[test]
    fn test_full_final_chunk_followed_by_data() {
        let (_, mut f) = session();
        f.nonce().unwrap();
        f.payload_chunk_final(CHUNK_SIZE).unwrap();
        let first = f.payload.clone();
        f.payload_chunk_final(CHUNK_SIZE).unwrap();

        // A full chunk is retried as final, so it is released before the
        // trailing chunk is rejected
        let outcome = f.stream_outcome().unwrap();
        assert!(!outcome.complete);
        assert_eq!(outcome.released, first);
    }

    #[test]
    fn test_flip_chunk_bit_releases_prefix() {
        let (_, mut f) = session();
        f.nonce().unwrap();
        f.payload_chunk(CHUNK_SIZE).unwrap();
        f.payload_chunk(CHUNK_SIZE).unwrap();
        f.payload_chunk_final(100).unwrap();
        let two = f.payload[..2 * CHUNK_SIZE].to_vec();

        f.flip_chunk_bit(2, 0, 0x01).unwrap();
        assert_eq!(f.expectation(), Expectation::PayloadFailure);
        assert_eq!(f.payload, two);
    }

    #[test]
    fn test_flip_nonce_fails_every_chunk() {
        let (_, mut f) = session();
        f.payload(b"hello").unwrap();
        let offset = f.nonce_offset.unwrap();
        f.flip_bit(offset, 0x80).unwrap();
        f.expect_stream_outcome().unwrap();
        assert_eq!(f.expectation(), Expectation::PayloadFailure);
        assert!(f.payload.is_empty());
    }

    #[test]
    fn test_truncate_inside_nonce_is_header_failure() {
        let (_, mut f) = session();
        f.payload(b"hello").unwrap();
        let nonce = f.nonce_offset.unwrap();
        f.truncate(nonce + 12).unwrap();
        let v = finish(f);
        assert_eq!(v.expect, Expectation::HeaderFailure);
        assert!(v.payload_digest.is_none());
    }

    #[test]
    fn test_truncate_mid_chunk() {
        let (_, mut f) = session();
        f.nonce().unwrap();
        f.payload_chunk(CHUNK_SIZE).unwrap();
        f.payload_chunk_final(500).unwrap();
        let first = f.payload[..CHUNK_SIZE].to_vec();
        let len = f.bytes().len();

        f.truncate(len - 10).unwrap();
        assert_eq!(f.expectation(), Expectation::PayloadFailure);
        assert_eq!(f.payload, first);
    }

    #[test]
    fn test_truncate_final_chunk_away() {
        let (_, mut f) = session();
        f.nonce().unwrap();
        f.payload_chunk(CHUNK_SIZE).unwrap();
        let first = f.payload.clone();
        f.payload_chunk_final(500).unwrap();
        let end_of_first = f.chunk_records()[0].end();

        f.truncate(end_of_first).unwrap();
        // Full non-final chunk at end of stream: released, then no final chunk
        assert_eq!(f.expectation(), Expectation::PayloadFailure);
        assert_eq!(f.payload, first);
    }

    #[test]
    fn test_truncate_trailing_garbage_restores_success() {
        let (_, mut f) = session();
        f.payload(b"hello").unwrap();
        let good = f.bytes().len();
        let garbage = f.rand(20);
        f.raw(&garbage);
        f.expect_stream_outcome().unwrap();
        assert_eq!(f.expectation(), Expectation::PayloadFailure);

        f.truncate(good).unwrap();
        assert_eq!(f.expectation(), Expectation::Success);
        assert_eq!(f.payload, b"hello");
    }

    #[test]
    fn test_duplicate_chunk() {
        let (_, mut f) = session();
        f.nonce().unwrap();
        f.payload_chunk(CHUNK_SIZE).unwrap();
        f.payload_chunk_final(10).unwrap();
        let first = f.payload[..CHUNK_SIZE].to_vec();
        let len = f.bytes().len();

        f.duplicate_chunk(0).unwrap();
        assert_eq!(f.bytes().len(), len + CHUNK_SIZE + TAG_SIZE);
        assert_eq!(f.expectation(), Expectation::PayloadFailure);
        assert_eq!(f.payload, first);
    }

    #[test]
    fn test_swap_chunks() {
        let (_, mut f) = session();
        f.nonce().unwrap();
        f.payload_chunk(CHUNK_SIZE).unwrap();
        f.payload_chunk(CHUNK_SIZE).unwrap();
        f.payload_chunk_final(10).unwrap();
        let len = f.bytes().len();

        f.swap_chunks(0, 1).unwrap();
        assert_eq!(f.bytes().len(), len);
        assert_eq!(f.expectation(), Expectation::PayloadFailure);
        assert!(f.payload.is_empty());

        // Swapping back restores the stream
        f.swap_chunks(0, 1).unwrap();
        assert_eq!(f.expectation(), Expectation::Success);
    }

    #[test]
    fn test_swap_keeps_trailing_bytes() {
        let (_, mut f) = session();
        f.nonce().unwrap();
        f.payload_chunk(CHUNK_SIZE).unwrap();
        f.payload_chunk_final(10).unwrap();
        f.raw(b"tail");
        f.swap_chunks(0, 1).unwrap();
        assert!(f.bytes().ends_with(b"tail"));
    }

    #[test]
    fn test_replace_stanza_arg() {
        let fx = Fixtures::standard().unwrap();
        let mut f = VectorBuilder::new(&fx);
        f.version_line("v1").unwrap();
        f.x25519(&fx.identity).unwrap();
        let share = f.stanzas()[0].args()[1].clone();
        let altered = header::not_canonical_base64(&share).unwrap();
        f.replace_stanza_arg(1, &altered).unwrap();
        f.hmac().unwrap();

        let text = String::from_utf8(f.bytes()).unwrap();
        assert_eq!(text.lines().nth(1).unwrap(), format!("-> X25519 {altered}"));
        assert_eq!(f.expectation(), Expectation::HeaderFailure);
        assert!(f.replace_stanza_arg(5, "x").is_err());
    }

    #[test]
    fn test_fault_bounds_checked() {
        let (_, mut f) = session();
        f.payload(b"hello").unwrap();
        let len = f.bytes().len();
        assert!(f.flip_bit(len, 1).is_err());
        assert!(f.flip_chunk_bit(0, 5 + TAG_SIZE, 1).is_err());
        assert!(f.flip_chunk_bit(1, 0, 1).is_err());
        assert!(f.truncate(len + 1).is_err());
        assert!(f.duplicate_chunk(3).is_err());
    }
}
