//! Payload STREAM vectors
//!
//! Chunk plaintexts come from the payload keystream, so every chunk of a
//! vector is distinct even when the sizes repeat.

use agevec_kit::{Fixtures, VectorBuilder, CHUNK_SIZE};

use crate::{standard_header, Definition, PAYLOAD};

pub(crate) const VECTORS: &[Definition] = &[
    Definition::new("stream_258_chunks", stream_258_chunks),
    Definition::new("stream_bad_tag", stream_bad_tag),
    Definition::new("stream_bad_tag_second_chunk_full", stream_bad_tag_second_chunk_full),
    Definition::new("stream_duplicate_chunk", stream_duplicate_chunk),
    Definition::new("stream_empty_payload", stream_empty_payload),
    Definition::new("stream_last_chunk_empty", stream_last_chunk_empty),
    Definition::new("stream_last_chunk_full", stream_last_chunk_full),
    Definition::new("stream_no_chunks", stream_no_chunks),
    Definition::new("stream_no_final", stream_no_final),
    Definition::new("stream_no_final_two_chunks", stream_no_final_two_chunks),
    Definition::new("stream_no_nonce", stream_no_nonce),
    Definition::new("stream_short_nonce", stream_short_nonce),
    Definition::new("stream_swapped_chunks", stream_swapped_chunks),
    Definition::new("stream_three_chunks", stream_three_chunks),
    Definition::new("stream_trailing_garbage_long", stream_trailing_garbage_long),
    Definition::new("stream_truncated_chunk", stream_truncated_chunk),
    Definition::new("stream_two_chunks", stream_two_chunks),
    Definition::new("stream_two_chunks_full", stream_two_chunks_full),
    Definition::new("stream_two_final_chunks", stream_two_final_chunks),
    Definition::new("stream_two_final_chunks_full", stream_two_final_chunks_full),
];

/// Standard header followed by the stream nonce.
fn with_nonce(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = standard_header(fx)?;
    f.nonce()?;
    Ok(f)
}

fn stream_258_chunks(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = with_nonce(fx)?;
    for _ in 0..257 {
        f.payload_chunk(CHUNK_SIZE)?;
    }
    f.payload_chunk_final(1)?;
    Ok(f)
}

fn stream_bad_tag(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = standard_header(fx)?;
    f.payload(PAYLOAD)?;
    f.flip_last_byte(0x01)?;
    f.expect_payload_failure();
    Ok(f)
}

fn stream_bad_tag_second_chunk_full(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = with_nonce(fx)?;
    f.payload_chunk(CHUNK_SIZE)?;
    f.payload_chunk_final(CHUNK_SIZE)?;
    f.flip_last_byte(0x20)?;
    f.expect_partial_payload(CHUNK_SIZE);
    Ok(f)
}

fn stream_duplicate_chunk(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = with_nonce(fx)?;
    f.payload_chunk(CHUNK_SIZE)?;
    f.payload_chunk(CHUNK_SIZE)?;
    f.payload_chunk_final(1)?;
    f.duplicate_chunk(0)?;
    f.comment("the first chunk is repeated in place of the second");
    Ok(f)
}

fn stream_empty_payload(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = standard_header(fx)?;
    f.payload_stream(&[])?;
    Ok(f)
}

fn stream_last_chunk_empty(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = with_nonce(fx)?;
    f.payload_chunk(CHUNK_SIZE)?;
    f.payload_chunk_final(0)?;
    f.comment("final STREAM chunk can't be empty unless whole payload is empty");
    f.expect_partial_payload(CHUNK_SIZE);
    Ok(f)
}

fn stream_last_chunk_full(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = with_nonce(fx)?;
    f.payload_chunk_final(CHUNK_SIZE)?;
    Ok(f)
}

fn stream_no_chunks(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = with_nonce(fx)?;
    f.expect_stream_outcome()?;
    Ok(f)
}

fn stream_no_final(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = with_nonce(fx)?;
    f.payload_chunk(CHUNK_SIZE)?;
    f.expect_stream_outcome()?;
    Ok(f)
}

fn stream_no_final_two_chunks(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = with_nonce(fx)?;
    f.payload_chunk(CHUNK_SIZE)?;
    f.payload_chunk(CHUNK_SIZE)?;
    f.expect_stream_outcome()?;
    Ok(f)
}

fn stream_no_nonce(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = standard_header(fx)?;
    f.expect_header_failure();
    Ok(f)
}

fn stream_short_nonce(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = VectorBuilder::new(fx);
    f.version_line("v1")?;
    f.x25519(&fx.recipient())?;
    f.hmac()?;
    let short = f.rand(12);
    f.raw(&short);
    // The nonce is read along with the header
    f.expect_header_failure();
    Ok(f)
}

fn stream_swapped_chunks(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = with_nonce(fx)?;
    f.payload_chunk(CHUNK_SIZE)?;
    f.payload_chunk(CHUNK_SIZE)?;
    f.payload_chunk_final(1)?;
    f.swap_chunks(0, 1)?;
    Ok(f)
}

fn stream_three_chunks(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = standard_header(fx)?;
    let plaintext = f.rand(2 * CHUNK_SIZE + 100);
    f.payload_stream(&plaintext)?;
    Ok(f)
}

fn stream_trailing_garbage_long(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = with_nonce(fx)?;
    f.payload_chunk_final(CHUNK_SIZE)?;
    let garbage = f.rand(1024);
    f.raw(&garbage);
    f.expect_stream_outcome()?;
    Ok(f)
}

fn stream_truncated_chunk(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = with_nonce(fx)?;
    f.payload_chunk(CHUNK_SIZE)?;
    f.payload_chunk_final(100)?;
    let len = f.bytes().len();
    f.truncate(len - 10)?;
    Ok(f)
}

fn stream_two_chunks(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = with_nonce(fx)?;
    f.payload_chunk(CHUNK_SIZE)?;
    f.payload_chunk_final(1)?;
    Ok(f)
}

fn stream_two_chunks_full(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = with_nonce(fx)?;
    f.payload_chunk(CHUNK_SIZE)?;
    f.payload_chunk_final(CHUNK_SIZE)?;
    Ok(f)
}

fn stream_two_final_chunks(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = with_nonce(fx)?;
    f.payload_chunk(CHUNK_SIZE)?;
    f.payload_chunk_final(1)?;
    f.payload_chunk_final(1)?;
    f.expect_stream_outcome()?;
    Ok(f)
}

fn stream_two_final_chunks_full(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = with_nonce(fx)?;
    f.payload_chunk_final(CHUNK_SIZE)?;
    f.payload_chunk_final(CHUNK_SIZE)?;
    f.expect_partial_payload(CHUNK_SIZE);
    Ok(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agevec_core::Expectation;
    use agevec_kit::TAG_SIZE;

    fn payload_len(f: &VectorBuilder) -> usize {
        f.chunk_records().iter().map(|r| r.plaintext_len).sum()
    }

    #[test]
    fn test_258_chunks_layout() {
        let fx = Fixtures::standard().unwrap();
        let f = stream_258_chunks(&fx).unwrap();
        let records = f.chunk_records();
        assert_eq!(records.len(), 258);
        assert!(records[..257].iter().all(|r| r.is_full() && !r.last));
        assert!(records[257].last);
        assert_eq!(records[257].index, 257);
        assert_eq!(payload_len(&f), 257 * CHUNK_SIZE + 1);
        assert_eq!(f.expectation(), Expectation::Success);
    }

    #[test]
    fn test_stream_outcomes() {
        let fx = Fixtures::standard().unwrap();
        let outcome = |build: fn(&Fixtures) -> anyhow::Result<VectorBuilder>| {
            let f = build(&fx).unwrap();
            (f.expectation(), f.stream_outcome().map(|o| o.released.len()))
        };

        assert_eq!(
            outcome(stream_no_final),
            (Expectation::PayloadFailure, Some(CHUNK_SIZE))
        );
        assert_eq!(
            outcome(stream_no_final_two_chunks),
            (Expectation::PayloadFailure, Some(2 * CHUNK_SIZE))
        );
        assert_eq!(outcome(stream_no_chunks), (Expectation::PayloadFailure, Some(0)));
        assert_eq!(
            outcome(stream_duplicate_chunk),
            (Expectation::PayloadFailure, Some(CHUNK_SIZE))
        );
        assert_eq!(outcome(stream_swapped_chunks), (Expectation::PayloadFailure, Some(0)));
        assert_eq!(
            outcome(stream_truncated_chunk),
            (Expectation::PayloadFailure, Some(CHUNK_SIZE))
        );
        assert_eq!(
            outcome(stream_trailing_garbage_long),
            (Expectation::PayloadFailure, Some(CHUNK_SIZE))
        );
        assert_eq!(
            outcome(stream_two_final_chunks),
            (Expectation::PayloadFailure, Some(CHUNK_SIZE))
        );
        assert_eq!(outcome(stream_three_chunks), (Expectation::Success, Some(2 * CHUNK_SIZE + 100)));
    }

    #[test]
    fn test_partial_payloads() {
        let fx = Fixtures::standard().unwrap();
        for build in [
            stream_bad_tag_second_chunk_full,
            stream_last_chunk_empty,
            stream_two_final_chunks_full,
        ] {
            let v = build(&fx).unwrap().finish("t").unwrap();
            assert_eq!(v.expect, Expectation::PayloadFailure);
            assert!(v.payload_digest.is_some());
        }
    }

    #[test]
    fn test_short_nonce() {
        let fx = Fixtures::standard().unwrap();
        let header_len = standard_header(&fx).unwrap().bytes().len();
        let f = stream_short_nonce(&fx).unwrap();
        assert_eq!(f.bytes().len(), header_len + 12);
        assert!(f.chunk_records().is_empty());

        let v = f.finish("stream_short_nonce").unwrap();
        assert_eq!(v.expect, Expectation::HeaderFailure);
        assert!(v.payload_digest.is_none());
    }

    #[test]
    fn test_full_final_chunk_sizes() {
        let fx = Fixtures::standard().unwrap();
        let f = stream_last_chunk_full(&fx).unwrap();
        let records = f.chunk_records();
        assert_eq!(records.len(), 1);
        assert!(records[0].last);
        assert_eq!(records[0].ciphertext_len(), CHUNK_SIZE + TAG_SIZE);
    }
}
