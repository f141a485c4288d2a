//! Stanza framing vectors
//!
//! Grease stanzas (unknown types) carry the malformation; the X25519 stanza
//! that follows keeps the file decryptable when the framing is valid.

use agevec_kit::header::{b64, BODY_BYTES_PER_LINE};
use agevec_kit::{Fixtures, VectorBuilder};

use crate::{Definition, PAYLOAD};

pub(crate) const VECTORS: &[Definition] = &[
    Definition::new("stanza_base64_padding", stanza_base64_padding),
    Definition::new("stanza_empty_argument", stanza_empty_argument),
    Definition::new("stanza_empty_body", stanza_empty_body),
    Definition::new("stanza_full_body_no_end", stanza_full_body_no_end),
    Definition::new("stanza_long_line", stanza_long_line),
    Definition::new("stanza_missing_body", stanza_missing_body),
    Definition::new("stanza_no_arguments", stanza_no_arguments),
];

/// X25519 stanza for the fixture identity, MAC and a one-chunk payload.
fn close(f: &mut VectorBuilder, fx: &Fixtures) -> anyhow::Result<()> {
    f.x25519(&fx.identity)?;
    f.hmac()?;
    f.payload(PAYLOAD)
}

fn stanza_base64_padding(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = VectorBuilder::new(fx);
    f.version_line("v1")?;
    f.x25519(&fx.identity)?;
    f.base64_padding()?;
    f.hmac()?;
    f.payload(PAYLOAD)?;
    f.expect_header_failure();
    f.comment("stanza bodies are unpadded base64");
    Ok(f)
}

fn stanza_empty_argument(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = VectorBuilder::new(fx);
    f.version_line("v1")?;
    f.args_line(&["grease", ""])?;
    f.body(&[])?;
    close(&mut f, fx)?;
    f.expect_header_failure();
    Ok(f)
}

fn stanza_empty_body(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = VectorBuilder::new(fx);
    f.version_line("v1")?;
    f.args_line(&["empty"])?;
    f.body(&[])?;
    close(&mut f, fx)?;
    Ok(f)
}

fn stanza_full_body_no_end(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = VectorBuilder::new(fx);
    f.version_line("v1")?;
    f.args_line(&["grease"])?;
    let body = f.rand(BODY_BYTES_PER_LINE);
    f.body(&body)?;
    // Drop the empty line that terminates a body of full lines
    f.unread_line()?;
    close(&mut f, fx)?;
    f.expect_header_failure();
    Ok(f)
}

fn stanza_long_line(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = VectorBuilder::new(fx);
    f.version_line("v1")?;
    f.args_line(&["grease"])?;
    let body = f.rand(BODY_BYTES_PER_LINE + 3);
    f.text_line(b64(&body))?;
    f.text_line("")?;
    close(&mut f, fx)?;
    f.expect_header_failure();
    f.comment("body lines are at most 64 columns");
    Ok(f)
}

fn stanza_missing_body(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = VectorBuilder::new(fx);
    f.version_line("v1")?;
    f.x25519(&fx.identity)?;
    f.unread_line()?;
    f.hmac()?;
    f.payload(PAYLOAD)?;
    f.expect_header_failure();
    Ok(f)
}

fn stanza_no_arguments(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = VectorBuilder::new(fx);
    f.version_line("v1")?;
    f.args_line(&[])?;
    f.body(&[])?;
    close(&mut f, fx)?;
    f.expect_header_failure();
    Ok(f)
}
