//! Version line and header MAC vectors

use agevec_kit::header::{header_mac, not_canonical_base64};
use agevec_kit::{Fixtures, VectorBuilder};

use crate::{standard_header, Definition, PAYLOAD};

pub(crate) const VECTORS: &[Definition] = &[
    Definition::new("header_crlf", header_crlf),
    Definition::new("hmac_bad", hmac_bad),
    Definition::new("hmac_extra_space", hmac_extra_space),
    Definition::new("hmac_garbage", hmac_garbage),
    Definition::new("hmac_missing", hmac_missing),
    Definition::new("hmac_no_space", hmac_no_space),
    Definition::new("hmac_not_canonical", hmac_not_canonical),
    Definition::new("hmac_truncated", hmac_truncated),
    Definition::new("version_unsupported", version_unsupported),
];

/// Version and stanza, no MAC yet.
fn before_mac(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = VectorBuilder::new(fx);
    f.version_line("v1")?;
    f.x25519(&fx.identity)?;
    Ok(f)
}

/// Replace the MAC line just written with `edit(line)`.
fn rewrite_mac_line(f: &mut VectorBuilder, edit: impl FnOnce(&str) -> String) -> anyhow::Result<()> {
    let line = f.unread_line()?;
    f.text_line(edit(&line))
}

fn header_crlf(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = VectorBuilder::new(fx);
    f.version_line("v1")?;
    let line = f.unread_line()?;
    f.text_line(format!("{line}\r"))?;
    f.x25519(&fx.identity)?;
    f.hmac()?;
    f.payload(PAYLOAD)?;
    f.expect_header_failure();
    f.comment("the version line ends in CRLF");
    Ok(f)
}

fn hmac_bad(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = standard_header(fx)?;
    f.payload(PAYLOAD)?;
    f.flip_mac_bit()?;
    Ok(f)
}

fn hmac_extra_space(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = standard_header(fx)?;
    rewrite_mac_line(&mut f, |line| line.replacen(' ', "  ", 1))?;
    f.payload(PAYLOAD)?;
    f.expect_header_failure();
    Ok(f)
}

fn hmac_garbage(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = standard_header(fx)?;
    rewrite_mac_line(&mut f, |line| format!("{line}AAAA"))?;
    f.payload(PAYLOAD)?;
    f.expect_header_failure();
    f.comment("the MAC line carries 35 bytes");
    Ok(f)
}

fn hmac_missing(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = before_mac(fx)?;
    f.payload(PAYLOAD)?;
    f.expect_header_failure();
    Ok(f)
}

fn hmac_no_space(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = standard_header(fx)?;
    rewrite_mac_line(&mut f, |line| line.replacen(' ', "", 1))?;
    f.payload(PAYLOAD)?;
    f.expect_header_failure();
    Ok(f)
}

fn hmac_not_canonical(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = standard_header(fx)?;
    let line = f.unread_line()?;
    let altered = not_canonical_base64(&line)
        .ok_or_else(|| anyhow::anyhow!("MAC encoding has no spare bits"))?;
    f.text_line(altered)?;
    f.payload(PAYLOAD)?;
    f.expect_header_failure();
    f.comment("the MAC decodes to the right value but its encoding sets a spare bit");
    Ok(f)
}

fn hmac_truncated(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = before_mac(fx)?;
    let mac = header_mac(f.file_key(), &f.bytes())?;
    f.hmac_line(&mac[..31])?;
    f.payload(PAYLOAD)?;
    f.expect_header_failure();
    Ok(f)
}

fn version_unsupported(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = VectorBuilder::new(fx);
    f.version_line("v1234")?;
    f.x25519(&fx.identity)?;
    f.hmac()?;
    f.payload(PAYLOAD)?;
    f.expect_header_failure();
    Ok(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agevec_core::Expectation;

    #[test]
    fn test_mac_line_edits() {
        let fx = Fixtures::standard().unwrap();
        let mac_line = |b: VectorBuilder| {
            let text = String::from_utf8_lossy(&b.bytes()).into_owned();
            text.lines().nth(3).unwrap().to_string()
        };

        assert!(mac_line(hmac_no_space(&fx).unwrap()).starts_with("---"));
        assert!(!mac_line(hmac_no_space(&fx).unwrap()).starts_with("--- "));
        assert!(mac_line(hmac_extra_space(&fx).unwrap()).starts_with("---  "));
        assert_eq!(mac_line(hmac_truncated(&fx).unwrap()).len(), 4 + 42);
        assert_eq!(mac_line(hmac_garbage(&fx).unwrap()).len(), 4 + 47);
    }

    #[test]
    fn test_hmac_bad_is_hmac_failure() {
        let fx = Fixtures::standard().unwrap();
        let v = hmac_bad(&fx).unwrap().finish("hmac_bad").unwrap();
        assert_eq!(v.expect, Expectation::HmacFailure);
        assert!(v.payload_digest.is_none());
    }
}
