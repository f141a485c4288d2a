use agevec_kit::header::{b64, not_canonical_base64};
use agevec_kit::keys::LOW_ORDER_POINTS;
use agevec_kit::stanza::x25519_wrap_key;
use agevec_kit::{Fixtures, VectorBuilder};

use crate::{other_identity, standard_header, Definition, PAYLOAD};

pub(crate) const VECTORS: &[Definition] = &[
    Definition::new("x25519", x25519),
    Definition::new("x25519_bad_tag", x25519_bad_tag),
    Definition::new("x25519_extra_argument", x25519_extra_argument),
    Definition::new("x25519_grease", x25519_grease),
    Definition::new("x25519_long_file_key", x25519_long_file_key),
    Definition::new("x25519_low_order_order4", x25519_low_order_order4),
    Definition::new("x25519_low_order_order8", x25519_low_order_order8),
    Definition::new("x25519_low_order_p_minus_1", x25519_low_order_p_minus_1),
    Definition::new("x25519_low_order_zero", x25519_low_order_zero),
    Definition::new("x25519_lowercase", x25519_lowercase),
    Definition::new("x25519_multiple_recipients", x25519_multiple_recipients),
    Definition::new("x25519_no_match", x25519_no_match),
    Definition::new("x25519_not_canonical_body", x25519_not_canonical_body),
    Definition::new("x25519_not_canonical_share", x25519_not_canonical_share),
];

fn x25519(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = standard_header(fx)?;
    f.payload(PAYLOAD)?;
    Ok(f)
}

fn x25519_bad_tag(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = VectorBuilder::new(fx);
    f.version_line("v1")?;
    f.x25519_record_identity(&fx.identity)?;
    let ephemeral = other_identity(&mut f)?;
    let share = agevec_kit::keys::public_key(&ephemeral);
    let mut key = x25519_wrap_key(&share, &fx.identity)?;
    key[0] ^= 0x01;
    let share_b64 = b64(&share);
    f.args_line(&["X25519", share_b64.as_str()])?;
    let file_key = f.file_key().as_bytes().to_vec();
    f.aead_body(&key, &file_key)?;
    f.hmac()?;
    f.payload(PAYLOAD)?;
    f.expect_no_match();
    f.comment("the wrapped file key does not authenticate");
    Ok(f)
}

fn x25519_extra_argument(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = VectorBuilder::new(fx);
    f.version_line("v1")?;
    f.x25519(&fx.identity)?;
    let body = f.unread_line()?;
    let mut args = f.unread_args_line()?;
    args.push("1".into());
    let refs: Vec<&str> = args.iter().map(String::as_str).collect();
    f.args_line(&refs)?;
    f.text_line(body)?;
    f.hmac()?;
    f.payload(PAYLOAD)?;
    f.expect_header_failure();
    Ok(f)
}

fn x25519_grease(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = VectorBuilder::new(fx);
    f.version_line("v1")?;
    f.args_line(&["grease-before", "argument"])?;
    let grease = f.rand(60);
    f.body(&grease)?;
    f.x25519(&fx.identity)?;
    f.args_line(&["grease-after"])?;
    f.body(&[])?;
    f.hmac()?;
    f.payload(PAYLOAD)?;
    Ok(f)
}

fn x25519_long_file_key(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = VectorBuilder::new(fx);
    let mut key = fx.file_key.as_bytes().to_vec();
    key.push(0x42);
    f.set_file_key(key);
    f.version_line("v1")?;
    f.x25519(&fx.identity)?;
    f.hmac()?;
    f.payload(PAYLOAD)?;
    f.expect_header_failure();
    f.comment("the wrapped file key is 17 bytes");
    Ok(f)
}

fn low_order(fx: &Fixtures, point: &[u8; 32]) -> anyhow::Result<VectorBuilder> {
    let mut f = VectorBuilder::new(fx);
    f.version_line("v1")?;
    f.x25519_record_identity(&fx.identity)?;
    f.x25519_stanza(point, &fx.identity)?;
    f.hmac()?;
    f.payload(PAYLOAD)?;
    f.expect_header_failure();
    f.comment("the share is a low-order point, so the shared secret is all zeroes");
    Ok(f)
}

fn x25519_low_order_zero(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    low_order(fx, &LOW_ORDER_POINTS[0])
}

fn x25519_low_order_order4(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    low_order(fx, &LOW_ORDER_POINTS[1])
}

fn x25519_low_order_order8(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    low_order(fx, &LOW_ORDER_POINTS[2])
}

fn x25519_low_order_p_minus_1(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    low_order(fx, &LOW_ORDER_POINTS[4])
}

fn x25519_lowercase(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = VectorBuilder::new(fx);
    f.version_line("v1")?;
    f.x25519(&fx.identity)?;
    f.replace_stanza_arg(0, "x25519")?;
    f.hmac()?;
    f.payload(PAYLOAD)?;
    // Unknown stanza types are skipped, not rejected
    f.expect_no_match();
    Ok(f)
}

fn x25519_multiple_recipients(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = VectorBuilder::new(fx);
    f.version_line("v1")?;
    let other = other_identity(&mut f)?;
    f.x25519_no_record_identity(&other)?;
    f.x25519(&fx.identity)?;
    f.hmac()?;
    f.payload(PAYLOAD)?;
    Ok(f)
}

fn x25519_no_match(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = VectorBuilder::new(fx);
    f.version_line("v1")?;
    f.x25519_record_identity(&fx.identity)?;
    let other = other_identity(&mut f)?;
    f.x25519_no_record_identity(&other)?;
    f.hmac()?;
    f.payload(PAYLOAD)?;
    f.expect_no_match();
    Ok(f)
}

fn x25519_not_canonical_body(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = VectorBuilder::new(fx);
    f.version_line("v1")?;
    f.x25519(&fx.identity)?;
    let body = f.unread_line()?;
    let altered = not_canonical_base64(&body)
        .ok_or_else(|| anyhow::anyhow!("stanza body has no spare bits"))?;
    f.text_line(altered)?;
    f.hmac()?;
    f.payload(PAYLOAD)?;
    f.expect_header_failure();
    Ok(f)
}

fn x25519_not_canonical_share(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = VectorBuilder::new(fx);
    f.version_line("v1")?;
    f.x25519(&fx.identity)?;
    let share = f.stanzas()[0].args()[1].clone();
    let altered = not_canonical_base64(&share)
        .ok_or_else(|| anyhow::anyhow!("share encoding has no spare bits"))?;
    f.replace_stanza_arg(1, &altered)?;
    f.hmac()?;
    f.payload(PAYLOAD)?;
    Ok(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agevec_core::Expectation;

    #[test]
    fn test_grease_stanzas_keep_success() {
        let fx = Fixtures::standard().unwrap();
        let f = x25519_grease(&fx).unwrap();
        let tags: Vec<String> = f.stanzas().iter().map(|s| s.type_tag().to_string()).collect();
        assert_eq!(tags, vec!["X25519"]);
        let v = f.finish("x25519_grease").unwrap();
        assert_eq!(v.expect, Expectation::Success);
        let text = String::from_utf8_lossy(&v.body).into_owned();
        assert!(text.contains("\n-> grease-after\n\n---"));
    }

    #[test]
    fn test_lowercase_keeps_body() {
        let fx = Fixtures::standard().unwrap();
        let v = x25519_lowercase(&fx).unwrap().finish("x").unwrap();
        let text = String::from_utf8_lossy(&v.body).into_owned();
        assert!(text.lines().nth(1).unwrap().starts_with("-> x25519 "));
        assert_eq!(v.expect, Expectation::NoMatch);
    }

    #[test]
    fn test_not_canonical_share_is_header_failure() {
        let fx = Fixtures::standard().unwrap();
        let v = x25519_not_canonical_share(&fx).unwrap().finish("x").unwrap();
        assert_eq!(v.expect, Expectation::HeaderFailure);
    }
}
