use agevec_kit::header::not_canonical_base64;
use agevec_kit::{Fixtures, VectorBuilder};

use crate::{Definition, PAYLOAD};

pub(crate) const VECTORS: &[Definition] = &[
    Definition::new("scrypt", scrypt),
    Definition::new("scrypt_and_x25519", scrypt_and_x25519),
    Definition::new("scrypt_double", scrypt_double),
    Definition::new("scrypt_no_match", scrypt_no_match),
    Definition::new("scrypt_not_canonical_salt", scrypt_not_canonical_salt),
    Definition::new("scrypt_salt_long", scrypt_salt_long),
    Definition::new("scrypt_salt_short", scrypt_salt_short),
    Definition::new("scrypt_uppercase", scrypt_uppercase),
    Definition::new("scrypt_work_factor_23", scrypt_work_factor_23),
    Definition::new("scrypt_work_factor_leading_zero", scrypt_work_factor_leading_zero),
    Definition::new("scrypt_work_factor_negative", scrypt_work_factor_negative),
    Definition::new("scrypt_work_factor_zero", scrypt_work_factor_zero),
];

const PASSPHRASE: &str = "password";
const WORK_FACTOR: u8 = 10;

fn finish_header(f: &mut VectorBuilder) -> anyhow::Result<()> {
    f.hmac()?;
    f.payload(PAYLOAD)
}

fn with_stanza(fx: &Fixtures, work_factor: u8) -> anyhow::Result<VectorBuilder> {
    let mut f = VectorBuilder::new(fx);
    f.version_line("v1")?;
    f.scrypt(PASSPHRASE, work_factor)?;
    Ok(f)
}

fn scrypt(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = with_stanza(fx, WORK_FACTOR)?;
    finish_header(&mut f)?;
    Ok(f)
}

fn scrypt_and_x25519(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = with_stanza(fx, WORK_FACTOR)?;
    f.x25519(&fx.identity)?;
    finish_header(&mut f)?;
    f.expect_header_failure();
    f.comment("scrypt stanzas must be alone in the header");
    Ok(f)
}

fn scrypt_double(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = with_stanza(fx, WORK_FACTOR)?;
    f.scrypt_no_record_passphrase(PASSPHRASE, WORK_FACTOR)?;
    finish_header(&mut f)?;
    f.expect_header_failure();
    Ok(f)
}

fn scrypt_no_match(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = VectorBuilder::new(fx);
    f.version_line("v1")?;
    f.scrypt_record_passphrase("wrong passphrase");
    f.scrypt_no_record_passphrase(PASSPHRASE, WORK_FACTOR)?;
    finish_header(&mut f)?;
    f.expect_no_match();
    Ok(f)
}

fn scrypt_not_canonical_salt(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = with_stanza(fx, WORK_FACTOR)?;
    let salt = f.stanzas()[0].args()[1].clone();
    let altered = not_canonical_base64(&salt)
        .ok_or_else(|| anyhow::anyhow!("salt encoding has no spare bits"))?;
    f.replace_stanza_arg(1, &altered)?;
    finish_header(&mut f)?;
    Ok(f)
}

fn with_salt_len(fx: &Fixtures, len: usize) -> anyhow::Result<VectorBuilder> {
    let mut f = VectorBuilder::new(fx);
    f.version_line("v1")?;
    f.scrypt_record_passphrase(PASSPHRASE);
    let salt = f.rand(len);
    f.scrypt_no_record_passphrase_with_salt(PASSPHRASE, WORK_FACTOR, &salt)?;
    finish_header(&mut f)?;
    f.expect_header_failure();
    Ok(f)
}

fn scrypt_salt_long(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    with_salt_len(fx, 17)
}

fn scrypt_salt_short(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    with_salt_len(fx, 15)
}

fn scrypt_uppercase(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = with_stanza(fx, WORK_FACTOR)?;
    f.replace_stanza_arg(0, "Scrypt")?;
    finish_header(&mut f)?;
    f.expect_no_match();
    Ok(f)
}

fn scrypt_work_factor_23(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = with_stanza(fx, 23)?;
    finish_header(&mut f)?;
    f.expect_header_failure();
    f.comment("work factor above the decryptor limit; the stanza is not a valid wrap");
    Ok(f)
}

fn scrypt_work_factor_leading_zero(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = with_stanza(fx, WORK_FACTOR)?;
    f.replace_stanza_arg(2, &format!("0{WORK_FACTOR}"))?;
    finish_header(&mut f)?;
    Ok(f)
}

fn scrypt_work_factor_negative(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = with_stanza(fx, WORK_FACTOR)?;
    f.replace_stanza_arg(2, &format!("-{WORK_FACTOR}"))?;
    finish_header(&mut f)?;
    Ok(f)
}

fn scrypt_work_factor_zero(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = with_stanza(fx, 0)?;
    finish_header(&mut f)?;
    f.expect_header_failure();
    Ok(f)
}
