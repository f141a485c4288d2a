use anyhow::ensure;

use agevec_kit::armor::{ArmorOptions, Padding};
use agevec_kit::{Fixtures, VectorBuilder, CHUNK_SIZE};

use crate::{standard_header, Definition, PAYLOAD};

pub(crate) const VECTORS: &[Definition] = &[
    Definition::new("armor", armor),
    Definition::new("armor_garbage_encoded", armor_garbage_encoded),
    Definition::new("armor_long_line", armor_long_line),
    Definition::new("armor_no_end_line", armor_no_end_line),
    Definition::new("armor_no_padding", armor_no_padding),
    Definition::new("armor_not_canonical", armor_not_canonical),
];

fn armored(fx: &Fixtures, options: ArmorOptions) -> anyhow::Result<VectorBuilder> {
    let mut f = standard_header(fx)?;
    f.payload(PAYLOAD)?;
    // Padding faults only exist when the last base64 group is partial
    if options.padding != Padding::Canonical {
        let len = f.bytes().len();
        ensure!(
            len % 3 != 0,
            "container is {len} bytes, a multiple of 3: base64 has no padding to alter"
        );
    }
    f.armor(options);
    Ok(f)
}

fn armor(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    armored(fx, ArmorOptions::default())
}

fn armor_garbage_encoded(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = standard_header(fx)?;
    f.nonce()?;
    f.payload_chunk_final(CHUNK_SIZE)?;
    let garbage = f.rand(20);
    f.raw(&garbage);
    f.expect_partial_payload(CHUNK_SIZE);
    f.armor(ArmorOptions::default());
    f.comment("there is trailing garbage encoded after the final chunk");
    Ok(f)
}

fn armor_long_line(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = armored(
        fx,
        ArmorOptions {
            line_width: 76,
            ..Default::default()
        },
    )?;
    f.expect_armor_failure();
    f.comment("armor lines are wrapped at 76 columns instead of 64");
    Ok(f)
}

fn armor_no_end_line(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = armored(
        fx,
        ArmorOptions {
            end_line: false,
            ..Default::default()
        },
    )?;
    f.expect_armor_failure();
    Ok(f)
}

fn armor_no_padding(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = armored(
        fx,
        ArmorOptions {
            padding: Padding::Omitted,
            ..Default::default()
        },
    )?;
    f.expect_armor_failure();
    Ok(f)
}

fn armor_not_canonical(fx: &Fixtures) -> anyhow::Result<VectorBuilder> {
    let mut f = armored(
        fx,
        ArmorOptions {
            padding: Padding::NonCanonical,
            ..Default::default()
        },
    )?;
    f.expect_armor_failure();
    f.comment("the last base64 character sets a padding bit");
    Ok(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padding_faults_have_a_partial_group() {
        let fx = Fixtures::standard().unwrap();
        let len = armored(&fx, ArmorOptions::default()).unwrap().bytes().len();
        assert_ne!(len % 3, 0);

        let no_padding = armor_no_padding(&fx).unwrap().finish("armor_no_padding").unwrap();
        let canonical = armor(&fx).unwrap().finish("armor").unwrap();
        assert_ne!(no_padding.body, canonical.body);
        assert_eq!(no_padding.expect, agevec_core::Expectation::ArmorFailure);
    }
}
