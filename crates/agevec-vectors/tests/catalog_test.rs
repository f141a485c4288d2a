//! Catalog-wide checks: every definition builds, is deterministic, records
//! the metadata its outcome calls for, and survives the vector file format.

use agevec_core::{Expectation, Vector};
use agevec_kit::{encode_vector, parse_vector, EmitOptions, Fixtures};

fn build_all(fx: &Fixtures) -> Vec<Vector> {
    agevec_vectors::catalog()
        .iter()
        .map(|d| d.build(fx).unwrap_or_else(|e| panic!("{}: {e:#}", d.name)))
        .collect()
}

#[test]
fn every_vector_is_deterministic() {
    let fx = Fixtures::standard().unwrap();
    let first = build_all(&fx);
    let second = build_all(&fx);
    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a, b, "{} differs between runs", a.name);
    }
}

#[test]
fn digest_present_iff_outcome_records_payload() {
    let fx = Fixtures::standard().unwrap();
    for v in build_all(&fx) {
        assert_eq!(
            v.payload_digest.is_some(),
            v.expect.records_payload(),
            "{}",
            v.name
        );
        assert!(
            !v.identities.is_empty() || !v.passphrases.is_empty(),
            "{} records no identity or passphrase",
            v.name
        );
    }
}

#[test]
fn original_generators_keep_their_outcomes() {
    let fx = Fixtures::standard().unwrap();
    let expected = [
        ("armor_garbage_encoded", Expectation::PayloadFailure),
        ("stream_258_chunks", Expectation::Success),
        ("stream_bad_tag_second_chunk_full", Expectation::PayloadFailure),
        ("stream_last_chunk_empty", Expectation::PayloadFailure),
        ("stream_short_nonce", Expectation::HeaderFailure),
        ("stream_two_final_chunks_full", Expectation::PayloadFailure),
    ];
    for (name, expect) in expected {
        let def = agevec_vectors::find(name).unwrap_or_else(|| panic!("{name} missing"));
        let v = def.build(&fx).unwrap();
        assert_eq!(v.expect, expect, "{name}");
    }

    let garbage = agevec_vectors::find("armor_garbage_encoded")
        .unwrap()
        .build(&fx)
        .unwrap();
    assert!(garbage.armored);
    assert_eq!(
        garbage.comment.as_deref(),
        Some("there is trailing garbage encoded after the final chunk")
    );
}

#[test]
fn vectors_survive_file_format() {
    let fx = Fixtures::standard().unwrap();
    let options = EmitOptions::default();
    for v in build_all(&fx) {
        let encoded = encode_vector(&v, &options).unwrap();
        let parsed = parse_vector(&v.name, &encoded).unwrap();
        assert_eq!(parsed, v, "{}", v.name);
    }
}

#[test]
fn different_fixtures_change_containers() {
    let fx = Fixtures::standard().unwrap();
    let mut other = fx.clone();
    other.seed[0] ^= 0xff;

    let def = agevec_vectors::find("x25519").unwrap();
    let a = def.build(&fx).unwrap();
    let b = def.build(&other).unwrap();
    assert_ne!(a.body, b.body);
    assert_eq!(a.payload_digest, b.payload_digest);
}
