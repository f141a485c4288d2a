use agevec_kit::keys::FileKey;
use agevec_kit::{Fixtures, StreamState, VectorBuilder, CHUNK_SIZE};

#[divan::bench(args = [1024, 16384, 65536])]
fn bench_seal_chunk(bencher: divan::Bencher, size: usize) {
    let key = FileKey::from_bytes(b"YELLOW SUBMARINE".to_vec());
    let data = vec![0x5Au8; size];
    let mut state = StreamState::new(&key, &[0u8; 16]).unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench_local(|| state.seal_chunk(divan::black_box(&data)).unwrap());
}

#[divan::bench]
fn bench_keystream_plaintext(bencher: divan::Bencher) {
    let key = FileKey::from_bytes(b"YELLOW SUBMARINE".to_vec());
    let state = StreamState::new(&key, &[0u8; 16]).unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(CHUNK_SIZE))
        .bench(|| state.keystream_plaintext(divan::black_box(CHUNK_SIZE)));
}

#[divan::bench(args = [1, 16, 258])]
fn bench_build_stream(bencher: divan::Bencher, chunks: usize) {
    let fixtures = Fixtures::standard().unwrap();
    bencher.bench(|| {
        let mut f = VectorBuilder::new(&fixtures);
        f.version_line("v1").unwrap();
        f.x25519(&fixtures.identity).unwrap();
        f.hmac().unwrap();
        f.nonce().unwrap();
        for _ in 1..chunks {
            f.payload_chunk(CHUNK_SIZE).unwrap();
        }
        f.payload_chunk_final(1).unwrap();
        f.finish("bench").unwrap()
    });
}

fn main() {
    divan::main();
}
