use criterion::{black_box, criterion_group, criterion_main, Criterion};
use seqstore::codec::packed;
use seqstore::{AcceptAll, ByteOrder, Format, OffsetIndex, PushParser};

fn packed_reads(n: usize, len: usize) -> Vec<u8> {
    let mut data = Vec::new();
    for i in 0..n {
        let bases: Vec<u8> = (0..len).map(|j| b"ACGT"[(i + j) % 4]).collect();
        let quals: Vec<u8> = (0..len).map(|j| 1 + (j % 60) as u8).collect();
        packed::encode_into(&mut data, &format!("read_{i}"), &bases, &quals, ByteOrder::Little)
            .unwrap();
    }
    data
}

pub fn decode_packed(c: &mut Criterion) {
    let data = packed_reads(10_000, 150);
    c.bench_function("decode bfq", |b| {
        b.iter(|| {
            for read in packed::decode_all(&data, ByteOrder::Little).unwrap() {
                black_box(read);
            }
        })
    });
}

pub fn index_packed(c: &mut Criterion) {
    let data = packed_reads(10_000, 150);
    let parser = PushParser::new(
        Format::Bfq {
            byte_order: ByteOrder::Little,
        },
        "bench",
    );
    c.bench_function("index bfq", |b| {
        b.iter(|| {
            let index = OffsetIndex::build(&parser, &data[..], Some(data.len() as u64), &AcceptAll).unwrap();
            black_box(index.len());
        })
    });
}

criterion_group!(benches, decode_packed, index_packed);
criterion_main!(benches);
