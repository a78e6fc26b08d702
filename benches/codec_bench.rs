//! Performance benchmarks for frame encoding and decoding.
//!
//! Run benchmarks with:
//! ```sh
//! cargo bench --bench codec_bench
//! ```

use bytes::BytesMut;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use lockctl_core::{BoardAddress, ChannelId};
use lockctl_protocol::{BoardResponse, Frame, LockBoardCodec, LockCommand, checksum};
use std::hint::black_box;
use tokio_util::codec::{Decoder, Encoder};

fn channels(n: u8) -> Vec<ChannelId> {
    (1..=n).map(|id| ChannelId::new(id).unwrap()).collect()
}

/// Encode single-channel and multi-channel commands.
fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Elements(1));

    let single = LockCommand::open_single(BoardAddress::new(0), ChannelId::new(1).unwrap());
    group.bench_function("open_single", |b| {
        b.iter(|| black_box(single.encode().unwrap()));
    });

    let multi = LockCommand::open_sequential(BoardAddress::new(0), channels(24)).unwrap();
    group.bench_function("open_sequential_24", |b| {
        b.iter(|| black_box(multi.encode().unwrap()));
    });

    group.bench_function("codec_encode", |b| {
        let mut codec = LockBoardCodec::new();
        b.iter(|| {
            let mut buffer = BytesMut::with_capacity(16);
            codec.encode(black_box(single.clone()), &mut buffer).unwrap();
            black_box(buffer);
        });
    });

    group.finish();
}

/// Validate frames of increasing payload size.
fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for size in [0usize, 3, 24, 247] {
        let payload = vec![0x01; size];
        let frame = Frame::encode(BoardAddress::new(0), 0x84, &payload).unwrap();
        let bytes = frame.as_bytes().to_vec();

        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::new("frame_decode", size), &bytes, |b, bytes| {
            b.iter(|| black_box(Frame::decode(black_box(bytes)).unwrap()));
        });
    }

    group.finish();
}

fn bench_checksum(c: &mut Criterion) {
    let bytes = vec![0xA5u8; 254];
    c.bench_function("checksum_254_bytes", |b| {
        b.iter(|| black_box(checksum(black_box(&bytes))));
    });
}

/// Decode plus typed parse, as done for every response.
fn bench_parse_response(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_response");
    group.throughput(Throughput::Elements(1));

    let mut payload = vec![0x00, 24];
    payload.extend(std::iter::repeat_n(0x01, 24));
    let frame = Frame::encode(BoardAddress::new(0), 0x84, &payload).unwrap();

    group.bench_function("query_all_24", |b| {
        b.iter(|| black_box(BoardResponse::parse(black_box(&frame)).unwrap()));
    });

    group.bench_function("codec_decode_query_all_24", |b| {
        let mut codec = LockBoardCodec::new();
        b.iter(|| {
            let mut buffer = BytesMut::from(frame.as_bytes());
            black_box(codec.decode(&mut buffer).unwrap());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_encode,
    bench_decode,
    bench_checksum,
    bench_parse_response
);

criterion_main!(benches);
