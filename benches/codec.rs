//! Benchmarks for PDU encoding and decoding.
//!
//! Run with: cargo bench --bench codec

use bytes::{Bytes, BytesMut};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use tokio_util::codec::Decoder;

use smpp_session::pdu::{tags, Address, Decoded, ShortMessage, SmppCodec, Tlv};
use smpp_session::Pdu;

fn submit_sm() -> Pdu {
    Pdu::submit_sm(ShortMessage {
        source: Address::new(5, 0, "INFO"),
        destination: Address::new(1, 1, "258841234567"),
        registered_delivery: 1,
        short_message: Bytes::from_static(b"Your verification code is 482913"),
        ..Default::default()
    })
    .with_sequence(42)
    .with_tlv(Tlv::new(tags::SOURCE_PORT, Bytes::from_static(&[0x0B, 0x84])))
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec/encode");
    group.throughput(Throughput::Elements(1));

    let enquire_link = Pdu::enquire_link().with_sequence(1);
    group.bench_function("enquire_link", |b| {
        b.iter(|| black_box(SmppCodec::encode_pdu(black_box(&enquire_link)).unwrap()))
    });

    let submit = submit_sm();
    group.bench_function("submit_sm", |b| {
        b.iter(|| black_box(SmppCodec::encode_pdu(black_box(&submit)).unwrap()))
    });

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec/decode");
    group.throughput(Throughput::Elements(1));

    let frame = SmppCodec::encode_pdu(&submit_sm()).unwrap();
    group.bench_function("submit_sm_frame", |b| {
        b.iter(|| black_box(SmppCodec::decode_frame(black_box(&frame))))
    });

    // Ten PDUs back to back in one read buffer
    let mut batch = BytesMut::new();
    for _ in 0..10 {
        batch.extend_from_slice(&frame);
    }
    let batch = batch.freeze();
    group.throughput(Throughput::Elements(10));
    group.bench_function("stream_batch_10", |b| {
        b.iter(|| {
            let mut codec = SmppCodec::new();
            let mut buf = BytesMut::from(&batch[..]);
            let mut count = 0;
            while let Ok(Some(Decoded::Pdu(pdu))) = codec.decode(&mut buf) {
                black_box(pdu);
                count += 1;
            }
            count
        })
    });

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
