use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use thinlink_protocol::{
    decode_message, encode_message, FieldList, FieldValue, Message, PacketAssembler,
    ProtocolVersion,
};

fn message_with(fields: usize, compressed: bool) -> Message {
    let mut list = FieldList::with_capacity(fields);
    for i in 0..fields {
        let id = (i % 4096) as u16;
        let value = match i % 3 {
            0 => FieldValue::Int32(i as i32),
            1 => FieldValue::string(format!("value-{i}")),
            _ => FieldValue::binary(vec![(i % 256) as u8; 32]),
        };
        list = list.with(id, value);
    }
    let mut message = Message::new(ProtocolVersion::V4, 1, 1).with_compression(compressed);
    message.fields = list;
    message
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_message");
    for fields in [8usize, 128, 1024] {
        for compressed in [false, true] {
            let message = message_with(fields, compressed);
            let label = if compressed { "deflate" } else { "plain" };
            group.bench_with_input(BenchmarkId::new(label, fields), &message, |b, m| {
                b.iter(|| encode_message(black_box(m)).unwrap());
            });
        }
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_message");
    for fields in [8usize, 128, 1024] {
        let bytes = encode_message(&message_with(fields, false)).unwrap();
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(fields), &bytes, |b, bytes| {
            b.iter(|| decode_message(black_box(bytes)).unwrap());
        });
    }
    group.finish();
}

fn bench_assembler(c: &mut Criterion) {
    let bytes = encode_message(&message_with(256, false)).unwrap();
    c.bench_function("assemble_in_64_byte_chunks", |b| {
        b.iter(|| {
            let mut assembler = PacketAssembler::new();
            for chunk in bytes.chunks(64) {
                assembler.feed(chunk);
            }
            assembler.drain().unwrap().unwrap()
        });
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_assembler);
criterion_main!(benches);
