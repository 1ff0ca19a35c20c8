//! Benchmarks for optional field encoding, placement and lookup.
//!
//! - Varint encoding and decoding across size classes
//! - Planning and placing a large descriptor population
//! - Inline and out-of-line lookups on a placed image
//! - Run-time stream encoding and decoding

extern crate optfields;

use criterion::{criterion_group, criterion_main, Criterion};
use optfields::{metadata::optionalfields::varint, prelude::*};
use std::hint::black_box;

const DESCRIPTORS: u32 = 10_000;

fn builder(index: u32) -> FieldSetBuilder {
    let mut builder = FieldSetBuilder::new();
    builder.add_dispatch_map(index);
    if index % 4 == 0 {
        builder.add_rare_flags(RareFlags::HAS_CCTOR | RareFlags::IS_ABSTRACT_CLASS);
    }
    if index % 3 == 0 {
        builder.add_sealed_virtual_slots(OutlineBlob::new(vec![0; 16], 4));
    }
    if index % 8 == 1 {
        builder.add_thread_static_info(OutlineBlob::new(vec![0; 32], 16));
    }
    builder
}

fn placed() -> (Image, Vec<Option<FieldsHandle>>) {
    let mut planner = LayoutPlanner::new(LayoutConfig::default()).unwrap();
    let handles = (0..DESCRIPTORS)
        .map(|index| planner.encode_fields(builder(index)).unwrap())
        .collect();
    (planner.place().unwrap(), handles)
}

/// Benchmark encoding one value of every size class.
fn bench_varint_encode(c: &mut Criterion) {
    let values = [5_u32, 1000, 100_000, 10_000_000, u32::MAX];
    let mut buffer = Vec::with_capacity(64);

    c.bench_function("varint_encode", |b| {
        b.iter(|| {
            buffer.clear();
            for value in values {
                varint::encode(black_box(value), &mut buffer);
            }
            black_box(buffer.len())
        });
    });
}

/// Benchmark decoding a 5-byte value.
fn bench_varint_decode(c: &mut Criterion) {
    let mut buffer = Vec::new();
    varint::encode(u32::MAX, &mut buffer);

    c.bench_function("varint_decode", |b| {
        b.iter(|| {
            let decoded = varint::decode(black_box(&buffer)).unwrap();
            black_box(decoded)
        });
    });
}

/// Benchmark planning and placing the whole descriptor population.
fn bench_plan_and_place(c: &mut Criterion) {
    c.bench_function("plan_and_place", |b| {
        b.iter(|| {
            let (image, handles) = placed();
            black_box((image.len(), handles.len()))
        });
    });
}

/// Benchmark an inline lookup on every descriptor.
fn bench_inline_lookup(c: &mut Criterion) {
    let (image, handles) = placed();

    c.bench_function("inline_lookup", |b| {
        b.iter(|| {
            let mut sum = 0_u64;
            for handle in &handles {
                let fields = image.optional_fields(image.resolve(*handle));
                sum += u64::from(fields.dispatch_map(0).unwrap());
            }
            black_box(sum)
        });
    });
}

/// Benchmark an out-of-line lookup, the last tag in every stream that has one.
fn bench_outline_lookup(c: &mut Criterion) {
    let (image, handles) = placed();

    c.bench_function("outline_lookup", |b| {
        b.iter(|| {
            let mut found = 0_usize;
            for handle in &handles {
                let fields = image.optional_fields(image.resolve(*handle));
                if fields.thread_static_info().unwrap().is_some() {
                    found += 1;
                }
            }
            black_box(found)
        });
    });
}

/// Benchmark a run-time stream encode and decode.
fn bench_runtime_stream(c: &mut Criterion) {
    let mut builder = RuntimeFieldBuilder::new();
    builder
        .set(OptionalFieldTag::RareFlags, RuntimeValue::Inline(0x24))
        .set(OptionalFieldTag::DispatchMap, RuntimeValue::Inline(77))
        .set(
            OptionalFieldTag::GenericComposition,
            RuntimeValue::Pointer(0x7FFF_0000_1000),
        );

    c.bench_function("runtime_stream", |b| {
        b.iter(|| {
            let stream = black_box(&builder).to_stream().unwrap();
            let decoded = RuntimeFieldBuilder::from_stream(Some(&stream)).unwrap();
            black_box(decoded)
        });
    });
}

criterion_group!(
    benches,
    bench_varint_encode,
    bench_varint_decode,
    bench_plan_and_place,
    bench_inline_lookup,
    bench_outline_lookup,
    bench_runtime_stream,
);
criterion_main!(benches);
