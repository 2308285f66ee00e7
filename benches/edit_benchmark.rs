use criterion::{criterion_group, criterion_main, Criterion};
use fit_relabel::fit::{self, mesg_num, BaseType, FitFile, Message};
use fit_relabel::models::DeviceIdentity;
use fit_relabel::services::{EditOptions, FileEditor};
use std::hint::black_box;

/// A two-hour ride at 1 Hz from a development build of a trainer app.
fn synthetic_ride() -> Vec<u8> {
    let start = 1_000_000_000u64;
    let mut messages = vec![
        Message::new(mesg_num::FILE_ID, 0)
            .with_uint(0, BaseType::ENUM, 4)
            .with_uint(1, BaseType::UINT16, 255)
            .with_uint(2, BaseType::UINT16, 0)
            .with_uint(4, BaseType::UINT32, start),
        Message::new(mesg_num::DEVICE_INFO, 1)
            .with_uint(2, BaseType::UINT16, 255)
            .with_uint(4, BaseType::UINT16, 0),
    ];
    for i in 0..7200u64 {
        messages.push(
            Message::new(mesg_num::RECORD, 2)
                .with_uint(253, BaseType::UINT32, start + i)
                .with_uint(3, BaseType::UINT8, 120 + i % 40)
                .with_uint(4, BaseType::UINT8, 85 + i % 10)
                .with_uint(6, BaseType::UINT16, 8000 + i % 500)
                .with_uint(7, BaseType::UINT16, 150 + i % 120),
        );
    }
    fit::encode(&FitFile {
        header: Default::default(),
        messages,
    })
}

fn benchmark_edit(c: &mut Criterion) {
    let bytes = synthetic_ride();
    let editor = FileEditor::new(DeviceIdentity::EDGE_830, EditOptions::default());
    let edited = editor.edit_bytes(&bytes).expect("Failed to edit ride");

    let mut group = c.benchmark_group("edit_activity");

    group.bench_function("decode", |b| b.iter(|| fit::decode(black_box(&bytes))));

    group.bench_function("edit_and_encode", |b| {
        b.iter(|| {
            editor
                .edit_bytes(black_box(&bytes))
                .map(|edited| edited.to_bytes())
        })
    });

    group.bench_function("already_edited", |b| {
        let once = edited.to_bytes();
        b.iter(|| editor.edit_bytes(black_box(&once)).map(|e| e.rewritten))
    });

    group.finish();
}

criterion_group!(benches, benchmark_edit);
criterion_main!(benches);
