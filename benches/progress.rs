use criterion::{black_box, criterion_group, criterion_main, Criterion};
use whisper_vault::models::progress::{
    classify, LineKind, LineSplitter, ProgressTracker, StreamKind,
};

fn wget_output() -> Vec<u8> {
    let mut out = Vec::new();
    for p in 0..=100 {
        out.extend_from_slice(
            format!(" {p:>3}%[=========>          ]  {p}.2M  10.1MB/s    eta 12s\r").as_bytes(),
        );
    }
    out.extend_from_slice(b"\nDone! Model 'base' saved\n");
    out
}

fn bench_parse(c: &mut Criterion) {
    let output = wget_output();

    c.bench_function("split_and_classify_wget_progress", |b| {
        b.iter(|| {
            let mut splitter = LineSplitter::new();
            let mut tracker = ProgressTracker::new();
            let mut reported = 0usize;
            for chunk in output.chunks(512) {
                for line in splitter.push(black_box(chunk)) {
                    if let LineKind::Progress(p) = classify(StreamKind::Stderr, &line) {
                        if tracker.observe(p) {
                            reported += 1;
                        }
                    }
                }
            }
            reported
        });
    });
}

criterion_group!(benches, bench_parse);
criterion_main!(benches);
