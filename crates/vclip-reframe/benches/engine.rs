//! Reframing Engine Benchmarks
//!
//! Measures end-to-end throughput of the cropping pipeline on synthetic
//! detector feeds.
//!
//! # Running Benchmarks
//! ```bash
//! cargo bench --package vclip-reframe --bench engine
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use vclip_models::{NormalizedBox, RawDetection, RawFrame, SourceGeometry};
use vclip_reframe::{process_batch, ReframeConfig, ReframeEngine, ReframeJob};

/// Two people talking, speaker alternating every 4 seconds at 30fps, with
/// small box wobble and periodic dropouts.
fn conversation(frames: u64) -> Vec<RawFrame> {
    (0..frames)
        .map(|i| {
            if i % 200 < 5 {
                return RawFrame::empty(i);
            }
            let wobble = ((i as f64) * 0.37).sin() * 0.005;
            let a_speaking = (i / 120) % 2 == 0;
            RawFrame::new(
                i,
                vec![
                    RawDetection::face(NormalizedBox::new(0.2 + wobble, 0.3, 0.12, 0.2), 0.88)
                        .with_speaking(a_speaking),
                    RawDetection::face(NormalizedBox::new(0.65 - wobble, 0.32, 0.12, 0.2), 0.86)
                        .with_speaking(!a_speaking),
                ],
            )
        })
        .collect()
}

fn bench_single_job(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_process");

    for frames in [300u64, 1_800, 9_000] {
        let feed = conversation(frames);
        group.throughput(Throughput::Elements(frames));
        group.bench_with_input(BenchmarkId::from_parameter(frames), &feed, |b, feed| {
            let mut engine = ReframeEngine::new(ReframeConfig::default(), SourceGeometry::FULL_HD)
                .expect("valid engine");
            b.iter(|| engine.process(black_box(feed)).expect("engine run"));
        });
    }

    group.finish();
}

fn bench_batch(c: &mut Criterion) {
    let jobs: Vec<ReframeJob> = (0..8)
        .map(|n| ReframeJob {
            id: format!("job-{}", n),
            source: SourceGeometry::FULL_HD,
            frames: conversation(1_800),
        })
        .collect();
    let config = ReframeConfig::default();

    let mut group = c.benchmark_group("engine_batch");
    group.throughput(Throughput::Elements(8 * 1_800));
    group.bench_function("8x1800", |b| {
        b.iter(|| process_batch(black_box(&config), black_box(&jobs)))
    });
    group.finish();
}

criterion_group!(benches, bench_single_job, bench_batch);
criterion_main!(benches);
