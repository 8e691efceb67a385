//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::sync::Once;
use tracing_subscriber::EnvFilter;
use vclip_models::{NormalizedBox, RawDetection, RawFrame};

static INIT: Once = Once::new();

/// Route engine logs to the test harness. Honors `RUST_LOG`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
            .with_test_writer()
            .try_init();
    });
}

/// Box of the given size centered on (cx, cy).
pub fn centered_box(cx: f64, cy: f64, width: f64, height: f64) -> NormalizedBox {
    NormalizedBox::new(cx - width / 2.0, cy - height / 2.0, width, height)
}

/// Deterministic jitter in [-amplitude, amplitude].
pub struct Jitter {
    state: u64,
    amplitude: f64,
}

impl Jitter {
    pub fn new(seed: u64, amplitude: f64) -> Self {
        Self {
            state: seed,
            amplitude,
        }
    }

    pub fn sample(&mut self) -> f64 {
        // 64-bit LCG (Knuth MMIX constants)
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let unit = (self.state >> 11) as f64 / (1u64 << 53) as f64;
        (unit * 2.0 - 1.0) * self.amplitude
    }
}

/// A clip mixing every situation the engine handles, starting at `start`:
/// a lone jittery speaker, a two-person conversation with a handoff, an
/// empty stretch, and a contested two-shot.
pub fn mixed_clip(start: u64) -> Vec<RawFrame> {
    let mut jitter = Jitter::new(42, 0.01);

    (0..360u64)
        .map(|i| {
            let a = |j: &mut Jitter| centered_box(0.3 + j.sample(), 0.4 + j.sample(), 0.12, 0.2);
            let b = |j: &mut Jitter| centered_box(0.7 + j.sample(), 0.45 + j.sample(), 0.12, 0.2);

            let detections = match i {
                0..=89 => vec![RawDetection::face(a(&mut jitter), 0.92).with_track_id(1)],
                90..=179 => vec![
                    RawDetection::face(a(&mut jitter), 0.85)
                        .with_track_id(1)
                        .with_speaking(i < 130),
                    RawDetection::face(b(&mut jitter), 0.85)
                        .with_track_id(2)
                        .with_speaking(i >= 130),
                ],
                180..=239 => Vec::new(),
                _ => vec![
                    RawDetection::face(a(&mut jitter), 0.8).with_track_id(1),
                    RawDetection::face(b(&mut jitter), 0.8).with_track_id(2),
                ],
            };

            RawFrame::new(start + i, detections)
        })
        .collect()
}
