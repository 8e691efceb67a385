//! Invariants that must hold for any detector feed.

mod common;

use common::{init_tracing, mixed_clip};
use vclip_models::{AspectRatio, RawFrame, SegmentKind, SourceGeometry};
use vclip_reframe::{process_batch, ReframeConfig, ReframeEngine, ReframeError, ReframeJob};

fn run(config: ReframeConfig, source: SourceGeometry, frames: &[RawFrame]) -> vclip_reframe::CropStream {
    let mut engine = ReframeEngine::new(config, source).unwrap();
    engine.process(frames).unwrap()
}

#[test]
fn test_coverage_matches_input_indices() {
    init_tracing();
    let frames = mixed_clip(1000);
    let stream = run(ReframeConfig::default(), SourceGeometry::FULL_HD, &frames);

    assert_eq!(stream.frames.len(), frames.len());
    for (crop, raw) in stream.frames.iter().zip(&frames) {
        assert_eq!(crop.frame_index, raw.frame_index);
    }

    // Segments partition the range
    assert_eq!(stream.segments.first().map(|s| s.start), Some(1000));
    assert_eq!(stream.segments.last().map(|s| s.end), Some(1360));
    for pair in stream.segments.windows(2) {
        assert_eq!(pair[0].end, pair[1].start);
    }
}

#[test]
fn test_crops_in_bounds_with_target_aspect() {
    init_tracing();
    let cases = [
        (SourceGeometry::FULL_HD, AspectRatio::PORTRAIT),
        (SourceGeometry::new(1280, 720), AspectRatio::INSTAGRAM_PORTRAIT),
        (SourceGeometry::new(1080, 1920), AspectRatio::new(16, 9)),
        (SourceGeometry::new(1001, 563), AspectRatio::SQUARE),
    ];

    for (source, aspect) in cases {
        let config = ReframeConfig {
            target_aspect: aspect,
            ..Default::default()
        };
        let stream = run(config, source, &mixed_clip(0));

        for crop in &stream.frames {
            assert!(crop.rect.fits_within(&source), "{:?} outside {:?}", crop.rect, source);
            assert_eq!(crop.rect.width % 2, 0);
            assert_eq!(crop.rect.height % 2, 0);
            let relative = (crop.rect.aspect() - aspect.as_f64()).abs() / aspect.as_f64();
            assert!(relative < 0.01, "aspect {} for {}", crop.rect.aspect(), aspect);
        }
    }
}

#[test]
fn test_velocity_bounded_within_segments() {
    init_tracing();
    let config = ReframeConfig::default();
    let max_velocity = config.max_velocity;
    let stream = run(config, SourceGeometry::FULL_HD, &mixed_clip(0));

    for pair in stream.states.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);
        let boundary = stream.segments.iter().any(|s| s.start == curr.frame_index);
        if boundary {
            continue;
        }
        assert!((curr.cx - prev.cx).abs() <= max_velocity + 1e-12, "cx jump at {}", curr.frame_index);
        assert!((curr.cy - prev.cy).abs() <= max_velocity + 1e-12, "cy jump at {}", curr.frame_index);
        assert!((curr.scale - prev.scale).abs() <= max_velocity + 1e-12);
    }
}

#[test]
fn test_segment_start_jumps_to_new_target() {
    init_tracing();
    let config = ReframeConfig::default();
    let max_velocity = config.max_velocity;
    let frames = mixed_clip(0);
    let stream = run(config, SourceGeometry::FULL_HD, &frames);

    // Speaker handoff from subject 1 to subject 2
    let handoff = stream
        .segments
        .iter()
        .find(|s| s.kind == SegmentKind::Track { subject_id: 2 })
        .expect("handoff segment");
    assert_eq!(handoff.start, 130);

    for segment in &stream.segments {
        let Some(subject_id) = segment.kind.subject_id() else {
            continue;
        };
        let pos = (segment.start - frames[0].frame_index) as usize;
        let Some(detection) = frames[pos]
            .detections
            .iter()
            .find(|d| d.track_id == Some(subject_id))
        else {
            continue;
        };

        let state = &stream.states[pos];
        assert!((state.cx - detection.bbox.cx()).abs() < 1e-9, "cx at {}", segment.start);
        assert!((state.cy - detection.bbox.cy()).abs() < 1e-9, "cy at {}", segment.start);
        assert_eq!(state.speed(), 0.0);
    }

    // A cut, not a pan
    let pos = handoff.start as usize;
    let jump = (stream.states[pos].cx - stream.states[pos - 1].cx).abs();
    assert!(jump > max_velocity, "jump {}", jump);
}

#[test]
fn test_no_mode_flicker_and_neighbours_differ() {
    init_tracing();
    let stream = run(ReframeConfig::default(), SourceGeometry::FULL_HD, &mixed_clip(0));

    for segment in &stream.segments {
        assert!(!segment.is_empty());
        for crop in stream.frames.iter().filter(|c| segment.contains(c.frame_index)) {
            assert_eq!(crop.mode, segment.mode());
        }
    }
    for pair in stream.segments.windows(2) {
        assert_ne!(pair[0].kind, pair[1].kind);
    }
}

#[test]
fn test_identical_input_gives_identical_output() {
    init_tracing();
    let frames = mixed_clip(7);
    let first = run(ReframeConfig::podcast(), SourceGeometry::FULL_HD, &frames);
    let second = run(ReframeConfig::podcast(), SourceGeometry::FULL_HD, &frames);

    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
}

#[test]
fn test_malformed_input_fails_job() {
    init_tracing();
    let mut frames = mixed_clip(0);
    frames.remove(100);

    let mut engine = ReframeEngine::new(ReframeConfig::default(), SourceGeometry::FULL_HD).unwrap();
    let err = engine.process(&frames).unwrap_err();
    assert!(matches!(err, ReframeError::MalformedInput { .. }));
    assert!(err.is_fatal());

    frames.swap(10, 11);
    assert!(engine.process(&frames).is_err());
}

#[test]
fn test_batch_preserves_order_and_isolates_failures() {
    init_tracing();
    let mut broken = mixed_clip(0);
    broken.remove(5);

    let jobs = vec![
        ReframeJob {
            id: "a".into(),
            source: SourceGeometry::FULL_HD,
            frames: mixed_clip(0),
        },
        ReframeJob {
            id: "broken".into(),
            source: SourceGeometry::FULL_HD,
            frames: broken,
        },
        ReframeJob {
            id: "c".into(),
            source: SourceGeometry::new(1280, 720),
            frames: mixed_clip(50),
        },
    ];

    let config = ReframeConfig::default();
    let results = process_batch(&config, &jobs);

    assert_eq!(results.len(), 3);
    assert!(results[1].is_err());

    let a = results[0].as_ref().unwrap();
    let c = results[2].as_ref().unwrap();
    assert_eq!(a.frames.first().map(|f| f.frame_index), Some(0));
    assert_eq!(c.frames.first().map(|f| f.frame_index), Some(50));

    // Same as running the job alone
    let alone = run(config, SourceGeometry::FULL_HD, &jobs[0].frames);
    assert_eq!(a, &alone);
}
