//! Reframing engine: detections in, per-frame crop rectangles out.
//!
//! Pipeline: Detection Adapter → Mode Selector → Subject Resolver (TRACK
//! only) → Heavy Tripod → Crop Emitter.
//!
//! One engine instance owns the filter state for one job at a time.
//! Independent jobs run in parallel through [`process_batch`], each with its
//! own engine, sharing nothing mutable.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::time::Instant;
use tracing::{debug, info, warn};
use vclip_models::{
    CropFrame, FrameDetection, FrameIndex, RawFrame, Segment, SegmentKind, SourceGeometry,
};

use crate::config::ReframeConfig;
use crate::crop_emitter::CropEmitter;
use crate::detection_adapter::{collect_frames, validate_sequence, DetectionAdapter, SubjectDetector};
use crate::error::{ReframeError, ReframeResult};
use crate::framing::{Framer, TargetPoint};
use crate::metrics;
use crate::mode_selector::ModeSelector;
use crate::stabilizer::{HeavyTripod, SmoothedState};
use crate::stats::TrajectoryStats;
use crate::subject_resolver::SubjectResolver;

/// Engine output for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropStream {
    /// One crop per input frame, in input order
    pub frames: Vec<CropFrame>,
    /// Segments partitioning the frame range
    pub segments: Vec<Segment>,
    /// Smoothed camera state behind each crop
    pub states: Vec<SmoothedState>,
    pub stats: TrajectoryStats,
}

impl CropStream {
    fn empty() -> Self {
        Self {
            frames: Vec::new(),
            segments: Vec::new(),
            states: Vec::new(),
            stats: TrajectoryStats::default(),
        }
    }

    /// Number of emitted frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// JSON handoff for the rendering stage.
    pub fn to_json(&self) -> ReframeResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Segment containing `frame`.
    pub fn segment_at(&self, frame: FrameIndex) -> Option<&Segment> {
        self.segments.iter().find(|s| s.contains(frame))
    }
}

/// The cropping and stabilization engine.
pub struct ReframeEngine {
    config: ReframeConfig,
    source: SourceGeometry,
    adapter: DetectionAdapter,
    selector: ModeSelector,
    resolver: SubjectResolver,
    framer: Framer,
    tripod: HeavyTripod,
    emitter: CropEmitter,
}

impl ReframeEngine {
    /// Create an engine for one source geometry.
    pub fn new(config: ReframeConfig, source: SourceGeometry) -> ReframeResult<Self> {
        config.validate()?;
        if source.width < 2 || source.height < 2 {
            return Err(ReframeError::invalid_config(format!(
                "source geometry {}x{} is too small",
                source.width, source.height
            )));
        }

        Ok(Self {
            adapter: DetectionAdapter::new(&config),
            selector: ModeSelector::new(&config),
            resolver: SubjectResolver::new(config.detection_gap_tolerance),
            framer: Framer::new(&config, &source),
            tripod: HeavyTripod::new(&config),
            emitter: CropEmitter::new(source, &config.target_aspect),
            config,
            source,
        })
    }

    pub fn config(&self) -> &ReframeConfig {
        &self.config
    }

    pub fn source(&self) -> SourceGeometry {
        self.source
    }

    /// Process a fully materialized detector feed.
    pub fn process(&mut self, frames: &[RawFrame]) -> ReframeResult<CropStream> {
        let started = Instant::now();
        let result = self
            .adapter
            .adapt(frames)
            .and_then(|detections| self.run(&detections));
        finish(result, started)
    }

    /// Process detections that are already normalized.
    pub fn process_detections(&mut self, detections: &[FrameDetection]) -> ReframeResult<CropStream> {
        let started = Instant::now();
        let result = validate_sequence(detections.iter().map(|d| d.frame_index))
            .and_then(|_| self.run(detections));
        finish(result, started)
    }

    /// Pull `range` from a detector, then process it.
    ///
    /// The whole range is collected before smoothing starts; the filter
    /// never runs ahead of its input.
    pub fn process_detector<D>(&mut self, detector: &mut D, range: Range<FrameIndex>) -> ReframeResult<CropStream>
    where
        D: SubjectDetector + ?Sized,
    {
        let started = Instant::now();
        let result = collect_frames(detector, range)
            .and_then(|frames| self.adapter.adapt(&frames))
            .and_then(|detections| self.run(&detections));
        finish(result, started)
    }

    fn run(&mut self, detections: &[FrameDetection]) -> ReframeResult<CropStream> {
        let Some(first) = detections.first() else {
            debug!("Empty detection stream, nothing to emit");
            return Ok(CropStream::empty());
        };
        let base = first.frame_index;

        let segments = self.selector.select(detections)?;

        let mut frames = Vec::with_capacity(detections.len());
        let mut states = Vec::with_capacity(detections.len());
        let mut held_frames = 0;

        self.tripod.clear();

        for segment in &segments {
            let lo = (segment.start - base) as usize;
            let hi = (segment.end - base) as usize;
            let slice = &detections[lo..hi];

            let targets: Vec<TargetPoint> = match segment.kind {
                SegmentKind::Track { .. } => {
                    let track = self.resolver.resolve(segment, slice)?;
                    held_frames += track.held_frames;
                    track
                        .frames
                        .iter()
                        .map(|resolved| self.framer.track_target(resolved))
                        .collect()
                }
                SegmentKind::General => slice.iter().map(|f| self.framer.group_target(f)).collect(),
            };

            let mode = segment.mode();
            let mut targets = targets.iter();
            if let Some(first) = targets.next() {
                // Instantaneous retarget at every boundary
                let state = self.tripod.reset(first);
                frames.push(self.emitter.emit(&state, mode));
                states.push(state);
            }
            for target in targets {
                let state = self.tripod.update(target);
                frames.push(self.emitter.emit(&state, mode));
                states.push(state);
            }

            metrics::record_segment(mode, segment.len());
        }

        if frames.len() != detections.len() {
            return Err(ReframeError::degenerate_segment(
                base,
                base + frames.len() as FrameIndex,
            ));
        }

        let stats = TrajectoryStats::compute(
            &states,
            &segments,
            held_frames,
            self.config.static_motion_threshold,
        );
        metrics::record_held_frames(held_frames);

        Ok(CropStream {
            frames,
            segments,
            states,
            stats,
        })
    }
}

fn finish(result: ReframeResult<CropStream>, started: Instant) -> ReframeResult<CropStream> {
    let elapsed = started.elapsed().as_secs_f64();
    match &result {
        Ok(stream) => {
            info!(
                frames = stream.len(),
                segments = stream.segments.len(),
                track_frames = stream.stats.track_frames,
                general_frames = stream.stats.general_frames,
                held_frames = stream.stats.held_frames,
                elapsed_ms = (elapsed * 1000.0) as u64,
                "Reframe complete"
            );
            metrics::record_job_completed(stream.len(), elapsed);
        }
        Err(e) => {
            warn!(code = e.code(), error = %e, "Reframe failed");
            metrics::record_job_failed(e.code());
        }
    }
    result
}

/// One independent reframing job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReframeJob {
    pub id: String,
    pub source: SourceGeometry,
    pub frames: Vec<RawFrame>,
}

/// Process independent jobs in parallel, one engine per job.
///
/// Results are returned in input order; one job failing does not affect
/// the others.
pub fn process_batch(config: &ReframeConfig, jobs: &[ReframeJob]) -> Vec<ReframeResult<CropStream>> {
    info!(jobs = jobs.len(), "Processing reframe batch");

    jobs.par_iter()
        .map(|job| {
            let result = ReframeEngine::new(config.clone(), job.source)
                .and_then(|mut engine| engine.process(&job.frames));
            if let Err(e) = &result {
                warn!(job_id = %job.id, code = e.code(), "Reframe job failed");
            }
            result
        })
        .collect()
}
