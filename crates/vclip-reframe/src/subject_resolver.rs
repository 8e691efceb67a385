//! Subject Resolver - holds one subject identity across a TRACK segment.
//!
//! The resolver never re-targets: the segment's subject is followed for the
//! whole segment. Frames where it is missing reuse its last known box and
//! are marked unobserved so the stabilizer freezes instead of drifting.

use std::cmp::Ordering;
use tracing::{debug, warn};
use vclip_models::{DetectedSubject, FrameDetection, FrameIndex, NormalizedBox, Segment, SubjectId};

use crate::error::{ReframeError, ReframeResult};

/// Order subjects for selection: highest confidence first, speaking
/// subjects win confidence ties, then lowest id.
pub fn rank_subjects(subjects: &[DetectedSubject]) -> Vec<&DetectedSubject> {
    let mut ranked: Vec<&DetectedSubject> = subjects.iter().collect();
    ranked.sort_by(|a, b| compare_subjects(a, b));
    ranked
}

fn compare_subjects(a: &DetectedSubject, b: &DetectedSubject) -> Ordering {
    b.confidence
        .partial_cmp(&a.confidence)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.is_speaking.cmp(&a.is_speaking))
        .then_with(|| a.track_id.cmp(&b.track_id))
}

/// Subject position for one frame of a TRACK segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedFrame {
    pub frame_index: FrameIndex,
    /// Subject box, or the last known one while the subject is missing
    pub bbox: NormalizedBox,
    /// False when the box is held from another frame
    pub observed: bool,
}

/// Resolved subject positions for a whole TRACK segment.
#[derive(Debug, Clone)]
pub struct ResolvedTrack {
    pub subject_id: SubjectId,
    pub frames: Vec<ResolvedFrame>,
    /// Frames where the subject was missing and its box was held
    pub held_frames: u64,
}

/// Maintains subject continuity within TRACK segments.
#[derive(Debug, Clone)]
pub struct SubjectResolver {
    gap_tolerance: u32,
}

impl SubjectResolver {
    /// Create a resolver tolerating `gap_tolerance` consecutive missing frames.
    pub fn new(gap_tolerance: u32) -> Self {
        Self { gap_tolerance }
    }

    /// Resolve the tracked subject's box for every frame of `segment`.
    ///
    /// `frames` must be exactly the segment's frames, in order.
    pub fn resolve(&self, segment: &Segment, frames: &[FrameDetection]) -> ReframeResult<ResolvedTrack> {
        let subject_id = segment
            .kind
            .subject_id()
            .ok_or_else(|| ReframeError::degenerate_segment(segment.start, segment.end))?;

        if frames.len() as u64 != segment.len()
            || frames.first().map(|f| f.frame_index) != Some(segment.start)
        {
            return Err(ReframeError::degenerate_segment(segment.start, segment.end));
        }

        // Leading absence takes the subject's first appearance
        let first_seen = frames
            .iter()
            .find_map(|f| f.subject(subject_id).map(|s| s.bbox))
            .ok_or_else(|| ReframeError::degenerate_segment(segment.start, segment.end))?;

        let mut last_known = first_seen;
        let mut gap: u32 = 0;
        let mut held_frames = 0;
        let mut resolved = Vec::with_capacity(frames.len());

        for frame in frames {
            match frame.subject(subject_id) {
                Some(subject) => {
                    if gap > 0 {
                        debug!(subject_id, frame = frame.frame_index, gap, "Subject reacquired");
                    }
                    gap = 0;
                    last_known = subject.bbox;
                    resolved.push(ResolvedFrame {
                        frame_index: frame.frame_index,
                        bbox: subject.bbox,
                        observed: true,
                    });
                }
                None => {
                    gap += 1;
                    held_frames += 1;
                    if gap == self.gap_tolerance.saturating_add(1) {
                        warn!(
                            subject_id,
                            frame = frame.frame_index,
                            "Subject missing beyond gap tolerance inside TRACK segment, holding"
                        );
                    }
                    resolved.push(ResolvedFrame {
                        frame_index: frame.frame_index,
                        bbox: last_known,
                        observed: false,
                    });
                }
            }
        }

        Ok(ResolvedTrack {
            subject_id,
            frames: resolved,
            held_frames,
        })
    }
}
