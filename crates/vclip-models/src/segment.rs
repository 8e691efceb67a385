//! Cropping segments: contiguous frame runs sharing one mode.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::detection::{FrameIndex, SubjectId};

/// Cropping strategy for a run of frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CroppingMode {
    /// Follow a single identified subject.
    Track,
    /// Frame the group or the wide scene over a blurred background.
    General,
}

impl CroppingMode {
    /// Lowercase name, used as a metric/log label.
    pub fn as_str(&self) -> &'static str {
        match self {
            CroppingMode::Track => "track",
            CroppingMode::General => "general",
        }
    }
}

impl fmt::Display for CroppingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mode of a segment, carrying the tracked subject for TRACK runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SegmentKind {
    /// Follow `subject_id`.
    Track { subject_id: SubjectId },
    /// Group / wide framing.
    General,
}

impl SegmentKind {
    /// The plain cropping mode.
    pub fn mode(&self) -> CroppingMode {
        match self {
            SegmentKind::Track { .. } => CroppingMode::Track,
            SegmentKind::General => CroppingMode::General,
        }
    }

    /// Tracked subject, if any.
    pub fn subject_id(&self) -> Option<SubjectId> {
        match self {
            SegmentKind::Track { subject_id } => Some(*subject_id),
            SegmentKind::General => None,
        }
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentKind::Track { subject_id } => write!(f, "track({})", subject_id),
            SegmentKind::General => f.write_str("general"),
        }
    }
}

/// Why the mode selector chose a segment's mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SegmentReason {
    /// One subject present and dominant.
    SingleSubject,
    /// One of several subjects dominates through the speaking flag.
    ActiveSpeaker,
    /// One of several subjects clearly out-scores the rest.
    DominantSubject,
    /// Nobody detected.
    NoSubjects,
    /// Several subjects, none clearly dominant.
    NoDominantSubject,
    /// Dominant subject too small for a close-up.
    WideShot,
    /// Tracked subject lost for longer than the gap tolerance.
    DetectionLoss,
}

/// A contiguous, half-open frame range `[start, end)` with one mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Segment {
    /// First frame (inclusive)
    pub start: FrameIndex,
    /// One past the last frame (exclusive)
    pub end: FrameIndex,
    /// Mode and tracked subject
    pub kind: SegmentKind,
    /// Reason the mode was chosen
    pub reason: SegmentReason,
}

impl Segment {
    /// Create a segment.
    pub fn new(start: FrameIndex, end: FrameIndex, kind: SegmentKind, reason: SegmentReason) -> Self {
        Self {
            start,
            end,
            kind,
            reason,
        }
    }

    /// Number of frames in the segment.
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// True for zero-length or inverted ranges.
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Cropping mode.
    pub fn mode(&self) -> CroppingMode {
        self.kind.mode()
    }

    /// Whether `frame` falls inside this segment.
    pub fn contains(&self, frame: FrameIndex) -> bool {
        frame >= self.start && frame < self.end
    }
}
