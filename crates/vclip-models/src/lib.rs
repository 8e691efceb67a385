//! Shared data models for the ViralClip reframing engine.
//!
//! This crate provides Serde-serializable types for:
//! - The raw detector feed and normalized per-frame detections
//! - Cropping segments and their modes
//! - The crop stream handed to the renderer

pub mod crop;
pub mod detection;
pub mod segment;

// Re-export common types
pub use crop::{AspectRatio, AspectRatioParseError, CropFrame, CropLayout, CropRect, SourceGeometry};
pub use detection::{
    ConfidenceScale, DetectedSubject, DetectorKind, FrameDetection, FrameIndex, NormalizedBox,
    RawDetection, RawFrame, SubjectId,
};
pub use segment::{CroppingMode, Segment, SegmentKind, SegmentReason};
