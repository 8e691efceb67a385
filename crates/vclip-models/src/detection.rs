//! Detector feed and normalized per-frame detection records.
//!
//! The external face/person detectors hand the engine a [`RawFrame`] per
//! source frame. The detection adapter turns those into [`FrameDetection`]s:
//! thresholded, rescaled to unit confidence, clipped to the frame and with a
//! stable subject id on every entry.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Zero-based source frame index.
pub type FrameIndex = u64;

/// Identity of a tracked subject, stable across frames.
pub type SubjectId = u32;

/// Axis-aligned box in normalized source-frame coordinates (0.0-1.0).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NormalizedBox {
    /// Left edge
    pub x: f64,
    /// Top edge
    pub y: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
}

impl NormalizedBox {
    /// Create a new normalized box.
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Box covering the whole frame.
    pub const FULL_FRAME: NormalizedBox = NormalizedBox::new(0.0, 0.0, 1.0, 1.0);

    /// Center x-coordinate.
    #[inline]
    pub fn cx(&self) -> f64 {
        self.x + self.width / 2.0
    }

    /// Center y-coordinate.
    #[inline]
    pub fn cy(&self) -> f64 {
        self.y + self.height / 2.0
    }

    /// Right edge.
    #[inline]
    pub fn x2(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge.
    #[inline]
    pub fn y2(&self) -> f64 {
        self.y + self.height
    }

    /// Area as a fraction of the frame.
    #[inline]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// True when every component is a finite number.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }

    /// Intersection over Union with another box.
    pub fn iou(&self, other: &NormalizedBox) -> f64 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.x2().min(other.x2());
        let y2 = self.y2().min(other.y2());

        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }

        let intersection = (x2 - x1) * (y2 - y1);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }

    /// Clip the box to the unit frame. Returns `None` if nothing is left.
    pub fn clip_to_frame(&self) -> Option<NormalizedBox> {
        if !self.is_finite() {
            return None;
        }

        let x1 = self.x.clamp(0.0, 1.0);
        let y1 = self.y.clamp(0.0, 1.0);
        let x2 = self.x2().clamp(0.0, 1.0);
        let y2 = self.y2().clamp(0.0, 1.0);

        if x2 <= x1 || y2 <= y1 {
            return None;
        }

        Some(NormalizedBox::new(x1, y1, x2 - x1, y2 - y1))
    }

    /// Smallest box containing all input boxes.
    pub fn union<'a, I>(boxes: I) -> Option<NormalizedBox>
    where
        I: IntoIterator<Item = &'a NormalizedBox>,
    {
        let mut iter = boxes.into_iter();
        let first = iter.next()?;
        let (mut x1, mut y1, mut x2, mut y2) = (first.x, first.y, first.x2(), first.y2());

        for b in iter {
            x1 = x1.min(b.x);
            y1 = y1.min(b.y);
            x2 = x2.max(b.x2());
            y2 = y2.max(b.y2());
        }

        Some(NormalizedBox::new(x1, y1, x2 - x1, y2 - y1))
    }
}

/// Which detector model produced a raw detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    /// Face detector: the box is the face itself.
    Face,
    /// Person detector: the box covers the whole body.
    Person,
}

/// Scale a detector reports its confidence on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceScale {
    /// Already in 0.0-1.0.
    #[default]
    Unit,
    /// 0-100.
    Percent,
}

impl ConfidenceScale {
    /// Map a raw confidence onto 0.0-1.0.
    pub fn to_unit(self, raw: f64) -> f64 {
        let value = match self {
            ConfidenceScale::Unit => raw,
            ConfidenceScale::Percent => raw / 100.0,
        };
        value.clamp(0.0, 1.0)
    }
}

/// One detection exactly as the external detector reported it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RawDetection {
    /// Producing detector
    pub kind: DetectorKind,
    /// Bounding box in normalized coordinates
    pub bbox: NormalizedBox,
    /// Confidence on the detector's own scale
    pub confidence: f64,
    /// Scale of `confidence`
    #[serde(default)]
    pub confidence_scale: ConfidenceScale,
    /// Identity from the detector's own tracker, if it has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_id: Option<SubjectId>,
    /// Active-speaker flag, if the detector computes one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_speaking: Option<bool>,
}

impl RawDetection {
    /// A face detection with unit-scale confidence.
    pub fn face(bbox: NormalizedBox, confidence: f64) -> Self {
        Self {
            kind: DetectorKind::Face,
            bbox,
            confidence,
            confidence_scale: ConfidenceScale::Unit,
            track_id: None,
            is_speaking: None,
        }
    }

    /// A person detection with unit-scale confidence.
    pub fn person(bbox: NormalizedBox, confidence: f64) -> Self {
        Self {
            kind: DetectorKind::Person,
            ..Self::face(bbox, confidence)
        }
    }

    /// Set the detector-provided identity.
    pub fn with_track_id(mut self, id: SubjectId) -> Self {
        self.track_id = Some(id);
        self
    }

    /// Set the active-speaker flag.
    pub fn with_speaking(mut self, speaking: bool) -> Self {
        self.is_speaking = Some(speaking);
        self
    }

    /// Set the confidence scale.
    pub fn with_scale(mut self, scale: ConfidenceScale) -> Self {
        self.confidence_scale = scale;
        self
    }
}

/// All raw detections for one source frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct RawFrame {
    /// Source frame index
    pub frame_index: FrameIndex,
    /// Detections in this frame (may be empty)
    #[serde(default)]
    pub detections: Vec<RawDetection>,
}

impl RawFrame {
    /// Create a frame record.
    pub fn new(frame_index: FrameIndex, detections: Vec<RawDetection>) -> Self {
        Self {
            frame_index,
            detections,
        }
    }

    /// A frame with no detections.
    pub fn empty(frame_index: FrameIndex) -> Self {
        Self::new(frame_index, Vec::new())
    }
}

/// A normalized, thresholded subject inside one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DetectedSubject {
    /// Subject box (face region) in normalized coordinates
    pub bbox: NormalizedBox,
    /// Confidence in 0.0-1.0
    pub confidence: f64,
    /// Stable identity
    pub track_id: SubjectId,
    /// Whether the subject was flagged as the active speaker
    pub is_speaking: bool,
}

/// Normalized detections for a single frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FrameDetection {
    /// Source frame index
    pub frame_index: FrameIndex,
    /// Subjects, ordered by descending confidence
    pub subjects: Vec<DetectedSubject>,
}

impl FrameDetection {
    /// Create a frame record.
    pub fn new(frame_index: FrameIndex, subjects: Vec<DetectedSubject>) -> Self {
        Self {
            frame_index,
            subjects,
        }
    }

    /// True when nothing passed the confidence threshold.
    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    /// Look up a subject by id.
    pub fn subject(&self, id: SubjectId) -> Option<&DetectedSubject> {
        self.subjects.iter().find(|s| s.track_id == id)
    }

    /// Ids of the subjects flagged as speaking.
    pub fn speaking_ids(&self) -> impl Iterator<Item = SubjectId> + '_ {
        self.subjects
            .iter()
            .filter(|s| s.is_speaking)
            .map(|s| s.track_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iou_partial_overlap() {
        let a = NormalizedBox::new(0.0, 0.0, 0.2, 0.2);
        let b = NormalizedBox::new(0.1, 0.1, 0.2, 0.2);

        // Intersection 0.01, union 0.07
        assert!((a.iou(&b) - 0.01 / 0.07).abs() < 1e-9);
    }

    #[test]
    fn test_iou_disjoint() {
        let a = NormalizedBox::new(0.0, 0.0, 0.1, 0.1);
        let b = NormalizedBox::new(0.5, 0.5, 0.1, 0.1);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_clip_to_frame() {
        let clipped = NormalizedBox::new(-0.1, 0.9, 0.3, 0.3).clip_to_frame().unwrap();
        assert!((clipped.x - 0.0).abs() < 1e-12);
        assert!((clipped.width - 0.2).abs() < 1e-12);
        assert!((clipped.height - 0.1).abs() < 1e-12);

        assert!(NormalizedBox::new(1.2, 0.0, 0.1, 0.1).clip_to_frame().is_none());
        assert!(NormalizedBox::new(f64::NAN, 0.0, 0.1, 0.1).clip_to_frame().is_none());
    }

    #[test]
    fn test_union() {
        let boxes = [
            NormalizedBox::new(0.1, 0.2, 0.1, 0.1),
            NormalizedBox::new(0.6, 0.4, 0.2, 0.3),
        ];
        let u = NormalizedBox::union(&boxes).unwrap();
        assert!((u.x - 0.1).abs() < 1e-12);
        assert!((u.y - 0.2).abs() < 1e-12);
        assert!((u.x2() - 0.8).abs() < 1e-12);
        assert!((u.y2() - 0.7).abs() < 1e-12);

        assert!(NormalizedBox::union(&[]).is_none());
    }

    #[test]
    fn test_confidence_scale() {
        assert_eq!(ConfidenceScale::Percent.to_unit(85.0), 0.85);
        assert_eq!(ConfidenceScale::Unit.to_unit(1.4), 1.0);
        assert_eq!(ConfidenceScale::Unit.to_unit(-0.2), 0.0);
    }

    #[test]
    fn test_raw_frame_deserializes_without_optional_fields() {
        let json = r#"{"frame_index": 3, "detections": [
            {"kind": "face", "bbox": {"x": 0.1, "y": 0.1, "width": 0.2, "height": 0.2}, "confidence": 0.9}
        ]}"#;
        let frame: RawFrame = serde_json::from_str(json).unwrap();
        assert_eq!(frame.frame_index, 3);
        assert_eq!(frame.detections[0].confidence_scale, ConfidenceScale::Unit);
        assert!(frame.detections[0].track_id.is_none());
    }
}
