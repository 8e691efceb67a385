//! Detection Adapter - normalizes raw detector output into frame detections.
//!
//! The external detectors are heterogeneous: face boxes and person boxes,
//! each with its own confidence scale, with or without identities. The
//! adapter turns them into one [`FrameDetection`] per input frame:
//!
//! - confidence rescaled to 0.0-1.0, then thresholded
//! - person boxes reduced to the head region (upper quarter of the body)
//! - person boxes only used when no face passes the threshold
//! - boxes clipped to the frame; degenerate or non-finite boxes dropped
//! - every subject given a stable id by the IoU tracker
//!
//! Frames with no surviving detections are kept with an empty subject set.
//! The frame sequence itself must be gapless and strictly increasing;
//! violations fail with [`ReframeError::MalformedInput`].

use std::cmp::Ordering;
use std::ops::Range;
use tracing::debug;
use vclip_models::{
    DetectedSubject, DetectorKind, FrameDetection, FrameIndex, NormalizedBox, RawDetection,
    RawFrame, SubjectId,
};

use crate::config::ReframeConfig;
use crate::error::{ReframeError, ReframeResult};
use crate::metrics;
use crate::tracker::IoUTracker;

/// Fraction of a person box taken as the head region.
const PERSON_HEAD_FRACTION: f64 = 0.25;

/// Capability interface for a ready-to-use subject detector.
///
/// Model loading and lifecycle belong to the implementor; the engine only
/// pulls detections frame by frame.
pub trait SubjectDetector {
    /// Detect subjects in the given source frame.
    fn detect(&mut self, frame_index: FrameIndex) -> ReframeResult<Vec<RawDetection>>;
}

impl<F> SubjectDetector for F
where
    F: FnMut(FrameIndex) -> ReframeResult<Vec<RawDetection>>,
{
    fn detect(&mut self, frame_index: FrameIndex) -> ReframeResult<Vec<RawDetection>> {
        (*self)(frame_index)
    }
}

/// Pull every frame of `range` from a detector, in order.
pub fn collect_frames<D>(detector: &mut D, range: Range<FrameIndex>) -> ReframeResult<Vec<RawFrame>>
where
    D: SubjectDetector + ?Sized,
{
    range
        .map(|frame_index| {
            detector
                .detect(frame_index)
                .map(|detections| RawFrame::new(frame_index, detections))
        })
        .collect()
}

/// Check that frame indices are strictly increasing with no gaps.
pub fn validate_sequence<I>(indices: I) -> ReframeResult<()>
where
    I: IntoIterator<Item = FrameIndex>,
{
    let mut prev: Option<FrameIndex> = None;

    for index in indices {
        if let Some(prev) = prev {
            match index.cmp(&prev) {
                Ordering::Equal => {
                    return Err(ReframeError::malformed_input(format!(
                        "duplicate frame index {}",
                        index
                    )));
                }
                Ordering::Less => {
                    return Err(ReframeError::malformed_input(format!(
                        "frame index {} follows {}",
                        index, prev
                    )));
                }
                Ordering::Greater if index != prev + 1 => {
                    return Err(ReframeError::malformed_input(format!(
                        "missing frames {}..{}",
                        prev + 1,
                        index
                    )));
                }
                Ordering::Greater => {}
            }
        }
        prev = Some(index);
    }

    Ok(())
}

/// A detection that survived normalization, before identity assignment.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    bbox: NormalizedBox,
    confidence: f64,
    track_id: Option<SubjectId>,
    is_speaking: bool,
}

#[derive(Debug, Default)]
struct DropCounts {
    low_confidence: u64,
    invalid_box: u64,
    duplicate_id: u64,
}

/// Converts raw detector frames into normalized frame detections.
#[derive(Debug, Clone)]
pub struct DetectionAdapter {
    confidence_threshold: f64,
    prefer_faces: bool,
    iou_threshold: f64,
    max_gap: u32,
}

impl DetectionAdapter {
    /// Create an adapter from engine configuration.
    pub fn new(config: &ReframeConfig) -> Self {
        Self {
            confidence_threshold: config.face_detection_confidence,
            prefer_faces: config.prefer_face_detections,
            iou_threshold: config.iou_threshold,
            max_gap: config.detection_gap_tolerance,
        }
    }

    /// Normalize a full detector feed.
    ///
    /// Pure transform: the same input always yields the same output.
    pub fn adapt(&self, frames: &[RawFrame]) -> ReframeResult<Vec<FrameDetection>> {
        validate_sequence(frames.iter().map(|f| f.frame_index))?;

        let mut tracker = IoUTracker::new(self.iou_threshold, self.max_gap);
        if let Some(max_id) = frames
            .iter()
            .flat_map(|f| f.detections.iter())
            .filter_map(|d| d.track_id)
            .max()
        {
            tracker.reserve_ids_through(max_id);
        }

        let mut drops = DropCounts::default();
        let mut peak_tracks = 0;
        let mut output = Vec::with_capacity(frames.len());

        for frame in frames {
            let candidates = self.normalize_frame(frame, &mut drops);

            let inputs: Vec<(NormalizedBox, Option<SubjectId>)> =
                candidates.iter().map(|c| (c.bbox, c.track_id)).collect();
            let ids = tracker.update(&inputs);
            peak_tracks = peak_tracks.max(tracker.active_track_count());

            let subjects = candidates
                .iter()
                .zip(ids)
                .map(|(c, track_id)| DetectedSubject {
                    bbox: c.bbox,
                    confidence: c.confidence,
                    track_id,
                    is_speaking: c.is_speaking,
                })
                .collect();

            output.push(FrameDetection::new(frame.frame_index, subjects));
        }

        if drops.low_confidence + drops.invalid_box + drops.duplicate_id > 0 {
            debug!(
                low_confidence = drops.low_confidence,
                invalid_box = drops.invalid_box,
                duplicate_id = drops.duplicate_id,
                "Dropped raw detections"
            );
        }
        debug!(frames = frames.len(), peak_tracks, "Detections adapted");
        metrics::record_dropped_detections("low_confidence", drops.low_confidence);
        metrics::record_dropped_detections("invalid_box", drops.invalid_box);
        metrics::record_dropped_detections("duplicate_id", drops.duplicate_id);

        Ok(output)
    }

    /// Threshold, convert and clip one frame's detections.
    ///
    /// Returns candidates ordered by descending confidence.
    fn normalize_frame(&self, frame: &RawFrame, drops: &mut DropCounts) -> Vec<Candidate> {
        let mut faces = Vec::new();
        let mut persons = Vec::new();

        for det in &frame.detections {
            if !det.confidence.is_finite() {
                drops.invalid_box += 1;
                continue;
            }

            let confidence = det.confidence_scale.to_unit(det.confidence);
            if confidence < self.confidence_threshold {
                drops.low_confidence += 1;
                continue;
            }

            let region = match det.kind {
                DetectorKind::Face => det.bbox,
                DetectorKind::Person => head_region(&det.bbox),
            };

            let Some(bbox) = region.clip_to_frame() else {
                drops.invalid_box += 1;
                continue;
            };

            let candidate = Candidate {
                bbox,
                confidence,
                track_id: det.track_id,
                is_speaking: det.is_speaking.unwrap_or(false),
            };

            match det.kind {
                DetectorKind::Face => faces.push(candidate),
                DetectorKind::Person => persons.push(candidate),
            }
        }

        let mut candidates = if self.prefer_faces && !faces.is_empty() {
            faces
        } else {
            faces.extend(persons);
            faces
        };

        candidates.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal)
        });

        // One box per detector id; keep the most confident
        let mut seen = Vec::new();
        candidates.retain(|c| match c.track_id {
            Some(id) if seen.contains(&id) => {
                drops.duplicate_id += 1;
                false
            }
            Some(id) => {
                seen.push(id);
                true
            }
            None => true,
        });

        candidates
    }
}

/// Head region estimate for a person box: upper quarter, full width.
fn head_region(person: &NormalizedBox) -> NormalizedBox {
    NormalizedBox::new(
        person.x,
        person.y,
        person.width,
        person.height * PERSON_HEAD_FRACTION,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use vclip_models::ConfidenceScale;

    fn adapter() -> DetectionAdapter {
        DetectionAdapter::new(&ReframeConfig::default())
    }

    fn face(x: f64, conf: f64) -> RawDetection {
        RawDetection::face(NormalizedBox::new(x, 0.3, 0.1, 0.15), conf)
    }

    #[test]
    fn test_empty_frames_are_kept() {
        let frames = vec![RawFrame::empty(0), RawFrame::empty(1)];
        let out = adapter().adapt(&frames).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|f| f.is_empty()));
    }

    #[test]
    fn test_gap_is_malformed() {
        let frames = vec![RawFrame::empty(0), RawFrame::empty(2)];
        let err = adapter().adapt(&frames).unwrap_err();
        assert!(matches!(err, ReframeError::MalformedInput { .. }));
    }

    #[test]
    fn test_duplicate_and_disorder_are_malformed() {
        assert!(validate_sequence([3, 3]).is_err());
        assert!(validate_sequence([4, 3]).is_err());
        assert!(validate_sequence([7, 8, 9]).is_ok());
        assert!(validate_sequence(std::iter::empty()).is_ok());
    }

    #[test]
    fn test_threshold_and_confidence_scale() {
        let frames = vec![RawFrame::new(
            0,
            vec![
                face(0.1, 0.5),
                face(0.5, 85.0).with_scale(ConfidenceScale::Percent),
            ],
        )];
        let out = adapter().adapt(&frames).unwrap();
        assert_eq!(out[0].subjects.len(), 1);
        assert!((out[0].subjects[0].confidence - 0.85).abs() < 1e-12);
        assert!((out[0].subjects[0].bbox.x - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_person_fallback_uses_head_region() {
        let person = RawDetection::person(NormalizedBox::new(0.4, 0.2, 0.2, 0.8), 0.9);
        let frames = vec![
            RawFrame::new(0, vec![person.clone()]),
            RawFrame::new(1, vec![person, face(0.1, 0.9)]),
        ];
        let out = adapter().adapt(&frames).unwrap();

        // Only the person: head region is the upper quarter
        let head = out[0].subjects[0].bbox;
        assert!((head.height - 0.2).abs() < 1e-12);
        assert!((head.y - 0.2).abs() < 1e-12);

        // Face present: person box ignored
        assert_eq!(out[1].subjects.len(), 1);
        assert!((out[1].subjects[0].bbox.x - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_subjects_sorted_and_identified() {
        let frames = vec![
            RawFrame::new(0, vec![face(0.1, 0.7), face(0.6, 0.95)]),
            RawFrame::new(1, vec![face(0.1, 0.7), face(0.6, 0.95)]),
        ];
        let out = adapter().adapt(&frames).unwrap();

        assert!(out[0].subjects[0].confidence > out[0].subjects[1].confidence);
        let ids0: Vec<_> = out[0].subjects.iter().map(|s| s.track_id).collect();
        let ids1: Vec<_> = out[1].subjects.iter().map(|s| s.track_id).collect();
        assert_eq!(ids0, ids1);
        assert_ne!(ids0[0], ids0[1]);
    }

    #[test]
    fn test_generated_ids_avoid_detector_ids() {
        let frames = vec![
            RawFrame::new(0, vec![face(0.1, 0.9)]),
            RawFrame::new(1, vec![face(0.6, 0.9).with_track_id(0)]),
        ];
        let out = adapter().adapt(&frames).unwrap();
        assert_ne!(out[0].subjects[0].track_id, 0);
        assert_eq!(out[1].subjects[0].track_id, 0);
    }

    #[test]
    fn test_invalid_boxes_dropped() {
        let frames = vec![RawFrame::new(
            0,
            vec![
                RawDetection::face(NormalizedBox::new(1.5, 0.0, 0.1, 0.1), 0.9),
                RawDetection::face(NormalizedBox::new(f64::NAN, 0.0, 0.1, 0.1), 0.9),
                RawDetection::face(NormalizedBox::new(0.2, 0.2, 0.1, 0.1), f64::NAN),
            ],
        )];
        let out = adapter().adapt(&frames).unwrap();
        assert!(out[0].is_empty());
    }

    #[test]
    fn test_pull_detector() {
        let mut calls = Vec::new();
        let mut detector = |index: FrameIndex| -> ReframeResult<Vec<RawDetection>> {
            calls.push(index);
            Ok(vec![face(0.3, 0.9)])
        };

        let frames = collect_frames(&mut detector, 5..8).unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].frame_index, 5);
        assert_eq!(calls, vec![5, 6, 7]);
    }
}
