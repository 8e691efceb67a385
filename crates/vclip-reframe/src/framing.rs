//! Target framing: desired crop center and scale per frame.
//!
//! Coordinates are normalized to the source frame. Scale is relative to the
//! largest crop of the output aspect that fits the source: 1.0 is that
//! widest crop, `1 / max_zoom_factor` the tightest allowed close-up.

use vclip_models::{AspectRatio, FrameDetection, FrameIndex, NormalizedBox, SourceGeometry};

use crate::config::ReframeConfig;
use crate::subject_resolver::ResolvedFrame;

/// Desired camera position for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetPoint {
    pub frame_index: FrameIndex,
    /// Center x (fraction of source width)
    pub cx: f64,
    /// Center y (fraction of source height)
    pub cy: f64,
    /// Crop scale, always > 0
    pub scale: f64,
    /// False when derived from a held position
    pub observed: bool,
}

impl TargetPoint {
    /// The fixed wide framing: centered, widest crop.
    pub fn wide(frame_index: FrameIndex) -> Self {
        Self {
            frame_index,
            cx: 0.5,
            cy: 0.5,
            scale: 1.0,
            observed: true,
        }
    }
}

/// Computes target points from subject boxes.
#[derive(Debug, Clone)]
pub struct Framer {
    headroom_margin: f64,
    vertical_bias: f64,
    min_scale: f64,
    /// Largest crop as a fraction of source (width, height)
    max_crop: (f64, f64),
}

impl Framer {
    pub fn new(config: &ReframeConfig, source: &SourceGeometry) -> Self {
        Self {
            headroom_margin: config.headroom_margin,
            vertical_bias: config.vertical_bias,
            min_scale: config.min_scale(),
            max_crop: max_crop_fraction(source, &config.target_aspect),
        }
    }

    /// Target for a TRACK frame.
    pub fn track_target(&self, resolved: &ResolvedFrame) -> TargetPoint {
        let bbox = &resolved.bbox;
        TargetPoint {
            frame_index: resolved.frame_index,
            cx: bbox.cx(),
            // Shift the target down so the subject sits higher in the crop
            cy: bbox.cy() + bbox.height * self.vertical_bias,
            scale: self.scale_for(bbox),
            observed: resolved.observed,
        }
    }

    /// Target for a GENERAL frame: the union of all subjects, or the wide
    /// framing when nobody is detected.
    pub fn group_target(&self, frame: &FrameDetection) -> TargetPoint {
        match NormalizedBox::union(frame.subjects.iter().map(|s| &s.bbox)) {
            Some(group) => TargetPoint {
                frame_index: frame.frame_index,
                cx: group.cx(),
                cy: group.cy(),
                scale: self.scale_for(&group),
                observed: true,
            },
            None => TargetPoint::wide(frame.frame_index),
        }
    }

    /// Smallest scale whose crop holds `bbox` plus headroom on every side.
    fn scale_for(&self, bbox: &NormalizedBox) -> f64 {
        let margin = 1.0 + 2.0 * self.headroom_margin;
        let needed_w = bbox.width * margin / self.max_crop.0;
        let needed_h = bbox.height * margin / self.max_crop.1;

        needed_w.max(needed_h).clamp(self.min_scale, 1.0)
    }
}

/// Largest crop of `aspect` inside `source`, as fractions of source size.
pub fn max_crop_fraction(source: &SourceGeometry, aspect: &AspectRatio) -> (f64, f64) {
    let (w, h) = source.max_crop_size(aspect);
    (w / source.width as f64, h / source.height as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vclip_models::DetectedSubject;

    fn framer() -> Framer {
        Framer::new(&ReframeConfig::default(), &SourceGeometry::FULL_HD)
    }

    #[test]
    fn test_track_target_centered_on_box() {
        let resolved = ResolvedFrame {
            frame_index: 3,
            bbox: NormalizedBox::new(0.4, 0.4, 0.2, 0.3),
            observed: true,
        };
        let target = framer().track_target(&resolved);

        assert!((target.cx - 0.5).abs() < 1e-12);
        assert!((target.cy - 0.55).abs() < 1e-12);
        assert!(target.scale > 0.0 && target.scale <= 1.0);
        assert!(target.observed);
    }

    #[test]
    fn test_scale_clamped_to_zoom_limits() {
        let f = framer();

        // Tiny face: clamps to maximum zoom
        let tiny = NormalizedBox::new(0.5, 0.5, 0.01, 0.01);
        assert!((f.scale_for(&tiny) - 1.0 / 1.5).abs() < 1e-12);

        // Huge box: clamps to the widest crop
        let huge = NormalizedBox::new(0.0, 0.0, 0.9, 0.9);
        assert_eq!(f.scale_for(&huge), 1.0);
    }

    #[test]
    fn test_vertical_bias() {
        let config = ReframeConfig {
            vertical_bias: 0.2,
            ..Default::default()
        };
        let f = Framer::new(&config, &SourceGeometry::FULL_HD);
        let resolved = ResolvedFrame {
            frame_index: 0,
            bbox: NormalizedBox::new(0.4, 0.4, 0.2, 0.2),
            observed: true,
        };
        assert!((f.track_target(&resolved).cy - 0.54).abs() < 1e-12);
    }

    #[test]
    fn test_group_target() {
        let f = framer();
        let subject = |x: f64, id| DetectedSubject {
            bbox: NormalizedBox::new(x, 0.4, 0.1, 0.2),
            confidence: 0.9,
            track_id: id,
            is_speaking: false,
        };

        let frame = FrameDetection::new(0, vec![subject(0.2, 0), subject(0.6, 1)]);
        let target = f.group_target(&frame);
        assert!((target.cx - 0.45).abs() < 1e-12);
        assert!((target.cy - 0.5).abs() < 1e-12);

        let empty = FrameDetection::new(1, vec![]);
        assert_eq!(f.group_target(&empty), TargetPoint::wide(1));
    }

    #[test]
    fn test_max_crop_fraction() {
        let (w, h) = max_crop_fraction(&SourceGeometry::FULL_HD, &AspectRatio::PORTRAIT);
        assert!((w - 607.5 / 1920.0).abs() < 1e-12);
        assert_eq!(h, 1.0);
    }
}
