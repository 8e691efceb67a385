//! Configuration for the reframing engine.
//!
//! Centralizes every tunable parameter of the cropping and stabilization
//! pipeline. Spatial quantities are fractions of the source frame, temporal
//! ones are frame counts.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;
use vclip_models::AspectRatio;

use crate::error::{ReframeError, ReframeResult};

/// Configuration for the reframing engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReframeConfig {
    // === Detection Adapter ===
    /// Minimum unit-scale confidence for a detection to count.
    /// Env: `FACE_DETECTION_CONFIDENCE`. Default: 0.6
    pub face_detection_confidence: f64,

    /// Use person boxes only in frames where no face passes the threshold.
    /// Env: `PREFER_FACE_DETECTIONS`. Default: true
    pub prefer_face_detections: bool,

    /// IoU needed to associate an anonymous detection with an existing track.
    /// Default: 0.3
    pub iou_threshold: f64,

    // === Mode Selector ===
    /// Sliding window length for mode arbitration, and the number of
    /// consecutive frames a new mode must hold before it takes effect.
    /// Env: `MODE_WINDOW_FRAMES`. Default: 45 (1.5s at 30fps)
    pub mode_window_frames: u32,

    /// Frames a speaker change must persist before the camera hands off.
    /// Env: `SPEAKER_DWELL_FRAMES`. Default: 24
    pub speaker_dwell_frames: u32,

    /// Top-two confidence gap at or below which no subject dominates a frame.
    /// Env: `DOMINANCE_TOLERANCE`. Default: 0.1
    pub dominance_tolerance: f64,

    /// Minimum mean box height (fraction of frame) for a close-up.
    /// Smaller dominant subjects are framed as a wide shot.
    /// Env: `MIN_CLOSEUP_HEIGHT`. Default: 0.08
    pub min_closeup_height: f64,

    // === Subject Resolver ===
    /// Consecutive frames a tracked subject may be missing before the
    /// track is considered lost.
    /// Env: `DETECTION_GAP_TOLERANCE`. Default: 8
    pub detection_gap_tolerance: u32,

    /// Margin added around the subject on each side, as a fraction of its size.
    /// Env: `HEADROOM_MARGIN`. Default: 0.25
    pub headroom_margin: f64,

    /// Downward shift of the TRACK target as a fraction of the box height,
    /// which places the face higher in the crop. Default: 0.0
    pub vertical_bias: f64,

    // === Stabilizer ===
    /// Low-pass coefficient applied to the clamped delta.
    /// Env: `TRACK_SMOOTHING_FACTOR`. Default: 0.15
    pub track_smoothing_factor: f64,

    /// Per-frame delta clamp, as a fraction of the frame dimension.
    /// Env: `MAX_VELOCITY`. Default: 0.05
    pub max_velocity: f64,

    /// Distance under which a moving camera re-locks.
    /// Env: `STABILIZER_DEAD_ZONE`. Default: 0.0
    pub dead_zone: f64,

    /// Distance a locked camera's target must exceed before it moves again.
    /// 0.0 disables locking. Env: `STABILIZER_LOCK_THRESHOLD`. Default: 0.0
    pub lock_threshold: f64,

    /// Remaining delta below which the filter snaps onto its target.
    /// Default: 1e-4
    pub settle_epsilon: f64,

    // === Crop Emitter ===
    /// Output aspect ratio.
    /// Env: `TARGET_ASPECT_RATIO`. Default: 9:16
    pub target_aspect: AspectRatio,

    /// Maximum zoom relative to the largest crop that fits the source.
    /// Env: `MAX_ZOOM_FACTOR`. Default: 1.5
    pub max_zoom_factor: f64,

    // === Statistics ===
    /// Mean per-frame center movement below which a job counts as static.
    /// Default: 0.001
    pub static_motion_threshold: f64,
}

impl Default for ReframeConfig {
    fn default() -> Self {
        Self {
            // Detection
            face_detection_confidence: 0.6,
            prefer_face_detections: true,
            iou_threshold: 0.3,

            // Mode selection
            mode_window_frames: 45,
            speaker_dwell_frames: 24,
            dominance_tolerance: 0.1,
            min_closeup_height: 0.08,

            // Subject resolution
            detection_gap_tolerance: 8,
            headroom_margin: 0.25,
            vertical_bias: 0.0,

            // Heavy tripod
            track_smoothing_factor: 0.15,
            max_velocity: 0.05,
            dead_zone: 0.0,
            lock_threshold: 0.0,
            settle_epsilon: 1e-4,

            // Crop
            target_aspect: AspectRatio::PORTRAIT,
            max_zoom_factor: 1.5,

            static_motion_threshold: 0.001,
        }
    }
}

impl ReframeConfig {
    /// Configuration for podcast/interview content.
    /// Slower camera, longer dwell before handing off between speakers.
    pub fn podcast() -> Self {
        Self {
            track_smoothing_factor: 0.10,
            max_velocity: 0.03,
            speaker_dwell_frames: 36,
            mode_window_frames: 60,
            dead_zone: 0.01,
            lock_threshold: 0.03,
            ..Default::default()
        }
    }

    /// Configuration for dynamic content (vlogs, presentations).
    /// More responsive camera, shorter windows.
    pub fn dynamic() -> Self {
        Self {
            track_smoothing_factor: 0.20,
            max_velocity: 0.08,
            speaker_dwell_frames: 15,
            mode_window_frames: 30,
            ..Default::default()
        }
    }

    /// Rescale the frame-count windows for a given frame rate.
    ///
    /// Keeps the default wall-clock durations: 1.5s mode window,
    /// 0.8s speaker dwell, ~0.27s gap tolerance.
    pub fn with_frame_rate(mut self, fps: f64) -> Self {
        if fps.is_finite() && fps > 0.0 {
            self.mode_window_frames = ((1.5 * fps).round() as u32).max(1);
            self.speaker_dwell_frames = ((0.8 * fps).round() as u32).max(1);
            self.detection_gap_tolerance = (0.27 * fps).round() as u32;
        }
        self
    }

    /// Load configuration from environment variables.
    ///
    /// Unset or unparsable variables fall back to the defaults; the result
    /// is validated before it is returned.
    pub fn from_env() -> ReframeResult<Self> {
        let defaults = Self::default();

        let config = Self {
            face_detection_confidence: env_or(
                "FACE_DETECTION_CONFIDENCE",
                defaults.face_detection_confidence,
            ),
            prefer_face_detections: env_or("PREFER_FACE_DETECTIONS", defaults.prefer_face_detections),
            iou_threshold: defaults.iou_threshold,
            mode_window_frames: env_or("MODE_WINDOW_FRAMES", defaults.mode_window_frames),
            speaker_dwell_frames: env_or("SPEAKER_DWELL_FRAMES", defaults.speaker_dwell_frames),
            dominance_tolerance: env_or("DOMINANCE_TOLERANCE", defaults.dominance_tolerance),
            min_closeup_height: env_or("MIN_CLOSEUP_HEIGHT", defaults.min_closeup_height),
            detection_gap_tolerance: env_or(
                "DETECTION_GAP_TOLERANCE",
                defaults.detection_gap_tolerance,
            ),
            headroom_margin: env_or("HEADROOM_MARGIN", defaults.headroom_margin),
            vertical_bias: defaults.vertical_bias,
            track_smoothing_factor: env_or("TRACK_SMOOTHING_FACTOR", defaults.track_smoothing_factor),
            max_velocity: env_or("MAX_VELOCITY", defaults.max_velocity),
            dead_zone: env_or("STABILIZER_DEAD_ZONE", defaults.dead_zone),
            lock_threshold: env_or("STABILIZER_LOCK_THRESHOLD", defaults.lock_threshold),
            settle_epsilon: defaults.settle_epsilon,
            target_aspect: env_or("TARGET_ASPECT_RATIO", defaults.target_aspect),
            max_zoom_factor: env_or("MAX_ZOOM_FACTOR", defaults.max_zoom_factor),
            static_motion_threshold: defaults.static_motion_threshold,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check every parameter against its valid range.
    pub fn validate(&self) -> ReframeResult<()> {
        fn check(ok: bool, message: &str) -> ReframeResult<()> {
            if ok {
                Ok(())
            } else {
                Err(ReframeError::invalid_config(message))
            }
        }

        check(
            self.target_aspect.width > 0 && self.target_aspect.height > 0,
            "target_aspect must have non-zero width and height",
        )?;
        check(
            (0.0..=1.0).contains(&self.face_detection_confidence),
            "face_detection_confidence must be in [0, 1]",
        )?;
        check(
            self.iou_threshold > 0.0 && self.iou_threshold <= 1.0,
            "iou_threshold must be in (0, 1]",
        )?;
        check(self.mode_window_frames >= 1, "mode_window_frames must be >= 1")?;
        check(self.speaker_dwell_frames >= 1, "speaker_dwell_frames must be >= 1")?;
        check(
            (0.0..1.0).contains(&self.dominance_tolerance),
            "dominance_tolerance must be in [0, 1)",
        )?;
        check(
            (0.0..=1.0).contains(&self.min_closeup_height),
            "min_closeup_height must be in [0, 1]",
        )?;
        check(
            self.headroom_margin.is_finite() && self.headroom_margin >= 0.0,
            "headroom_margin must be >= 0",
        )?;
        check(
            (-0.5..=0.5).contains(&self.vertical_bias),
            "vertical_bias must be in [-0.5, 0.5]",
        )?;
        check(
            self.track_smoothing_factor > 0.0 && self.track_smoothing_factor <= 1.0,
            "track_smoothing_factor must be in (0, 1]",
        )?;
        check(
            self.max_velocity > 0.0 && self.max_velocity <= 1.0,
            "max_velocity must be in (0, 1]",
        )?;
        check(
            self.dead_zone.is_finite() && self.dead_zone >= 0.0,
            "dead_zone must be >= 0",
        )?;
        check(
            self.lock_threshold.is_finite() && self.lock_threshold >= 0.0,
            "lock_threshold must be >= 0",
        )?;
        check(
            self.lock_threshold == 0.0 || self.lock_threshold >= self.dead_zone,
            "lock_threshold must not be smaller than dead_zone",
        )?;
        check(
            self.settle_epsilon.is_finite() && self.settle_epsilon >= 0.0,
            "settle_epsilon must be >= 0",
        )?;
        check(
            self.max_zoom_factor.is_finite() && self.max_zoom_factor >= 1.0,
            "max_zoom_factor must be >= 1",
        )?;
        check(
            self.static_motion_threshold.is_finite() && self.static_motion_threshold >= 0.0,
            "static_motion_threshold must be >= 0",
        )?;

        Ok(())
    }

    /// Smallest allowed crop scale.
    pub fn min_scale(&self) -> f64 {
        1.0 / self.max_zoom_factor
    }

    /// Whether dead-zone locking is active.
    pub fn locking_enabled(&self) -> bool {
        self.lock_threshold > 0.0
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(key, value = %raw, "Ignoring unparsable configuration value");
                default
            }
        },
        Err(_) => default,
    }
}
