#![deny(unreachable_patterns)]
//! AI cropping and stabilization engine.
//!
//! Turns per-frame face/person detections for a landscape source into a
//! stream of stable crop rectangles for vertical output:
//!
//! - Detection normalization with identity tracking
//! - TRACK / GENERAL mode arbitration with hysteresis and speaker handoff
//! - Subject continuity across short detection dropouts
//! - Heavy Tripod smoothing with a per-frame velocity clamp
//! - Bounded, aspect-locked crop emission with a layout flag for the renderer
//!
//! Detection, decoding and rendering are external; this crate does no I/O.

pub mod config;
pub mod crop_emitter;
pub mod detection_adapter;
pub mod engine;
pub mod error;
pub mod framing;
pub mod metrics;
pub mod mode_selector;
pub mod stabilizer;
pub mod stats;
pub mod subject_resolver;
pub mod tracker;

pub use config::ReframeConfig;
pub use crop_emitter::CropEmitter;
pub use detection_adapter::{DetectionAdapter, SubjectDetector};
pub use engine::{process_batch, CropStream, ReframeEngine, ReframeJob};
pub use error::{ReframeError, ReframeResult};
pub use framing::TargetPoint;
pub use mode_selector::ModeSelector;
pub use stabilizer::{HeavyTripod, SmoothedState};
pub use stats::TrajectoryStats;
pub use subject_resolver::SubjectResolver;
