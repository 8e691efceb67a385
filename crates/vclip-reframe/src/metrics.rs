//! Metrics emitted by the reframing engine.
//!
//! Recorded through the `metrics` facade; installing an exporter is left to
//! the host process. Without a recorder every call is a no-op.

use metrics::{counter, histogram};
use vclip_models::CroppingMode;

/// Metric names as constants for consistency.
pub mod names {
    pub const FRAMES_PROCESSED_TOTAL: &str = "vclip_reframe_frames_processed_total";
    pub const SEGMENTS_TOTAL: &str = "vclip_reframe_segments_total";
    pub const SEGMENT_FRAMES: &str = "vclip_reframe_segment_frames";
    pub const HELD_FRAMES_TOTAL: &str = "vclip_reframe_held_frames_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "vclip_reframe_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "vclip_reframe_jobs_failed_total";
    pub const JOB_DURATION_SECONDS: &str = "vclip_reframe_job_duration_seconds";
    pub const DETECTIONS_DROPPED_TOTAL: &str = "vclip_reframe_detections_dropped_total";
}

/// Record a finished job.
pub fn record_job_completed(frames: usize, duration_secs: f64) {
    counter!(names::FRAMES_PROCESSED_TOTAL).increment(frames as u64);
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
    histogram!(names::JOB_DURATION_SECONDS).record(duration_secs);
}

/// Record a failed job by error code.
pub fn record_job_failed(code: &'static str) {
    let labels = [("code", code)];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

/// Record an emitted segment.
pub fn record_segment(mode: CroppingMode, frames: u64) {
    let labels = [("mode", mode.as_str())];
    counter!(names::SEGMENTS_TOTAL, &labels).increment(1);
    histogram!(names::SEGMENT_FRAMES, &labels).record(frames as f64);
}

/// Record frames where the camera held position on a missing subject.
pub fn record_held_frames(count: u64) {
    if count > 0 {
        counter!(names::HELD_FRAMES_TOTAL).increment(count);
    }
}

/// Record raw detections discarded by the adapter.
pub fn record_dropped_detections(reason: &'static str, count: u64) {
    if count > 0 {
        let labels = [("reason", reason)];
        counter!(names::DETECTIONS_DROPPED_TOTAL, &labels).increment(count);
    }
}
