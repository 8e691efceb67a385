//! Camera trajectory statistics for a finished job.

use serde::{Deserialize, Serialize};
use vclip_models::{CroppingMode, Segment};

use crate::stabilizer::SmoothedState;

/// Summary of how much the virtual camera moved.
///
/// Movement is the center displacement between consecutive frames in
/// normalized units. Instantaneous retargets at segment boundaries are not
/// counted as movement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryStats {
    pub frame_count: usize,
    pub segment_count: usize,
    pub track_segments: usize,
    pub general_segments: usize,
    pub track_frames: u64,
    pub general_frames: u64,
    /// Frames where the camera held on a missing subject
    pub held_frames: u64,
    /// Segment boundaries where the camera cut
    pub retargets: usize,
    pub total_movement: f64,
    pub avg_movement: f64,
    pub max_movement: f64,
    /// Mean movement under the static threshold
    pub is_static: bool,
}

impl TrajectoryStats {
    /// Compute stats from the emitted states and segments.
    pub fn compute(
        states: &[SmoothedState],
        segments: &[Segment],
        held_frames: u64,
        static_threshold: f64,
    ) -> Self {
        let mut stats = Self {
            frame_count: states.len(),
            segment_count: segments.len(),
            held_frames,
            retargets: segments.len().saturating_sub(1),
            ..Default::default()
        };

        for segment in segments {
            match segment.mode() {
                CroppingMode::Track => {
                    stats.track_segments += 1;
                    stats.track_frames += segment.len();
                }
                CroppingMode::General => {
                    stats.general_segments += 1;
                    stats.general_frames += segment.len();
                }
            }
        }

        let mut moves = 0usize;
        let mut boundaries = segments.iter().map(|s| s.start).peekable();

        for pair in states.windows(2) {
            let (prev, curr) = (&pair[0], &pair[1]);

            while boundaries.peek().is_some_and(|&start| start < curr.frame_index) {
                boundaries.next();
            }
            if boundaries.peek() == Some(&curr.frame_index) {
                continue;
            }

            let movement = (curr.cx - prev.cx).hypot(curr.cy - prev.cy);
            stats.total_movement += movement;
            stats.max_movement = stats.max_movement.max(movement);
            moves += 1;
        }

        if moves > 0 {
            stats.avg_movement = stats.total_movement / moves as f64;
        }
        stats.is_static = stats.avg_movement < static_threshold;

        stats
    }
}
