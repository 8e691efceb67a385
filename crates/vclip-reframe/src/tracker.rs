//! IoU-based tracker for maintaining subject identity across frames.
//!
//! Detections that already carry an id from the upstream detector keep it;
//! anonymous detections are greedily matched by Intersection over Union
//! against the tracks that were not claimed in the current frame.

use std::collections::HashMap;
use vclip_models::{NormalizedBox, SubjectId};

/// Track information.
#[derive(Debug, Clone)]
struct Track {
    /// Last known bounding box
    bbox: NormalizedBox,
    /// Frames since last detection
    age: u32,
    /// Whether track was seen in the latest frame
    active: bool,
}

/// Simple IoU-based tracker for maintaining identity across frames.
pub struct IoUTracker {
    /// IoU threshold for matching
    iou_threshold: f64,
    /// Maximum gap frames before track deletion
    max_gap: u32,
    /// Live tracks
    tracks: HashMap<SubjectId, Track>,
    /// Next track ID to assign
    next_track_id: SubjectId,
}

impl IoUTracker {
    /// Create a new tracker.
    pub fn new(iou_threshold: f64, max_gap: u32) -> Self {
        Self {
            iou_threshold,
            max_gap,
            tracks: HashMap::new(),
            next_track_id: 0,
        }
    }

    /// Never hand out ids at or below `max_id`.
    ///
    /// Used when the detector assigns its own ids, so generated ids cannot
    /// collide with them.
    pub fn reserve_ids_through(&mut self, max_id: SubjectId) {
        self.next_track_id = self.next_track_id.max(max_id.saturating_add(1));
    }

    /// Update tracks with one frame of detections.
    ///
    /// `detections` pairs each box with its detector id, if any, and should
    /// be ordered by descending confidence so stronger boxes match first.
    /// Returns the resolved id for each detection, in input order.
    pub fn update(&mut self, detections: &[(NormalizedBox, Option<SubjectId>)]) -> Vec<SubjectId> {
        let mut assigned: Vec<Option<SubjectId>> = vec![None; detections.len()];
        let mut claimed: Vec<SubjectId> = Vec::new();

        // Detector-provided identities win outright
        for (idx, (bbox, id)) in detections.iter().enumerate() {
            if let Some(id) = id {
                self.touch(*id, *bbox);
                claimed.push(*id);
                assigned[idx] = Some(*id);
                self.reserve_ids_through(*id);
            }
        }

        // Greedy IoU matching for the rest
        for (idx, (bbox, id)) in detections.iter().enumerate() {
            if id.is_some() {
                continue;
            }

            let mut best_iou = self.iou_threshold;
            let mut best_track: Option<SubjectId> = None;

            for (&track_id, track) in &self.tracks {
                if claimed.contains(&track_id) {
                    continue;
                }
                let iou = bbox.iou(&track.bbox);
                // Ties broken by lowest id so results do not depend on map order
                if iou > best_iou
                    || (iou == best_iou && best_track.is_some_and(|best| track_id < best))
                {
                    best_iou = iou;
                    best_track = Some(track_id);
                }
            }

            let track_id = match best_track {
                Some(track_id) => track_id,
                None => {
                    let track_id = self.next_track_id;
                    self.next_track_id = self.next_track_id.saturating_add(1);
                    track_id
                }
            };

            self.touch(track_id, *bbox);
            claimed.push(track_id);
            assigned[idx] = Some(track_id);
        }

        // Age unmatched tracks
        let max_gap = self.max_gap;
        self.tracks.retain(|id, track| {
            if claimed.contains(id) {
                return true;
            }
            track.age += 1;
            track.active = false;
            track.age <= max_gap
        });

        assigned.into_iter().flatten().collect()
    }

    fn touch(&mut self, id: SubjectId, bbox: NormalizedBox) {
        self.tracks.insert(
            id,
            Track {
                bbox,
                age: 0,
                active: true,
            },
        );
    }

    /// Get the number of tracks seen in the latest frame.
    pub fn active_track_count(&self) -> usize {
        self.tracks.values().filter(|t| t.active).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anon(x: f64, y: f64) -> (NormalizedBox, Option<SubjectId>) {
        (NormalizedBox::new(x, y, 0.1, 0.1), None)
    }

    #[test]
    fn test_tracker_new_detections() {
        let mut tracker = IoUTracker::new(0.3, 10);

        let ids = tracker.update(&[anon(0.1, 0.1), anon(0.5, 0.5)]);
        assert_eq!(ids, vec![0, 1]);
        assert_eq!(tracker.active_track_count(), 2);
    }

    #[test]
    fn test_tracker_matching() {
        let mut tracker = IoUTracker::new(0.3, 10);

        let first = tracker.update(&[anon(0.10, 0.10)]);
        // Slightly moved
        let second = tracker.update(&[anon(0.11, 0.11)]);

        assert_eq!(first, second);
    }

    #[test]
    fn test_tracker_gap_handling() {
        let mut tracker = IoUTracker::new(0.3, 2);

        tracker.update(&[anon(0.1, 0.1)]);

        // Empty frames
        tracker.update(&[]);
        tracker.update(&[]);

        // Track should still exist (age = 2, max_gap = 2)
        assert_eq!(tracker.tracks.len(), 1);
        assert_eq!(tracker.active_track_count(), 0);

        tracker.update(&[]);
        assert_eq!(tracker.tracks.len(), 0);

        // Re-appearing after deletion gets a fresh id
        assert_eq!(tracker.update(&[anon(0.1, 0.1)]), vec![1]);
    }

    #[test]
    fn test_detector_ids_are_kept_and_reserved() {
        let mut tracker = IoUTracker::new(0.3, 10);

        let ids = tracker.update(&[
            (NormalizedBox::new(0.1, 0.1, 0.1, 0.1), Some(5)),
            anon(0.6, 0.6),
        ]);
        assert_eq!(ids, vec![5, 6]);
    }

    #[test]
    fn test_claimed_track_is_not_matched_twice() {
        let mut tracker = IoUTracker::new(0.3, 10);
        tracker.update(&[(NormalizedBox::new(0.1, 0.1, 0.1, 0.1), Some(2))]);

        // Detector re-reports id 2; an overlapping anonymous box must not steal it
        let ids = tracker.update(&[
            (NormalizedBox::new(0.1, 0.1, 0.1, 0.1), Some(2)),
            anon(0.1, 0.1),
        ]);
        assert_eq!(ids[0], 2);
        assert_ne!(ids[1], 2);
    }
}
