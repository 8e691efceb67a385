//! Mode Selector - partitions the frame range into TRACK and GENERAL segments.
//!
//! Decision pipeline:
//!
//! 1. **Per-frame dominance**: the single speaking subject, else the only
//!    subject, else the top-ranked subject if it beats the runner-up by more
//!    than `dominance_tolerance`, else nobody.
//! 2. **Window verdict**: a window centered on each frame (clipped at the
//!    stream edges) votes TRACK(id) when one id dominates a strict majority
//!    of its frames at close-up size, GENERAL otherwise.
//! 3. **Hysteresis**: a new verdict must hold for `mode_window_frames`
//!    consecutive frames (`speaker_dwell_frames` for a speaker handoff)
//!    before a boundary is placed at the start of that run.
//! 4. **Detection loss**: absences of the tracked subject longer than
//!    `detection_gap_tolerance` are carved out as GENERAL; TRACK leftovers
//!    shorter than the mode window are folded into them.
//! 5. **Merge and validate**: neighbours with the same mode and subject are
//!    merged; the result must partition the input exactly.

use tracing::debug;
use vclip_models::{FrameDetection, FrameIndex, Segment, SegmentKind, SegmentReason, SubjectId};

use crate::config::ReframeConfig;
use crate::error::{ReframeError, ReframeResult};
use crate::subject_resolver::rank_subjects;

/// Who, if anyone, dominates a single frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameDominance {
    /// No subjects.
    Empty,
    /// Several subjects, none clearly ahead.
    Contested,
    /// One subject dominates.
    Dominant {
        subject_id: SubjectId,
        reason: SegmentReason,
        /// Box height of the dominant subject
        height: f64,
    },
}

/// Decide dominance for one frame.
pub fn frame_dominance(frame: &FrameDetection, tolerance: f64) -> FrameDominance {
    let dominant = |subject_id, reason, height| FrameDominance::Dominant {
        subject_id,
        reason,
        height,
    };

    match frame.subjects.as_slice() {
        [] => FrameDominance::Empty,
        [only] => dominant(only.track_id, SegmentReason::SingleSubject, only.bbox.height),
        subjects => {
            let mut speaking = subjects.iter().filter(|s| s.is_speaking);
            if let (Some(speaker), None) = (speaking.next(), speaking.next()) {
                return dominant(speaker.track_id, SegmentReason::ActiveSpeaker, speaker.bbox.height);
            }

            let ranked = rank_subjects(subjects);
            let [top, runner_up, ..] = ranked.as_slice() else {
                return FrameDominance::Empty;
            };

            if top.confidence - runner_up.confidence > tolerance {
                dominant(top.track_id, SegmentReason::DominantSubject, top.bbox.height)
            } else {
                FrameDominance::Contested
            }
        }
    }
}

/// Window-level vote for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Track(SubjectId),
    General,
}

impl Verdict {
    fn kind(self) -> SegmentKind {
        match self {
            Verdict::Track(subject_id) => SegmentKind::Track { subject_id },
            Verdict::General => SegmentKind::General,
        }
    }
}

/// A segment in stream positions (0-based offsets into the input).
#[derive(Debug, Clone, Copy)]
struct Span {
    start: usize,
    end: usize,
    kind: SegmentKind,
    reason: SegmentReason,
}

/// Partitions a detection stream into segments.
#[derive(Debug, Clone)]
pub struct ModeSelector {
    window: usize,
    dwell: usize,
    gap_tolerance: usize,
    dominance_tolerance: f64,
    min_closeup_height: f64,
}

impl ModeSelector {
    pub fn new(config: &ReframeConfig) -> Self {
        Self {
            window: config.mode_window_frames.max(1) as usize,
            dwell: config.speaker_dwell_frames.max(1) as usize,
            gap_tolerance: config.detection_gap_tolerance as usize,
            dominance_tolerance: config.dominance_tolerance,
            min_closeup_height: config.min_closeup_height,
        }
    }

    /// Segment the whole stream.
    ///
    /// `frames` must already be contiguous. An empty stream yields no segments.
    pub fn select(&self, frames: &[FrameDetection]) -> ReframeResult<Vec<Segment>> {
        let Some(first) = frames.first() else {
            return Ok(Vec::new());
        };
        let base = first.frame_index;

        let dominance: Vec<FrameDominance> = frames
            .iter()
            .map(|f| frame_dominance(f, self.dominance_tolerance))
            .collect();

        let verdicts = self.window_verdicts(&dominance);
        let spans = self.apply_hysteresis(&verdicts);
        let spans = self.carve_detection_loss(&spans, frames);
        let spans = merge_spans(spans);

        let segments: Vec<Segment> = spans
            .iter()
            .map(|span| {
                let reason = match span.reason {
                    SegmentReason::DetectionLoss => SegmentReason::DetectionLoss,
                    _ => self.segment_reason(span.kind, &dominance[span.start..span.end]),
                };
                Segment::new(
                    base + span.start as FrameIndex,
                    base + span.end as FrameIndex,
                    span.kind,
                    reason,
                )
            })
            .collect();

        validate_partition(&segments, base, base + frames.len() as FrameIndex)?;

        for segment in &segments {
            debug!(
                start = segment.start,
                end = segment.end,
                kind = %segment.kind,
                reason = ?segment.reason,
                "Segment selected"
            );
        }

        Ok(segments)
    }

    /// Centered-window vote for every frame.
    fn window_verdicts(&self, dominance: &[FrameDominance]) -> Vec<Verdict> {
        let n = dominance.len();
        let half = self.window / 2;

        (0..n)
            .map(|pos| {
                let lo = pos.saturating_sub(half);
                let hi = (pos + self.window - half).min(n);
                self.vote(&dominance[lo..hi])
            })
            .collect()
    }

    fn vote(&self, window: &[FrameDominance]) -> Verdict {
        // (id, frames dominated, summed height)
        let mut tally: Vec<(SubjectId, usize, f64)> = Vec::new();

        for frame in window {
            if let FrameDominance::Dominant {
                subject_id, height, ..
            } = *frame
            {
                match tally.iter_mut().find(|(id, _, _)| *id == subject_id) {
                    Some(entry) => {
                        entry.1 += 1;
                        entry.2 += height;
                    }
                    None => tally.push((subject_id, 1, height)),
                }
            }
        }

        let leader = tally
            .iter()
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)));

        match leader {
            Some(&(id, count, height_sum))
                if count * 2 > window.len()
                    && height_sum / count as f64 >= self.min_closeup_height =>
            {
                Verdict::Track(id)
            }
            _ => Verdict::General,
        }
    }

    /// Place boundaries only where a new verdict persists long enough.
    fn apply_hysteresis(&self, verdicts: &[Verdict]) -> Vec<Span> {
        let mut spans = Vec::new();
        let Some(&initial) = verdicts.first() else {
            return spans;
        };

        let mut current = initial;
        let mut current_start = 0;
        let mut pending: Option<(Verdict, usize)> = None;

        for (pos, &verdict) in verdicts.iter().enumerate().skip(1) {
            if verdict == current {
                pending = None;
                continue;
            }

            let (candidate, run_start) = match pending {
                Some((candidate, run_start)) if candidate == verdict => (candidate, run_start),
                _ => (verdict, pos),
            };
            pending = Some((candidate, run_start));

            let required = match (current, candidate) {
                (Verdict::Track(_), Verdict::Track(_)) => self.dwell,
                _ => self.window,
            };

            if pos + 1 - run_start >= required {
                spans.push(Span {
                    start: current_start,
                    end: run_start,
                    kind: current.kind(),
                    reason: SegmentReason::SingleSubject,
                });
                current = candidate;
                current_start = run_start;
                pending = None;
            }
        }

        spans.push(Span {
            start: current_start,
            end: verdicts.len(),
            kind: current.kind(),
            reason: SegmentReason::SingleSubject,
        });

        spans
    }

    /// Split TRACK spans where their subject is missing for too long.
    ///
    /// TRACK pieces left over by a cut that are shorter than the mode window
    /// fold into the surrounding detection-loss framing, so a cut never
    /// produces a mode change that hysteresis would have rejected.
    fn carve_detection_loss(&self, spans: &[Span], frames: &[FrameDetection]) -> Vec<Span> {
        let mut out = Vec::with_capacity(spans.len());

        for span in spans {
            let SegmentKind::Track { subject_id } = span.kind else {
                out.push(*span);
                continue;
            };

            let lost = |start, end| Span {
                start,
                end,
                kind: SegmentKind::General,
                reason: SegmentReason::DetectionLoss,
            };

            let mut pieces = Vec::new();
            let mut piece_start = span.start;
            let mut pos = span.start;

            while pos < span.end {
                if frames[pos].subject(subject_id).is_some() {
                    pos += 1;
                    continue;
                }

                let gap_start = pos;
                while pos < span.end && frames[pos].subject(subject_id).is_none() {
                    pos += 1;
                }

                if pos - gap_start > self.gap_tolerance {
                    debug!(
                        subject_id,
                        from = frames[gap_start].frame_index,
                        frames = pos - gap_start,
                        "Tracked subject lost"
                    );
                    if gap_start > piece_start {
                        pieces.push(Span {
                            start: piece_start,
                            end: gap_start,
                            ..*span
                        });
                    }
                    pieces.push(lost(gap_start, pos));
                    piece_start = pos;
                }
            }

            if piece_start < span.end {
                let seen = frames[piece_start..span.end]
                    .iter()
                    .any(|f| f.subject(subject_id).is_some());
                if seen {
                    pieces.push(Span {
                        start: piece_start,
                        end: span.end,
                        ..*span
                    });
                } else {
                    pieces.push(lost(piece_start, span.end));
                }
            }

            let was_cut = pieces
                .iter()
                .any(|p| p.reason == SegmentReason::DetectionLoss);
            for piece in pieces {
                let short_track = matches!(piece.kind, SegmentKind::Track { .. })
                    && piece.end - piece.start < self.window;
                if was_cut && short_track {
                    debug!(
                        subject_id,
                        from = frames[piece.start].frame_index,
                        frames = piece.end - piece.start,
                        "Folding short reacquisition into detection loss"
                    );
                    out.push(lost(piece.start, piece.end));
                } else {
                    out.push(piece);
                }
            }
        }

        out
    }

    /// Most frequent per-frame explanation for a segment's mode.
    fn segment_reason(&self, kind: SegmentKind, dominance: &[FrameDominance]) -> SegmentReason {
        let candidates: &[SegmentReason] = match kind {
            SegmentKind::Track { .. } => &[
                SegmentReason::ActiveSpeaker,
                SegmentReason::SingleSubject,
                SegmentReason::DominantSubject,
            ],
            SegmentKind::General => &[
                SegmentReason::NoSubjects,
                SegmentReason::NoDominantSubject,
                SegmentReason::WideShot,
            ],
        };

        let reason_of = |frame: &FrameDominance| -> Option<SegmentReason> {
            match (kind, *frame) {
                (
                    SegmentKind::Track { subject_id },
                    FrameDominance::Dominant {
                        subject_id: id,
                        reason,
                        ..
                    },
                ) if id == subject_id => Some(reason),
                (SegmentKind::Track { .. }, _) => None,
                (SegmentKind::General, FrameDominance::Empty) => Some(SegmentReason::NoSubjects),
                (SegmentKind::General, FrameDominance::Contested) => {
                    Some(SegmentReason::NoDominantSubject)
                }
                (SegmentKind::General, FrameDominance::Dominant { height, .. }) => {
                    if height < self.min_closeup_height {
                        Some(SegmentReason::WideShot)
                    } else {
                        Some(SegmentReason::NoDominantSubject)
                    }
                }
            }
        };

        let mut counts = vec![0usize; candidates.len()];
        for frame in dominance {
            if let Some(reason) = reason_of(frame) {
                if let Some(idx) = candidates.iter().position(|c| *c == reason) {
                    counts[idx] += 1;
                }
            }
        }

        // First candidate wins ties
        let mut best = 0;
        for (idx, &count) in counts.iter().enumerate() {
            if count > counts[best] {
                best = idx;
            }
        }
        candidates[best]
    }
}

/// Merge neighbours sharing mode and subject; the longer part names the reason.
fn merge_spans(spans: Vec<Span>) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::with_capacity(spans.len());

    for span in spans {
        match merged.last_mut() {
            Some(last) if last.kind == span.kind && last.end == span.start => {
                if span.end - span.start > last.end - last.start {
                    last.reason = span.reason;
                }
                last.end = span.end;
            }
            _ => merged.push(span),
        }
    }

    merged
}

/// Check that `segments` partition `[start, end)` with no gaps or overlaps.
pub fn validate_partition(segments: &[Segment], start: FrameIndex, end: FrameIndex) -> ReframeResult<()> {
    let mut expected = start;

    for segment in segments {
        if segment.is_empty() || segment.start != expected {
            return Err(ReframeError::degenerate_segment(segment.start, segment.end));
        }
        expected = segment.end;
    }

    if expected != end {
        return Err(ReframeError::degenerate_segment(expected, end));
    }

    Ok(())
}
