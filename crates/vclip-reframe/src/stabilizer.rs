//! Heavy Tripod stabilizer.
//!
//! Turns a jittery target sequence into deliberate camera motion. Each of
//! cx, cy and scale is filtered independently:
//!
//! 1. `delta = target - previous`
//! 2. `delta` clamped to `±max_velocity`
//! 3. `next = previous + clamped * smoothing_factor`
//!
//! The per-frame step is therefore bounded by `max_velocity * smoothing_factor`.
//! The filter is reinitialized on the first target of every segment and
//! holds its state on unobserved targets.

use serde::{Deserialize, Serialize};
use vclip_models::FrameIndex;

use crate::config::ReframeConfig;
use crate::framing::TargetPoint;

/// Filter state for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmoothedState {
    pub frame_index: FrameIndex,
    /// Smoothed center x (fraction of source width)
    pub cx: f64,
    /// Smoothed center y (fraction of source height)
    pub cy: f64,
    /// Smoothed scale
    pub scale: f64,
    /// Change in cx since the previous frame
    pub vx: f64,
    /// Change in cy since the previous frame
    pub vy: f64,
    /// Change in scale since the previous frame
    pub vscale: f64,
}

impl SmoothedState {
    /// State sitting exactly on `target` with zero velocity.
    pub fn at(target: &TargetPoint) -> Self {
        Self {
            frame_index: target.frame_index,
            cx: target.cx,
            cy: target.cy,
            scale: target.scale,
            vx: 0.0,
            vy: 0.0,
            vscale: 0.0,
        }
    }

    /// Center displacement since the previous frame.
    pub fn speed(&self) -> f64 {
        self.vx.hypot(self.vy)
    }

    fn held(&self, frame_index: FrameIndex) -> Self {
        Self {
            frame_index,
            vx: 0.0,
            vy: 0.0,
            vscale: 0.0,
            ..*self
        }
    }
}

/// Exponential smoother with velocity clamp and optional dead-zone lock.
#[derive(Debug, Clone)]
pub struct HeavyTripod {
    smoothing_factor: f64,
    max_velocity: f64,
    settle_epsilon: f64,
    dead_zone: f64,
    lock_threshold: f64,
    locking: bool,
    state: Option<SmoothedState>,
    locked: bool,
}

impl HeavyTripod {
    pub fn new(config: &ReframeConfig) -> Self {
        Self {
            smoothing_factor: config.track_smoothing_factor,
            max_velocity: config.max_velocity,
            // Snapping must never move further than the clamp allows
            settle_epsilon: config.settle_epsilon.min(config.max_velocity),
            dead_zone: config.dead_zone,
            lock_threshold: config.lock_threshold,
            locking: config.locking_enabled(),
            state: None,
            locked: false,
        }
    }

    /// Current state, if the filter has been initialized.
    pub fn state(&self) -> Option<&SmoothedState> {
        self.state.as_ref()
    }

    /// Jump straight to `target` (segment boundary).
    pub fn reset(&mut self, target: &TargetPoint) -> SmoothedState {
        let state = SmoothedState::at(target);
        self.state = Some(state);
        self.locked = self.locking;
        state
    }

    /// Drop all state.
    pub fn clear(&mut self) {
        self.state = None;
        self.locked = false;
    }

    /// Advance one frame toward `target`.
    pub fn update(&mut self, target: &TargetPoint) -> SmoothedState {
        let Some(prev) = self.state else {
            return self.reset(target);
        };

        if !target.observed {
            return self.hold(target.frame_index);
        }

        if self.locking {
            let distance = (target.cx - prev.cx).hypot(target.cy - prev.cy);
            let scale_drift = (target.scale - prev.scale).abs();

            if self.locked {
                if distance <= self.lock_threshold && scale_drift <= self.lock_threshold {
                    return self.hold(target.frame_index);
                }
                self.locked = false;
            }
        }

        let cx = self.step(prev.cx, target.cx);
        let cy = self.step(prev.cy, target.cy);
        let scale = self.step(prev.scale, target.scale);

        let next = SmoothedState {
            frame_index: target.frame_index,
            cx,
            cy,
            scale,
            vx: cx - prev.cx,
            vy: cy - prev.cy,
            vscale: scale - prev.scale,
        };

        if self.locking {
            let remaining = (target.cx - cx).hypot(target.cy - cy);
            if remaining < self.dead_zone {
                self.locked = true;
            }
        }

        self.state = Some(next);
        next
    }

    /// Keep the previous position for `frame_index`, with zero velocity.
    pub fn hold(&mut self, frame_index: FrameIndex) -> SmoothedState {
        match self.state {
            Some(prev) => {
                let held = prev.held(frame_index);
                self.state = Some(held);
                held
            }
            None => {
                let wide = SmoothedState::at(&TargetPoint::wide(frame_index));
                self.state = Some(wide);
                wide
            }
        }
    }

    #[cfg(test)]
    fn is_locked(&self) -> bool {
        self.locked
    }

    fn step(&self, prev: f64, target: f64) -> f64 {
        let delta = target - prev;
        if delta.abs() <= self.settle_epsilon {
            return target;
        }
        let clamped = delta.clamp(-self.max_velocity, self.max_velocity);
        prev + clamped * self.smoothing_factor
    }
}
