//! Crop Emitter - maps smoothed camera states to pixel crop rectangles.
//!
//! Rectangles keep the output aspect ratio and always lie inside the source.
//! A center near an edge shifts the rectangle; the size only shrinks when
//! the source itself is too small for the requested crop.

use vclip_models::{AspectRatio, CropFrame, CropLayout, CropRect, CroppingMode, SourceGeometry};

use crate::stabilizer::SmoothedState;

/// Converts [`SmoothedState`]s into [`CropFrame`]s for one source geometry.
#[derive(Debug, Clone)]
pub struct CropEmitter {
    source: SourceGeometry,
    aspect: f64,
    /// Largest crop in pixels
    max_crop: (f64, f64),
    /// Output narrower than source: height drives the size
    height_driven: bool,
}

impl CropEmitter {
    pub fn new(source: SourceGeometry, aspect: &AspectRatio) -> Self {
        Self {
            source,
            aspect: aspect.as_f64(),
            max_crop: source.max_crop_size(aspect),
            height_driven: aspect.as_f64() <= source.aspect(),
        }
    }

    /// Crop for one frame. Total: every state yields exactly one frame.
    pub fn emit(&self, state: &SmoothedState, mode: CroppingMode) -> CropFrame {
        CropFrame {
            frame_index: state.frame_index,
            rect: self.rect_for(state.cx, state.cy, state.scale),
            mode,
            layout: CropLayout::from(mode),
        }
    }

    /// Rectangle of the given scale centered as close to (cx, cy) as bounds allow.
    pub fn rect_for(&self, cx: f64, cy: f64, scale: f64) -> CropRect {
        let (width, height) = self.size_for(scale);

        let src_w = self.source.width as f64;
        let src_h = self.source.height as f64;

        let left = shift_into(cx * src_w - width as f64 / 2.0, self.source.width.saturating_sub(width));
        let top = shift_into(cy * src_h - height as f64 / 2.0, self.source.height.saturating_sub(height));

        CropRect::new(left, top, width, height)
    }

    /// Even pixel dimensions for `scale`, never larger than the source.
    fn size_for(&self, scale: f64) -> (u32, u32) {
        let scale = if scale.is_finite() { scale.clamp(f64::EPSILON, 1.0) } else { 1.0 };
        let max_w = make_even(self.source.width).max(2);
        let max_h = make_even(self.source.height).max(2);

        if self.height_driven {
            let height = even_px(self.max_crop.1 * scale).clamp(2, max_h);
            let width = even_px(height as f64 * self.aspect).clamp(2, max_w);
            (width, height)
        } else {
            let width = even_px(self.max_crop.0 * scale).clamp(2, max_w);
            let height = even_px(width as f64 / self.aspect).clamp(2, max_h);
            (width, height)
        }
    }
}

/// Clamp a desired offset into `[0, max]`.
fn shift_into(offset: f64, max: u32) -> u32 {
    if !offset.is_finite() {
        return max / 2;
    }
    offset.round().clamp(0.0, max as f64) as u32
}

/// Round to the nearest pixel, then down to even (required by video codecs).
fn even_px(value: f64) -> u32 {
    make_even(value.round().max(0.0) as u32)
}

/// Make a value even, rounding down.
#[inline]
pub fn make_even(value: u32) -> u32 {
    (value / 2) * 2
}
