//! Crop stream types consumed by the rendering stage.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::detection::FrameIndex;
use crate::segment::CroppingMode;

/// Output aspect ratio specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    /// Standard portrait (9:16) for TikTok/Reels/Shorts
    pub const PORTRAIT: AspectRatio = AspectRatio {
        width: 9,
        height: 16,
    };

    /// Square (1:1)
    pub const SQUARE: AspectRatio = AspectRatio {
        width: 1,
        height: 1,
    };

    /// Instagram portrait (4:5)
    pub const INSTAGRAM_PORTRAIT: AspectRatio = AspectRatio {
        width: 4,
        height: 5,
    };

    /// Create a new aspect ratio.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns width / height.
    pub fn as_f64(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

impl FromStr for AspectRatio {
    type Err = AspectRatioParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| AspectRatioParseError::InvalidFormat(s.to_string()))?;

        let width = w
            .trim()
            .parse()
            .map_err(|_| AspectRatioParseError::InvalidNumber(w.to_string()))?;
        let height = h
            .trim()
            .parse()
            .map_err(|_| AspectRatioParseError::InvalidNumber(h.to_string()))?;

        if width == 0 || height == 0 {
            return Err(AspectRatioParseError::ZeroValue);
        }

        Ok(AspectRatio { width, height })
    }
}

impl Default for AspectRatio {
    fn default() -> Self {
        Self::PORTRAIT
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AspectRatioParseError {
    #[error("Invalid aspect ratio format: {0}, expected 'W:H'")]
    InvalidFormat(String),
    #[error("Invalid number in aspect ratio: {0}")]
    InvalidNumber(String),
    #[error("Aspect ratio cannot have zero values")]
    ZeroValue,
}

/// Pixel dimensions of the source video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct SourceGeometry {
    pub width: u32,
    pub height: u32,
}

impl SourceGeometry {
    /// Create source geometry.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// 1920x1080 landscape.
    pub const FULL_HD: SourceGeometry = SourceGeometry::new(1920, 1080);

    /// Source width / height.
    pub fn aspect(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// Largest rectangle of `ratio` that fits the source, in pixels.
    pub fn max_crop_size(&self, ratio: &AspectRatio) -> (f64, f64) {
        let w = self.width as f64;
        let h = self.height as f64;
        let target = ratio.as_f64();

        if target <= self.aspect() {
            // Narrower than source: full height
            (h * target, h)
        } else {
            // Wider than source: full width
            (w, w / target)
        }
    }
}

/// Pixel-space crop rectangle inside the source frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct CropRect {
    /// Left edge
    pub left: u32,
    /// Top edge
    pub top: u32,
    /// Width (even)
    pub width: u32,
    /// Height (even)
    pub height: u32,
}

impl CropRect {
    /// Create a crop rectangle.
    pub const fn new(left: u32, top: u32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Right edge (exclusive).
    pub fn right(&self) -> u32 {
        self.left + self.width
    }

    /// Bottom edge (exclusive).
    pub fn bottom(&self) -> u32 {
        self.top + self.height
    }

    /// Center in pixels.
    pub fn center(&self) -> (f64, f64) {
        (
            self.left as f64 + self.width as f64 / 2.0,
            self.top as f64 + self.height as f64 / 2.0,
        )
    }

    /// Width / height.
    pub fn aspect(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// True when the rectangle lies entirely inside the source frame.
    pub fn fits_within(&self, source: &SourceGeometry) -> bool {
        self.width > 0
            && self.height > 0
            && self.right() <= source.width
            && self.bottom() <= source.height
    }

    /// FFmpeg `crop` filter expression for this rectangle.
    pub fn to_ffmpeg_filter(&self) -> String {
        format!("crop={}:{}:{}:{}", self.width, self.height, self.left, self.top)
    }
}

/// How the renderer should lay the crop out on the output canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CropLayout {
    /// Scale the crop to fill the output.
    Fill,
    /// Composite the crop over a blurred full-frame background.
    BlurredPad,
}

impl From<CroppingMode> for CropLayout {
    fn from(mode: CroppingMode) -> Self {
        match mode {
            CroppingMode::Track => CropLayout::Fill,
            CroppingMode::General => CropLayout::BlurredPad,
        }
    }
}

/// One entry of the crop stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CropFrame {
    /// Source frame index
    pub frame_index: FrameIndex,
    /// Crop rectangle
    pub rect: CropRect,
    /// Mode of the segment this frame belongs to
    pub mode: CroppingMode,
    /// Rendering layout
    pub layout: CropLayout,
}
