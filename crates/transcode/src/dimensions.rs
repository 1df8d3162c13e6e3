//! Pixel dimensions and the two-stage bounding policy.

use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;

/// Width and height in pixels, both at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    /// Build from raw values, clamping zero to one pixel.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Apply the bounding policy.
    ///
    /// The width bound is applied first: when the width exceeds it, the height
    /// is scaled by the same factor and the width is clamped. The height bound
    /// is then checked against the possibly already-scaled height and, when
    /// exceeded, the width is scaled and the height clamped. The order matters
    /// for non-square sources and must not be collapsed into a single
    /// max-dimension clamp.
    pub fn fit_within(self, max_width: Option<NonZeroU32>, max_height: Option<NonZeroU32>) -> Self {
        let (mut width, mut height) = (self.width, self.height);

        if let Some(max_w) = max_width.map(NonZeroU32::get).filter(|&max_w| width > max_w) {
            height = scale(height, max_w, width);
            width = max_w;
        }

        if let Some(max_h) = max_height.map(NonZeroU32::get).filter(|&max_h| height > max_h) {
            width = scale(width, max_h, height);
            height = max_h;
        }

        Self::new(width, height)
    }

    /// Companion height for a requested width with the aspect ratio locked.
    pub fn lock_to_width(self, width: NonZeroU32) -> Self {
        let width = width.get();
        Self::new(width, scale(self.height, width, self.width))
    }

    /// Companion width for a requested height with the aspect ratio locked.
    pub fn lock_to_height(self, height: NonZeroU32) -> Self {
        let height = height.get();
        Self::new(scale(self.width, height, self.height), height)
    }
}

impl From<(u32, u32)> for Dimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(width, height)
    }
}

/// `round(value * numerator / denominator)`, never below one pixel.
fn scale(value: u32, numerator: u32, denominator: u32) -> u32 {
    let scaled = (value as f64 * numerator as f64 / denominator.max(1) as f64).round();
    (scaled as u32).max(1)
}
