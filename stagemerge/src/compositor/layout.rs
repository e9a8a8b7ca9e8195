//! Pure geometry for side-by-side composition.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, StagemergeError};

/// Largest canvas, in pixels, a composite may allocate (about 300 MB as RGB8).
pub const MAX_CANVAS_PIXELS: u64 = 100_000_000;

/// Horizontal placement of one source on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    /// Horizontal offset of the left edge.
    pub x: u32,
    /// Width after scaling to the canvas height.
    pub width: u32,
}

/// Canvas geometry for two images placed side by side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideBySideLayout {
    /// Canvas width (sum of both scaled widths).
    pub width: u32,
    /// Canvas height (the taller source's height).
    pub height: u32,
    /// Placement of the first image.
    pub left: Placement,
    /// Placement of the second image.
    pub right: Placement,
}

impl SideBySideLayout {
    /// Computes the layout for sources of the given `(width, height)`.
    ///
    /// Both sources are scaled to the taller height, keeping their own
    /// aspect ratio; scaled widths are truncated and never below one pixel.
    /// Fails with [`StagemergeError::CanvasTooLarge`] when the canvas would
    /// exceed [`MAX_CANVAS_PIXELS`].
    pub fn compute(left: (u32, u32), right: (u32, u32)) -> Result<Self> {
        let height = left.1.max(right.1).max(1);
        let left_width = scaled_width(left, height);
        let right_width = scaled_width(right, height);

        let total = u64::from(left_width) + u64::from(right_width);
        let width = u32::try_from(total)
            .ok()
            .filter(|w| u64::from(*w) * u64::from(height) <= MAX_CANVAS_PIXELS)
            .ok_or(StagemergeError::CanvasTooLarge {
                width: total,
                height,
                max_pixels: MAX_CANVAS_PIXELS,
            })?;

        Ok(Self {
            width,
            height,
            left: Placement {
                x: 0,
                width: left_width,
            },
            right: Placement {
                x: left_width,
                width: right_width,
            },
        })
    }
}

/// Width of a `(width, height)` source scaled to `target_height`.
#[must_use]
pub fn scaled_width((width, height): (u32, u32), target_height: u32) -> u32 {
    if height == 0 {
        return width.max(1);
    }
    let scaled = u64::from(width) * u64::from(target_height) / u64::from(height);
    u32::try_from(scaled).unwrap_or(u32::MAX).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn test_equal_heights_keep_widths() {
        let layout = SideBySideLayout::compute((400, 300), (200, 300)).unwrap();
        assert_eq!(layout.height, 300);
        assert_eq!(layout.left, Placement { x: 0, width: 400 });
        assert_eq!(layout.right, Placement { x: 400, width: 200 });
        assert_eq!(layout.width, 600);
    }

    #[test]
    fn test_shorter_image_is_upscaled() {
        // 1024x768 scene next to a 300x400 portrait.
        let layout = SideBySideLayout::compute((1024, 768), (300, 400)).unwrap();
        assert_eq!(layout.height, 768);
        assert_eq!(layout.left.width, 1024);
        assert_eq!(layout.right.width, 576);
        assert_eq!(layout.right.x, 1024);
        assert_eq!(layout.width, 1600);
    }

    #[test]
    fn test_left_can_be_the_shorter_one() {
        let layout = SideBySideLayout::compute((100, 50), (80, 200)).unwrap();
        assert_eq!(layout.height, 200);
        assert_eq!(layout.left.width, 400);
        assert_eq!(layout.right, Placement { x: 400, width: 80 });
    }

    #[test]
    fn test_widths_are_truncated() {
        // 333 * 100 / 99 = 336.36...
        assert_eq!(scaled_width((333, 99), 100), 336);
    }

    #[test]
    fn test_width_never_collapses_to_zero() {
        assert_eq!(scaled_width((1, 1000), 10), 1);
    }

    #[test]
    fn test_height_is_max_for_many_shapes() {
        let shapes = [(1, 1), (640, 480), (480, 640), (3000, 17), (17, 3000), (999, 998)];
        for a in shapes {
            for b in shapes {
                let layout = SideBySideLayout::compute(a, b).unwrap();
                assert_eq!(layout.height, a.1.max(b.1));
                assert_eq!(layout.width, layout.left.width + layout.right.width);
                assert_eq!(layout.right.x, layout.left.width);

                let exact_left = f64::from(a.0) * f64::from(layout.height) / f64::from(a.1);
                assert!((exact_left - f64::from(layout.left.width)).abs() <= 1.0);
            }
        }
    }

    #[test]
    fn test_extreme_aspect_ratios_are_rejected() {
        // The wide strip scales to 100000 * 50000 pixels, past u32.
        let err = SideBySideLayout::compute((100_000, 1), (1, 50_000)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TooLarge);
        assert!(matches!(
            err,
            StagemergeError::CanvasTooLarge { width, height: 50_000, .. } if width > u64::from(u32::MAX)
        ));
    }

    #[test]
    fn test_canvas_over_pixel_budget_is_rejected() {
        let err = SideBySideLayout::compute((20_000, 10_000), (20_000, 10_000)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TooLarge);

        let at_limit = SideBySideLayout::compute((5_000, 10_000), (5_000, 10_000)).unwrap();
        assert_eq!(u64::from(at_limit.width) * u64::from(at_limit.height), MAX_CANVAS_PIXELS);
    }
}
