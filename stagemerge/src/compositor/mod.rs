//! Deterministic side-by-side composition of two images.
//!
//! The compositor never calls the editing service and never modifies its
//! inputs: both sources are decoded, scaled to a common height and pasted
//! onto a fresh canvas which is written to a new file.

mod layout;

pub use layout::{scaled_width, Placement, SideBySideLayout, MAX_CANVAS_PIXELS};

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use std::path::Path;

use crate::codec::{self, ImageRef, STORAGE_JPEG_QUALITY};
use crate::errors::Result;

/// Canvas fill behind the two images.
pub const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// Lays two images out next to each other on one canvas.
#[derive(Debug, Clone)]
pub struct Compositor {
    background: Rgb<u8>,
    filter: FilterType,
    quality: u8,
}

impl Default for Compositor {
    fn default() -> Self {
        Self {
            background: BACKGROUND,
            filter: FilterType::Lanczos3,
            quality: STORAGE_JPEG_QUALITY,
        }
    }
}

impl Compositor {
    /// Creates a compositor with a white background and Lanczos resampling.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the resampling filter.
    #[must_use]
    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }

    /// Sets the output JPEG quality.
    #[must_use]
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    /// Composes two in-memory images; `left` at x = 0, `right` after it.
    ///
    /// Fails without allocating when the canvas would exceed
    /// [`MAX_CANVAS_PIXELS`].
    pub fn compose_images(&self, left: &RgbImage, right: &RgbImage) -> Result<RgbImage> {
        let layout = SideBySideLayout::compute(left.dimensions(), right.dimensions())?;
        let mut canvas = RgbImage::from_pixel(layout.width, layout.height, self.background);

        for (source, placement) in [(left, layout.left), (right, layout.right)] {
            if source.dimensions() == (placement.width, layout.height) {
                imageops::replace(&mut canvas, source, i64::from(placement.x), 0);
            } else {
                let scaled = imageops::resize(source, placement.width, layout.height, self.filter);
                imageops::replace(&mut canvas, &scaled, i64::from(placement.x), 0);
            }
        }

        Ok(canvas)
    }

    /// Composes the images at `left` and `right` and writes the result to `dest`.
    ///
    /// Fails with a not-found or decode error if either source is unusable,
    /// or a too-large error if the canvas would exceed the pixel limit; in
    /// those cases nothing is written.
    pub fn compose_side_by_side(
        &self,
        left: &ImageRef,
        right: &ImageRef,
        dest: &Path,
    ) -> Result<ImageRef> {
        let left_img = codec::load_rgb(left)?;
        let right_img = codec::load_rgb(right)?;

        let canvas = self.compose_images(&left_img, &right_img)?;
        let output = codec::save_jpeg(&canvas, dest, self.quality)?;

        tracing::info!(
            left = %left,
            right = %right,
            output = %output,
            width = canvas.width(),
            height = canvas.height(),
            "Side-by-side composite written"
        );

        Ok(output)
    }

    /// Like [`compose_side_by_side`](Self::compose_side_by_side), writing to
    /// a freshly named file inside `dir`.
    ///
    /// Names are `side_by_side_<uuid-v7>.jpg`; v7 ids are time-ordered, so
    /// files sort by creation and two calls never share a name.
    pub fn compose_into_dir(&self, left: &ImageRef, right: &ImageRef, dir: &Path) -> Result<ImageRef> {
        let dest = dir.join(format!("side_by_side_{}.jpg", uuid::Uuid::now_v7()));
        self.compose_side_by_side(left, right, &dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::testing::write_test_image;
    use std::fs;

    #[test]
    fn test_compose_images_layout_and_fill() {
        let left = RgbImage::from_pixel(40, 20, Rgb([255, 0, 0]));
        let right = RgbImage::from_pixel(10, 10, Rgb([0, 0, 255]));

        let canvas = Compositor::new().compose_images(&left, &right).unwrap();

        assert_eq!(canvas.dimensions(), (60, 20));
        assert_eq!(canvas.get_pixel(0, 0), &Rgb([255, 0, 0]));
        assert_eq!(canvas.get_pixel(39, 19), &Rgb([255, 0, 0]));
        let scaled = canvas.get_pixel(50, 10);
        assert!(scaled[0] < 5 && scaled[2] > 250);
    }

    #[test]
    fn test_compose_side_by_side_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_test_image(&dir.path().join("a.png"), 120, 90, [200, 10, 10]);
        let b = write_test_image(&dir.path().join("b.png"), 30, 60, [10, 10, 200]);

        let out = Compositor::new()
            .compose_side_by_side(&a, &b, &dir.path().join("composite.jpg"))
            .unwrap();

        // Height 90; a stays 120 wide, b scales to 30 * 90 / 60 = 45.
        assert_eq!(codec::dimensions(&out).unwrap(), (165, 90));
    }

    #[test]
    fn test_compose_is_non_destructive() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_test_image(&dir.path().join("a.png"), 64, 48, [1, 2, 3]);
        let b = write_test_image(&dir.path().join("b.png"), 48, 64, [4, 5, 6]);
        let a_before = fs::read(a.path()).unwrap();
        let b_before = fs::read(b.path()).unwrap();

        let out = Compositor::new().compose_into_dir(&a, &b, dir.path()).unwrap();

        assert_ne!(&out, &a);
        assert_ne!(&out, &b);
        assert_eq!(fs::read(a.path()).unwrap(), a_before);
        assert_eq!(fs::read(b.path()).unwrap(), b_before);
    }

    #[test]
    fn test_compose_into_dir_allocates_fresh_names() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_test_image(&dir.path().join("a.png"), 8, 8, [0, 0, 0]);
        let b = write_test_image(&dir.path().join("b.png"), 8, 8, [9, 9, 9]);
        let compositor = Compositor::new();

        let first = compositor.compose_into_dir(&a, &b, dir.path()).unwrap();
        let second = compositor.compose_into_dir(&a, &b, dir.path()).unwrap();

        assert_ne!(first, second);
        assert!(first.exists() && second.exists());
    }

    #[test]
    fn test_missing_source_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_test_image(&dir.path().join("a.png"), 8, 8, [0, 0, 0]);
        let dest = dir.path().join("out.jpg");

        let err = Compositor::new()
            .compose_side_by_side(&a, &ImageRef::new(dir.path().join("nope.png")), &dest)
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(!dest.exists());
    }

    #[test]
    fn test_undecodable_source() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_test_image(&dir.path().join("a.png"), 8, 8, [0, 0, 0]);
        let bad = dir.path().join("bad.jpg");
        fs::write(&bad, b"\x00\x01\x02").unwrap();

        let err = Compositor::new()
            .compose_side_by_side(&ImageRef::new(&bad), &a, &dir.path().join("out.jpg"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn test_extreme_aspect_ratio_fails_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let strip = write_test_image(&dir.path().join("strip.png"), 100_000, 1, [0, 0, 0]);
        let pole = write_test_image(&dir.path().join("pole.png"), 1, 50_000, [255, 255, 255]);
        let dest = dir.path().join("out.jpg");

        let err = Compositor::new()
            .compose_side_by_side(&strip, &pole, &dest)
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::TooLarge);
        assert!(!dest.exists());
    }
}
