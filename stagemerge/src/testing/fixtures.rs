//! Image fixtures.

use image::{Rgb, RgbImage};
use std::path::Path;

use crate::codec::{self, ImageRef};

/// Writes a solid-colour image to `path`; the format follows the extension.
///
/// # Panics
///
/// Panics if the image cannot be written. Intended for tests only.
#[allow(clippy::expect_used)]
pub fn write_test_image(path: &Path, width: u32, height: u32, rgb: [u8; 3]) -> ImageRef {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create fixture directory");
    }
    RgbImage::from_pixel(width, height, Rgb(rgb))
        .save(path)
        .expect("write fixture image");
    ImageRef::new(path)
}

/// JPEG bytes of a solid-colour image.
///
/// # Panics
///
/// Panics if encoding fails. Intended for tests only.
#[allow(clippy::expect_used)]
#[must_use]
pub fn solid_image_bytes(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb(rgb));
    codec::encode_jpeg(&image, codec::STORAGE_JPEG_QUALITY).expect("encode fixture image")
}
