//! Image loading, normalization and transport encoding.
//!
//! Every image that leaves this crate, whether sent to the editing service
//! or written to storage, is first normalized to 8-bit RGB (no palette, no
//! alpha) and encoded as JPEG.

mod image_ref;

pub use image_ref::ImageRef;

use base64::{engine::general_purpose::STANDARD, Engine};
use image::codecs::jpeg::JpegEncoder;
use image::{ImageReader, RgbImage};
use std::fs;
use std::io::Cursor;
use std::path::Path;

use crate::errors::{Result, StagemergeError};

/// JPEG quality used for images sent to the editing service.
pub const TRANSPORT_JPEG_QUALITY: u8 = 75;

/// JPEG quality used for images written by the compositor.
pub const STORAGE_JPEG_QUALITY: u8 = 95;

/// Loads an image from storage and normalizes it to RGB8.
///
/// The format is sniffed from the content, so a file whose extension lies
/// about its format still decodes.
pub fn load_rgb(image: &ImageRef) -> Result<RgbImage> {
    image.ensure_readable()?;

    let reader = ImageReader::open(image.path())
        .map_err(|e| read_error(image.path(), e))?
        .with_guessed_format()
        .map_err(|e| read_error(image.path(), e))?;

    let decoded = reader
        .decode()
        .map_err(|e| StagemergeError::decode(image.path(), e))?;

    Ok(decoded.to_rgb8())
}

/// Reads the pixel dimensions of a stored image without a full decode.
pub fn dimensions(image: &ImageRef) -> Result<(u32, u32)> {
    image.ensure_readable()?;
    image::image_dimensions(image.path()).map_err(|e| StagemergeError::decode(image.path(), e))
}

/// Encodes an RGB image as JPEG bytes.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    encoder
        .encode_image(image)
        .map_err(|e| StagemergeError::Encode(e.to_string()))?;
    Ok(buf.into_inner())
}

/// Produces the transport string for a stored image.
///
/// The image is decoded, normalized to RGB8, re-encoded as JPEG and
/// base64-encoded (standard alphabet, padded). The same input file always
/// yields the same string.
pub fn encode(image: &ImageRef) -> Result<String> {
    let rgb = load_rgb(image)?;
    let bytes = encode_jpeg(&rgb, TRANSPORT_JPEG_QUALITY)?;

    tracing::debug!(
        image = %image,
        width = rgb.width(),
        height = rgb.height(),
        encoded_bytes = bytes.len(),
        "Encoded image for transport"
    );

    Ok(STANDARD.encode(bytes))
}

/// Writes an RGB image to `dest` as JPEG, creating parent directories.
pub fn save_jpeg(image: &RgbImage, dest: &Path, quality: u8) -> Result<ImageRef> {
    let bytes = encode_jpeg(image, quality)?;
    write_bytes(dest, &bytes)
}

/// Writes raw image bytes to `dest`, creating parent directories.
pub fn write_bytes(dest: &Path, bytes: &[u8]) -> Result<ImageRef> {
    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(dest, bytes)?;
    Ok(ImageRef::new(dest))
}

fn read_error(path: &Path, err: std::io::Error) -> StagemergeError {
    if err.kind() == std::io::ErrorKind::NotFound {
        StagemergeError::not_found(path)
    } else {
        StagemergeError::Io(err)
    }
}
