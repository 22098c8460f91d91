//! Image normalisation before upload.
//!
//! JPEG files keep their compressed scan untouched: only the APPn and COM segments that
//! carry EXIF, XMP, ICC, IPTC and comments are removed, so decoding gives the exact same
//! pixels. The JFIF (APP0) and Adobe (APP14) headers stay because they affect decoding.
//!
//! PNG, GIF and WebP are decoded and re-encoded through the `image` crate, whose encoders
//! never write text chunks or EXIF. The pixel grid is preserved, but palette PNGs come
//! back as truecolor, which can make small indexed images noticeably larger.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat};
use img_parts::jpeg::Jpeg;
use tracing::{debug, error};

use crate::contract::PipelineError;

const JPEG_APP0: u8 = 0xE0;
const JPEG_APP14: u8 = 0xEE;
const JPEG_APP15: u8 = 0xEF;
const JPEG_COM: u8 = 0xFE;

/// Returns `data` without auxiliary metadata. The image is always fully decoded first,
/// so corrupt input is rejected even when its container parses.
pub fn strip_metadata(data: &[u8]) -> Result<Vec<u8>, PipelineError> {
    let format = image::guess_format(data).map_err(|e| {
        error!(error = ?e, size = data.len(), "Unrecognised image format");
        PipelineError::Image(format!("unrecognised image format: {e}"))
    })?;

    let decoded = image::load_from_memory_with_format(data, format).map_err(|e| {
        error!(error = ?e, ?format, "Failed to decode image");
        PipelineError::Image(format!("failed to decode {format:?} image: {e}"))
    })?;

    let clean = match format {
        ImageFormat::Jpeg => strip_jpeg_segments(data)?,
        _ => reencode(&decoded, format)?,
    };

    debug!(
        ?format,
        width = decoded.width(),
        height = decoded.height(),
        original_size = data.len(),
        stripped_size = clean.len(),
        "Stripped image metadata"
    );
    Ok(clean)
}

fn is_jpeg_metadata(marker: u8) -> bool {
    let app = (JPEG_APP0..=JPEG_APP15).contains(&marker);
    (app && marker != JPEG_APP0 && marker != JPEG_APP14) || marker == JPEG_COM
}

fn strip_jpeg_segments(data: &[u8]) -> Result<Vec<u8>, PipelineError> {
    let mut jpeg = Jpeg::from_bytes(data.to_vec().into()).map_err(|e| {
        error!(error = %e, "Failed to parse JPEG segments");
        PipelineError::Image(format!("failed to parse JPEG segments: {e}"))
    })?;

    let before = jpeg.segments().len();
    jpeg.segments_mut()
        .retain(|segment| !is_jpeg_metadata(segment.marker()));
    debug!(removed = before - jpeg.segments().len(), "Removed JPEG metadata segments");

    let mut clean = Vec::with_capacity(data.len());
    jpeg.encoder().write_to(&mut clean).map_err(|e| {
        error!(error = ?e, "Failed to write JPEG");
        PipelineError::Image(format!("failed to write JPEG: {e}"))
    })?;
    Ok(clean)
}

fn reencode(decoded: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, PipelineError> {
    let mut clean = Cursor::new(Vec::new());
    decoded.write_to(&mut clean, format).map_err(|e| {
        error!(error = ?e, ?format, "Failed to re-encode image");
        PipelineError::Image(format!("failed to re-encode {format:?} image: {e}"))
    })?;
    Ok(clean.into_inner())
}

/// MIME type sniffed from the image's magic bytes, for blob uploads.
pub fn mime_type(data: &[u8]) -> Option<&'static str> {
    image::guess_format(data).ok().map(|format| format.to_mime_type())
}
