//! Image encoding: `RgbImage` → PNG bytes → base64.
//!
//! Both the deck (`ppt/media/*.png`) and the provider requests need PNG.
//! Lossless keeps slide text crisp for the vision model; JPEG artefacts around
//! small captions noticeably hurt what the model can read.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{ImageFormat, RgbImage};
use std::io::Cursor;
use tracing::debug;

/// Encode a slide image as PNG bytes.
pub fn encode_png(img: &RgbImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}

/// PNG, base64-encoded (standard alphabet, padded).
pub fn to_base64_png(img: &RgbImage) -> Result<String, image::ImageError> {
    let b64 = STANDARD.encode(encode_png(img)?);
    debug!("Encoded {}x{} image → {} bytes base64", img.width(), img.height(), b64.len());
    Ok(b64)
}

/// `data:image/png;base64,…` URI for chat-completions image parts.
pub fn to_data_uri(img: &RgbImage) -> Result<String, image::ImageError> {
    Ok(format!("data:image/png;base64,{}", to_base64_png(img)?))
}
