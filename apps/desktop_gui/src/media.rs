//! Image decoding helpers for preview textures.

use image::GenericImageView;

/// Previews are downscaled so a 5 MiB photo does not become a 5 MiB texture.
const MAX_PREVIEW_DIMENSION: f32 = 512.0;

#[derive(Clone)]
pub struct PreviewImage {
    pub width: usize,
    pub height: usize,
    pub rgba: Vec<u8>,
}

pub fn decode_preview_image(bytes: &[u8]) -> Result<PreviewImage, String> {
    let decoded =
        image::load_from_memory(bytes).map_err(|err| format!("failed to decode image: {err}"))?;

    let (orig_w, orig_h) = decoded.dimensions();
    let scale = (MAX_PREVIEW_DIMENSION / (orig_w.max(orig_h) as f32)).min(1.0);
    let resized = if scale < 1.0 {
        decoded.resize(
            (orig_w as f32 * scale).max(1.0) as u32,
            (orig_h as f32 * scale).max(1.0) as u32,
            image::imageops::FilterType::Triangle,
        )
    } else {
        decoded
    };

    let rgba = resized.to_rgba8();
    Ok(PreviewImage {
        width: rgba.width() as usize,
        height: rgba.height() as usize,
        rgba: rgba.into_raw(),
    })
}
