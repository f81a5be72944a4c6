use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Largest upload the removal service accepts.
pub const MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

/// Media types the session accepts for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
}

impl ImageFormat {
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        match media_type.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/webp" => Some(Self::Webp),
            _ => None,
        }
    }

    pub fn media_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
        }
    }

    /// Upper-cased label used in the metadata display.
    pub fn label(self) -> &'static str {
        match self {
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
            Self::Webp => "WEBP",
        }
    }
}

/// Accepts or rejects a candidate upload from its declared media type and
/// byte length. The media type is checked before the size ceiling.
pub fn validate_candidate(media_type: &str, byte_len: u64) -> Result<ImageFormat, ValidationError> {
    let format = ImageFormat::from_media_type(media_type).ok_or_else(|| {
        ValidationError::UnsupportedMediaType {
            media_type: media_type.to_string(),
        }
    })?;

    if byte_len > MAX_UPLOAD_BYTES {
        return Err(ValidationError::TooLarge {
            byte_len,
            limit_bytes: MAX_UPLOAD_BYTES,
        });
    }

    Ok(format)
}

/// Byte length rendered in MiB with two decimals, e.g. `"1.95 MB"`.
pub fn format_size_mib(byte_len: u64) -> String {
    format!("{:.2} MB", byte_len as f64 / (1024.0 * 1024.0))
}
