use thiserror::Error;

/// Rejection reasons produced by the input validator before any network
/// activity. The `Display` text is the exact notification shown to the user;
/// the fields carry the detail that goes into logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please select a JPG, PNG, or WEBP image")]
    UnsupportedMediaType { media_type: String },

    #[error("File size must be less than 5MB")]
    TooLarge { byte_len: u64, limit_bytes: u64 },
}
