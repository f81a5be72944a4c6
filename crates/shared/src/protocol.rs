//! Wire format of the external background-removal endpoint.

use serde::{Deserialize, Serialize};

/// Header carrying the static API credential.
pub const API_KEY_HEADER: &str = "X-Api-Key";

/// Multipart field holding the uploaded image bytes.
pub const IMAGE_FILE_FIELD: &str = "image_file";

/// Multipart field selecting the output size.
pub const SIZE_FIELD: &str = "size";

/// The only size directive this client ever sends.
pub const SIZE_AUTO: &str = "auto";

/// JSON body returned by the service on a non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovalErrorBody {
    #[serde(default)]
    pub errors: Vec<RemovalErrorEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovalErrorEntry {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl RemovalErrorBody {
    /// Display message for the first reported error, if any.
    pub fn primary_title(&self) -> Option<&str> {
        self.errors.first().map(|entry| entry.title.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_error_body_and_exposes_first_title() {
        let body: RemovalErrorBody = serde_json::from_str(
            r#"{"errors":[{"title":"Invalid image"},{"title":"Second"}]}"#,
        )
        .expect("parse");
        assert_eq!(body.primary_title(), Some("Invalid image"));
    }

    #[test]
    fn tolerates_missing_and_empty_error_lists() {
        let body: RemovalErrorBody = serde_json::from_str("{}").expect("parse");
        assert_eq!(body.primary_title(), None);

        let body: RemovalErrorBody = serde_json::from_str(r#"{"errors":[]}"#).expect("parse");
        assert_eq!(body.primary_title(), None);
    }

    #[test]
    fn carries_optional_code_and_detail_fields() {
        let body: RemovalErrorBody = serde_json::from_str(
            r#"{"errors":[{"title":"Rate limit exceeded","code":"rate_limit","detail":"Retry later"}]}"#,
        )
        .expect("parse");
        let entry = &body.errors[0];
        assert_eq!(entry.code.as_deref(), Some("rate_limit"));
        assert_eq!(entry.detail.as_deref(), Some("Retry later"));
    }
}
