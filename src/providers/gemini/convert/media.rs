//! Validation of inline media before it is sent upstream.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use url::Url;

use crate::providers::ProviderError;

/// Prefix accepted (and stripped) in front of PDF payloads.
pub const PDF_DATA_URI_PREFIX: &str = "data:application/pdf;base64,";

/// Magic bytes every PDF starts with.
const PDF_MAGIC: &[u8] = b"%PDF-";

/// MIME type used when an external image URL gives no hint.
pub const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

/// A validated image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Payload carried in a `data:` URI.
    Inline { mime_type: String, data: String },
    /// Externally hosted image.
    Remote { mime_type: Option<String>, url: String },
}

/// Validate an `image_url` value.
///
/// Accepts `http`, `https` and `data` URLs. Data URIs must name a MIME type
/// and carry a base64 payload that decodes.
pub fn validate_image_url(raw: &str) -> Result<ImageSource, ProviderError> {
    let url = Url::parse(raw)
        .map_err(|e| ProviderError::validation(format!("Invalid image URL: {e}")))?;

    match url.scheme() {
        "data" => parse_image_data_uri(raw),
        "http" | "https" => Ok(ImageSource::Remote {
            mime_type: mime_from_extension(url.path()).map(str::to_string),
            url: raw.to_string(),
        }),
        other => Err(ProviderError::validation(format!(
            "Unsupported image URL scheme: {other}"
        ))),
    }
}

fn parse_image_data_uri(raw: &str) -> Result<ImageSource, ProviderError> {
    let rest = raw.strip_prefix("data:").unwrap_or(raw);
    let (header, data) = rest
        .split_once(',')
        .ok_or_else(|| ProviderError::validation("Image data URI has no payload"))?;

    let mime_type = header
        .strip_suffix(";base64")
        .ok_or_else(|| ProviderError::validation("Image data URI must be base64 encoded"))?;
    if mime_type.is_empty() {
        return Err(ProviderError::validation("Image data URI is missing a MIME type"));
    }
    if data.is_empty() {
        return Err(ProviderError::validation("Image data URI has an empty payload"));
    }
    STANDARD
        .decode(data)
        .map_err(|e| ProviderError::validation(format!("Image payload is not valid base64: {e}")))?;

    Ok(ImageSource::Inline {
        mime_type: mime_type.to_string(),
        data: data.to_string(),
    })
}

fn mime_from_extension(path: &str) -> Option<&'static str> {
    let ext = path.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        _ => None,
    }
}

/// Validate a PDF payload and return its base64 body without any data URI prefix.
pub fn validate_pdf(raw: &str) -> Result<String, ProviderError> {
    let data = raw.strip_prefix(PDF_DATA_URI_PREFIX).unwrap_or(raw);
    let bytes = STANDARD
        .decode(data)
        .map_err(|e| ProviderError::validation(format!("Invalid PDF data: {e}")))?;
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(ProviderError::validation(
            "Invalid PDF data: missing %PDF- header",
        ));
    }
    Ok(data.to_string())
}
