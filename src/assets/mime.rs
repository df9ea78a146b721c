//! Image type detection and data URI encoding

use base64::Engine;
use url::Url;

/// Declared content types accepted as images
pub const IMAGE_MIME_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/gif",
    "image/svg+xml",
    "image/webp",
    "image/x-icon",
    "image/bmp",
    "image/avif",
    "image/tiff",
];

/// URL path extensions accepted as images, with their MIME type
const IMAGE_EXTENSIONS: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("svg", "image/svg+xml"),
    ("webp", "image/webp"),
    ("ico", "image/x-icon"),
    ("bmp", "image/bmp"),
    ("tiff", "image/tiff"),
    ("tif", "image/tiff"),
    ("avif", "image/avif"),
];

/// Bodies at or below this size are treated as broken placeholders
pub const MIN_ASSET_BYTES: usize = 100;

/// MIME type used when neither the header nor the extension says anything
pub const DEFAULT_IMAGE_MIME: &str = "image/png";

/// Strips parameters from a Content-Type header value and lowercases it
pub fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// Returns true when the declared content type is a known image type
pub fn is_image_mime(content_type: &str) -> bool {
    IMAGE_MIME_TYPES.contains(&essence(content_type).as_str())
}

/// Returns true when a response declares an HTML document
///
/// Login walls and error pages come back as HTML with a success status;
/// they must never be embedded as images.
pub fn is_html_content_type(content_type: &str) -> bool {
    let essence = essence(content_type);
    essence == "text/html" || essence == "application/xhtml+xml"
}

/// Lowercased extension of the URL's last path segment
fn extension(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.last()?.to_string();
    let (_, ext) = segment.rsplit_once('.')?;
    Some(ext.to_ascii_lowercase())
}

/// Returns true when the URL path ends in an image extension
pub fn has_image_extension(url: &str) -> bool {
    extension(url)
        .map(|ext| IMAGE_EXTENSIONS.iter().any(|(known, _)| *known == ext))
        .unwrap_or(false)
}

/// Guesses an image MIME type from the URL path, defaulting to PNG
pub fn guess_image_mime(url: &str) -> &'static str {
    extension(url)
        .and_then(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .find(|(known, _)| *known == ext)
                .map(|(_, mime)| *mime)
        })
        .unwrap_or(DEFAULT_IMAGE_MIME)
}

/// Picks the MIME type to embed with
///
/// A declared image type wins; anything else falls back to the extension.
pub fn resolve_mime(url: &str, content_type: Option<&str>) -> String {
    match content_type {
        Some(declared) if is_image_mime(declared) => essence(declared),
        _ => guess_image_mime(url).to_string(),
    }
}

/// Encodes a payload as a `data:` URI
pub fn data_uri(mime: &str, bytes: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{};base64,{}", mime, encoded)
}
