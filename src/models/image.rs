//! Image formats understood by the compression pipeline.

use serde::{Deserialize, Serialize};
use std::{fmt, path::Path};

/// Format of an uploaded image, derived from its filename.
///
/// `Unsupported` is a regular value rather than an error: classification never
/// fails, and it is up to the compression engine to refuse such files.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Svg,
    Gif,
    Unsupported,
}

impl ImageFormat {
    /// MIME type used when serving files of this format.
    pub fn content_type(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Svg => "image/svg+xml",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Unsupported => "application/octet-stream",
        }
    }

    pub fn is_supported(self) -> bool {
        self != ImageFormat::Unsupported
    }

    fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => ImageFormat::Jpeg,
            "png" => ImageFormat::Png,
            "svg" => ImageFormat::Svg,
            "gif" => ImageFormat::Gif,
            _ => ImageFormat::Unsupported,
        }
    }

    fn from_content_type(content_type: &str) -> Self {
        // Drop parameters such as `; charset=utf-8`.
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => ImageFormat::Jpeg,
            "image/png" => ImageFormat::Png,
            "image/svg+xml" => ImageFormat::Svg,
            "image/gif" => ImageFormat::Gif,
            _ => ImageFormat::Unsupported,
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImageFormat::Jpeg => "JPEG",
            ImageFormat::Png => "PNG",
            ImageFormat::Svg => "SVG",
            ImageFormat::Gif => "GIF",
            ImageFormat::Unsupported => "unsupported",
        };
        write!(f, "{}", name)
    }
}

/// Map a filename to its image format by extension (case-insensitive).
pub fn classify(filename: &str) -> ImageFormat {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(ImageFormat::from_extension)
        .unwrap_or(ImageFormat::Unsupported)
}

/// Classify an uploaded file, falling back to the client-declared content
/// type when the extension is missing or unknown.
pub fn classify_upload(filename: &str, content_type: Option<&str>) -> ImageFormat {
    match classify(filename) {
        ImageFormat::Unsupported => content_type
            .map(ImageFormat::from_content_type)
            .unwrap_or(ImageFormat::Unsupported),
        format => format,
    }
}
