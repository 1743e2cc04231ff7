//! Values passed through the compression pipeline and returned to clients.

use super::image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// A single request to compress one staged file.
///
/// Engine parameters are not part of the job; they are fixed when the engine
/// is constructed.
#[derive(Clone, Debug)]
pub struct CompressionJob {
    /// Path of the staged original.
    pub input_path: PathBuf,

    /// Directory receiving the compressed file (same base name as the input).
    pub output_dir: PathBuf,

    /// Format chosen by the classifier.
    pub format: ImageFormat,
}

/// Outcome of a successful compression.
#[derive(Clone, Debug)]
pub struct CompressionReport {
    /// Final location of the compressed file.
    pub output_path: PathBuf,

    pub input_bytes: u64,

    pub output_bytes: u64,

    /// True when the original bytes were kept because the tool could not
    /// improve on them.
    pub kept_original: bool,

    pub elapsed: Duration,
}

impl CompressionReport {
    /// Percentage of bytes saved relative to the input.
    pub fn percent_saved(&self) -> f64 {
        if self.input_bytes == 0 {
            return 0.0;
        }
        (1.0 - self.output_bytes as f64 / self.input_bytes as f64) * 100.0
    }
}

/// Public reference to a compressed image.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CompressedImageRef {
    /// Relative URL, e.g. `/compressed/photo.jpg`.
    pub url: String,
}

/// Body of a successful `POST /upload`.
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SingleUploadResponse {
    pub compressed_image_url: String,
}

/// Body of a successful `POST /upload-multi`.
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BatchUploadResponse {
    pub compressed_image_urls: Vec<String>,
}
