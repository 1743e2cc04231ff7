//! src/services/image_service.rs
//!
//! ImageService: ties staging and compression together. It owns the upload
//! service, the compressor and the public URL layout, and is the shared state
//! handed to every HTTP handler.

use super::{
    compression_service::{CompressionError, CompressionResult, ImageCompressor},
    upload_service::{UploadService, UploadedFile},
};
use crate::models::compression::{CompressedImageRef, CompressionJob};
use futures::{StreamExt, TryStreamExt, stream};
use std::{path::PathBuf, sync::Arc};
use tracing::{debug, error};

#[derive(Clone)]
pub struct ImageService {
    pub uploads: UploadService,

    pub compressor: Arc<dyn ImageCompressor>,

    /// Directory receiving compressed files.
    pub output_dir: PathBuf,

    /// URL path segment under which compressed files are published.
    pub public_path: String,

    /// Upper bound on files in one batch request.
    pub max_batch_files: usize,

    /// How many files of a batch are compressed at once (1 = sequential).
    pub batch_concurrency: usize,
}

impl ImageService {
    pub fn new(
        uploads: UploadService,
        compressor: Arc<dyn ImageCompressor>,
        output_dir: impl Into<PathBuf>,
        public_path: impl Into<String>,
    ) -> Self {
        Self {
            uploads,
            compressor,
            output_dir: output_dir.into(),
            public_path: public_path.into().trim_matches('/').to_string(),
            max_batch_files: 5,
            batch_concurrency: 1,
        }
    }

    pub fn with_batch_limits(mut self, max_files: usize, concurrency: usize) -> Self {
        self.max_batch_files = max_files;
        self.batch_concurrency = concurrency.max(1);
        self
    }

    /// Public URL of the compressed file named `file_name`.
    pub fn public_url(&self, file_name: &str) -> String {
        format!("/{}/{}", self.public_path, file_name)
    }

    /// Compress one staged file into the output directory.
    ///
    /// The work runs on its own task: dropping the returned future (client
    /// disconnect, aborted batch) does not stop a compression once started.
    /// The original is released whatever the outcome.
    pub async fn compress_upload(
        &self,
        file: UploadedFile,
    ) -> CompressionResult<CompressedImageRef> {
        let url = self.public_url(&file.original_name);
        let compressor = Arc::clone(&self.compressor);
        let job = CompressionJob {
            input_path: file.storage_path.clone(),
            output_dir: self.output_dir.clone(),
            format: file.format,
        };

        let task = tokio::spawn(async move {
            debug!(
                "compressing {} ({} bytes, {})",
                file.original_name, file.size_bytes, file.format
            );
            let result = compressor.compress(&job).await;
            if let Err(err) = &result {
                error!("compressing {} failed: {}", file.original_name, err);
            }
            file.release().await;
            result
        });

        match task.await {
            Ok(result) => result.map(|_| CompressedImageRef { url }),
            Err(err) => {
                error!("compression task for {} failed: {}", url, err);
                Err(CompressionError::Aborted(err.to_string()))
            }
        }
    }

    /// Compress a batch, returning references in submission order.
    ///
    /// The first failure aborts the batch. Outputs already written stay in
    /// place, compressions already running finish in the background, and
    /// originals not yet started are removed when their guards drop.
    pub async fn compress_batch(
        &self,
        files: Vec<UploadedFile>,
    ) -> CompressionResult<Vec<CompressedImageRef>> {
        if self.batch_concurrency <= 1 {
            let mut refs = Vec::with_capacity(files.len());
            for file in files {
                refs.push(self.compress_upload(file).await?);
            }
            return Ok(refs);
        }

        stream::iter(files)
            .map(|file| self.compress_upload(file))
            .buffered(self.batch_concurrency)
            .try_collect()
            .await
    }
}
