//! Defines routes for image uploads, compressed image downloads and probes.
//!
//! ## Structure
//! - **Upload endpoints**
//!   - `POST /upload`: compress one image (multipart field `image`)
//!   - `POST /upload-multi`: compress a batch (multipart field `images`)
//!
//! - **Download endpoint**
//!   - `GET  /{public_path}/{name}`: fetch a compressed image by file name
//!
//! - **Probes**
//!   - `GET  /healthz`, `GET /readyz`

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        upload_handlers::{get_compressed, upload_image, upload_images},
    },
    services::image_service::ImageService,
};
use axum::{
    Router,
    routing::{get, post},
};

/// Build and return the router for every endpoint.
///
/// `public_path` is the URL segment compressed files are published under
/// (`compressed` unless configured otherwise). The router carries shared
/// state (`ImageService`) to all handlers.
pub fn routes(public_path: &str) -> Router<ImageService> {
    let public_path = public_path.trim_matches('/');

    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // uploads
        .route("/upload", post(upload_image))
        .route("/upload-multi", post(upload_images))
        // compressed files
        .route(&format!("/{}/{{name}}", public_path), get(get_compressed))
}
