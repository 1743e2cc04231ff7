use anyhow::Result;
use axum::{Router, extract::DefaultBodyLimit};
use std::{fs, io::ErrorKind, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;

use services::{
    compression_service::{CompressionEngine, ImageCompressor},
    image_service::ImageService,
    upload_service::UploadService,
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Parse config ---
    let cfg = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting image-cdn with config: {:?}", cfg);

    // --- Ensure staging and output directories exist ---
    for dir in [&cfg.upload_dir, &cfg.output_dir] {
        if !Path::new(dir).exists() {
            fs::create_dir_all(dir)?;
            tracing::info!("Created directory at {}", dir);
        }
    }

    // --- Initialize core services ---
    let engine = CompressionEngine::new(cfg.compression_settings());
    for tool in engine.required_tools() {
        if tool.resolve().is_none() {
            tracing::warn!(
                "compressor `{}` not found on PATH; matching uploads will fail",
                tool.program
            );
        }
    }

    let service = ImageService::new(
        UploadService::new(&cfg.upload_dir),
        Arc::new(engine),
        &cfg.output_dir,
        &cfg.public_path,
    )
    .with_batch_limits(cfg.max_batch_files, cfg.batch_concurrency);

    // --- Build router ---
    let app: Router = routes::routes::routes(&service.public_path)
        .layer(DefaultBodyLimit::max(cfg.max_body_bytes))
        .with_state(service);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
