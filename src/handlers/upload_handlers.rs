//! HTTP handlers for image uploads and compressed image downloads.
//! Uploaded bodies are streamed straight into the request's staging session;
//! compression is delegated to `ImageService`.

use crate::{
    errors::AppError,
    models::{
        compression::{BatchUploadResponse, SingleUploadResponse},
        image,
    },
    services::{
        compression_service::is_temp_output_name,
        image_service::ImageService,
        upload_service::{UploadError, UploadSession, UploadedFile},
    },
};
use axum::{
    Json,
    body::Body,
    extract::{
        Multipart, Path, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::io::{self, ErrorKind};
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{error, warn};

/// Multipart field carrying the file for `POST /upload`.
pub const SINGLE_FIELD: &str = "image";
/// Multipart field carrying the files for `POST /upload-multi`.
pub const BATCH_FIELD: &str = "images";

const NO_FILE: &str = "No file uploaded";
const NO_FILES: &str = "No files uploaded";
const SINGLE_FAILED: &str = "Failed to compress image";
const BATCH_FAILED: &str = "Failed to compress images";
const MALFORMED: &str = "Malformed multipart request";
const TOO_LARGE: &str = "Upload too large";

/// Why the file fields of a request could not be collected.
#[derive(Debug)]
enum CollectError {
    NotMultipart(MultipartRejection),
    Malformed(MultipartError),
    UnexpectedField(String),
    TooManyFiles,
    Staging(UploadError),
}

impl CollectError {
    /// Client-facing error; `missing` and `failed` are the endpoint's messages
    /// for "nothing uploaded" and "internal failure".
    fn into_app_error(self, missing: &str, failed: &str) -> AppError {
        match self {
            CollectError::NotMultipart(rejection) => {
                warn!("request is not a multipart upload: {}", rejection);
                AppError::bad_request(missing)
            }
            CollectError::Malformed(err) => {
                warn!("malformed multipart body: {}", err);
                body_error(err.status())
            }
            CollectError::UnexpectedField(name) => {
                AppError::bad_request(format!("Unexpected field `{}`", name))
            }
            CollectError::TooManyFiles => AppError::bad_request("Too many files uploaded"),
            CollectError::Staging(UploadError::InvalidFileName(name)) => {
                warn!("rejected upload with unusable file name {:?}", name);
                AppError::bad_request("Invalid file name")
            }
            CollectError::Staging(UploadError::Body(err)) => {
                warn!("reading upload body failed: {}", err);
                let status = err
                    .get_ref()
                    .and_then(|inner| inner.downcast_ref::<MultipartError>())
                    .map_or(StatusCode::BAD_REQUEST, MultipartError::status);
                body_error(status)
            }
            CollectError::Staging(UploadError::Io(err)) => {
                error!("staging upload failed: {}", err);
                AppError::internal(failed)
            }
        }
    }
}

/// Oversized bodies get 413; every other multipart failure is a 400.
fn body_error(status: StatusCode) -> AppError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::new(status, TOO_LARGE)
    } else {
        AppError::bad_request(MALFORMED)
    }
}

/// Stage every file field named `field_name`, in submission order.
///
/// Text fields are ignored. A file under any other name, or more than
/// `max_files` files, rejects the request before the offending file is staged.
async fn collect_files(
    session: &UploadSession,
    multipart: Result<Multipart, MultipartRejection>,
    field_name: &str,
    max_files: usize,
) -> Result<Vec<UploadedFile>, CollectError> {
    let mut multipart = multipart.map_err(CollectError::NotMultipart)?;
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(CollectError::Malformed)?
    {
        let Some(file_name) = field
            .file_name()
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
        else {
            continue;
        };

        let name = field.name().unwrap_or_default().to_owned();
        if name != field_name {
            return Err(CollectError::UnexpectedField(name));
        }
        if files.len() >= max_files {
            return Err(CollectError::TooManyFiles);
        }

        let content_type = field.content_type().map(str::to_owned);
        let stream = field.map(|chunk| chunk.map_err(io::Error::other));
        let file = session
            .stage(&file_name, content_type.as_deref(), stream)
            .await
            .map_err(CollectError::Staging)?;
        files.push(file);
    }

    Ok(files)
}

/// `POST /upload`: compress a single image sent as field `image`.
pub async fn upload_image(
    State(service): State<ImageService>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<SingleUploadResponse>, AppError> {
    let session = service.uploads.session();
    let mut files = collect_files(&session, multipart, SINGLE_FIELD, 1)
        .await
        .map_err(|err| err.into_app_error(NO_FILE, SINGLE_FAILED))?;

    let Some(file) = files.pop() else {
        return Err(AppError::bad_request(NO_FILE));
    };

    let image = service
        .compress_upload(file)
        .await
        .map_err(|_| AppError::internal(SINGLE_FAILED))?;

    Ok(Json(SingleUploadResponse {
        compressed_image_url: image.url,
    }))
}

/// `POST /upload-multi`: compress up to `max_batch_files` images sent as
/// field `images`. URLs come back in submission order.
pub async fn upload_images(
    State(service): State<ImageService>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<BatchUploadResponse>, AppError> {
    let session = service.uploads.session();
    let files = collect_files(&session, multipart, BATCH_FIELD, service.max_batch_files)
        .await
        .map_err(|err| err.into_app_error(NO_FILES, BATCH_FAILED))?;

    if files.is_empty() {
        return Err(AppError::bad_request(NO_FILES));
    }

    let images = service
        .compress_batch(files)
        .await
        .map_err(|_| AppError::internal(BATCH_FAILED))?;

    Ok(Json(BatchUploadResponse {
        compressed_image_urls: images.into_iter().map(|image| image.url).collect(),
    }))
}

/// `GET /{public_path}/{name}`: stream a compressed image.
pub async fn get_compressed(
    State(service): State<ImageService>,
    Path(name): Path<String>,
) -> Result<Response, AppError> {
    const NOT_FOUND: &str = "Compressed image not found";

    if !is_servable_name(&name) {
        return Err(AppError::not_found(NOT_FOUND));
    }

    let path = service.output_dir.join(&name);
    let file = File::open(&path).await.map_err(|err| {
        if err.kind() == ErrorKind::NotFound {
            AppError::not_found(NOT_FOUND)
        } else {
            error!("opening {} failed: {}", path.display(), err);
            AppError::internal("Failed to read compressed image")
        }
    })?;
    let meta = file.metadata().await.map_err(|err| {
        error!("reading metadata of {} failed: {}", path.display(), err);
        AppError::internal("Failed to read compressed image")
    })?;
    if !meta.is_file() {
        return Err(AppError::not_found(NOT_FOUND));
    }

    let mut response = Response::new(Body::from_stream(ReaderStream::new(file)));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(image::classify(&name).content_type()),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(meta.len()));
    if let Ok(modified) = meta.modified() {
        let modified: DateTime<Utc> = modified.into();
        let http_date = modified.format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        if let Ok(value) = HeaderValue::from_str(&http_date) {
            headers.insert(header::LAST_MODIFIED, value);
        }
    }

    Ok(response)
}

/// Plain file names only; in-flight temporary outputs are never served.
fn is_servable_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains(['/', '\\', '\0'])
        && name != "."
        && name != ".."
        && !is_temp_output_name(name)
}
