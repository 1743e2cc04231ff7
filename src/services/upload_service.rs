//! src/services/upload_service.rs
//!
//! UploadService: stages multipart uploads on local disk for the duration of
//! one request. Each request gets its own session directory beneath
//! `base_path/{uuid}`, and every staged file sits in a numbered subdirectory
//! so that duplicate names within a request never overwrite each other.
//! The session directory outlives the request while any staged file is still
//! held, e.g. by a compression that keeps running after the client left.

use crate::models::image::{self, ImageFormat};
use bytes::Bytes;
use futures::{Stream, StreamExt, pin_mut};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, error};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("file name `{0}` is not usable")]
    InvalidFileName(String),
    #[error("reading upload body failed: {0}")]
    Body(#[source] io::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type UploadResult<T> = Result<T, UploadError>;

/// Factory for per-request upload sessions.
#[derive(Clone, Debug)]
pub struct UploadService {
    /// Root staging directory (`uploads/` by default).
    pub base_path: PathBuf,
}

impl UploadService {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Start a session for one request. No I/O happens until the first file
    /// is staged.
    pub fn session(&self) -> UploadSession {
        UploadSession {
            dir: Arc::new(SessionDir {
                path: self.base_path.join(Uuid::new_v4().to_string()),
            }),
            next_slot: AtomicUsize::new(0),
        }
    }
}

/// Request-scoped staging area. Its directory is removed once the session
/// and every file staged through it have been dropped.
#[derive(Debug)]
pub struct UploadSession {
    dir: Arc<SessionDir>,
    next_slot: AtomicUsize,
}

#[derive(Debug)]
struct SessionDir {
    path: PathBuf,
}

impl UploadSession {
    pub fn dir(&self) -> &Path {
        &self.dir.path
    }

    /// Stream an uploaded file into the session.
    ///
    /// The client-supplied name is kept verbatim as the staged file's name;
    /// only its last path component reaches the filesystem. A failed write or
    /// body read removes the partial file.
    pub async fn stage<S>(
        &self,
        original_name: &str,
        content_type: Option<&str>,
        stream: S,
    ) -> UploadResult<UploadedFile>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        let file_name = base_name(original_name)
            .ok_or_else(|| UploadError::InvalidFileName(original_name.to_string()))?;

        let slot = self.next_slot.fetch_add(1, Ordering::Relaxed);
        let slot_dir = self.dir().join(slot.to_string());
        fs::create_dir_all(&slot_dir).await?;
        let storage_path = slot_dir.join(&file_name);
        let mut file = File::create(&storage_path).await?;

        let mut size_bytes: u64 = 0;
        pin_mut!(stream);
        while let Some(chunk_res) = stream.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&storage_path).await;
                    return Err(UploadError::Body(err));
                }
            };
            size_bytes += chunk.len() as u64;
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&storage_path).await;
                return Err(UploadError::Io(err));
            }
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&storage_path).await;
            return Err(UploadError::Io(err));
        }

        let format = image::classify_upload(&file_name, content_type);
        debug!(
            "staged {} ({} bytes, {}) at {}",
            file_name,
            size_bytes,
            format,
            storage_path.display()
        );

        Ok(UploadedFile {
            original_name: file_name,
            storage_path,
            size_bytes,
            format,
            released: false,
            _session: Arc::clone(&self.dir),
        })
    }
}

impl Drop for SessionDir {
    fn drop(&mut self) {
        // Released files take their slot directories with them, so this is
        // normally a single rmdir of an empty directory.
        let err = match std::fs::remove_dir(&self.path) {
            Ok(()) => {
                debug!("removed upload session {}", self.path.display());
                return;
            }
            Err(err) if err.kind() == ErrorKind::NotFound => return,
            Err(err) => err,
        };
        debug!(
            "upload session {} not empty ({}), sweeping it",
            self.path.display(),
            err
        );

        let path = std::mem::take(&mut self.path);
        let sweep = move || {
            if let Err(err) = std::fs::remove_dir_all(&path) {
                error!("failed to remove upload session {}: {}", path.display(), err);
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(sweep);
            }
            Err(_) => sweep(),
        }
    }
}

/// A staged original waiting for compression.
///
/// Call [`UploadedFile::release`] once compression has reached a terminal
/// outcome. A file dropped without being released is removed in `Drop`, so
/// early returns and aborted batches never leak staged originals.
#[derive(Debug)]
pub struct UploadedFile {
    /// Client-supplied file name (final path component).
    pub original_name: String,

    /// Where the bytes were staged.
    pub storage_path: PathBuf,

    pub size_bytes: u64,

    pub format: ImageFormat,

    released: bool,

    /// Keeps the session directory alive while this file exists.
    _session: Arc<SessionDir>,
}

impl UploadedFile {
    /// Delete the staged original. Failures are logged, never returned.
    pub async fn release(mut self) {
        self.released = true;
        match fs::remove_file(&self.storage_path).await {
            Ok(()) => debug!("released {}", self.storage_path.display()),
            Err(err) => error!(
                "failed to remove staged upload {}: {}",
                self.storage_path.display(),
                err
            ),
        }
        if let Some(slot) = self.storage_path.parent() {
            let _ = fs::remove_dir(slot).await;
        }
    }
}

impl Drop for UploadedFile {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match std::fs::remove_file(&self.storage_path) {
            Ok(()) => debug!("removed unreleased upload {}", self.storage_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => error!(
                "failed to remove staged upload {}: {}",
                self.storage_path.display(),
                err
            ),
        }
        if let Some(slot) = self.storage_path.parent() {
            let _ = std::fs::remove_dir(slot);
        }
    }
}

/// Last path component of a client-supplied name, accepting both `/` and `\`
/// separators. Returns `None` for names with nothing usable left.
fn base_name(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next().unwrap_or_default();
    if last.is_empty() || last == "." || last == ".." || last.contains('\0') {
        return None;
    }
    Some(last.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::time::Duration;
    use tempfile::TempDir;

    fn chunks(parts: &[&str]) -> impl Stream<Item = io::Result<Bytes>> {
        let owned: Vec<io::Result<Bytes>> = parts
            .iter()
            .map(|p| Ok(Bytes::copy_from_slice(p.as_bytes())))
            .collect();
        stream::iter(owned)
    }

    fn files_under(dir: &Path) -> Vec<PathBuf> {
        let mut found = Vec::new();
        let Ok(entries) = std::fs::read_dir(dir) else {
            return found;
        };
        for entry in entries {
            let path = entry.unwrap().path();
            if path.is_dir() {
                found.extend(files_under(&path));
            } else {
                found.push(path);
            }
        }
        found
    }

    #[test]
    fn base_name_strips_directories() {
        assert_eq!(base_name("photo.jpg").as_deref(), Some("photo.jpg"));
        assert_eq!(base_name("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(base_name(r"C:\Users\me\cat.png").as_deref(), Some("cat.png"));
        assert_eq!(base_name("my photo (1).jpeg").as_deref(), Some("my photo (1).jpeg"));
        assert_eq!(base_name(""), None);
        assert_eq!(base_name(".."), None);
        assert_eq!(base_name("dir/"), None);
    }

    #[tokio::test]
    async fn session_creates_nothing_until_staging() {
        let root = TempDir::new().unwrap();
        let service = UploadService::new(root.path());
        let session = service.session();
        assert!(!session.dir().exists());
        drop(session);
        assert!(files_under(root.path()).is_empty());
    }

    #[tokio::test]
    async fn stages_bytes_under_original_name() {
        let root = TempDir::new().unwrap();
        let service = UploadService::new(root.path());
        let session = service.session();

        let file = session
            .stage("photo.jpg", Some("image/jpeg"), chunks(&["abc", "defg"]))
            .await
            .unwrap();

        assert_eq!(file.original_name, "photo.jpg");
        assert_eq!(file.size_bytes, 7);
        assert_eq!(file.format, ImageFormat::Jpeg);
        assert!(file.storage_path.starts_with(session.dir()));
        assert_eq!(file.storage_path.file_name().unwrap(), "photo.jpg");
        assert_eq!(std::fs::read(&file.storage_path).unwrap(), b"abcdefg");
    }

    #[tokio::test]
    async fn traversal_names_stay_inside_the_session() {
        let root = TempDir::new().unwrap();
        let service = UploadService::new(root.path().join("uploads"));
        let session = service.session();

        let file = session
            .stage("../../escape.png", None, chunks(&["x"]))
            .await
            .unwrap();

        assert_eq!(file.original_name, "escape.png");
        assert!(file.storage_path.starts_with(session.dir()));
        assert!(!root.path().join("escape.png").exists());
    }

    #[tokio::test]
    async fn unusable_names_are_rejected_without_io() {
        let root = TempDir::new().unwrap();
        let service = UploadService::new(root.path());
        let session = service.session();

        let err = session.stage("..", None, chunks(&["x"])).await.unwrap_err();
        assert!(matches!(err, UploadError::InvalidFileName(_)));
        assert!(!session.dir().exists());
    }

    #[tokio::test]
    async fn duplicate_names_do_not_collide() {
        let root = TempDir::new().unwrap();
        let service = UploadService::new(root.path());
        let session = service.session();

        let first = session.stage("a.gif", None, chunks(&["one"])).await.unwrap();
        let second = session.stage("a.gif", None, chunks(&["two"])).await.unwrap();

        assert_ne!(first.storage_path, second.storage_path);
        assert_eq!(std::fs::read(&first.storage_path).unwrap(), b"one");
        assert_eq!(std::fs::read(&second.storage_path).unwrap(), b"two");
    }

    #[tokio::test]
    async fn failed_body_removes_partial_file() {
        let root = TempDir::new().unwrap();
        let service = UploadService::new(root.path());
        let session = service.session();

        let body = stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(io::Error::new(ErrorKind::ConnectionReset, "client went away")),
        ]);
        let err = session.stage("photo.jpg", None, body).await.unwrap_err();

        assert!(matches!(err, UploadError::Body(_)));
        assert!(files_under(session.dir()).is_empty());
    }

    #[tokio::test]
    async fn release_removes_the_staged_file() {
        let root = TempDir::new().unwrap();
        let service = UploadService::new(root.path());
        let session = service.session();

        let file = session.stage("a.svg", None, chunks(&["<svg/>"])).await.unwrap();
        let path = file.storage_path.clone();
        file.release().await;

        assert!(!path.exists());
    }

    #[tokio::test]
    async fn release_tolerates_missing_file() {
        let root = TempDir::new().unwrap();
        let service = UploadService::new(root.path());
        let session = service.session();

        let file = session.stage("a.svg", None, chunks(&["<svg/>"])).await.unwrap();
        std::fs::remove_file(&file.storage_path).unwrap();
        // Logged, not propagated.
        file.release().await;
    }

    #[tokio::test]
    async fn dropping_unreleased_file_removes_it() {
        let root = TempDir::new().unwrap();
        let service = UploadService::new(root.path());
        let session = service.session();

        let file = session.stage("a.png", None, chunks(&["png"])).await.unwrap();
        let path = file.storage_path.clone();
        drop(file);

        assert!(!path.exists());
    }

    async fn wait_until_gone(path: &Path) {
        for _ in 0..100 {
            if !path.exists() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("{} still exists", path.display());
    }

    #[tokio::test]
    async fn dropping_session_removes_its_directory() {
        let root = TempDir::new().unwrap();
        let service = UploadService::new(root.path());
        let session = service.session();

        let file = session.stage("a.png", None, chunks(&["png"])).await.unwrap();
        let dir = session.dir().to_path_buf();
        file.release().await;
        drop(session);

        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn leftovers_are_swept_with_the_session() {
        let root = TempDir::new().unwrap();
        let service = UploadService::new(root.path());
        let session = service.session();

        let file = session.stage("a.png", None, chunks(&["png"])).await.unwrap();
        let dir = session.dir().to_path_buf();
        std::fs::write(dir.join("stray"), b"left behind").unwrap();
        drop(file);
        drop(session);

        wait_until_gone(&dir).await;
        assert!(files_under(root.path()).is_empty());
    }

    #[tokio::test]
    async fn staged_file_keeps_session_alive() {
        let root = TempDir::new().unwrap();
        let service = UploadService::new(root.path());
        let session = service.session();

        let file = session.stage("a.png", None, chunks(&["png"])).await.unwrap();
        let dir = session.dir().to_path_buf();
        drop(session);

        assert_eq!(std::fs::read(&file.storage_path).unwrap(), b"png");
        file.release().await;
        assert!(!dir.exists());
    }
}
