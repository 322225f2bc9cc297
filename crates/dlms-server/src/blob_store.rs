//! Filesystem-backed image buckets.
//!
//! Objects live at `{base}/{bucket}/{path}` and are served publicly under
//! `{public_base_url}/storage/{bucket}/{path}`. Writes never overwrite an
//! existing object.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use dlms_shared::constants::{PHOTO_BUCKET, SIGNATURE_BUCKET};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::error::ServerError;

pub const BUCKETS: [&str; 2] = [PHOTO_BUCKET, SIGNATURE_BUCKET];

/// Reject anything that could climb out of `base`.
fn ensure_within(base: &Path, relative: &str) -> Result<PathBuf, ServerError> {
    if relative.is_empty() || relative.contains('\\') {
        return Err(ServerError::BadRequest("Invalid object path".to_string()));
    }
    let mut resolved = base.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(c) => resolved.push(c),
            _ => {
                return Err(ServerError::BadRequest(
                    "Path traversal detected".to_string(),
                ));
            }
        }
    }
    if !resolved.starts_with(base) || resolved == base {
        return Err(ServerError::BadRequest(
            "Path traversal detected".to_string(),
        ));
    }
    Ok(resolved)
}

#[derive(Debug, Clone)]
pub struct BlobStore {
    base_path: PathBuf,
    public_base_url: String,
}

impl BlobStore {
    /// Create the base directory and one directory per bucket.
    pub async fn new(base_path: PathBuf, public_base_url: &str) -> Result<Self, ServerError> {
        for bucket in BUCKETS {
            let dir = base_path.join(bucket);
            fs::create_dir_all(&dir).await.map_err(|e| {
                ServerError::BlobStorage(format!(
                    "Failed to create bucket directory '{}': {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        info!(path = %base_path.display(), "Blob store initialized");

        Ok(Self {
            base_path,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/{}/{}", self.public_base_url, bucket, path)
    }

    /// Write a new object. An object already at `path` is a conflict.
    pub async fn upload(&self, bucket: &str, path: &str, data: &[u8]) -> Result<String, ServerError> {
        if data.is_empty() {
            return Err(ServerError::BadRequest("Empty object".to_string()));
        }
        let target = self.object_path(bucket, path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                ServerError::BlobStorage(format!("Failed to create '{}': {}", parent.display(), e))
            })?;
        }

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => {
                    ServerError::Conflict(format!("Object {bucket}/{path} already exists"))
                }
                _ => ServerError::BlobStorage(format!("Failed to create {bucket}/{path}: {e}")),
            })?;
        fill(file, &target, data)
            .await
            .map_err(|e| ServerError::BlobStorage(format!("Failed to write {bucket}/{path}: {e}")))?;

        debug!(bucket, path, size = data.len(), "Stored object");
        Ok(self.public_url(bucket, path))
    }

    pub async fn get(&self, bucket: &str, path: &str) -> Result<Vec<u8>, ServerError> {
        let target = self.object_path(bucket, path)?;
        match fs::read(&target).await {
            Ok(data) => {
                debug!(bucket, path, size = data.len(), "Read object");
                Ok(data)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(ServerError::NotFound(format!("Object {bucket}/{path}")))
            }
            Err(e) => Err(ServerError::BlobStorage(format!(
                "Failed to read {bucket}/{path}: {e}"
            ))),
        }
    }

    pub async fn remove(&self, bucket: &str, path: &str) -> Result<(), ServerError> {
        let target = self.object_path(bucket, path)?;
        match fs::remove_file(&target).await {
            Ok(()) => {
                debug!(bucket, path, "Deleted object");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(ServerError::NotFound(format!("Object {bucket}/{path}")))
            }
            Err(e) => Err(ServerError::BlobStorage(format!(
                "Failed to delete {bucket}/{path}: {e}"
            ))),
        }
    }

    fn object_path(&self, bucket: &str, path: &str) -> Result<PathBuf, ServerError> {
        if !BUCKETS.contains(&bucket) {
            return Err(ServerError::NotFound(format!("Bucket {bucket}")));
        }
        ensure_within(&self.base_path.join(bucket), path)
    }
}

/// Copy `body` into a freshly created object file. On failure the partial
/// file is deleted so the path stays free.
async fn fill<R>(mut file: fs::File, target: &Path, mut body: R) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let written = async {
        tokio::io::copy(&mut body, &mut file).await?;
        file.flush().await
    }
    .await;

    if written.is_err() {
        drop(file);
        if let Err(e) = fs::remove_file(target).await {
            warn!(path = %target.display(), error = %e, "Failed to remove partial object");
        }
    }
    written
}
