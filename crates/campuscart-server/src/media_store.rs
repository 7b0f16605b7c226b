//! Local object storage for listing and offer images.
//!
//! Each [`Bucket`] is a sub-directory of the storage root. Objects are
//! written under generated keys (`<uuid>.<ext>`) and served back by key;
//! public URLs for those keys come from [`campuscart_shared::ImageResolver`].

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use campuscart_shared::Bucket;
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ServerError;

const ALL_BUCKETS: [Bucket; 2] = [Bucket::PostImages, Bucket::OfferImages];

/// Verify that a resolved path stays within the expected base directory.
fn ensure_within(base: &Path, target: &Path) -> Result<PathBuf, ServerError> {
    let canonical_base = base.canonicalize().unwrap_or_else(|_| base.to_path_buf());
    let mut resolved = canonical_base.clone();
    for component in target
        .strip_prefix(base)
        .unwrap_or(target)
        .components()
    {
        match component {
            Component::Normal(c) => resolved.push(c),
            Component::ParentDir => {
                return Err(ServerError::BadRequest("Path traversal detected".into()));
            }
            _ => {}
        }
    }
    if !resolved.starts_with(&canonical_base) {
        return Err(ServerError::BadRequest("Path traversal detected".into()));
    }
    Ok(resolved)
}

/// A key is a single file name: no separators, no dot-files, no `..`.
fn validate_key(key: &str) -> Result<(), ServerError> {
    if key.is_empty()
        || key.starts_with('.')
        || key.contains('/')
        || key.contains('\\')
        || key.contains("..")
    {
        return Err(ServerError::BadRequest(format!("Invalid object key: {key}")));
    }
    Ok(())
}

/// Keep short alphanumeric extensions only, lowercased.
fn sanitize_extension(ext: Option<&str>) -> Option<String> {
    let ext = ext?.trim().trim_start_matches('.');
    if ext.is_empty() || ext.len() > 8 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Content type served for a stored key, guessed from its extension.
pub fn content_type_for(key: &str) -> &'static str {
    let ext = key.rsplit_once('.').map(|(_, e)| e).unwrap_or("");
    match ext {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone)]
pub struct MediaStore {
    base_path: PathBuf,
    max_size: usize,
}

impl MediaStore {
    pub async fn new(base_path: PathBuf, max_size: usize) -> Result<Self, ServerError> {
        for bucket in ALL_BUCKETS {
            let dir = base_path.join(bucket.as_str());
            fs::create_dir_all(&dir).await.map_err(|e| {
                ServerError::MediaStorage(format!(
                    "Failed to create bucket directory '{}': {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        info!(path = %base_path.display(), "Media store initialized");

        Ok(Self {
            base_path,
            max_size,
        })
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Store `data` in `bucket` under a fresh key and return that key.
    pub async fn upload(
        &self,
        bucket: Bucket,
        data: &[u8],
        extension: Option<&str>,
    ) -> Result<String, ServerError> {
        if data.is_empty() {
            return Err(ServerError::BadRequest("Empty upload".into()));
        }
        if data.len() > self.max_size {
            return Err(ServerError::ImageTooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }

        let key = match sanitize_extension(extension) {
            Some(ext) => format!("{}.{ext}", Uuid::new_v4()),
            None => Uuid::new_v4().to_string(),
        };
        let path = self.object_path(bucket, &key)?;

        fs::write(&path, data).await.map_err(|e| {
            ServerError::MediaStorage(format!("Failed to write {bucket}/{key}: {e}"))
        })?;

        debug!(%bucket, key = %key, size = data.len(), "Stored image");
        Ok(key)
    }

    pub async fn read(&self, bucket: Bucket, key: &str) -> Result<Bytes, ServerError> {
        let path = self.object_path(bucket, key)?;

        if !path.exists() {
            return Err(ServerError::MediaNotFound(format!("{bucket}/{key}")));
        }

        let data = fs::read(&path).await.map_err(|e| {
            ServerError::MediaStorage(format!("Failed to read {bucket}/{key}: {e}"))
        })?;

        debug!(%bucket, key = %key, size = data.len(), "Served image");
        Ok(Bytes::from(data))
    }

    fn object_path(&self, bucket: Bucket, key: &str) -> Result<PathBuf, ServerError> {
        validate_key(key)?;
        let raw = self.base_path.join(bucket.as_str()).join(key);
        ensure_within(&self.base_path, &raw)
    }
}
