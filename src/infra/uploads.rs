//! Filesystem storage for uploaded post images.

use std::{
    io::ErrorKind,
    path::{Component, Path, PathBuf},
};

use async_trait::async_trait;
use bytes::Bytes;
use slug::slugify;
use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

use crate::application::repos::{BlobStore, BlobStoreError};

/// Blob store rooted at a directory on disk.
#[derive(Debug)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn resolve(&self, stored_path: &str) -> Result<PathBuf, BlobStoreError> {
        let relative = Path::new(stored_path);
        if stored_path.is_empty()
            || relative.is_absolute()
            || relative.components().any(|component| {
                matches!(
                    component,
                    Component::ParentDir | Component::Prefix(_) | Component::RootDir
                )
            })
        {
            return Err(BlobStoreError::InvalidPath);
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn store(
        &self,
        directory: &str,
        original_name: &str,
        data: Bytes,
    ) -> Result<String, BlobStoreError> {
        if data.is_empty() {
            return Err(BlobStoreError::EmptyPayload);
        }

        let stored_path = build_stored_path(directory, original_name);
        let absolute = self.resolve(&stored_path)?;
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await.map_err(io_failure)?;
        }

        let mut file = fs::File::create(&absolute).await.map_err(io_failure)?;
        if let Err(err) = file.write_all(&data).await {
            drop(file);
            let _ = fs::remove_file(&absolute).await;
            return Err(io_failure(err));
        }
        file.flush().await.map_err(io_failure)?;

        Ok(stored_path)
    }

    async fn read(&self, stored_path: &str) -> Result<Bytes, BlobStoreError> {
        let absolute = self.resolve(stored_path)?;
        match fs::metadata(&absolute).await {
            Ok(metadata) if metadata.is_file() => {}
            Ok(_) => return Err(BlobStoreError::NotFound),
            Err(err) => return Err(not_found_or_failure(err)),
        }
        fs::read(absolute)
            .await
            .map(Bytes::from)
            .map_err(not_found_or_failure)
    }

    async fn remove(&self, stored_path: &str) -> Result<(), BlobStoreError> {
        let absolute = self.resolve(stored_path)?;
        fs::remove_file(absolute).await.map_err(not_found_or_failure)
    }
}

fn io_failure(err: std::io::Error) -> BlobStoreError {
    BlobStoreError::Backend(err.to_string())
}

fn not_found_or_failure(err: std::io::Error) -> BlobStoreError {
    match err.kind() {
        ErrorKind::NotFound | ErrorKind::IsADirectory | ErrorKind::NotADirectory => {
            BlobStoreError::NotFound
        }
        _ => io_failure(err),
    }
}

fn build_stored_path(directory: &str, original_name: &str) -> String {
    let directory = directory.trim_matches('/');
    let filename = format!("{}-{}", Uuid::new_v4(), sanitize_filename(original_name));
    if directory.is_empty() {
        filename
    } else {
        format!("{directory}/{filename}")
    }
}

fn sanitize_filename(original: &str) -> String {
    let path = Path::new(original);
    let stem = path
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("image");
    let mut base = slugify(stem);
    if base.is_empty() {
        base = "image".to_string();
    }

    let extension = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.trim_matches('.').to_ascii_lowercase())
        .filter(|value| !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric()));

    match extension {
        Some(ext) => format!("{base}.{ext}"),
        None => base,
    }
}
