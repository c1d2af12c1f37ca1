use std::path::Path;

use tokio::sync::watch;

use crate::api::{DocumentBatch, MetadataPair};

use super::error::UploadError;

/// One document to add to the backend's index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, named after its final path component.
    pub async fn from_path(path: &Path) -> Result<Self, UploadError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| UploadError::ReadFile {
                path: path.to_path_buf(),
                source,
            })?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { name, bytes })
    }
}

/// Package files and metadata as one batch; every file appears once, in order.
pub fn build_batch(files: Vec<UploadFile>, metadata: Vec<MetadataPair>) -> DocumentBatch {
    DocumentBatch {
        files: files.into_iter().map(|file| (file.name, file.bytes)).collect(),
        metadata,
    }
}

/// Parse `key=value` command-line metadata.
pub fn parse_metadata_pair(raw: &str) -> Option<MetadataPair> {
    let (key, value) = raw.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some(MetadataPair::new(key, value.trim()))
}

/// The "uploading" indicator.
pub struct UploadFlag {
    tx: watch::Sender<bool>,
}

impl Default for UploadFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadFlag {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn is_uploading(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    pub fn try_begin(&self) -> Option<UploadGuard<'_>> {
        let acquired = self.tx.send_if_modified(|uploading| {
            if *uploading {
                false
            } else {
                *uploading = true;
                true
            }
        });
        acquired.then(|| UploadGuard { flag: self })
    }
}

/// Clears the uploading indicator on every exit path.
#[must_use = "the upload flag is cleared as soon as the guard is dropped"]
pub struct UploadGuard<'a> {
    flag: &'a UploadFlag,
}

impl Drop for UploadGuard<'_> {
    fn drop(&mut self) {
        self.flag.tx.send_replace(false);
    }
}
