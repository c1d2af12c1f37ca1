//! Document upload from the command line.

use std::path::PathBuf;

use crate::api::MetadataPair;
use crate::core::controller::ChatController;
use crate::core::error::UploadError;
use crate::core::upload::{parse_metadata_pair, UploadFile};

/// Parse `--meta key=value` arguments, reporting the first malformed one.
pub fn parse_meta_args(raw: &[String]) -> Result<Vec<MetadataPair>, String> {
    raw.iter()
        .map(|item| {
            parse_metadata_pair(item)
                .ok_or_else(|| format!("metadata must look like key=value, got '{item}'"))
        })
        .collect()
}

/// Read every file, then submit them as one batch.
pub async fn upload_paths(
    controller: &ChatController,
    paths: &[PathBuf],
    metadata: Vec<MetadataPair>,
) -> Result<usize, UploadError> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        files.push(UploadFile::from_path(path).await?);
    }
    let count = files.len();
    controller.upload_documents(files, metadata).await?;
    Ok(count)
}

/// Upload and report the outcome; returns whether it succeeded.
pub async fn run_upload(
    controller: &ChatController,
    paths: &[PathBuf],
    metadata: Vec<MetadataPair>,
) -> bool {
    println!("📤 Uploading {} file(s)...", paths.len());
    match upload_paths(controller, paths, metadata).await {
        Ok(count) => {
            println!("✅ Added {count} document(s) to the index");
            true
        }
        Err(err) => {
            eprintln!("❌ {err}");
            false
        }
    }
}
