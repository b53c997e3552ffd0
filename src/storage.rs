//! Page photo import and corpus persistence.

use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::analysis::{DistortionTaxonomy, TaxonomyError};
use crate::ocr::batch::is_page_image;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("No valid images were provided (expected png, jpg or jpeg)")]
    NoValidImages,

    #[error("Text is empty")]
    EmptyText,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Make an uploaded file name safe to store.
///
/// Directory components are dropped and anything outside `[A-Za-z0-9._-]`
/// becomes `_`.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let sanitized: String = base
        .chars()
        .map(|c| match c {
            c if c.is_ascii_alphanumeric() => c,
            '.' | '-' | '_' => c,
            _ => '_',
        })
        .collect();

    let trimmed = sanitized.trim_matches(|c| c == '_' || c == '.');
    if trimmed.is_empty() {
        "page".to_string()
    } else if trimmed.len() > 100 {
        // ASCII only at this point, so byte slicing is safe.
        trimmed[trimmed.len() - 100..].to_string()
    } else {
        trimmed.to_string()
    }
}

/// Copy page photos into `images_dir`, skipping anything that is not a page image.
///
/// Returns the stored file names in input order.
pub async fn import_images(files: &[PathBuf], images_dir: &Path) -> Result<Vec<String>, StorageError> {
    let mut saved = Vec::new();

    for file in files {
        if !is_page_image(file) || !tokio::fs::metadata(file).await.is_ok_and(|m| m.is_file()) {
            debug!("Skipping {}", file.display());
            continue;
        }

        let Some(name) = file.file_name().map(|n| sanitize_filename(&n.to_string_lossy())) else {
            continue;
        };
        if saved.is_empty() {
            tokio::fs::create_dir_all(images_dir).await?;
        }
        tokio::fs::copy(file, images_dir.join(&name)).await?;
        saved.push(name);
    }

    if saved.is_empty() {
        return Err(StorageError::NoValidImages);
    }

    info!(
        "Imported {} images into {}",
        saved.len(),
        images_dir.display()
    );
    Ok(saved)
}

/// Write `text` to `path` atomically. Returns the number of bytes written.
pub fn save_corpus(text: &str, path: &Path) -> Result<usize, StorageError> {
    if text.trim().is_empty() {
        return Err(StorageError::EmptyText);
    }

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(text.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StorageError::Io(e.error))?;

    info!("Saved {} bytes to {}", text.len(), path.display());
    Ok(text.len())
}

/// The distortion reference data as raw JSON.
pub async fn load_taxonomy_raw(path: &Path) -> Result<serde_json::Value, TaxonomyError> {
    Ok(DistortionTaxonomy::load(path).await?.value().clone())
}
