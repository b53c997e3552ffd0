//! Directory-level OCR: every page image becomes one line of the corpus.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use super::backend::{OcrError, OcrOptions, VisionModel};
use super::column::{ocr_columns, ExtractedPageText};
use super::gutter::{detect_gutter, GutterConfig};
use super::splitter::{open_page, split_and_save, SplitPair};

/// File extensions treated as page photos.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpeg", "jpg", "png"];

/// Whether `path` has a page photo extension (case-insensitive).
pub fn is_page_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

/// Page images directly inside `dir`, sorted by file name.
pub fn list_page_images(dir: &Path) -> Result<Vec<PathBuf>, OcrError> {
    if !dir.is_dir() {
        return Err(OcrError::DirectoryNotFound(dir.to_path_buf()));
    }

    let mut images: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_page_image(path))
        .collect();

    if images.is_empty() {
        return Err(OcrError::NoImagesFound(dir.to_path_buf()));
    }

    images.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(images)
}

/// Collapse every line break in a page block into a single space.
pub fn flatten_line_breaks(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\n', '\r'], " ")
}

/// Splits, reads and concatenates page photos.
pub struct PageBatchProcessor {
    model: Arc<dyn VisionModel>,
    options: OcrOptions,
    gutter: GutterConfig,
}

impl PageBatchProcessor {
    pub fn new(model: Arc<dyn VisionModel>, options: OcrOptions, gutter: GutterConfig) -> Self {
        Self {
            model,
            options,
            gutter,
        }
    }

    /// Directory that receives split halves for pages in `images_dir`.
    pub fn splits_dir(&self, images_dir: &Path) -> PathBuf {
        images_dir.join(&self.options.splits_subdir)
    }

    /// OCR every page in `images_dir` and return the single-line-per-page corpus.
    ///
    /// A missing or empty directory fails. Individual pages never do; their
    /// failures are annotated inline.
    pub async fn process_directory(&self, images_dir: &Path) -> Result<String, OcrError> {
        let images = list_page_images(images_dir)?;
        let splits_dir = self.splits_dir(images_dir);
        info!("Found {} images to process", images.len());

        let started = Instant::now();
        let mut corpus = String::new();
        for image in &images {
            let page = self.process_page(image, &splits_dir).await;
            corpus.push_str(&flatten_line_breaks(&page.render()));
        }

        info!(
            "Processed {} images in {:.1}s ({} chars)",
            images.len(),
            started.elapsed().as_secs_f64(),
            corpus.len()
        );
        Ok(corpus)
    }

    /// OCR a single page. Split failures become a page-level annotation.
    pub async fn process_page(&self, image_path: &Path, splits_dir: &Path) -> ExtractedPageText {
        let name = image_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| image_path.display().to_string());
        info!("Processing image: {}", name);

        let pair = match self.split_page(image_path, splits_dir) {
            Ok(pair) => pair,
            Err(e) => {
                warn!("Failed to split {}: {}", name, e);
                return ExtractedPageText::failed(name, &e.to_string());
            }
        };

        let text = ocr_columns(
            self.model.as_ref(),
            &pair.left_path,
            &pair.right_path,
            &self.options.prompt,
        )
        .await;
        ExtractedPageText::new(name, text)
    }

    fn split_page(&self, image_path: &Path, splits_dir: &Path) -> Result<SplitPair, OcrError> {
        let image = open_page(image_path)?;
        let column = detect_gutter(&image, &self.gutter)?;
        split_and_save(&image, image_path, column, splits_dir)
    }
}
