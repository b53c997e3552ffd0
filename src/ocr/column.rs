//! Per-column OCR and page text assembly.

use std::path::Path;

use tracing::warn;

use super::backend::VisionModel;

/// Placeholder for a page whose columns both came back empty.
pub const NO_TEXT: &str = "[No text extracted]";

/// Placeholder for a failed column or page.
pub fn failure_annotation(reason: &str) -> String {
    format!("[OCR processing failed: {}]", reason)
}

/// Text recovered from one page, labelled with its file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPageText {
    pub name: String,
    pub text: String,
}

impl ExtractedPageText {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }

    /// Page that could not be split or decoded at all.
    pub fn failed(name: impl Into<String>, reason: &str) -> Self {
        Self::new(name, failure_annotation(reason))
    }

    /// The page block as it appears in the corpus, header included.
    pub fn render(&self) -> String {
        format!("\n\n--- {} ---\n{}", self.name, self.text)
    }
}

/// Outcome of reading one column.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ColumnText {
    Text(String),
    Empty,
    Failed(String),
}

async fn read_column(model: &dyn VisionModel, image_path: &Path, prompt: &str) -> ColumnText {
    match model.extract_text(image_path, prompt).await {
        Ok(text) => {
            let text = text.trim();
            if text.is_empty() {
                ColumnText::Empty
            } else {
                ColumnText::Text(text.to_string())
            }
        }
        Err(e) => {
            warn!(
                "{} failed on {}: {}",
                model.model_name(),
                image_path.display(),
                e
            );
            ColumnText::Failed(e.to_string())
        }
    }
}

/// OCR the left then right column and merge the results.
///
/// A failing column is replaced by a failure annotation; the other column's
/// text is kept. Two empty columns yield [`NO_TEXT`].
pub async fn ocr_columns(
    model: &dyn VisionModel,
    left: &Path,
    right: &Path,
    prompt: &str,
) -> String {
    let columns = [
        read_column(model, left, prompt).await,
        read_column(model, right, prompt).await,
    ];

    let parts: Vec<String> = columns
        .into_iter()
        .filter_map(|column| match column {
            ColumnText::Text(text) => Some(text),
            ColumnText::Failed(reason) => Some(failure_annotation(&reason)),
            ColumnText::Empty => None,
        })
        .collect();

    if parts.is_empty() {
        NO_TEXT.to_string()
    } else {
        parts.join("\n")
    }
}
