//! Page OCR pipeline.
//!
//! Journal pages are photographed two columns at a time. Each page is split
//! at its gutter, both halves are read by a vision model, and the per-page
//! text is flattened into a single corpus for indexing.

mod backend;
pub mod batch;
pub mod column;
pub mod gutter;
mod ollama;
pub mod splitter;

pub use backend::{encode_image_base64, OcrError, OcrOptions, VisionModel};
pub use batch::PageBatchProcessor;
pub use column::ExtractedPageText;
pub use gutter::{detect_gutter, GutterColumn, GutterConfig};
pub use ollama::OllamaVisionModel;
pub use splitter::SplitPair;
