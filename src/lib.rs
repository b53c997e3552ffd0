//! cbt-journal - journal OCR and cognitive distortion analysis.
//!
//! Photographed two-column journal pages are split at their gutter, read by a
//! vision model column by column, and concatenated into a plain-text corpus.
//! The corpus backs an optional retrieval step when analysing a new issue for
//! cognitive distortions.

pub mod analysis;
pub mod config;
pub mod index;
pub mod llm;
pub mod ocr;
pub mod storage;
