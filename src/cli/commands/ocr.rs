//! Page OCR command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use console::style;

use cbt_journal::config::Settings;
use cbt_journal::llm::LlmClient;
use cbt_journal::ocr::{OllamaVisionModel, PageBatchProcessor};
use cbt_journal::storage::save_corpus;

/// OCR every page photo in the images directory.
pub async fn cmd_ocr(
    settings: &Settings,
    images_dir: Option<PathBuf>,
    save: bool,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    settings.validate()?;

    let images_dir = images_dir.unwrap_or_else(|| settings.images_dir.clone());
    let client = Arc::new(LlmClient::new(settings.llm.clone())?);
    let model = Arc::new(OllamaVisionModel::new(client, &settings.ocr));
    let processor = PageBatchProcessor::new(model, settings.ocr.clone(), settings.gutter.clone());

    eprintln!(
        "{} Processing pages in {} with {}",
        style("→").cyan(),
        images_dir.display(),
        settings.ocr.model
    );

    let corpus = match processor.process_directory(&images_dir).await {
        Ok(corpus) => corpus,
        Err(e) if e.is_not_found() => {
            eprintln!("{} {}", style("✗").red(), e);
            anyhow::bail!("nothing to process in {}", images_dir.display());
        }
        Err(e) => return Err(e.into()),
    };

    if save {
        let path = output.unwrap_or_else(|| settings.corpus_path.clone());
        let written = save_corpus(&corpus, &path)
            .with_context(|| format!("saving corpus to {}", path.display()))?;
        println!(
            "{} Saved {} characters to {}",
            style("✓").green(),
            written,
            path.display()
        );
    } else {
        println!("{}", corpus);
    }

    Ok(())
}
