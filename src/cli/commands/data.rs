//! Image import, corpus save and reference data commands.

use std::path::{Path, PathBuf};

use anyhow::Context;
use console::style;

use cbt_journal::config::Settings;
use cbt_journal::storage::{import_images, load_taxonomy_raw, save_corpus};

/// Copy page photos into the images directory.
pub async fn cmd_import(settings: &Settings, files: &[PathBuf]) -> anyhow::Result<()> {
    let saved = import_images(files, &settings.images_dir).await?;

    println!(
        "{} Imported {} of {} files into {}",
        style("✓").green(),
        saved.len(),
        files.len(),
        settings.images_dir.display()
    );
    for name in saved {
        println!("  {}", name);
    }
    Ok(())
}

/// Save a text file as the corpus.
pub async fn cmd_save_text(settings: &Settings, file: &Path) -> anyhow::Result<()> {
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    let written = save_corpus(&text, &settings.corpus_path)?;

    println!(
        "{} Saved {} characters to {}",
        style("✓").green(),
        written,
        settings.corpus_path.display()
    );
    Ok(())
}

/// Print the distortion reference JSON.
pub async fn cmd_distortions(settings: &Settings) -> anyhow::Result<()> {
    let value = load_taxonomy_raw(&settings.distortions_path).await?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
