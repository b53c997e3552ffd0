//! Configuration and model availability report.

use console::style;

use cbt_journal::config::Settings;
use cbt_journal::llm::LlmClient;

/// Ollama lists untagged pulls as `name:latest`.
fn same_model(installed: &str, wanted: &str) -> bool {
    installed == wanted || installed.strip_suffix(":latest") == Some(wanted)
}

fn is_installed(models: &[String], name: &str) -> bool {
    models.iter().any(|m| same_model(m, name))
}

fn exists_marker(path: &std::path::Path) -> console::StyledObject<&'static str> {
    if path.exists() {
        style("✓").green()
    } else {
        style("✗").red()
    }
}

/// Show resolved paths, models and whether Ollama is reachable.
pub async fn cmd_status(settings: &Settings) -> anyhow::Result<()> {
    println!("\n{}", style("Paths").bold());
    println!("{}", "-".repeat(40));
    for (label, path) in [
        ("Images:", &settings.images_dir),
        ("Corpus:", &settings.corpus_path),
        ("Distortions:", &settings.distortions_path),
    ] {
        println!("{} {:<14} {}", exists_marker(path), label, path.display());
    }

    println!("\n{}", style("Models").bold());
    println!("{}", "-".repeat(40));
    println!("{:<20} {}", "Endpoint:", settings.llm.endpoint);
    println!("{:<20} {}", "Analysis model:", settings.llm.model);
    println!("{:<20} {}", "Embedding model:", settings.llm.embedding_model);
    println!("{:<20} {}", "OCR model:", settings.ocr.model);
    println!("{:<20} {}", "Splitter:", settings.retrieval.splitter);
    println!("{:<20} {}", "Retriever k:", settings.retrieval.k);

    if let Err(e) = settings.validate() {
        println!("\n{} {}", style("!").yellow(), e);
    }

    let client = LlmClient::new(settings.llm.clone())?;
    if !client.is_available().await {
        println!("\n{} {}", style("!").yellow(), settings.llm.availability_hint());
        return Ok(());
    }

    println!("\n{}", style("Installed Models").bold());
    println!("{}", "-".repeat(40));
    match client.list_models().await {
        Ok(models) if models.is_empty() => println!("  No models installed"),
        Ok(models) => {
            let wanted = [
                settings.llm.model.as_str(),
                settings.llm.embedding_model.as_str(),
                settings.ocr.model.as_str(),
            ];
            for model in &models {
                let marker = if wanted.iter().any(|w| same_model(model, w)) {
                    style("*").green().to_string()
                } else {
                    " ".to_string()
                };
                println!("{} {}", marker, model);
            }
            for missing in wanted.iter().filter(|w| !is_installed(&models, w)) {
                println!("{} {} is not installed", style("!").yellow(), missing);
            }
        }
        Err(e) => println!("{} Failed to list models: {}", style("✗").red(), e),
    }

    Ok(())
}
