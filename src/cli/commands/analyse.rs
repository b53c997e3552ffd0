//! Distortion analysis command.

use std::sync::Arc;

use console::style;

use cbt_journal::analysis::{
    AnalysisError, AnalysisOrchestrator, AnalysisOutcome, DistortionFinding, OllamaPipelineBuilder,
};
use cbt_journal::config::Settings;
use cbt_journal::llm::LlmClient;

/// Analyse one issue and print the findings.
pub async fn cmd_analyse(
    settings: &Settings,
    issue: &str,
    use_context: bool,
    json: bool,
) -> anyhow::Result<()> {
    settings.validate()?;

    let client = Arc::new(LlmClient::new(settings.llm.clone())?);
    let builder = OllamaPipelineBuilder::new(
        client,
        settings.distortions_path.clone(),
        settings.corpus_path.clone(),
        settings.retrieval.clone(),
    );
    let orchestrator = AnalysisOrchestrator::new(Arc::new(builder));

    let outcome = match orchestrator.analyse(issue, use_context).await {
        Ok(outcome) => outcome,
        Err(e) => {
            if let AnalysisError::InvalidOutput { content, .. } = &e {
                eprintln!("{} Model output was not valid JSON:", style("✗").red());
                eprintln!("{}", style(content).dim());
            }
            if let Some(source) = e.source_content() {
                eprintln!("\n{}", style("Source content").bold());
                eprintln!("{}", source);
            }
            return Err(e.into());
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }
    Ok(())
}

fn print_finding(finding: &DistortionFinding) {
    println!("\n{} {}", style("•").cyan(), style(&finding.name).bold());
    println!("  {}", finding.explanation);
    for question in &finding.questions {
        println!("  {} {}", style("?").yellow(), question);
    }
}

fn print_outcome(outcome: &AnalysisOutcome) {
    let result = &outcome.result;
    let heading = match result.comparison() {
        Some(_) => "Distortions in your journal",
        None => "Distortions in your issue",
    };

    println!("\n{}", style(heading).bold());
    println!("{}", "-".repeat(40));
    if result.findings().is_empty() {
        println!("  None identified");
    }
    for finding in result.findings() {
        print_finding(finding);
    }

    if let Some(comparison) = result.comparison() {
        println!("\n{}", style("Comparison").bold());
        println!("{}", "-".repeat(40));
        println!("{}", comparison);
    }

    if !outcome.source_content.is_empty() {
        println!("\n{}", style("Source content").bold());
        println!("{}", "-".repeat(40));
        println!("{}", style(&outcome.source_content).dim());
    }
}
