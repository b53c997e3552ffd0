//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod analyse;
mod data;
mod ocr;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use cbt_journal::config::load_settings;

#[derive(Parser)]
#[command(name = "cbt")]
#[command(about = "Journal OCR and cognitive distortion analysis")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Split and OCR every page photo into one corpus
    Ocr {
        /// Directory of page photos (defaults to the configured images directory)
        #[arg(short, long)]
        images_dir: Option<PathBuf>,
        /// Save the corpus instead of printing it
        #[arg(short, long)]
        save: bool,
        /// Where to save the corpus (defaults to the configured corpus path)
        #[arg(short, long, requires = "save")]
        output: Option<PathBuf>,
    },

    /// Copy page photos into the images directory
    Import {
        /// Photos to import (png, jpg, jpeg)
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Save a text file as the journal corpus
    SaveText {
        /// Text file to save
        file: PathBuf,
    },

    /// Analyse an issue for cognitive distortions
    #[command(alias = "analyze")]
    Analyse {
        /// The issue to analyse
        issue: String,
        /// Ground the analysis in retrieved journal entries
        #[arg(long)]
        context: bool,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the cognitive distortion reference data
    Distortions,

    /// Show configuration and model availability
    Status,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Ocr {
            images_dir,
            save,
            output,
        } => ocr::cmd_ocr(&settings, images_dir, save, output).await,
        Commands::Import { files } => data::cmd_import(&settings, &files).await,
        Commands::SaveText { file } => data::cmd_save_text(&settings, &file).await,
        Commands::Analyse {
            issue,
            context,
            json,
        } => analyse::cmd_analyse(&settings, &issue, context, json).await,
        Commands::Distortions => data::cmd_distortions(&settings).await,
        Commands::Status => status::cmd_status(&settings).await,
    }
}
