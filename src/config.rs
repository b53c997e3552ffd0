//! Configuration discovery and resolution.
//!
//! A config file named `cbt-journal.{toml,yaml,json}` is discovered with the
//! prefer crate, parsed with serde according to its extension and resolved
//! into [`Settings`] with concrete paths. Environment variables override
//! whatever the file sets.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::index::RetrievalConfig;
use crate::llm::LlmConfig;
use crate::ocr::{GutterConfig, OcrOptions};

/// Name prefer searches for.
pub const CONFIG_NAME: &str = "cbt-journal";

const DEFAULT_DATA_DIR: &str = "data";
const IMAGES_SUBDIR: &str = "journal_images";
const CORPUS_FILENAME: &str = "full_journal_text.txt";
const DISTORTIONS_FILENAME: &str = "cognitive_distortions.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {format} config {}: {message}", path.display())]
    Parse {
        path: PathBuf,
        format: &'static str,
        message: String,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration as written in the file. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Root for images, corpus and reference data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Page photo directory (default `<data_dir>/journal_images`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images_dir: Option<String>,
    /// Corpus text file (default `<data_dir>/full_journal_text.txt`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corpus_path: Option<String>,
    /// Distortion reference JSON (default `<data_dir>/cognitive_distortions.json`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distortions_path: Option<String>,
    #[serde(default, skip_serializing_if = "LlmConfig::is_default")]
    pub llm: LlmConfig,
    #[serde(default)]
    pub ocr: OcrOptions,
    #[serde(default)]
    pub gutter: GutterConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Discover and load the config file, falling back to defaults when none exists.
    pub async fn load() -> Result<Self, ConfigError> {
        match prefer::load(CONFIG_NAME).await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    Self::load_from_path(path).await
                } else {
                    Ok(Self::default())
                }
            }
            Err(_) => {
                debug!("No {} config file found, using defaults", CONFIG_NAME);
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific file path.
    ///
    /// The format follows the extension: TOML, YAML, otherwise JSON.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let parse_err = |format: &'static str, message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            format,
            message,
        };

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents).map_err(|e| parse_err("TOML", e.to_string()))?,
            "yaml" | "yml" => {
                serde_yaml::from_str(&contents).map_err(|e| parse_err("YAML", e.to_string()))?
            }
            _ => serde_json::from_str(&contents).map_err(|e| parse_err("JSON", e.to_string()))?,
        };

        debug!("Loaded config from {}", path.display());
        config.source_path = Some(path.to_path_buf());
        Ok(config.with_env_overrides())
    }

    /// Reapply env overrides to sections the file set explicitly.
    fn with_env_overrides(mut self) -> Self {
        self.llm = self.llm.with_env_overrides();
        self.ocr = self.ocr.with_env_overrides();
        self.retrieval = self.retrieval.with_env_overrides();
        self
    }

    /// Directory relative paths are resolved against: the config file's
    /// directory, or `None` when no file was loaded.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative or start with `~`.
    pub fn resolve_path(path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Resolve into concrete settings.
    pub fn into_settings(self) -> Settings {
        let base_dir = self
            .base_dir()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

        // CBT_DATA_DIR wins over the file.
        let data_dir_str = std::env::var("CBT_DATA_DIR")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.data_dir.clone())
            .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());
        let data_dir = Self::resolve_path(&data_dir_str, &base_dir);

        let under_data = |value: &Option<String>, default: &str| match value {
            Some(p) => Self::resolve_path(p, &base_dir),
            None => data_dir.join(default),
        };

        Settings {
            images_dir: under_data(&self.images_dir, IMAGES_SUBDIR),
            corpus_path: under_data(&self.corpus_path, CORPUS_FILENAME),
            distortions_path: under_data(&self.distortions_path, DISTORTIONS_FILENAME),
            data_dir,
            llm: self.llm,
            ocr: self.ocr,
            gutter: self.gutter,
            retrieval: self.retrieval,
        }
    }
}

/// Resolved application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub images_dir: PathBuf,
    pub corpus_path: PathBuf,
    pub distortions_path: PathBuf,
    pub llm: LlmConfig,
    pub ocr: OcrOptions,
    pub gutter: GutterConfig,
    pub retrieval: RetrievalConfig,
}

impl Settings {
    /// Reject settings that cannot work, before any model is called.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.gutter
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.retrieval
            .strategy()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.ocr.max_tokens == 0 {
            return Err(ConfigError::Invalid(
                "ocr.max_tokens must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load settings from `path` when given, otherwise by discovery.
pub async fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let config = match path {
        Some(path) => Config::load_from_path(path).await?,
        None => Config::load().await?,
    };
    Ok(config.into_settings())
}
