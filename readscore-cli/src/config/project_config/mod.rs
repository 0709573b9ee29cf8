//! Project-level configuration support
//!
//! Loads configuration from `readscore.toml` or `.readscorerc.json` in the
//! working directory, or from an explicit path.
//!
//! # Configuration Format
//!
//! ```toml
//! # readscore.toml
//!
//! [extractor]
//! keywords = ["func", "return", "if"]   # replaces the Go keyword set
//! comment_length = "last"               # "last" | "sum"
//! features = ["avg_strings", "avg_line_length"]
//!
//! [model]
//! path = "model.json"                   # relative to this file
//!
//! [output]
//! format = "json"                       # "text" | "json"
//! ```


use crate::models::Feature;
use crate::readability::{CommentLength, ExtractorConfig, KeywordSet};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const TOML_CONFIG: &str = "readscore.toml";
pub const JSON_CONFIG: &str = ".readscorerc.json";

/// Output format for `rate`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Project-level configuration loaded from readscore.toml or similar
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProjectConfig {
    #[serde(default)]
    pub extractor: ExtractorSection,

    #[serde(default)]
    pub model: ModelSection,

    #[serde(default)]
    pub output: OutputSection,

    /// Directory the config was loaded from (not serialized)
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

/// `[extractor]` table
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ExtractorSection {
    /// Replacement keyword set
    #[serde(default)]
    pub keywords: Option<Vec<String>>,

    #[serde(default)]
    pub comment_length: Option<CommentLength>,

    /// Features handed to the model; must match the model's feature set
    #[serde(default)]
    pub features: Option<Vec<Feature>>,
}

/// `[model]` table
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ModelSection {
    /// Model JSON; relative paths resolve against the config file's directory
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// `[output]` table
#[derive(Debug, Clone, Deserialize, Default)]
pub struct OutputSection {
    #[serde(default)]
    pub format: Option<OutputFormat>,
}

impl ProjectConfig {
    /// Build the extractor settings. `selection` is what the model expects
    /// and is used unless the config names features explicitly.
    pub fn extractor_config(&self, selection: Vec<Feature>) -> ExtractorConfig {
        let mut config = ExtractorConfig::default().with_selection(
            self.extractor.features.clone().unwrap_or(selection),
        );
        if let Some(words) = &self.extractor.keywords {
            config = config.with_keywords(KeywordSet::new(words));
        }
        if let Some(mode) = self.extractor.comment_length {
            config = config.with_comment_length(mode);
        }
        config
    }

    /// Model path from the config, resolved against the config's directory
    pub fn model_path(&self) -> Option<PathBuf> {
        let path = self.model.path.as_ref()?;
        match &self.base_dir {
            Some(dir) if path.is_relative() => Some(dir.join(path)),
            _ => Some(path.clone()),
        }
    }

    fn with_base_dir(mut self, path: &Path) -> Self {
        self.base_dir = path.parent().map(Path::to_path_buf);
        self
    }
}

/// Load project configuration from `dir`.
///
/// Tries `readscore.toml`, then `.readscorerc.json`. A file that fails to
/// parse is warned about and skipped; with nothing usable the defaults apply.
pub fn load_project_config(dir: &Path) -> ProjectConfig {
    let toml_path = dir.join(TOML_CONFIG);
    if toml_path.exists() {
        match load_toml_config(&toml_path) {
            Ok(config) => {
                debug!("Loaded project config from {}", toml_path.display());
                return config;
            }
            Err(e) => {
                warn!("Failed to load {}: {}", toml_path.display(), e);
            }
        }
    }

    let json_path = dir.join(JSON_CONFIG);
    if json_path.exists() {
        match load_json_config(&json_path) {
            Ok(config) => {
                debug!("Loaded project config from {}", json_path.display());
                return config;
            }
            Err(e) => {
                warn!("Failed to load {}: {}", json_path.display(), e);
            }
        }
    }

    debug!("No project config found, using defaults");
    ProjectConfig::default()
}

/// Load an explicitly named config file. Unlike discovery, failure is an error.
pub fn load_config_file(path: &Path) -> anyhow::Result<ProjectConfig> {
    let is_json = path.extension().is_some_and(|ext| ext == "json");
    let config = if is_json {
        load_json_config(path)
    } else {
        load_toml_config(path)
    };
    config.with_context(|| format!("Failed to load config {}", path.display()))
}

/// Load configuration from a TOML file
fn load_toml_config(path: &Path) -> anyhow::Result<ProjectConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: ProjectConfig = toml::from_str(&content)?;
    Ok(config.with_base_dir(path))
}

/// Load configuration from a JSON file
fn load_json_config(path: &Path) -> anyhow::Result<ProjectConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: ProjectConfig = serde_json::from_str(&content)?;
    Ok(config.with_base_dir(path))
}
