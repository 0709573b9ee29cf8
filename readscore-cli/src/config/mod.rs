//! Configuration module for readscore
//!
//! This module handles:
//! - Project-level configuration (readscore.toml)
//! - Extractor overrides (keywords, comment length, feature selection)
//! - CLI defaults (model path, output format)

mod project_config;

pub use project_config::{
    ExtractorSection,
    ModelSection,
    OutputFormat,
    OutputSection,
    ProjectConfig,
    load_config_file,
    load_project_config,
    JSON_CONFIG,
    TOML_CONFIG,
};
