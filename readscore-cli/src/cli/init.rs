//! Init command - write a readscore.toml template

use anyhow::{Context, Result};
use console::style;
use readscore::config::TOML_CONFIG;
use std::path::Path;

const DEFAULT_CONFIG: &str = r#"# readscore configuration

[extractor]
# Replace the Go keyword set
# keywords = ["break", "case", "chan", "const", "continue", "default", "defer",
#             "else", "fallthrough", "for", "func", "go", "goto", "if", "import",
#             "interface", "map", "package", "range", "return", "select",
#             "struct", "switch", "type", "var"]

# How comment lengths combine: "last" (the built-in model) or "sum"
comment_length = "last"

# Features fed to the model; must match the model's feature set
# features = ["avg_strings", "avg_line_length", "avg_commas_periods",
#             "avg_num_identifiers", "avg_keywords", "avg_strings_len",
#             "avg_comment_len", "avg_identifier_len"]

[model]
# Model JSON written by `readscore train` (default: built-in model)
# path = "model.json"

[output]
# Default output format for `readscore rate` (text, json)
format = "text"
"#;

/// Run the init command
pub fn run(path: &Path) -> Result<()> {
    let dir = path
        .canonicalize()
        .with_context(|| format!("Path does not exist: {}", path.display()))?;

    let config_path = dir.join(TOML_CONFIG);
    if config_path.exists() {
        anyhow::bail!("{} already exists", config_path.display());
    }

    std::fs::write(&config_path, DEFAULT_CONFIG)
        .with_context(|| format!("Failed to create {}", config_path.display()))?;
    println!(
        "{} Created {}",
        style("✓").green(),
        style(config_path.display()).cyan()
    );

    Ok(())
}
