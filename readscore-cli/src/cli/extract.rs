//! Extract command - build the feature table for training

use anyhow::{Context, Result};
use console::style;
use readscore::config::ProjectConfig;
use readscore::models::Feature;
use readscore::readability::{build_dataset, load_ratings, write_table, FeatureExtractor};
use std::path::Path;
use tracing::warn;

/// Run the extract command
pub fn run(
    dir: &Path,
    ratings: &Path,
    output: Option<&Path>,
    workers: usize,
    config: &ProjectConfig,
) -> Result<()> {
    let ratings = load_ratings(ratings)
        .with_context(|| format!("Failed to load ratings from {}", ratings.display()))?;
    if ratings.is_empty() {
        warn!("Ratings file has no usable rows");
    }

    // The table always carries every feature, so the selection is irrelevant here.
    let extractor = FeatureExtractor::new(config.extractor_config(Feature::MODEL_DEFAULT.to_vec()));
    let rows = build_dataset(dir, &ratings, &extractor, workers)
        .with_context(|| format!("Failed to extract snippets in {}", dir.display()))?;

    match output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_table(&rows, file)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!(
                "{} Wrote {} snippets to {}",
                style("✓").green(),
                rows.len(),
                style(path.display()).cyan()
            );
        }
        None => {
            write_table(&rows, std::io::stdout().lock()).context("Failed to write feature table")?;
        }
    }

    Ok(())
}
