//! Train command - fit a model on a feature table

use anyhow::{Context, Result};
use console::style;
use readscore::config::ProjectConfig;
use readscore::models::Feature;
use readscore::readability::{read_table, train, EvaluationReport, TrainConfig};
use std::path::Path;

fn print_report(report: &EvaluationReport, median: f64) {
    println!("Model performance:");
    println!("  Accuracy:  {:.2}", report.accuracy);
    println!("  Precision: {:.2}", report.precision);
    println!("  Recall:    {:.2}", report.recall);
    println!("  F-score:   {:.2}", report.f1);

    let [[tn, fp], [fn_, tp]] = report.confusion;
    println!("\nConfusion matrix:");
    println!("  {:>10} {:>8} {:>8}", "", "pred 0", "pred 1");
    println!("  {:>10} {:>8} {:>8}", "actual 0", tn, fp);
    println!("  {:>10} {:>8} {:>8}", "actual 1", fn_, tp);

    println!(
        "\nPredictions (1 = rated above median {:.2}):",
        median
    );
    for (name, truth, predicted) in &report.predictions {
        let mark = if truth == predicted {
            style("✓").green()
        } else {
            style("✗").red()
        };
        println!(
            "  {} {:<24} actual {}  predicted {}",
            mark,
            name,
            u8::from(*truth),
            u8::from(*predicted)
        );
    }
}

/// Run the train command
pub fn run(
    table: &Path,
    output: Option<&Path>,
    max_iter: Option<usize>,
    learning_rate: Option<f64>,
    config: &ProjectConfig,
) -> Result<()> {
    let file = std::fs::File::open(table)
        .with_context(|| format!("Failed to open feature table {}", table.display()))?;
    let rows = read_table(file)
        .with_context(|| format!("Failed to parse feature table {}", table.display()))?;

    let defaults = TrainConfig::default();
    let train_config = TrainConfig {
        features: config
            .extractor
            .features
            .clone()
            .unwrap_or_else(|| Feature::MODEL_DEFAULT.to_vec()),
        max_iter: max_iter.unwrap_or(defaults.max_iter),
        learning_rate: learning_rate.unwrap_or(defaults.learning_rate),
        ..defaults
    };

    let result = train(&rows, &train_config).context("Training failed")?;
    print_report(&result.evaluation, result.median);

    if let Some(path) = output {
        let mut metadata = result.model.metadata().cloned().unwrap_or_default();
        metadata.comment_length = Some(config.extractor.comment_length.unwrap_or_default());
        let model = result.model.with_metadata(metadata);
        model
            .save(path)
            .with_context(|| format!("Failed to write model {}", path.display()))?;
        println!(
            "\n{} Saved model to {}",
            style("✓").green(),
            style(path.display()).cyan()
        );
    }

    Ok(())
}
