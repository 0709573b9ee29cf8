//! Rate command - score snippets with a readability model

use anyhow::{Context, Result};
use console::style;
use readscore::config::{OutputFormat, ProjectConfig};
use readscore::models::{FeatureVector, Prediction};
use readscore::readability::{Contribution, FeatureExtractor, ReadabilityScorer, ScoringModel};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One scored file, as printed by `--format json`
#[derive(Debug, Serialize)]
struct RateReport {
    file: String,
    score: f64,
    raw_score: f64,
    features: FeatureVector,
    #[serde(skip_serializing_if = "Option::is_none")]
    contributions: Option<Vec<Contribution>>,
}

/// Pick the model: `--model`, then `[model] path`, then the built-in one
fn load_model(explicit: Option<&Path>, config: &ProjectConfig) -> Result<ScoringModel> {
    let path: Option<PathBuf> = explicit.map(Path::to_path_buf).or_else(|| config.model_path());
    match path {
        Some(path) => {
            debug!("Loading model from {}", path.display());
            ScoringModel::load(&path)
                .with_context(|| format!("Failed to load model {}", path.display()))
        }
        None => {
            debug!("Using built-in model");
            Ok(ScoringModel::default())
        }
    }
}

fn build_scorer(model: Option<&Path>, config: &ProjectConfig) -> Result<ReadabilityScorer> {
    let model = load_model(model, config)?;
    let extractor = FeatureExtractor::new(config.extractor_config(model.features().collect()));
    ReadabilityScorer::new(extractor, model)
        .context("Model features do not match the extractor configuration")
}

fn rate_file(scorer: &ReadabilityScorer, file: &Path, explain: bool) -> Result<RateReport> {
    let source = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let metrics = scorer.extractor().extract(&source);
    let Prediction { raw_score, score } = scorer.score_metrics(&metrics);
    let contributions = if explain {
        Some(scorer.explain(&metrics)?)
    } else {
        None
    };

    Ok(RateReport {
        file: file.display().to_string(),
        score,
        raw_score,
        features: scorer.features(&metrics),
        contributions,
    })
}

fn print_text(report: &RateReport, show_file: bool) {
    if show_file {
        println!("{}", style(&report.file).bold());
    }
    println!("Readability score: {:.2}", report.score);

    if let Some(terms) = &report.contributions {
        println!(
            "  {:<22} {:>9} {:>9} {:>9}",
            style("feature").dim(),
            style("value").dim(),
            style("z").dim(),
            style("weighted").dim()
        );
        for c in terms {
            let weighted = format!("{:+.3}", c.weighted);
            let weighted = if c.weighted >= 0.0 {
                style(weighted).green()
            } else {
                style(weighted).red()
            };
            println!(
                "  {:<22} {:>9.2} {:>9.2} {:>9}",
                c.feature.name(),
                c.value,
                c.normalized,
                weighted
            );
        }
        println!("  {:<22} {:>29.3}", "raw score", report.raw_score);
    }
}

/// Run the rate command
pub fn run(
    files: &[PathBuf],
    model: Option<&Path>,
    format: OutputFormat,
    explain: bool,
    config: &ProjectConfig,
) -> Result<()> {
    let scorer = build_scorer(model, config)?;

    let reports = files
        .iter()
        .map(|file| rate_file(&scorer, file, explain))
        .collect::<Result<Vec<_>>>()?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
        OutputFormat::Text => {
            let show_file = reports.len() > 1;
            for (i, report) in reports.iter().enumerate() {
                if i > 0 && (show_file || explain) {
                    println!();
                }
                print_text(report, show_file);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use readscore::models::Feature;
    use readscore::readability::{FeatureWeight, ModelError};

    #[test]
    fn test_built_in_model_by_default() {
        let scorer = build_scorer(None, &ProjectConfig::default()).unwrap();
        assert_eq!(scorer.model(), &ScoringModel::default());
    }

    #[test]
    fn test_explicit_model_and_explain() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("model.json");
        let model = ScoringModel::new(
            [(
                Feature::AvgSpaces,
                FeatureWeight {
                    mean: 1.0,
                    std: 2.0,
                    coefficient: 0.5,
                },
            )],
            0.0,
        )
        .unwrap();
        model.save(&model_path).unwrap();

        let file = dir.path().join("a.go");
        std::fs::write(&file, "a b c\n").unwrap();

        let scorer = build_scorer(Some(&model_path), &ProjectConfig::default()).unwrap();
        let report = rate_file(&scorer, &file, true).unwrap();
        // two spaces on one line: z = (2 - 1) / 2
        assert_eq!(report.raw_score, 0.25);
        assert_eq!(report.features.get(Feature::AvgSpaces), Some(2.0));
        assert_eq!(report.contributions.unwrap().len(), 1);
    }

    #[test]
    fn test_report_matches_direct_scoring() {
        let dir = tempfile::tempdir().unwrap();
        let source = "package main\n\n// entry\nfunc main() {\n\tprintln(\"hi\", 1)\n}\n";
        let file = dir.path().join("main.go");
        std::fs::write(&file, source).unwrap();

        let scorer = build_scorer(None, &ProjectConfig::default()).unwrap();
        let report = rate_file(&scorer, &file, true).unwrap();
        let direct = scorer.score(source);
        assert_eq!(report.raw_score.to_bits(), direct.raw_score.to_bits());
        assert_eq!(report.features, scorer.extractor().extract_features(source));

        let terms = report.contributions.unwrap();
        let sum = terms.iter().map(|c| c.weighted).sum::<f64>() + scorer.model().intercept();
        assert_eq!(sum.to_bits(), report.raw_score.to_bits());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let scorer = build_scorer(None, &ProjectConfig::default()).unwrap();
        assert!(rate_file(&scorer, Path::new("/nonexistent/snippet.go"), false).is_err());
    }

    #[test]
    fn test_bad_model_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("model.json");
        std::fs::write(&model_path, "{\"intercept\": 0.0, \"features\": {}}").unwrap();
        let err = build_scorer(Some(&model_path), &ProjectConfig::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ModelError>(),
            Some(ModelError::Parse(_))
        ));
    }
}
