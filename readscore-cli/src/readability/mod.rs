//! Readability scoring for Go snippets
//!
//! Lexical features → z-score → linear model → sigmoid
//!
//! The extractor turns source text into counters and averages, the model
//! maps the selected averages to a score in (0, 1). Ratings, dataset and
//! train are the offline side: they produce the model the scorer loads.

pub mod dataset;
pub mod features;
pub mod model;
pub mod ratings;
pub mod train;

pub use dataset::{build_dataset, read_table, write_table, DatasetError, DatasetRow, TableRow};
pub use features::{
    CommentLength, ExtractorConfig, FeatureExtractor, KeywordSet, SnippetMetrics, GO_KEYWORDS,
};
pub use model::{sigmoid, Contribution, FeatureWeight, ModelError, ModelMetadata, ScoringModel};
pub use ratings::{load_ratings, RatingTable};
pub use train::{train, EvaluationReport, LogisticRegression, TrainConfig, TrainError, TrainResult};

use crate::models::{FeatureVector, Prediction};
use tracing::warn;

/// An extractor bound to a model with a matching feature set
#[derive(Debug, Clone, Default)]
pub struct ReadabilityScorer {
    extractor: FeatureExtractor,
    model: ScoringModel,
}

impl ReadabilityScorer {
    /// Bind `extractor` to `model`.
    ///
    /// Fails unless the extractor's selection and the model's features are
    /// the same set.
    pub fn new(extractor: FeatureExtractor, model: ScoringModel) -> Result<Self, ModelError> {
        model.check_binding(extractor.selection())?;

        if let Some(trained_with) = model.metadata().and_then(|m| m.comment_length) {
            let configured = extractor.config().comment_length;
            if trained_with != configured {
                warn!(
                    "Model was trained with comment_length {:?} but extractor uses {:?}",
                    trained_with, configured
                );
            }
        }

        Ok(Self { extractor, model })
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    pub fn model(&self) -> &ScoringModel {
        &self.model
    }

    pub fn score(&self, source: &str) -> Prediction {
        self.score_metrics(&self.extractor.extract(source))
    }

    /// Score metrics that were already extracted with [`extractor`](Self::extractor)
    pub fn score_metrics(&self, metrics: &SnippetMetrics) -> Prediction {
        self.model.predict_metrics(metrics)
    }

    /// The model's inputs: `metrics` reduced to the bound selection
    pub fn features(&self, metrics: &SnippetMetrics) -> FeatureVector {
        metrics.features(self.extractor.selection())
    }

    /// Per-feature terms behind a score
    pub fn explain(&self, metrics: &SnippetMetrics) -> Result<Vec<Contribution>, ModelError> {
        self.model.contributions(&self.features(metrics))
    }
}

/// Score a snippet with the built-in model and default extractor
pub fn score_snippet(source: &str) -> Prediction {
    ReadabilityScorer::default().score(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Feature;

    const SNIPPET: &str = r#"package main

import "fmt"

// greet prints a greeting
func greet(name string) {
	fmt.Println("hello, " + name)
}
"#;

    #[test]
    fn test_score_is_a_probability() {
        let pred = score_snippet(SNIPPET);
        assert!(pred.score > 0.0 && pred.score < 1.0);
        assert_eq!(pred.score, sigmoid(pred.raw_score));
    }

    #[test]
    fn test_score_is_deterministic() {
        let scorer = ReadabilityScorer::default();
        let a = scorer.score(SNIPPET);
        let b = scorer.score(SNIPPET);
        assert_eq!(a.raw_score.to_bits(), b.raw_score.to_bits());
    }

    #[test]
    fn test_empty_snippet_scores() {
        let pred = score_snippet("");
        assert!(pred.raw_score.is_finite());
    }

    #[test]
    fn test_explain_sums_to_raw_score() {
        let scorer = ReadabilityScorer::default();
        let metrics = scorer.extractor().extract(SNIPPET);
        let terms = scorer.explain(&metrics).unwrap();
        assert_eq!(terms.len(), Feature::MODEL_DEFAULT.len());
        let raw = terms.iter().map(|c| c.weighted).sum::<f64>() + scorer.model().intercept();
        assert!((raw - scorer.score(SNIPPET).raw_score).abs() < 1e-12);
    }

    #[test]
    fn test_metrics_path_matches_source_path() {
        let scorer = ReadabilityScorer::default();
        let metrics = scorer.extractor().extract(SNIPPET);
        assert_eq!(
            scorer.score_metrics(&metrics).raw_score.to_bits(),
            scorer.score(SNIPPET).raw_score.to_bits()
        );
        assert_eq!(
            scorer.features(&metrics),
            scorer.extractor().extract_features(SNIPPET)
        );
    }

    #[test]
    fn test_mismatched_selection_rejected() {
        let extractor = FeatureExtractor::new(
            ExtractorConfig::default().with_selection(vec![Feature::AvgSpaces]),
        );
        let err = ReadabilityScorer::new(extractor, ScoringModel::default()).unwrap_err();
        assert!(matches!(err, ModelError::FeatureMismatch { .. }));
    }

    #[test]
    fn test_selection_order_is_irrelevant() {
        let mut selection = Feature::MODEL_DEFAULT.to_vec();
        selection.reverse();
        let extractor = FeatureExtractor::new(ExtractorConfig::default().with_selection(selection));
        let scorer = ReadabilityScorer::new(extractor, ScoringModel::default()).unwrap();
        assert_eq!(
            scorer.score(SNIPPET).raw_score.to_bits(),
            score_snippet(SNIPPET).raw_score.to_bits()
        );
    }
}
