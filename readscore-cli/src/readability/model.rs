//! Linear readability model
//!
//! z-score normalization → weighted sum + intercept → logistic squash.
//! Coefficients are bound to features by name, so a model file can list
//! its features in any order.

use super::features::{CommentLength, SnippetMetrics};
use crate::models::{feature_list, Feature, FeatureVector, Prediction};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Errors raised by model construction, loading and scoring
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("model has no features")]
    Empty,

    #[error("standard deviation for `{0}` is zero")]
    ZeroStd(Feature),

    #[error("non-finite {field} for `{feature}`")]
    NonFinite { feature: Feature, field: &'static str },

    #[error("non-finite intercept")]
    NonFiniteIntercept,

    #[error("feature vector is missing `{0}`")]
    MissingFeature(Feature),

    #[error("model has no coefficient for `{0}`")]
    UnexpectedFeature(Feature),

    #[error("feature `{0}` is selected more than once")]
    DuplicateFeature(Feature),

    #[error(
        "model features do not match extractor output (no coefficient: [{}], not extracted: [{}])",
        feature_list(.without_coefficient),
        feature_list(.not_extracted)
    )]
    FeatureMismatch {
        without_coefficient: Vec<Feature>,
        not_extracted: Vec<Feature>,
    },

    #[error("failed to parse model: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Normalization constants and coefficient for one feature
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureWeight {
    pub mean: f64,
    pub std: f64,
    pub coefficient: f64,
}

/// Where a model came from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trained_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub samples: Option<usize>,
    /// Comment-length mode of the extractor that produced the training table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_length: Option<CommentLength>,
}

/// One feature's share of a raw score
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Contribution {
    pub feature: Feature,
    pub value: f64,
    pub normalized: f64,
    pub weighted: f64,
}

/// On-disk JSON shape of a [`ScoringModel`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelFile {
    pub intercept: f64,
    pub features: BTreeMap<Feature, FeatureWeight>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ModelMetadata>,
}

/// Pre-fitted linear model with per-feature normalization.
///
/// Every constructor validates, so a value of this type always has at
/// least one feature, finite constants and non-zero standard deviations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ModelFile", into = "ModelFile")]
pub struct ScoringModel {
    intercept: f64,
    weights: BTreeMap<Feature, FeatureWeight>,
    metadata: Option<ModelMetadata>,
}

impl TryFrom<ModelFile> for ScoringModel {
    type Error = ModelError;

    fn try_from(file: ModelFile) -> Result<Self, Self::Error> {
        let model = Self {
            intercept: file.intercept,
            weights: file.features,
            metadata: file.metadata,
        };
        model.validate()?;
        Ok(model)
    }
}

impl From<ScoringModel> for ModelFile {
    fn from(model: ScoringModel) -> Self {
        Self {
            intercept: model.intercept,
            features: model.weights,
            metadata: model.metadata,
        }
    }
}

// Fitted on the survey ratings, in Feature::MODEL_DEFAULT order.
const SURVEY_MEAN: [f64; 8] = [
    0.07916667, 28.79916667, 1.49, 1.77666667, 0.36583333, 12.9, 15.22916667, 7.9025,
];
const SURVEY_STD: [f64; 8] = [
    0.14822945, 8.57692831, 0.75379042, 0.57920531, 0.14323905, 14.38345009, 21.13728952,
    2.04951934,
];
const SURVEY_COEFFICIENTS: [f64; 8] = [
    -0.32295017, -0.02162178, -0.14302383, 0.16994715, 0.53624519, -0.87802927, 0.94317421,
    -0.08688262,
];
const SURVEY_INTERCEPT: f64 = -0.27823503;

impl Default for ScoringModel {
    /// The built-in model fitted on the survey data.
    fn default() -> Self {
        let weights = Feature::MODEL_DEFAULT
            .iter()
            .enumerate()
            .map(|(i, &feature)| {
                (
                    feature,
                    FeatureWeight {
                        mean: SURVEY_MEAN[i],
                        std: SURVEY_STD[i],
                        coefficient: SURVEY_COEFFICIENTS[i],
                    },
                )
            })
            .collect();
        Self {
            intercept: SURVEY_INTERCEPT,
            weights,
            metadata: None,
        }
    }
}

/// First feature that appears twice in `features`
pub(crate) fn first_duplicate(features: &[Feature]) -> Option<Feature> {
    features
        .iter()
        .enumerate()
        .find(|(i, f)| features[..*i].contains(f))
        .map(|(_, &f)| f)
}

/// Logistic function `1 / (1 + e^-x)`.
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

impl ScoringModel {
    /// Build and validate a model. A feature listed twice keeps its last weight.
    pub fn new(
        weights: impl IntoIterator<Item = (Feature, FeatureWeight)>,
        intercept: f64,
    ) -> Result<Self, ModelError> {
        let model = Self {
            intercept,
            weights: weights.into_iter().collect(),
            metadata: None,
        };
        model.validate()?;
        Ok(model)
    }

    pub fn with_metadata(mut self, metadata: ModelMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn metadata(&self) -> Option<&ModelMetadata> {
        self.metadata.as_ref()
    }

    pub fn weight(&self, feature: Feature) -> Option<&FeatureWeight> {
        self.weights.get(&feature)
    }

    /// Model features in canonical order
    pub fn features(&self) -> impl Iterator<Item = Feature> + '_ {
        self.weights.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.weights.is_empty() {
            return Err(ModelError::Empty);
        }
        if !self.intercept.is_finite() {
            return Err(ModelError::NonFiniteIntercept);
        }
        for (&feature, w) in &self.weights {
            for (field, value) in [("mean", w.mean), ("std", w.std), ("coefficient", w.coefficient)] {
                if !value.is_finite() {
                    return Err(ModelError::NonFinite { feature, field });
                }
            }
            if w.std == 0.0 {
                return Err(ModelError::ZeroStd(feature));
            }
        }
        Ok(())
    }

    /// Require the extractor's selection and the model's features to be the
    /// same set, with no feature selected twice.
    pub fn check_binding(&self, selection: &[Feature]) -> Result<(), ModelError> {
        if let Some(dup) = first_duplicate(selection) {
            return Err(ModelError::DuplicateFeature(dup));
        }
        let without_coefficient: Vec<Feature> = selection
            .iter()
            .copied()
            .filter(|f| !self.weights.contains_key(f))
            .collect();
        let not_extracted: Vec<Feature> = self
            .features()
            .filter(|f| !selection.contains(f))
            .collect();
        if without_coefficient.is_empty() && not_extracted.is_empty() {
            Ok(())
        } else {
            Err(ModelError::FeatureMismatch {
                without_coefficient,
                not_extracted,
            })
        }
    }

    fn check_vector(&self, features: &FeatureVector) -> Result<(), ModelError> {
        if let Some(extra) = features.features().find(|f| !self.weights.contains_key(f)) {
            return Err(ModelError::UnexpectedFeature(extra));
        }
        if let Some(missing) = self.features().find(|&f| !features.contains(f)) {
            return Err(ModelError::MissingFeature(missing));
        }
        Ok(())
    }

    /// Weights in summation order: `MODEL_DEFAULT` features first, in that
    /// order, then any others in enum order.
    fn ordered(&self) -> impl Iterator<Item = (Feature, &FeatureWeight)> + '_ {
        let order: &'static [Feature] = &Feature::MODEL_DEFAULT;
        let defaults = order.iter().filter_map(|f| self.weights.get_key_value(f));
        let rest = self.weights.iter().filter(move |(f, _)| !order.contains(f));
        defaults.chain(rest).map(|(&f, w)| (f, w))
    }

    fn contribution(feature: Feature, weight: &FeatureWeight, value: f64) -> Contribution {
        let normalized = (value - weight.mean) / weight.std;
        Contribution {
            feature,
            value,
            normalized,
            weighted: normalized * weight.coefficient,
        }
    }

    /// Per-feature terms in summation order.
    pub fn contributions(&self, features: &FeatureVector) -> Result<Vec<Contribution>, ModelError> {
        self.check_vector(features)?;
        self.ordered()
            .map(|(feature, weight)| {
                if weight.std == 0.0 {
                    return Err(ModelError::ZeroStd(feature));
                }
                let value = features
                    .get(feature)
                    .ok_or(ModelError::MissingFeature(feature))?;
                Ok(Self::contribution(feature, weight, value))
            })
            .collect()
    }

    /// `(value - mean) / std` for every model feature.
    pub fn normalize(&self, features: &FeatureVector) -> Result<FeatureVector, ModelError> {
        Ok(self
            .contributions(features)?
            .into_iter()
            .map(|c| (c.feature, c.normalized))
            .collect())
    }

    fn combine(&self, terms: impl Iterator<Item = f64>) -> f64 {
        terms.sum::<f64>() + self.intercept
    }

    /// Unbounded linear score
    pub fn raw_score(&self, features: &FeatureVector) -> Result<f64, ModelError> {
        let terms = self.contributions(features)?;
        Ok(self.combine(terms.iter().map(|c| c.weighted)))
    }

    pub fn predict(&self, features: &FeatureVector) -> Result<Prediction, ModelError> {
        let raw_score = self.raw_score(features)?;
        Ok(Prediction {
            raw_score,
            score: sigmoid(raw_score),
        })
    }

    /// Score extracted metrics directly. Metrics carry every feature and the
    /// model is validated, so this cannot fail.
    pub fn predict_metrics(&self, metrics: &SnippetMetrics) -> Prediction {
        let raw_score = self.combine(
            self.ordered()
                .map(|(f, w)| Self::contribution(f, w, metrics.value(f)).weighted),
        );
        Prediction {
            raw_score,
            score: sigmoid(raw_score),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, ModelError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a model from a JSON file
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Save model to JSON
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at_means(model: &ScoringModel) -> FeatureVector {
        model
            .features()
            .map(|f| (f, model.weight(f).unwrap().mean))
            .collect()
    }

    #[test]
    fn test_sigmoid() {
        assert_eq!(sigmoid(0.0), 0.5);
        for x in [-30.0, -5.0, -0.1, 0.1, 5.0, 30.0] {
            let y = sigmoid(x);
            assert!(y > 0.0 && y < 1.0, "sigmoid({}) = {}", x, y);
        }
        assert!(sigmoid(1.0) > sigmoid(-1.0));
    }

    #[test]
    fn test_default_model_is_valid() {
        let model = ScoringModel::default();
        model.validate().unwrap();
        assert_eq!(model.len(), 8);
        model.check_binding(&Feature::MODEL_DEFAULT).unwrap();
    }

    #[test]
    fn test_features_at_means_score_intercept() {
        let model = ScoringModel::default();
        let features = at_means(&model);

        let normalized = model.normalize(&features).unwrap();
        assert!(normalized.iter().all(|(_, v)| v == 0.0));

        let pred = model.predict(&features).unwrap();
        assert_eq!(pred.raw_score, model.intercept());
        assert_eq!(pred.score, sigmoid(model.intercept()));
    }

    #[test]
    fn test_declaration_order_does_not_change_score() {
        let weights: Vec<(Feature, FeatureWeight)> = Feature::MODEL_DEFAULT
            .iter()
            .map(|&f| (f, *ScoringModel::default().weight(f).unwrap()))
            .collect();
        let mut reversed = weights.clone();
        reversed.reverse();

        let a = ScoringModel::new(weights, -0.2).unwrap();
        let b = ScoringModel::new(reversed, -0.2).unwrap();

        let features: FeatureVector = Feature::MODEL_DEFAULT
            .iter()
            .enumerate()
            .map(|(i, &f)| (f, i as f64 * 1.7 + 0.3))
            .collect();
        let mut shuffled: Vec<_> = features.iter().collect();
        shuffled.rotate_left(3);
        let shuffled: FeatureVector = shuffled.into_iter().collect();

        let sa = a.predict(&features).unwrap();
        let sb = b.predict(&shuffled).unwrap();
        assert_eq!(sa.raw_score.to_bits(), sb.raw_score.to_bits());
        assert_eq!(sa.score.to_bits(), sb.score.to_bits());
    }

    #[test]
    fn test_sum_runs_in_default_feature_order() {
        let model = ScoringModel::default();
        let features: FeatureVector = Feature::MODEL_DEFAULT
            .iter()
            .enumerate()
            .map(|(i, &f)| (f, i as f64 * 0.9 + 0.11))
            .collect();

        let mut expected = 0.0;
        for f in Feature::MODEL_DEFAULT {
            let w = model.weight(f).unwrap();
            expected += (features.get(f).unwrap() - w.mean) / w.std * w.coefficient;
        }
        expected += model.intercept();

        let raw = model.raw_score(&features).unwrap();
        assert_eq!(raw.to_bits(), expected.to_bits());

        let order: Vec<Feature> = model
            .contributions(&features)
            .unwrap()
            .iter()
            .map(|c| c.feature)
            .collect();
        assert_eq!(order, Feature::MODEL_DEFAULT.to_vec());
    }

    #[test]
    fn test_duplicate_selection_rejected() {
        let model = ScoringModel::default();
        let mut selection = Feature::MODEL_DEFAULT.to_vec();
        selection.push(Feature::AvgKeywords);
        assert!(matches!(
            model.check_binding(&selection),
            Err(ModelError::DuplicateFeature(Feature::AvgKeywords))
        ));
    }

    #[test]
    fn test_zero_std_rejected() {
        let err = ScoringModel::new(
            [(
                Feature::AvgSpaces,
                FeatureWeight {
                    mean: 1.0,
                    std: 0.0,
                    coefficient: 1.0,
                },
            )],
            0.0,
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::ZeroStd(Feature::AvgSpaces)));
    }

    #[test]
    fn test_empty_and_non_finite_rejected() {
        assert!(matches!(
            ScoringModel::new(Vec::new(), 0.0),
            Err(ModelError::Empty)
        ));
        let w = FeatureWeight {
            mean: f64::NAN,
            std: 1.0,
            coefficient: 1.0,
        };
        assert!(matches!(
            ScoringModel::new([(Feature::AvgSpaces, w)], 0.0),
            Err(ModelError::NonFinite { field: "mean", .. })
        ));
    }

    #[test]
    fn test_vector_mismatch() {
        let model = ScoringModel::default();
        let mut features = at_means(&model);

        features.insert(Feature::AvgSpaces, 1.0);
        assert!(matches!(
            model.predict(&features),
            Err(ModelError::UnexpectedFeature(Feature::AvgSpaces))
        ));

        let partial: FeatureVector = at_means(&model)
            .iter()
            .filter(|(f, _)| *f != Feature::AvgKeywords)
            .collect();
        assert!(matches!(
            model.raw_score(&partial),
            Err(ModelError::MissingFeature(Feature::AvgKeywords))
        ));
    }

    #[test]
    fn test_binding_reports_both_directions() {
        let model = ScoringModel::default();
        let mut selection = Feature::MODEL_DEFAULT.to_vec();
        selection.retain(|&f| f != Feature::AvgStrings);
        selection.push(Feature::AvgSpaces);

        match model.check_binding(&selection) {
            Err(ModelError::FeatureMismatch {
                without_coefficient,
                not_extracted,
            }) => {
                assert_eq!(without_coefficient, vec![Feature::AvgSpaces]);
                assert_eq!(not_extracted, vec![Feature::AvgStrings]);
            }
            other => panic!("expected mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_predict_metrics_matches_vector_path() {
        let model = ScoringModel::default();
        let metrics = SnippetMetrics {
            total_lines: 10,
            blank_lines: 1,
            comment_lines: 2,
            comment_length: 14,
            total_line_length: 250,
            total_identifiers: 18,
            total_identifier_length: 120,
            total_keywords: 4,
            total_strings: 2,
            total_strings_length: 11,
            total_periods: 6,
            total_commas: 5,
            ..Default::default()
        };
        let via_vector = model
            .predict(&metrics.features(&Feature::MODEL_DEFAULT))
            .unwrap();
        let direct = model.predict_metrics(&metrics);
        assert_eq!(via_vector.raw_score.to_bits(), direct.raw_score.to_bits());
        assert!(direct.score > 0.0 && direct.score < 1.0);
    }

    #[test]
    fn test_json_roundtrip_and_validation() {
        let model = ScoringModel::default().with_metadata(ModelMetadata {
            samples: Some(12),
            ..Default::default()
        });
        let json = model.to_json().unwrap();
        assert!(json.contains("\"avg_strings\""));
        let loaded = ScoringModel::from_json(&json).unwrap();
        assert_eq!(loaded, model);

        let bad = r#"{"intercept": 0.0, "features": {"avg_spaces": {"mean": 0.0, "std": 0.0, "coefficient": 1.0}}}"#;
        assert!(ScoringModel::from_json(bad).is_err());

        let unknown = r#"{"intercept": 0.0, "features": {"avg_tabs": {"mean": 0.0, "std": 1.0, "coefficient": 1.0}}}"#;
        assert!(ScoringModel::from_json(unknown).is_err());
    }

    #[test]
    fn test_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let model = ScoringModel::default();
        model.save(&path).unwrap();
        assert_eq!(ScoringModel::load(&path).unwrap(), model);
    }
}
