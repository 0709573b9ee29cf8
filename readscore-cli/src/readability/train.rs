//! Model fitting and leave-one-out evaluation
//!
//! Ratings are split into two classes at the median (strictly above the
//! median is "readable"), features are z-scored with the sample standard
//! deviation, and an L2-regularized logistic regression is fitted by plain
//! gradient descent. The fitted weights plus the normalization constants
//! become a [`ScoringModel`].

use super::dataset::TableRow;
use super::model::{sigmoid, FeatureWeight, ModelError, ModelMetadata, ScoringModel};
use crate::models::Feature;
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised while fitting a model
#[derive(Error, Debug)]
pub enum TrainError {
    #[error("need at least 2 rated snippets, found {0}")]
    TooFewSamples(usize),

    #[error("all ratings fall in one class; cannot fit a classifier")]
    SingleClass,

    #[error("feature `{0}` is constant across the table")]
    ConstantFeature(Feature),

    #[error("snippet {snippet} has no value for `{feature}`")]
    MissingValue { snippet: String, feature: Feature },

    #[error("snippet {snippet} has a non-finite `{column}`")]
    NonFinite { snippet: String, column: &'static str },

    #[error("feature `{0}` is listed more than once")]
    DuplicateFeature(Feature),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Training configuration
#[derive(Debug, Clone)]
pub struct TrainConfig {
    /// Features the model is fitted on
    pub features: Vec<Feature>,
    /// Gradient descent step size
    pub learning_rate: f64,
    /// Maximum gradient descent iterations per fit
    pub max_iter: usize,
    /// L2 penalty strength (inverse of regularization C)
    pub l2: f64,
    /// Stop once every gradient component is below this
    pub tol: f64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            features: Feature::MODEL_DEFAULT.to_vec(),
            learning_rate: 0.1,
            max_iter: 1000,
            l2: 1.0,
            tol: 1e-6,
        }
    }
}

/// Binary logistic regression over dense rows
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticRegression {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LogisticRegression {
    fn probability(&self, row: &[f64]) -> f64 {
        let z: f64 = self
            .coefficients
            .iter()
            .zip(row)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.intercept;
        sigmoid(z)
    }

    /// Fit on `x` (rows of equal width) against boolean labels.
    ///
    /// Starts from zero weights and runs full-batch gradient descent on the
    /// mean log-loss plus `l2 / (2n) * |w|^2`. The intercept is not
    /// penalized. A single-class `y` still converges towards that class.
    pub fn fit(x: &[Vec<f64>], y: &[bool], config: &TrainConfig) -> Self {
        let n_features = x.first().map_or(0, Vec::len);
        let mut model = Self {
            coefficients: vec![0.0; n_features],
            intercept: 0.0,
        };
        if x.is_empty() {
            return model;
        }
        let n = x.len() as f64;

        for iter in 0..config.max_iter {
            let mut grad = vec![0.0; n_features];
            let mut grad_intercept = 0.0;

            for (row, &label) in x.iter().zip(y) {
                let error = model.probability(row) - if label { 1.0 } else { 0.0 };
                grad_intercept += error;
                for (g, xi) in grad.iter_mut().zip(row) {
                    *g += error * xi;
                }
            }

            grad_intercept /= n;
            for (g, w) in grad.iter_mut().zip(&model.coefficients) {
                *g = *g / n + config.l2 / n * w;
            }

            model.intercept -= config.learning_rate * grad_intercept;
            for (w, g) in model.coefficients.iter_mut().zip(&grad) {
                *w -= config.learning_rate * g;
            }

            if grad_intercept.abs() < config.tol && grad.iter().all(|g| g.abs() < config.tol) {
                debug!("Converged after {} iterations", iter + 1);
                break;
            }
        }

        model
    }

    pub fn predict(&self, row: &[f64]) -> bool {
        self.probability(row) >= 0.5
    }
}

/// Classification quality of the leave-one-out predictions
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// `[[tn, fp], [fn, tp]]`
    pub confusion: [[usize; 2]; 2],
    /// (snippet, true label, predicted label)
    pub predictions: Vec<(String, bool, bool)>,
}

fn safe_div(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

impl EvaluationReport {
    pub fn from_predictions(predictions: Vec<(String, bool, bool)>) -> Self {
        let mut confusion = [[0usize; 2]; 2];
        for (_, truth, predicted) in &predictions {
            confusion[usize::from(*truth)][usize::from(*predicted)] += 1;
        }
        let [[tn, fp], [fn_, tp]] = confusion;
        let (tn, fp, fn_, tp) = (tn as f64, fp as f64, fn_ as f64, tp as f64);

        let precision = safe_div(tp, tp + fp);
        let recall = safe_div(tp, tp + fn_);
        Self {
            accuracy: safe_div(tp + tn, tp + tn + fp + fn_),
            precision,
            recall,
            f1: safe_div(2.0 * precision * recall, precision + recall),
            confusion,
            predictions,
        }
    }
}

/// Training result
#[derive(Debug)]
pub struct TrainResult {
    /// Model fitted on every row
    pub model: ScoringModel,
    /// Leave-one-out evaluation
    pub evaluation: EvaluationReport,
    /// Rating that splits the two classes
    pub median: f64,
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    if n == 0 {
        0.0
    } else if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Mean and sample (n - 1) standard deviation of one column
fn column_stats(column: impl Iterator<Item = f64> + Clone) -> (f64, f64) {
    let n = column.clone().count() as f64;
    let mean = column.clone().sum::<f64>() / n;
    let variance = column.map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, variance.sqrt())
}

/// Fit a scoring model on a feature table and evaluate it with
/// leave-one-out cross-validation.
pub fn train(rows: &[TableRow], config: &TrainConfig) -> Result<TrainResult, TrainError> {
    if rows.len() < 2 {
        return Err(TrainError::TooFewSamples(rows.len()));
    }

    if let Some(dup) = super::model::first_duplicate(&config.features) {
        return Err(TrainError::DuplicateFeature(dup));
    }
    if let Some(row) = rows.iter().find(|r| !r.readability_rating.is_finite()) {
        return Err(TrainError::NonFinite {
            snippet: row.snippet_filename.clone(),
            column: "readability_rating",
        });
    }

    let ratings: Vec<f64> = rows.iter().map(|r| r.readability_rating).collect();
    let median = median(&ratings);
    let labels: Vec<bool> = ratings.iter().map(|&r| r > median).collect();
    if labels.iter().all(|&l| l) || labels.iter().all(|&l| !l) {
        return Err(TrainError::SingleClass);
    }

    let raw: Vec<Vec<f64>> = rows
        .iter()
        .map(|row| {
            config
                .features
                .iter()
                .map(|&feature| match row.values.get(feature) {
                    Some(value) if value.is_finite() => Ok(value),
                    Some(_) => Err(TrainError::NonFinite {
                        snippet: row.snippet_filename.clone(),
                        column: feature.name(),
                    }),
                    None => Err(TrainError::MissingValue {
                        snippet: row.snippet_filename.clone(),
                        feature,
                    }),
                })
                .collect::<Result<Vec<f64>, TrainError>>()
        })
        .collect::<Result<_, _>>()?;

    let mut stats = Vec::with_capacity(config.features.len());
    for (j, &feature) in config.features.iter().enumerate() {
        let (mean, std) = column_stats(raw.iter().map(|r| r[j]));
        if std == 0.0 || !std.is_finite() {
            return Err(TrainError::ConstantFeature(feature));
        }
        stats.push((mean, std));
    }

    let x: Vec<Vec<f64>> = raw
        .iter()
        .map(|r| {
            r.iter()
                .zip(&stats)
                .map(|(v, (mean, std))| (v - mean) / std)
                .collect()
        })
        .collect();

    info!(
        "Training on {} snippets, {} above median rating {:.2}",
        rows.len(),
        labels.iter().filter(|&&l| l).count(),
        median
    );

    let mut predictions = Vec::with_capacity(rows.len());
    for held_out in 0..rows.len() {
        let (train_x, train_y): (Vec<Vec<f64>>, Vec<bool>) = x
            .iter()
            .zip(&labels)
            .enumerate()
            .filter(|(i, _)| *i != held_out)
            .map(|(_, (row, &label))| (row.clone(), label))
            .unzip();
        let fold = LogisticRegression::fit(&train_x, &train_y, config);
        predictions.push((
            rows[held_out].snippet_filename.clone(),
            labels[held_out],
            fold.predict(&x[held_out]),
        ));
    }
    let evaluation = EvaluationReport::from_predictions(predictions);
    info!("Leave-one-out accuracy: {:.2}", evaluation.accuracy);

    let fitted = LogisticRegression::fit(&x, &labels, config);
    let weights = config
        .features
        .iter()
        .zip(&stats)
        .zip(&fitted.coefficients)
        .map(|((&feature, &(mean, std)), &coefficient)| {
            (
                feature,
                FeatureWeight {
                    mean,
                    std,
                    coefficient,
                },
            )
        });
    let model = ScoringModel::new(weights, fitted.intercept)?.with_metadata(ModelMetadata {
        trained_at: Some(chrono::Utc::now().to_rfc3339()),
        samples: Some(rows.len()),
        comment_length: None,
    });

    Ok(TrainResult {
        model,
        evaluation,
        median,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeatureVector;

    fn row(name: &str, rating: f64, values: &[(Feature, f64)]) -> TableRow {
        TableRow {
            snippet_filename: name.to_string(),
            readability_rating: rating,
            values: values.iter().copied().collect::<FeatureVector>(),
        }
    }

    fn separable() -> Vec<TableRow> {
        let lengths = [1.0, 2.0, 3.0, 4.0, 11.0, 12.0, 13.0, 14.0];
        lengths
            .iter()
            .enumerate()
            .map(|(i, &len)| {
                row(
                    &format!("{}.go", i),
                    (i + 1) as f64,
                    &[(Feature::AvgLineLength, len)],
                )
            })
            .collect()
    }

    fn single_feature() -> TrainConfig {
        TrainConfig {
            features: vec![Feature::AvgLineLength],
            ..Default::default()
        }
    }

    #[test]
    fn test_train_config_default() {
        let config = TrainConfig::default();
        assert!(config.learning_rate > 0.0);
        assert!(config.max_iter > 0);
        assert_eq!(config.features, Feature::MODEL_DEFAULT.to_vec());
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
    }

    #[test]
    fn test_median_with_nan_does_not_panic() {
        let values: Vec<f64> = (0..64)
            .map(|i| if i % 3 == 0 { f64::NAN } else { i as f64 })
            .collect();
        // NaN sorts last under total_cmp
        let m = median(&values);
        assert!(m.is_finite());
    }

    #[test]
    fn test_column_stats_uses_sample_std() {
        let (mean, std) = column_stats([2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0].into_iter());
        assert_eq!(mean, 5.0);
        assert!((std - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_separable_data_is_learned() {
        let result = train(&separable(), &single_feature()).unwrap();
        assert_eq!(result.median, 4.5);
        assert_eq!(result.evaluation.accuracy, 1.0);
        assert_eq!(result.evaluation.confusion, [[4, 0], [0, 4]]);
        assert_eq!(result.evaluation.f1, 1.0);

        let weight = result.model.weight(Feature::AvgLineLength).unwrap();
        assert!(weight.coefficient > 0.0);
        assert_eq!(weight.mean, 7.5);
        assert_eq!(result.model.metadata().unwrap().samples, Some(8));
    }

    #[test]
    fn test_trained_model_scores_by_name() {
        let result = train(&separable(), &single_feature()).unwrap();
        let low: FeatureVector = [(Feature::AvgLineLength, 1.0)].into_iter().collect();
        let high: FeatureVector = [(Feature::AvgLineLength, 14.0)].into_iter().collect();
        let low = result.model.predict(&low).unwrap().score;
        let high = result.model.predict(&high).unwrap().score;
        assert!(low < 0.5 && high > 0.5);
    }

    #[test]
    fn test_constant_feature_rejected() {
        let mut rows = separable();
        for r in &mut rows {
            r.values.insert(Feature::AvgSpaces, 2.0);
        }
        let config = TrainConfig {
            features: vec![Feature::AvgLineLength, Feature::AvgSpaces],
            ..Default::default()
        };
        assert!(matches!(
            train(&rows, &config),
            Err(TrainError::ConstantFeature(Feature::AvgSpaces))
        ));
    }

    #[test]
    fn test_missing_value_and_small_tables() {
        assert!(matches!(
            train(&separable()[..1], &single_feature()),
            Err(TrainError::TooFewSamples(1))
        ));
        assert!(matches!(
            train(&separable(), &TrainConfig::default()),
            Err(TrainError::MissingValue { .. })
        ));
    }

    #[test]
    fn test_non_finite_rows_rejected() {
        let mut rows = separable();
        for (i, r) in rows.iter_mut().enumerate() {
            if i % 3 == 0 {
                r.readability_rating = f64::NAN;
            }
        }
        assert!(matches!(
            train(&rows, &single_feature()),
            Err(TrainError::NonFinite { column: "readability_rating", .. })
        ));

        let mut rows = separable();
        rows[5].values.insert(Feature::AvgLineLength, f64::INFINITY);
        assert!(matches!(
            train(&rows, &single_feature()),
            Err(TrainError::NonFinite { column: "avg_line_length", .. })
        ));
    }

    #[test]
    fn test_duplicate_features_rejected() {
        let config = TrainConfig {
            features: vec![Feature::AvgLineLength, Feature::AvgLineLength],
            ..Default::default()
        };
        assert!(matches!(
            train(&separable(), &config),
            Err(TrainError::DuplicateFeature(Feature::AvgLineLength))
        ));
    }

    #[test]
    fn test_equal_ratings_are_single_class() {
        let rows: Vec<_> = (0..4)
            .map(|i| row("x.go", 3.0, &[(Feature::AvgLineLength, i as f64)]))
            .collect();
        assert!(matches!(
            train(&rows, &single_feature()),
            Err(TrainError::SingleClass)
        ));
    }

    #[test]
    fn test_report_handles_undefined_ratios() {
        let report = EvaluationReport::from_predictions(vec![
            ("a".into(), false, false),
            ("b".into(), true, false),
        ]);
        assert_eq!(report.accuracy, 0.5);
        assert_eq!(report.precision, 0.0);
        assert_eq!(report.recall, 0.0);
        assert_eq!(report.f1, 0.0);
        assert_eq!(report.confusion, [[1, 0], [1, 0]]);
    }
}
