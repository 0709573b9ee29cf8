//! Core data models for readscore
//!
//! These types flow between the lexical extractor, the scoring model,
//! the feature table and the trainer.

use serde::{Deserialize, Serialize, Serializer};

/// A named per-snippet statistic.
///
/// The serialized name doubles as the feature-table column name and the
/// key in model files, so renaming a variant is a format change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    AvgLineLength,
    MaxLineLength,
    AvgNumIdentifiers,
    MaxNumIdentifiers,
    AvgIdentifierLen,
    MaxIdentifierLen,
    AvgIndentation,
    MaxIndentation,
    AvgKeywords,
    AvgNumbers,
    AvgComments,
    AvgCommentLen,
    AvgStrings,
    AvgStringsLen,
    AvgCommasPeriods,
    AvgSpaces,
    AvgParenthesis,
    AvgBlankLines,
}

impl Feature {
    /// Features consumed by the built-in model, in its declared order.
    pub const MODEL_DEFAULT: [Feature; 8] = [
        Feature::AvgStrings,
        Feature::AvgLineLength,
        Feature::AvgCommasPeriods,
        Feature::AvgNumIdentifiers,
        Feature::AvgKeywords,
        Feature::AvgStringsLen,
        Feature::AvgCommentLen,
        Feature::AvgIdentifierLen,
    ];

    /// Every feature, in feature-table column order.
    pub fn all() -> &'static [Feature] {
        &[
            Feature::AvgLineLength,
            Feature::MaxLineLength,
            Feature::AvgNumIdentifiers,
            Feature::MaxNumIdentifiers,
            Feature::AvgIdentifierLen,
            Feature::MaxIdentifierLen,
            Feature::AvgIndentation,
            Feature::MaxIndentation,
            Feature::AvgKeywords,
            Feature::AvgNumbers,
            Feature::AvgComments,
            Feature::AvgCommentLen,
            Feature::AvgStrings,
            Feature::AvgStringsLen,
            Feature::AvgCommasPeriods,
            Feature::AvgSpaces,
            Feature::AvgParenthesis,
            Feature::AvgBlankLines,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Feature::AvgLineLength => "avg_line_length",
            Feature::MaxLineLength => "max_line_length",
            Feature::AvgNumIdentifiers => "avg_num_identifiers",
            Feature::MaxNumIdentifiers => "max_num_identifiers",
            Feature::AvgIdentifierLen => "avg_identifier_len",
            Feature::MaxIdentifierLen => "max_identifier_len",
            Feature::AvgIndentation => "avg_indentation",
            Feature::MaxIndentation => "max_indentation",
            Feature::AvgKeywords => "avg_keywords",
            Feature::AvgNumbers => "avg_numbers",
            Feature::AvgComments => "avg_comments",
            Feature::AvgCommentLen => "avg_comment_len",
            Feature::AvgStrings => "avg_strings",
            Feature::AvgStringsLen => "avg_strings_len",
            Feature::AvgCommasPeriods => "avg_commas_periods",
            Feature::AvgSpaces => "avg_spaces",
            Feature::AvgParenthesis => "avg_parenthesis",
            Feature::AvgBlankLines => "avg_blank_lines",
        }
    }

    /// Look a feature up by its column name.
    pub fn from_name(name: &str) -> Option<Feature> {
        Self::all().iter().copied().find(|f| f.name() == name)
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Feature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::from_name(s.trim()).ok_or_else(|| format!("unknown feature '{}'", s))
    }
}

/// Format a feature list as `a, b, c` for messages.
pub fn feature_list(features: &[Feature]) -> String {
    features
        .iter()
        .map(Feature::name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Feature values keyed by name.
///
/// Entries keep insertion order for display, but every lookup goes
/// through the feature name. Inserting an existing feature replaces its
/// value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureVector {
    entries: Vec<(Feature, f64)>,
}

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, returning the previous one if the feature was present.
    pub fn insert(&mut self, feature: Feature, value: f64) -> Option<f64> {
        if let Some(slot) = self.entries.iter_mut().find(|(f, _)| *f == feature) {
            return Some(std::mem::replace(&mut slot.1, value));
        }
        self.entries.push((feature, value));
        None
    }

    pub fn get(&self, feature: Feature) -> Option<f64> {
        self.entries
            .iter()
            .find(|(f, _)| *f == feature)
            .map(|(_, v)| *v)
    }

    pub fn contains(&self, feature: Feature) -> bool {
        self.get(feature).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        self.entries.iter().copied()
    }

    pub fn features(&self) -> impl Iterator<Item = Feature> + '_ {
        self.entries.iter().map(|(f, _)| *f)
    }
}

impl FromIterator<(Feature, f64)> for FeatureVector {
    fn from_iter<I: IntoIterator<Item = (Feature, f64)>>(iter: I) -> Self {
        let mut vector = FeatureVector::new();
        for (feature, value) in iter {
            vector.insert(feature, value);
        }
        vector
    }
}

impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter().map(|(f, v)| (f.name(), v)))
    }
}

/// Output of the scorer for one snippet
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    /// Linear combination plus intercept, before squashing
    pub raw_score: f64,
    /// Logistic of `raw_score`, in [0, 1]
    pub score: f64,
}
