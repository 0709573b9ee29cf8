//! readscore - readability scoring for Go snippets
//!
//! Lexical feature extraction, a linear/logistic scoring model, and the
//! offline tooling (ratings, feature tables, training) that produces models.

pub mod config;
pub mod models;
pub mod readability;

pub use models::{Feature, FeatureVector, Prediction};
pub use readability::{score_snippet, FeatureExtractor, ReadabilityScorer, ScoringModel};
