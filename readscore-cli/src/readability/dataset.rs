//! Feature table: snippets joined with their ratings
//!
//! One row per rated snippet: filename, mean rating, line count and every
//! feature in [`Feature::all`] order. The trainer reads the same table back.

use super::features::{FeatureExtractor, SnippetMetrics};
use super::ratings::RatingTable;
use crate::models::{Feature, FeatureVector};
use rayon::prelude::*;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

const FILENAME_COLUMN: &str = "snippet_filename";
const RATING_COLUMN: &str = "readability_rating";
const LINES_COLUMN: &str = "total_lines";

/// Errors reading snippets, ratings or feature tables
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),

    #[error("feature table has no `{0}` column")]
    MissingColumn(String),

    #[error("invalid value {value:?} in column `{column}` on line {line}")]
    InvalidValue {
        line: u64,
        column: String,
        value: String,
    },

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// A rated snippet with its extracted metrics
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRow {
    pub snippet_filename: String,
    pub readability_rating: f64,
    pub metrics: SnippetMetrics,
}

/// A row read back from a feature table
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub snippet_filename: String,
    pub readability_rating: f64,
    pub values: FeatureVector,
}

/// Extract every rated snippet directly inside `dir`.
///
/// Files without a rating, and files that are not UTF-8 text, are logged
/// and skipped. Rows come back sorted by filename.
pub fn build_dataset(
    dir: &Path,
    ratings: &RatingTable,
    extractor: &FeatureExtractor,
    workers: usize,
) -> Result<Vec<DatasetRow>, DatasetError> {
    if !dir.is_dir() {
        return Err(DatasetError::NotADirectory(dir.to_path_buf()));
    }

    let mut files: Vec<(String, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(name) = path.file_name() {
            files.push((name.to_string_lossy().into_owned(), path));
        }
    }
    files.sort();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()?;

    let rows: Vec<DatasetRow> = pool.install(|| {
        files
            .par_iter()
            .filter_map(|(name, path)| {
                let Some(rating) = ratings.get(name) else {
                    warn!("No readability rating for {}", name);
                    return None;
                };
                match std::fs::read_to_string(path) {
                    Ok(source) => Some(DatasetRow {
                        snippet_filename: name.clone(),
                        readability_rating: rating,
                        metrics: extractor.extract(&source),
                    }),
                    Err(e) => {
                        warn!("Failed to read {}: {}", path.display(), e);
                        None
                    }
                }
            })
            .collect()
    });

    info!(
        "Extracted {} rated snippets out of {} files in {}",
        rows.len(),
        files.len(),
        dir.display()
    );
    Ok(rows)
}

fn format_value(value: f64) -> String {
    format!("{:.2}", value)
}

/// Write the feature table as CSV, floats with two decimals.
pub fn write_table<W: Write>(rows: &[DatasetRow], writer: W) -> Result<(), DatasetError> {
    let mut csv = csv::Writer::from_writer(writer);

    let mut header = vec![FILENAME_COLUMN, RATING_COLUMN, LINES_COLUMN];
    header.extend(Feature::all().iter().map(Feature::name));
    csv.write_record(&header)?;

    for row in rows {
        let mut record = vec![
            row.snippet_filename.clone(),
            format_value(row.readability_rating),
            row.metrics.total_lines.to_string(),
        ];
        record.extend(
            Feature::all()
                .iter()
                .map(|&f| format_value(row.metrics.value(f))),
        );
        csv.write_record(&record)?;
    }

    csv.flush()?;
    Ok(())
}

/// Parse a feature table by column name.
///
/// The filename and rating columns are required. Every value must be a
/// finite number. Feature columns that are
/// absent are left out of each row's values; unknown columns are ignored.
pub fn read_table<R: Read>(reader: R) -> Result<Vec<TableRow>, DatasetError> {
    let mut csv = csv::Reader::from_reader(reader);
    let headers = csv.headers()?.clone();

    let position = |name: &str| headers.iter().position(|h| h.trim() == name);
    let filename_idx =
        position(FILENAME_COLUMN).ok_or_else(|| DatasetError::MissingColumn(FILENAME_COLUMN.into()))?;
    let rating_idx =
        position(RATING_COLUMN).ok_or_else(|| DatasetError::MissingColumn(RATING_COLUMN.into()))?;
    let feature_columns: Vec<(Feature, usize)> = Feature::all()
        .iter()
        .filter_map(|&f| position(f.name()).map(|idx| (f, idx)))
        .collect();

    let mut rows = Vec::new();
    for record in csv.records() {
        let record = record?;
        let line = record.position().map_or(0, |p| p.line());

        let parse = |idx: usize, column: &str| -> Result<f64, DatasetError> {
            let raw = record.get(idx).unwrap_or("").trim();
            match raw.parse::<f64>() {
                Ok(value) if value.is_finite() => Ok(value),
                _ => Err(DatasetError::InvalidValue {
                    line,
                    column: column.to_string(),
                    value: raw.to_string(),
                }),
            }
        };

        let readability_rating = parse(rating_idx, RATING_COLUMN)?;
        let mut values = FeatureVector::new();
        for &(feature, idx) in &feature_columns {
            values.insert(feature, parse(idx, feature.name())?);
        }

        rows.push(TableRow {
            snippet_filename: record.get(filename_idx).unwrap_or("").to_string(),
            readability_rating,
            values,
        });
    }

    Ok(rows)
}
