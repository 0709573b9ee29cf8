//! Human readability ratings
//!
//! Ratings arrive as a CSV of `filename,rating` rows, possibly several per
//! snippet. The label for a snippet is the mean of its ratings.

use super::dataset::DatasetError;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

/// Mean rating per snippet filename
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RatingTable {
    ratings: HashMap<String, f64>,
}

impl RatingTable {
    /// Parse a ratings CSV. The first row is a header and is skipped.
    ///
    /// Rows that do not have exactly two fields, or whose rating is not a
    /// finite number, are skipped.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DatasetError> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let mut rows: Vec<(String, f64)> = Vec::new();
        let mut skipped = 0usize;

        for record in csv.records() {
            let record = record?;
            if record.len() != 2 {
                skipped += 1;
                continue;
            }
            match record[1].trim().parse::<f64>() {
                Ok(rating) if rating.is_finite() => rows.push((record[0].to_string(), rating)),
                _ => skipped += 1,
            }
        }

        if skipped > 0 {
            warn!("Skipped {} malformed rating rows", skipped);
        }

        let table: Self = rows.into_iter().collect();
        debug!("Loaded ratings for {} snippets", table.len());
        Ok(table)
    }

    pub fn get(&self, filename: &str) -> Option<f64> {
        self.ratings.get(filename).copied()
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }
}

impl FromIterator<(String, f64)> for RatingTable {
    /// Collect single ratings, averaging repeated filenames.
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        let mut collected: HashMap<String, (f64, usize)> = HashMap::new();
        for (file, rating) in iter {
            let slot = collected.entry(file).or_insert((0.0, 0));
            slot.0 += rating;
            slot.1 += 1;
        }
        Self {
            ratings: collected
                .into_iter()
                .map(|(file, (sum, n))| (file, sum / n as f64))
                .collect(),
        }
    }
}

/// Load a ratings CSV from disk
pub fn load_ratings(path: &Path) -> Result<RatingTable, DatasetError> {
    let file = std::fs::File::open(path)?;
    RatingTable::from_reader(file)
}
