//! Loading raw records from a data directory.
//!
//! The ingestion side hands the core a full replacement dataset on every
//! fit. `RawDataset` is that dataset: ordered items, ordered ratings, and
//! the lines the parser had to drop.

use crate::error::Result;
use crate::parser;
use crate::types::{Item, ItemId, Rating, UserId};
use crate::DataLoadError;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, instrument, warn};

/// Raw item and rating records in file order
#[derive(Debug, Clone, Default)]
pub struct RawDataset {
    pub items: Vec<Item>,
    pub ratings: Vec<Rating>,
    /// Lines rejected while parsing
    pub rejected: Vec<DataLoadError>,
}

impl RawDataset {
    pub fn new(items: Vec<Item>, ratings: Vec<Rating>) -> Self {
        Self {
            items,
            ratings,
            rejected: Vec::new(),
        }
    }

    /// Load `items.dat` and `ratings.dat` from a directory
    ///
    /// Both files are parsed in parallel. Missing files are an error;
    /// malformed lines are not.
    #[instrument]
    pub fn load_from_dir(data_dir: &Path) -> Result<Self> {
        let items_path = data_dir.join("items.dat");
        let ratings_path = data_dir.join("ratings.dat");

        let (items, ratings) = rayon::join(
            || parser::parse_items(&items_path),
            || parser::parse_ratings(&ratings_path),
        );
        let items = items?;
        let ratings = ratings?;

        let mut rejected = items.rejected;
        rejected.extend(ratings.rejected);
        for cause in &rejected {
            warn!("Dropped record: {}", cause);
        }

        info!(
            "Loaded {} items and {} ratings ({} lines rejected)",
            items.records.len(),
            ratings.records.len(),
            rejected.len()
        );

        Ok(Self {
            items: items.records,
            ratings: ratings.records,
            rejected,
        })
    }

    /// Get counts for debugging/validation
    pub fn counts(&self) -> (usize, usize) {
        (self.items.len(), self.ratings.len())
    }

    /// Add ratings on top of the existing ones.
    ///
    /// A rating for a (user, item) pair that is already present replaces it
    /// unless the existing one has a later timestamp. New pairs are appended
    /// in the order given. Returns how many pairs were new.
    pub fn merge_ratings(&mut self, ratings: impl IntoIterator<Item = Rating>) -> usize {
        // (user, item) -> position of the latest rating for that pair
        let mut latest: HashMap<(UserId, ItemId), usize> = HashMap::new();
        for (pos, rating) in self.ratings.iter().enumerate() {
            let key = (rating.user_id, rating.item_id);
            match latest.get(&key) {
                Some(&prev) if self.ratings[prev].timestamp > rating.timestamp => {}
                _ => {
                    latest.insert(key, pos);
                }
            }
        }

        let mut added = 0;
        for rating in ratings {
            let key = (rating.user_id, rating.item_id);
            match latest.get(&key) {
                Some(&pos) => {
                    if rating.timestamp >= self.ratings[pos].timestamp {
                        self.ratings[pos] = rating;
                    }
                }
                None => {
                    latest.insert(key, self.ratings.len());
                    self.ratings.push(rating);
                    added += 1;
                }
            }
        }
        added
    }
}
