//! Preprocessor: raw records in, indexed numeric structures out.
//!
//! Steps:
//! 1. Validate items and build the catalog (later duplicates supersede earlier ones)
//! 2. Validate ratings against the catalog and the rating scale
//! 3. Deduplicate ratings per (user, item), keeping the most recent
//! 4. Assign user rows and item columns in first-seen order
//! 5. Clean overview text + genres into the content corpus
//!
//! Invalid records are dropped and their cause is kept in
//! `PreparedData::rejected`; preprocessing itself never fails.

use crate::error::DataLoadError;
use crate::text::TextCleaner;
use crate::types::*;
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::{debug, info, instrument};

/// Output of preprocessing, owned by one fitted snapshot
#[derive(Debug, Clone, Default)]
pub struct PreparedData {
    pub catalog: Catalog,
    pub matrix: RatingMatrix,
    /// One document per vectorizable item, in catalog order
    pub corpus: Vec<Document>,
    /// Why each dropped or content-excluded record was set aside
    pub rejected: Vec<DataLoadError>,
}

impl PreparedData {
    /// Number of effective ratings after deduplication
    pub fn rating_count(&self) -> usize {
        self.matrix.nnz()
    }
}

#[derive(Debug, Clone)]
pub struct Preprocessor {
    scale: RatingScale,
    cleaner: TextCleaner,
}

impl Preprocessor {
    pub fn new(scale: RatingScale) -> Self {
        Self {
            scale,
            cleaner: TextCleaner::new(),
        }
    }

    #[instrument(skip_all, fields(items = items.len(), ratings = ratings.len()))]
    pub fn run(&self, items: Vec<Item>, ratings: Vec<Rating>) -> PreparedData {
        let mut rejected = Vec::new();

        let catalog = self.build_catalog(items, &mut rejected);
        let matrix = self.build_matrix(&catalog, ratings, &mut rejected);
        let corpus = self.build_corpus(&catalog, &mut rejected);

        info!(
            "Preprocessed {} items, {} users, {} effective ratings, {} documents ({} records set aside)",
            catalog.len(),
            matrix.n_users(),
            matrix.nnz(),
            corpus.len(),
            rejected.len()
        );

        PreparedData {
            catalog,
            matrix,
            corpus,
            rejected,
        }
    }

    fn build_catalog(&self, items: Vec<Item>, rejected: &mut Vec<DataLoadError>) -> Catalog {
        let mut catalog = Catalog::new();
        for item in items {
            match validate_item(&item) {
                Ok(()) => catalog.upsert(item),
                Err(cause) => {
                    debug!("Rejected item {}: {}", item.id, cause);
                    rejected.push(cause);
                }
            }
        }
        catalog
    }

    fn build_matrix(
        &self,
        catalog: &Catalog,
        ratings: Vec<Rating>,
        rejected: &mut Vec<DataLoadError>,
    ) -> RatingMatrix {
        // (user, item) -> latest rating, plus the order pairs were first seen in
        let mut latest: HashMap<(UserId, ItemId), Rating> = HashMap::new();
        let mut order: Vec<(UserId, ItemId)> = Vec::new();

        for rating in ratings {
            if let Err(cause) = self.validate_rating(catalog, &rating) {
                debug!("Rejected rating: {}", cause);
                rejected.push(cause);
                continue;
            }
            let key = (rating.user_id, rating.item_id);
            match latest.get_mut(&key) {
                Some(existing) => {
                    if rating.timestamp >= existing.timestamp {
                        *existing = rating;
                    }
                }
                None => {
                    order.push(key);
                    latest.insert(key, rating);
                }
            }
        }

        let mut matrix = RatingMatrix::default();
        for key in order {
            let value = latest[&key].value;
            let row = matrix.users.get_or_insert(key.0);
            let col = matrix.items.get_or_insert(key.1);
            if row == matrix.rows.len() {
                matrix.rows.push(Vec::new());
            }
            matrix.rows[row].push((col, value));
        }
        matrix
    }

    fn build_corpus(&self, catalog: &Catalog, rejected: &mut Vec<DataLoadError>) -> Vec<Document> {
        for item in catalog.items().iter().filter(|item| !item.is_vectorizable()) {
            rejected.push(DataLoadError::NotVectorizable { item_id: item.id });
        }

        catalog
            .items()
            .par_iter()
            .filter(|item| item.is_vectorizable())
            .map(|item| Document {
                item_id: item.id,
                terms: self.cleaner.item_terms(item),
            })
            .collect()
    }

    fn validate_rating(&self, catalog: &Catalog, rating: &Rating) -> Result<(), DataLoadError> {
        if !self.scale.contains(rating.value) {
            return Err(DataLoadError::InvalidValue {
                field: "rating".to_string(),
                value: rating.value.to_string(),
            });
        }
        if !catalog.contains(rating.item_id) {
            return Err(DataLoadError::UnknownItem {
                user_id: rating.user_id,
                item_id: rating.item_id,
            });
        }
        Ok(())
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(RatingScale::default())
    }
}

fn validate_item(item: &Item) -> Result<(), DataLoadError> {
    if item.title.trim().is_empty() {
        return Err(DataLoadError::ValidationError(format!(
            "item {} has an empty title",
            item.id
        )));
    }
    if !item.popularity.is_finite() || item.popularity < 0.0 {
        return Err(DataLoadError::InvalidValue {
            field: "popularity".to_string(),
            value: item.popularity.to_string(),
        });
    }
    Ok(())
}
