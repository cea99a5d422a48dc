//! # Data Loader Crate
//!
//! Ingestion-facing half of the recommender: raw catalog records, the
//! `.dat` file parser, text cleaning and the preprocessor that turns raw
//! records into the indexed structures the models are fitted on.
//!
//! ## Main Components
//!
//! - **types**: Items, ratings, id index maps, catalog, sparse rating matrix
//! - **parser**: Parse `items.dat` / `ratings.dat` into records
//! - **dataset**: Load a full `RawDataset` from a directory
//! - **text**: Lowercasing, diacritic folding, stop terms, genre pseudo-terms
//! - **preprocess**: Validation, deduplication and indexing
//! - **error**: Error types for data loading
//!
//! ## Example Usage
//!
//! ```ignore
//! use data_loader::{Preprocessor, RawDataset, RatingScale};
//! use std::path::Path;
//!
//! let dataset = RawDataset::load_from_dir(Path::new("data"))?;
//! let prepared = Preprocessor::new(RatingScale::default())
//!     .run(dataset.items, dataset.ratings);
//!
//! println!("{} users rated {} items", prepared.matrix.n_users(), prepared.matrix.n_items());
//! ```

// Public modules
pub mod error;
pub mod types;
pub mod parser;
pub mod dataset;
pub mod text;
pub mod preprocess;

// Re-export commonly used types for convenience
pub use error::{DataLoadError, Result};
pub use types::{
    // Type aliases
    UserId,
    ItemId,
    // Core types
    Item,
    ItemType,
    Rating,
    RatingScale,
    IdIndex,
    Catalog,
    RatingMatrix,
    Document,
};
pub use dataset::RawDataset;
pub use text::TextCleaner;
pub use preprocess::{PreparedData, Preprocessor};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_preprocess() {
        let prepared = Preprocessor::default().run(Vec::new(), Vec::new());

        assert!(prepared.catalog.is_empty());
        assert_eq!(prepared.matrix.n_users(), 0);
        assert_eq!(prepared.rating_count(), 0);
        assert!(prepared.matrix.global_mean().is_none());
        assert!(prepared.corpus.is_empty());
    }

    #[test]
    fn test_matrix_statistics() {
        let items = (1..=2)
            .map(|id| Item {
                id,
                title: format!("Item {}", id),
                item_type: ItemType::Series,
                genres: vec!["Drama".to_string()],
                overview: String::new(),
                popularity: 0.0,
            })
            .collect();
        let ratings = vec![
            Rating { user_id: 1, item_id: 1, value: 1.0, timestamp: 0 },
            Rating { user_id: 2, item_id: 2, value: 4.0, timestamp: 0 },
        ];

        let prepared = Preprocessor::default().run(items, ratings);

        assert_eq!(prepared.matrix.global_mean(), Some(2.5));
        assert_eq!(prepared.matrix.value_range(), Some((1.0, 4.0)));
        assert!(prepared.matrix.user_ratings(3).is_empty());
    }
}
