//! # Models Crate
//!
//! The two signals the hybrid recommender blends, plus the popularity
//! ranking used whenever a signal is missing.
//!
//! ## Components
//!
//! ### Collaborative Model
//! Biased matrix factorization of the user x item rating matrix:
//! - Latent user/item vectors plus global, user and item biases
//! - Predictions clipped to the rating scale, min-max normalised to [0, 1]
//! - Unknown users or items get no prediction (cold start)
//!
//! ### Content Model
//! TF-IDF vectors over cleaned overview text and genre pseudo-terms:
//! - Cosine similarity, 0 for zero-norm vectors
//! - `similar_items` with a deterministic tie-break
//!
//! ### Popularity Ranking
//! Catalog popularity, normalised by the maximum.
//!
//! ## Example Usage
//!
//! ```ignore
//! use models::{CollaborativeModel, ContentModel, FactorizationParams, PopularityRanking};
//! use std::sync::Arc;
//!
//! let matrix = Arc::new(prepared.matrix);
//! let catalog = Arc::new(prepared.catalog);
//!
//! let collaborative = CollaborativeModel::fit(matrix, &FactorizationParams::default(), scale);
//! let content = ContentModel::fit(&prepared.corpus, catalog.clone());
//! let popularity = PopularityRanking::from_catalog(&catalog);
//!
//! let neighbours = content.similar_items(42, 10)?;
//! ```

// Public modules
pub mod error;
pub mod ranking;
pub mod popularity;
pub mod collaborative;
pub mod content;

// Re-export commonly used types
pub use error::ModelError;
pub use ranking::{rank_order, top_n, ScoredItem};
pub use popularity::PopularityRanking;
pub use collaborative::{CollaborativeModel, FactorizationParams, LatentFactors};
pub use content::{cosine_similarity, ContentModel, FeatureVector, ItemFeatureMatrix, TfIdfVectorizer};
