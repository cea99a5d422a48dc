//! Hybrid scoring pipeline.
//!
//! This crate provides:
//! - UserProfile: a user's rated and liked items, gathered once per request
//! - Filter trait and implementations for candidate filtering
//! - FilterPipeline for composing filters
//! - FallbackPolicy: what to use when a signal is missing
//! - HybridRecommender: blends collaborative and content scores and ranks
//!
//! ## Architecture
//! A request flows through these stages:
//! 1. Build the user profile from the fitted rating matrix
//! 2. Cold users short-circuit to the popularity ranking
//! 3. Filters remove rated items (and other item types when asked)
//! 4. Each remaining candidate is scored in parallel
//! 5. Candidates are ranked by score, then popularity, then item id
//!
//! ## Example Usage
//! ```ignore
//! use pipeline::{HybridParams, HybridRecommender, RecommendOptions};
//!
//! let recommender = HybridRecommender::new(catalog, collaborative, content, popularity, HybridParams::default());
//! let top = recommender.recommend(user_id, 10, RecommendOptions::default())?;
//! ```

pub mod traits;
pub mod profile;
pub mod filters;
pub mod filter_pipeline;
pub mod fallback;
pub mod hybrid;

// Re-export main types
pub use traits::Filter;
pub use profile::{build_user_profile, Candidate, UserProfile};
pub use filter_pipeline::FilterPipeline;
pub use fallback::FallbackPolicy;
pub use hybrid::{HybridParams, HybridRecommender, RecommendOptions, ScoreBreakdown, Strategy};
