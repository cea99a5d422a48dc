//! FallbackPolicy: the single place that decides what to use when a signal
//! is unavailable.
//!
//! - No collaborative prediction (cold user or item) → neutral midpoint
//! - No liked items to compare against → zero content score
//! - No ratings at all for the user → global popularity ranking

use models::{PopularityRanking, ScoredItem};
use data_loader::ItemId;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FallbackPolicy {
    /// Collaborative score used when no prediction exists
    pub neutral_collab_score: f64,
    /// Content score used when the user has no liked items
    pub empty_content_score: f64,
}

impl FallbackPolicy {
    pub fn collab_score(&self, normalized: Option<f32>) -> f64 {
        normalized.map(f64::from).unwrap_or(self.neutral_collab_score)
    }

    pub fn content_score(&self, mean_similarity: Option<f64>) -> f64 {
        mean_similarity.unwrap_or(self.empty_content_score)
    }

    /// Top `n` items by global popularity that pass `keep`
    pub fn popular(
        &self,
        popularity: &PopularityRanking,
        n: usize,
        keep: impl FnMut(ItemId) -> bool,
    ) -> Vec<ScoredItem> {
        let items = popularity.top(n, keep);
        debug!("Popularity fallback returned {} items", items.len());
        items
    }
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            neutral_collab_score: 0.5,
            empty_content_score: 0.0,
        }
    }
}
