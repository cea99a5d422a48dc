//! Deterministic ranking order shared by every result list.
//!
//! Higher score first; ties go to the more popular item, then to the lower
//! item id. Scores are compared with `total_cmp` so the order is total even
//! if a NaN slips through.

use data_loader::ItemId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// An item with the score it was ranked by
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredItem {
    pub item_id: ItemId,
    pub score: f64,
    /// Catalog popularity, used only to break score ties
    pub popularity: f64,
}

impl ScoredItem {
    pub fn new(item_id: ItemId, score: f64, popularity: f64) -> Self {
        Self {
            item_id,
            score,
            popularity,
        }
    }
}

/// Ordering used for every ranked list
pub fn rank_order(a: &ScoredItem, b: &ScoredItem) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.popularity.total_cmp(&a.popularity))
        .then_with(|| a.item_id.cmp(&b.item_id))
}

/// Sort in place and keep the top `n`
pub fn top_n(mut scored: Vec<ScoredItem>, n: usize) -> Vec<ScoredItem> {
    scored.sort_unstable_by(rank_order);
    scored.truncate(n);
    scored
}
