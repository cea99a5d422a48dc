//! Global popularity ranking, the fallback for every missing signal.

use crate::ranking::{top_n, ScoredItem};
use data_loader::{Catalog, ItemId};

/// Catalog items ordered by popularity (desc), ties by lower id.
///
/// Scores are popularity divided by the largest popularity in the catalog,
/// so they fall in [0, 1]; all zero when nobody has any popularity.
#[derive(Debug, Clone, Default)]
pub struct PopularityRanking {
    ranked: Vec<ScoredItem>,
}

impl PopularityRanking {
    pub fn from_catalog(catalog: &Catalog) -> Self {
        let max = catalog
            .items()
            .iter()
            .map(|item| item.popularity)
            .fold(0.0_f64, f64::max);

        let scored = catalog
            .items()
            .iter()
            .map(|item| {
                let score = if max > 0.0 { item.popularity / max } else { 0.0 };
                ScoredItem::new(item.id, score, item.popularity)
            })
            .collect::<Vec<_>>();

        let len = scored.len();
        Self {
            ranked: top_n(scored, len),
        }
    }

    /// Full ranking, most popular first
    pub fn ranked(&self) -> &[ScoredItem] {
        &self.ranked
    }

    /// Top `n` items accepted by `keep`
    pub fn top(&self, n: usize, mut keep: impl FnMut(ItemId) -> bool) -> Vec<ScoredItem> {
        self.ranked
            .iter()
            .filter(|s| keep(s.item_id))
            .take(n)
            .copied()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }
}
