//! Filter to restrict recommendations to movies or to series.

use crate::profile::{Candidate, UserProfile};
use crate::traits::Filter;
use anyhow::Result;
use data_loader::ItemType;

/// Keeps only candidates of one item type.
pub struct ItemTypeFilter {
    item_type: ItemType,
}

impl ItemTypeFilter {
    pub fn new(item_type: ItemType) -> Self {
        Self { item_type }
    }
}

impl Filter for ItemTypeFilter {
    fn name(&self) -> &str {
        "ItemTypeFilter"
    }

    fn apply(&self, candidates: Vec<Candidate>, _profile: &UserProfile) -> Result<Vec<Candidate>> {
        Ok(candidates
            .into_iter()
            .filter(|candidate| candidate.item_type == self.item_type)
            .collect())
    }
}
