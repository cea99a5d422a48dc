//! Filter to remove items the user has already rated.
//!
//! Always the first filter in the pipeline: a rated item is never
//! recommended back to the user who rated it.

use crate::profile::{Candidate, UserProfile};
use crate::traits::Filter;
use anyhow::Result;

/// Removes candidates that the user has already rated.
///
/// ## Algorithm
/// Uses the HashSet in UserProfile.rated_items for O(1) lookups.
pub struct AlreadyRatedFilter;

impl Filter for AlreadyRatedFilter {
    fn name(&self) -> &str {
        "AlreadyRatedFilter"
    }

    fn apply(&self, candidates: Vec<Candidate>, profile: &UserProfile) -> Result<Vec<Candidate>> {
        let filtered: Vec<Candidate> = candidates
            .into_iter()
            .filter(|candidate| !profile.rated_items.contains(&candidate.item_id))
            .collect();
        Ok(filtered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::ItemType;

    #[test]
    fn test_already_rated_filter() {
        let mut profile = UserProfile::new(1);
        profile.rated_items.insert(100);
        profile.rated_items.insert(200);

        let candidates = [100, 101, 200, 300]
            .into_iter()
            .map(|item_id| Candidate { item_id, item_type: ItemType::Movie, popularity: 0.0 })
            .collect();

        let filtered = AlreadyRatedFilter.apply(candidates, &profile).unwrap();

        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered[0].item_id, 101);
        assert_eq!(filtered[1].item_id, 300);
    }
}
