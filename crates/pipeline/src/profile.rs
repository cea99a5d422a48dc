//! User profiles and scoring candidates.
//!
//! A `UserProfile` gathers everything the hybrid scorer needs about one
//! user up front, so candidate scoring never goes back to the rating matrix.

use data_loader::{Catalog, Item, ItemId, ItemType, RatingMatrix, UserId};
use std::collections::HashSet;

/// What the fitted snapshot knows about one user
#[derive(Debug, Clone, Default)]
pub struct UserProfile {
    pub user_id: UserId,
    /// Every item the user has an effective rating for
    pub rated_items: HashSet<ItemId>,
    /// Items rated at or above the liked threshold, in first-seen order
    pub liked_items: Vec<ItemId>,
}

impl UserProfile {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            ..Default::default()
        }
    }

    /// No ratings in the active snapshot: popularity fallback applies
    pub fn is_cold(&self) -> bool {
        self.rated_items.is_empty()
    }
}

/// Build a profile from the rating matrix; unknown users get an empty one
pub fn build_user_profile(matrix: &RatingMatrix, user_id: UserId, liked_threshold: f32) -> UserProfile {
    let mut profile = UserProfile::new(user_id);

    for (item_id, value) in matrix.user_ratings(user_id) {
        profile.rated_items.insert(item_id);
        if value >= liked_threshold {
            profile.liked_items.push(item_id);
        }
    }

    profile
}

/// An item under consideration for one request
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub item_id: ItemId,
    pub item_type: ItemType,
    pub popularity: f64,
}

impl Candidate {
    pub fn from_item(item: &Item) -> Self {
        Self {
            item_id: item.id,
            item_type: item.item_type,
            popularity: item.popularity,
        }
    }
}

/// Every catalog item as a candidate, in catalog order
pub fn all_candidates(catalog: &Catalog) -> Vec<Candidate> {
    catalog.items().iter().map(Candidate::from_item).collect()
}
