//! Core domain types for the recommendation catalog.
//!
//! Raw records (`Item`, `Rating`) come from the ingestion side. The indexed
//! structures (`IdIndex`, `Catalog`, `RatingMatrix`) are built by the
//! preprocessor and belong to exactly one fitted snapshot.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;

// =============================================================================
// Type Aliases
// =============================================================================

/// External identifier of a user
pub type UserId = u32;

/// External identifier of a catalog item (movie or series)
pub type ItemId = u32;

// =============================================================================
// Raw Records
// =============================================================================

/// Kind of catalog item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemType {
    Movie,
    Series,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Movie => "movie",
            ItemType::Series => "series",
        }
    }
}

impl std::str::FromStr for ItemType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "movie" => Ok(ItemType::Movie),
            "series" | "tv" => Ok(ItemType::Series),
            other => Err(format!("unknown item type '{}'", other)),
        }
    }
}

/// A catalog item. Immutable once ingested; re-ingesting the same id supersedes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    pub item_type: ItemType,
    pub genres: Vec<String>,
    /// Free-text synopsis, may be empty
    pub overview: String,
    /// Non-negative popularity score supplied by the catalog
    pub popularity: f64,
}

impl Item {
    /// Items with neither overview text nor genres cannot be vectorized.
    pub fn is_vectorizable(&self) -> bool {
        !self.overview.trim().is_empty() || self.genres.iter().any(|g| !g.trim().is_empty())
    }
}

/// A single user rating of an item
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub value: f32,
    /// Unix timestamp when rating was made
    pub timestamp: i64,
}

/// Bounded range every rating value must fall in
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingScale {
    pub min: f32,
    pub max: f32,
}

impl RatingScale {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f32) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }

    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }

    pub fn midpoint(&self) -> f32 {
        (self.min + self.max) / 2.0
    }
}

impl Default for RatingScale {
    fn default() -> Self {
        Self::new(0.5, 5.0)
    }
}

// =============================================================================
// Index Maps
// =============================================================================

/// Bijection between external ids and dense positions, in first-seen order.
///
/// Positions are only meaningful inside the snapshot that built the index.
#[derive(Debug, Clone, Default)]
pub struct IdIndex<K> {
    ids: Vec<K>,
    positions: HashMap<K, usize>,
}

impl<K: Copy + Eq + Hash> IdIndex<K> {
    pub fn new() -> Self {
        Self {
            ids: Vec::new(),
            positions: HashMap::new(),
        }
    }

    /// Returns the position of `id`, assigning the next free one on first sight.
    pub fn get_or_insert(&mut self, id: K) -> usize {
        if let Some(&pos) = self.positions.get(&id) {
            return pos;
        }
        let pos = self.ids.len();
        self.ids.push(id);
        self.positions.insert(id, pos);
        pos
    }

    pub fn position(&self, id: K) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    pub fn id_at(&self, position: usize) -> Option<K> {
        self.ids.get(position).copied()
    }

    pub fn ids(&self) -> &[K] {
        &self.ids
    }

    pub fn contains(&self, id: K) -> bool {
        self.positions.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// All accepted items, keyed by id, kept in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    items: Vec<Item>,
    index: IdIndex<ItemId>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an item. A later record with the same id supersedes the earlier
    /// one but keeps its original position.
    pub fn upsert(&mut self, item: Item) {
        match self.index.position(item.id) {
            Some(pos) => self.items[pos] = item,
            None => {
                self.index.get_or_insert(item.id);
                self.items.push(item);
            }
        }
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.index.position(id).map(|pos| &self.items[pos])
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.index.contains(id)
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn popularity(&self, id: ItemId) -> f64 {
        self.get(id).map(|item| item.popularity).unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// =============================================================================
// Sparse Rating Matrix
// =============================================================================

/// Sparse user x item matrix of effective ratings.
///
/// Rows are users, columns are items; both indexed in first-seen order of the
/// accepted ratings. Each row keeps its `(column, value)` entries in the order
/// they were first seen.
#[derive(Debug, Clone, Default)]
pub struct RatingMatrix {
    pub(crate) users: IdIndex<UserId>,
    pub(crate) items: IdIndex<ItemId>,
    pub(crate) rows: Vec<Vec<(usize, f32)>>,
}

impl RatingMatrix {
    pub fn users(&self) -> &IdIndex<UserId> {
        &self.users
    }

    pub fn items(&self) -> &IdIndex<ItemId> {
        &self.items
    }

    /// Entries of one user row as `(column, value)` pairs
    pub fn row(&self, row: usize) -> &[(usize, f32)] {
        self.rows.get(row).map(|r| r.as_slice()).unwrap_or(&[])
    }

    /// Ratings of a user keyed by external item id; empty for unknown users.
    pub fn user_ratings(&self, user_id: UserId) -> Vec<(ItemId, f32)> {
        let Some(row) = self.users.position(user_id) else {
            return Vec::new();
        };
        self.row(row)
            .iter()
            .filter_map(|&(col, value)| self.items.id_at(col).map(|id| (id, value)))
            .collect()
    }

    /// Iterate every stored entry as `(row, column, value)`
    pub fn entries(&self) -> impl Iterator<Item = (usize, usize, f32)> + '_ {
        self.rows
            .iter()
            .enumerate()
            .flat_map(|(row, cols)| cols.iter().map(move |&(col, value)| (row, col, value)))
    }

    pub fn nnz(&self) -> usize {
        self.rows.iter().map(|r| r.len()).sum()
    }

    pub fn n_users(&self) -> usize {
        self.users.len()
    }

    pub fn n_items(&self) -> usize {
        self.items.len()
    }

    /// Mean of all stored ratings, `None` if the matrix is empty
    pub fn global_mean(&self) -> Option<f32> {
        let nnz = self.nnz();
        if nnz == 0 {
            return None;
        }
        let total: f64 = self.entries().map(|(_, _, v)| v as f64).sum();
        Some((total / nnz as f64) as f32)
    }

    /// Smallest and largest stored rating, `None` if the matrix is empty
    pub fn value_range(&self) -> Option<(f32, f32)> {
        self.entries().fold(None, |acc, (_, _, v)| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}

// =============================================================================
// Content Corpus
// =============================================================================

/// Cleaned term list of one vectorizable item
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub item_id: ItemId,
    pub terms: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: ItemId, title: &str) -> Item {
        Item {
            id,
            title: title.to_string(),
            item_type: ItemType::Movie,
            genres: vec!["Drama".to_string()],
            overview: String::new(),
            popularity: 1.0,
        }
    }

    #[test]
    fn test_id_index_first_seen_order() {
        let mut index = IdIndex::new();
        assert_eq!(index.get_or_insert(30u32), 0);
        assert_eq!(index.get_or_insert(10), 1);
        assert_eq!(index.get_or_insert(30), 0);

        assert_eq!(index.ids(), &[30, 10]);
        assert_eq!(index.position(10), Some(1));
        assert_eq!(index.id_at(1), Some(10));
        assert_eq!(index.position(99), None);
    }

    #[test]
    fn test_catalog_upsert_keeps_position() {
        let mut catalog = Catalog::new();
        catalog.upsert(item(5, "Old"));
        catalog.upsert(item(7, "Other"));
        catalog.upsert(item(5, "New"));

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.items()[0].title, "New");
        assert_eq!(catalog.get(7).map(|i| i.title.as_str()), Some("Other"));
    }

    #[test]
    fn test_item_type_parsing() {
        assert_eq!("movie".parse::<ItemType>(), Ok(ItemType::Movie));
        assert_eq!("TV".parse::<ItemType>(), Ok(ItemType::Series));
        assert!("podcast".parse::<ItemType>().is_err());
    }

    #[test]
    fn test_rating_scale() {
        let scale = RatingScale::default();
        assert!(scale.contains(0.5));
        assert!(scale.contains(5.0));
        assert!(!scale.contains(5.5));
        assert!(!scale.contains(f32::NAN));
        assert_eq!(scale.clamp(7.0), 5.0);
    }
}
