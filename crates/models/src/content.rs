//! Content Model - TF-IDF item vectors and cosine similarity
//!
//! Every vectorizable item's cleaned term list becomes a sparse TF-IDF
//! vector over a vocabulary fixed at fit time. Similarity between two items
//! is the cosine of their vectors, defined as 0 when either vector has zero
//! norm.
//!
//! ## Weighting
//! - tf: raw count of the term in the document
//! - idf: `ln((1 + N) / (1 + df)) + 1` (smoothed, never zero)

use crate::error::{ModelError, Result};
use crate::ranking::{top_n, ScoredItem};
use data_loader::{Catalog, Document, ItemId};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Sparse weighted term vector, entries sorted by term id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureVector {
    entries: Vec<(u32, f64)>,
    norm: f64,
}

impl FeatureVector {
    fn from_weights(mut entries: Vec<(u32, f64)>) -> Self {
        entries.sort_unstable_by_key(|&(term, _)| term);
        let norm = entries.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        Self { entries, norm }
    }

    pub fn entries(&self) -> &[(u32, f64)] {
        &self.entries
    }

    pub fn norm(&self) -> f64 {
        self.norm
    }

    pub fn is_zero(&self) -> bool {
        self.norm == 0.0
    }

    /// Dot product by merging the two sorted entry lists
    pub fn dot(&self, other: &FeatureVector) -> f64 {
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0;
        while i < self.entries.len() && j < other.entries.len() {
            let (ta, wa) = self.entries[i];
            let (tb, wb) = other.entries[j];
            match ta.cmp(&tb) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += wa * wb;
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }
}

/// Cosine similarity, 0 when either vector has zero norm
pub fn cosine_similarity(a: &FeatureVector, b: &FeatureVector) -> f64 {
    if a.is_zero() || b.is_zero() {
        return 0.0;
    }
    (a.dot(b) / (a.norm * b.norm)).clamp(-1.0, 1.0)
}

/// Vocabulary and idf weights learned from the corpus
#[derive(Debug, Clone, Default)]
pub struct TfIdfVectorizer {
    vocabulary: HashMap<String, u32>,
    idf: Vec<f64>,
}

impl TfIdfVectorizer {
    /// Learn vocabulary (sorted term order) and document frequencies
    pub fn fit(corpus: &[Document]) -> Self {
        let mut document_frequency: BTreeMap<&str, usize> = BTreeMap::new();
        for doc in corpus {
            let mut seen: Vec<&str> = doc.terms.iter().map(String::as_str).collect();
            seen.sort_unstable();
            seen.dedup();
            for term in seen {
                *document_frequency.entry(term).or_insert(0) += 1;
            }
        }

        let n_docs = corpus.len() as f64;
        let mut vocabulary = HashMap::with_capacity(document_frequency.len());
        let mut idf = Vec::with_capacity(document_frequency.len());
        for (term_id, (term, df)) in document_frequency.into_iter().enumerate() {
            vocabulary.insert(term.to_string(), term_id as u32);
            idf.push(((1.0 + n_docs) / (1.0 + df as f64)).ln() + 1.0);
        }

        Self { vocabulary, idf }
    }

    /// Weight a term list; terms outside the vocabulary are ignored
    pub fn transform(&self, terms: &[String]) -> FeatureVector {
        let mut counts: HashMap<u32, f64> = HashMap::new();
        for term in terms {
            if let Some(&id) = self.vocabulary.get(term) {
                *counts.entry(id).or_insert(0.0) += 1.0;
            }
        }
        let weights = counts
            .into_iter()
            .map(|(id, tf)| (id, tf * self.idf[id as usize]))
            .collect();
        FeatureVector::from_weights(weights)
    }

    /// Vector dimensionality
    pub fn dimension(&self) -> usize {
        self.idf.len()
    }
}

/// One feature vector per vectorizable item
#[derive(Debug, Clone, Default)]
pub struct ItemFeatureMatrix {
    vectorizer: TfIdfVectorizer,
    vectors: HashMap<ItemId, FeatureVector>,
    /// Items in corpus order
    order: Vec<ItemId>,
}

impl ItemFeatureMatrix {
    pub fn build(corpus: &[Document]) -> Self {
        let vectorizer = TfIdfVectorizer::fit(corpus);
        let vectors: Vec<(ItemId, FeatureVector)> = corpus
            .par_iter()
            .map(|doc| (doc.item_id, vectorizer.transform(&doc.terms)))
            .collect();

        let order = vectors.iter().map(|(id, _)| *id).collect();
        Self {
            vectorizer,
            vectors: vectors.into_iter().collect(),
            order,
        }
    }

    pub fn get(&self, item_id: ItemId) -> Option<&FeatureVector> {
        self.vectors.get(&item_id)
    }

    pub fn item_ids(&self) -> &[ItemId] {
        &self.order
    }

    pub fn dimension(&self) -> usize {
        self.vectorizer.dimension()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Fitted content-based model for one snapshot
#[derive(Debug, Clone)]
pub struct ContentModel {
    features: ItemFeatureMatrix,
    catalog: Arc<Catalog>,
}

impl ContentModel {
    #[instrument(skip_all, fields(documents = corpus.len()))]
    pub fn fit(corpus: &[Document], catalog: Arc<Catalog>) -> Self {
        let features = ItemFeatureMatrix::build(corpus);
        let zero = features.vectors.values().filter(|v| v.is_zero()).count();
        info!(
            "Built {} item vectors over {} terms ({} without informative terms)",
            features.len(),
            features.dimension(),
            zero
        );
        Self { features, catalog }
    }

    pub fn features(&self) -> &ItemFeatureMatrix {
        &self.features
    }

    pub fn has_vector(&self, item_id: ItemId) -> bool {
        self.features.get(item_id).is_some()
    }

    /// Cosine similarity of two items; 0 if either has no informative vector
    pub fn similarity(&self, a: ItemId, b: ItemId) -> f64 {
        match (self.features.get(a), self.features.get(b)) {
            (Some(va), Some(_)) if a == b => {
                if va.is_zero() {
                    0.0
                } else {
                    1.0
                }
            }
            (Some(va), Some(vb)) => cosine_similarity(va, vb),
            _ => 0.0,
        }
    }

    /// Mean similarity of `item_id` to each of `others` (`None` if `others` is empty)
    pub fn mean_similarity(&self, item_id: ItemId, others: &[ItemId]) -> Option<f64> {
        if others.is_empty() {
            return None;
        }
        let total: f64 = others.iter().map(|&other| self.similarity(item_id, other)).sum();
        Some(total / others.len() as f64)
    }

    /// The `n` items most similar to `item_id`, excluding itself
    ///
    /// Ties go to the more popular item, then the lower id.
    #[instrument(skip(self))]
    pub fn similar_items(&self, item_id: ItemId, n: usize) -> Result<Vec<ScoredItem>> {
        let target = self
            .features
            .get(item_id)
            .ok_or(ModelError::NotFound { item_id })?;

        let scored: Vec<ScoredItem> = self
            .features
            .item_ids()
            .par_iter()
            .filter(|&&other| other != item_id)
            .filter_map(|&other| {
                let vector = self.features.get(other)?;
                Some(ScoredItem::new(
                    other,
                    cosine_similarity(target, vector),
                    self.catalog.popularity(other),
                ))
            })
            .collect();

        debug!("Scored {} neighbours of item {}", scored.len(), item_id);
        Ok(top_n(scored, n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::{Item, ItemType, Preprocessor};

    fn item(id: ItemId, genres: &[&str], overview: &str, popularity: f64) -> Item {
        Item {
            id,
            title: format!("Item {}", id),
            item_type: ItemType::Movie,
            genres: genres.iter().map(|g| g.to_string()).collect(),
            overview: overview.to_string(),
            popularity,
        }
    }

    fn model(items: Vec<Item>) -> ContentModel {
        let prepared = Preprocessor::default().run(items, Vec::new());
        ContentModel::fit(&prepared.corpus, Arc::new(prepared.catalog))
    }

    fn sample() -> ContentModel {
        model(vec![
            item(1, &["Sci-Fi"], "A crew of astronauts explores deep space", 10.0),
            item(2, &["Sci-Fi"], "Astronauts stranded in deep space", 5.0),
            item(3, &["Romance"], "Two strangers fall in love in Paris", 8.0),
            item(4, &["Comedy"], "", 1.0),
        ])
    }

    #[test]
    fn test_similarity_symmetric_and_reflexive() {
        let model = sample();
        for a in 1..=4 {
            assert!((model.similarity(a, a) - 1.0).abs() < 1e-9);
            for b in 1..=4 {
                assert_eq!(model.similarity(a, b), model.similarity(b, a));
            }
        }
    }

    #[test]
    fn test_cosine_matches_definition() {
        let model = sample();
        let a = model.features().get(1).unwrap();
        let b = model.features().get(2).unwrap();
        let expected = a.dot(b) / (a.norm() * b.norm());
        assert!((cosine_similarity(a, b) - expected).abs() < 1e-12);
        assert!(expected > 0.0);
    }

    #[test]
    fn test_similar_items_ranks_by_text() {
        let model = sample();
        let similar = model.similar_items(1, 3).unwrap();
        assert_eq!(similar.len(), 3);
        assert_eq!(similar[0].item_id, 2);
        assert!(similar.iter().all(|s| s.item_id != 1));
        assert!(similar[0].score >= similar[1].score);
    }

    #[test]
    fn test_zero_vector_similarity() {
        // Overview made only of stop terms and no genres → zero vector
        let model = model(vec![
            item(1, &[], "the and of", 1.0),
            item(2, &["Drama"], "A family saga", 5.0),
            item(3, &["Drama"], "A family feud", 5.0),
        ]);
        assert!(model.features().get(1).unwrap().is_zero());
        assert_eq!(model.similarity(1, 2), 0.0);
        assert_eq!(model.similarity(1, 1), 0.0);

        let similar = model.similar_items(1, 2).unwrap();
        assert!(similar.iter().all(|s| s.score == 0.0));
        // popularity tie, then lower id
        assert_eq!(similar.iter().map(|s| s.item_id).collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn test_similar_items_unknown_item() {
        let model = model(vec![item(1, &[], "", 1.0), item(2, &["Drama"], "", 1.0)]);
        assert_eq!(
            model.similar_items(1, 5),
            Err(ModelError::NotFound { item_id: 1 })
        );
        assert_eq!(
            model.similar_items(42, 5),
            Err(ModelError::NotFound { item_id: 42 })
        );
    }

    #[test]
    fn test_mean_similarity() {
        let model = sample();
        assert_eq!(model.mean_similarity(1, &[]), None);
        let mean = model.mean_similarity(1, &[2, 3]).unwrap();
        let expected = (model.similarity(1, 2) + model.similarity(1, 3)) / 2.0;
        assert!((mean - expected).abs() < 1e-12);
    }

    #[test]
    fn test_vectorizer_idf_smoothing() {
        let corpus = vec![
            Document { item_id: 1, terms: vec!["space".into(), "crew".into()] },
            Document { item_id: 2, terms: vec!["space".into()] },
        ];
        let vectorizer = TfIdfVectorizer::fit(&corpus);
        assert_eq!(vectorizer.dimension(), 2);

        let v = vectorizer.transform(&["space".to_string(), "space".to_string(), "unknown".to_string()]);
        assert_eq!(v.entries().len(), 1);
        // "space" appears in every document: idf = ln(3/3) + 1 = 1, tf = 2
        assert!((v.entries()[0].1 - 2.0).abs() < 1e-12);
    }
}
