//! An immutable, fully fitted set of models.
//!
//! A snapshot owns everything a query needs: the catalog it was built
//! from, the rating matrix, both fitted models, the popularity ranking and
//! the recommender wired over them. Once built it is never mutated, so any
//! number of readers can share it behind an `Arc`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use data_loader::{Catalog, DataLoadError, ItemId, Preprocessor, RatingMatrix, RawDataset, UserId};
use models::{CollaborativeModel, ContentModel, PopularityRanking, ScoredItem};
use pipeline::{HybridRecommender, RecommendOptions, ScoreBreakdown, Strategy};

use crate::config::RecommenderConfig;
use crate::error::{Result, ServiceError};

/// One recommended item as returned to callers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub item_id: ItemId,
    pub title: String,
    pub score: f64,
}

#[derive(Debug)]
pub struct ModelSnapshot {
    generation: u64,
    fitted_at: DateTime<Utc>,
    catalog: Arc<Catalog>,
    matrix: Arc<RatingMatrix>,
    content: Arc<ContentModel>,
    recommender: HybridRecommender,
    rejected: Vec<DataLoadError>,
    /// Raw records the snapshot was fitted on, for incremental submissions
    records: RawDataset,
}

impl ModelSnapshot {
    /// Preprocess the records and fit every model.
    ///
    /// Only fails when the configuration is invalid or no item survives
    /// validation. Bad individual records are dropped and kept in
    /// `rejected()`, after any lines the parser already rejected.
    #[instrument(skip_all, fields(items = dataset.items.len(), ratings = dataset.ratings.len()))]
    pub fn build(config: &RecommenderConfig, dataset: RawDataset) -> Result<Self> {
        config.validate()?;
        if dataset.items.is_empty() {
            return Err(ServiceError::EmptyCatalog);
        }

        let prepared = Preprocessor::new(config.rating_scale()).run(dataset.items.clone(), dataset.ratings.clone());
        if prepared.catalog.is_empty() {
            return Err(ServiceError::EmptyCatalog);
        }

        let mut rejected = dataset.rejected.clone();
        rejected.extend(prepared.rejected);

        let catalog = Arc::new(prepared.catalog);
        let matrix = Arc::new(prepared.matrix);

        let (collaborative, (content, popularity)) = rayon::join(
            || CollaborativeModel::fit(matrix.clone(), &config.factorization(), config.rating_scale()),
            || {
                rayon::join(
                    || ContentModel::fit(&prepared.corpus, catalog.clone()),
                    || PopularityRanking::from_catalog(&catalog),
                )
            },
        );
        let content = Arc::new(content);

        let recommender = HybridRecommender::new(
            catalog.clone(),
            Arc::new(collaborative),
            content.clone(),
            Arc::new(popularity),
            config.hybrid(),
        );

        info!(
            "Built snapshot: {} items, {} users, {} ratings, {} vectorized",
            catalog.len(),
            matrix.n_users(),
            matrix.nnz(),
            content.features().len()
        );

        Ok(Self {
            generation: 0,
            fitted_at: Utc::now(),
            catalog,
            matrix,
            content,
            recommender,
            rejected,
            records: dataset,
        })
    }

    /// Top `n` recommendations for a user
    pub fn recommend(&self, user_id: UserId, n: usize, options: RecommendOptions) -> Result<Vec<Recommendation>> {
        let scored = self.recommender.recommend(user_id, n, options)?;
        Ok(self.to_recommendations(scored))
    }

    /// Top `n` items most similar in content to `item_id`
    pub fn similar(&self, item_id: ItemId, n: usize) -> Result<Vec<Recommendation>> {
        let scored = self.content.similar_items(item_id, n)?;
        Ok(self.to_recommendations(scored))
    }

    pub fn explain(&self, user_id: UserId, item_id: ItemId, strategy: Strategy) -> Result<ScoreBreakdown> {
        if !self.catalog.contains(item_id) {
            return Err(ServiceError::NotFound { item_id });
        }
        Ok(self.recommender.explain(user_id, item_id, strategy))
    }

    fn to_recommendations(&self, scored: Vec<ScoredItem>) -> Vec<Recommendation> {
        scored
            .into_iter()
            .map(|s| Recommendation {
                item_id: s.item_id,
                title: self
                    .catalog
                    .get(s.item_id)
                    .map(|item| item.title.clone())
                    .unwrap_or_default(),
                score: s.score,
            })
            .collect()
    }

    pub(crate) fn set_generation(&mut self, generation: u64) {
        self.generation = generation;
    }

    /// Publish sequence number, 0 until published
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn fitted_at(&self) -> DateTime<Utc> {
        self.fitted_at
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn matrix(&self) -> &RatingMatrix {
        &self.matrix
    }

    pub fn item_count(&self) -> usize {
        self.catalog.len()
    }

    pub fn rating_count(&self) -> usize {
        self.matrix.nnz()
    }

    /// Every record set aside during preprocessing, with its cause
    pub fn rejected(&self) -> &[DataLoadError] {
        &self.rejected
    }

    pub fn records(&self) -> &RawDataset {
        &self.records
    }

    /// Records dropped entirely (not counting items kept without a feature vector)
    pub fn dropped_count(&self) -> usize {
        self.rejected.iter().filter(|e| !e.is_content_only()).count()
    }

    pub fn unvectorized_count(&self) -> usize {
        self.rejected.iter().filter(|e| e.is_content_only()).count()
    }
}
