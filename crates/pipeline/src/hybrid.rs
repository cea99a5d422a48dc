//! HybridRecommender: blends collaborative and content signals.
//!
//! For a candidate item `i` and user `u`:
//!
//! - `collab = normalize(predict(u, i))`, or the fallback midpoint on cold start
//! - `content = mean cosine(i, liked)` over the user's liked items, or 0
//! - `score = alpha * collab + (1 - alpha) * content`
//!
//! Already-rated items never reach scoring. Users without ratings get the
//! popularity ranking instead.

use crate::fallback::FallbackPolicy;
use crate::filter_pipeline::FilterPipeline;
use crate::filters::{AlreadyRatedFilter, ItemTypeFilter};
use crate::profile::{all_candidates, build_user_profile, UserProfile};
use anyhow::Result;
use data_loader::{Catalog, ItemId, ItemType, UserId};
use models::{top_n, CollaborativeModel, ContentModel, PopularityRanking, ScoredItem};
use rayon::prelude::*;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Which signals to use for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    #[default]
    Hybrid,
    Collaborative,
    ContentBased,
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hybrid" => Ok(Strategy::Hybrid),
            "collaborative" | "cf" => Ok(Strategy::Collaborative),
            "content" | "content_based" | "content-based" => Ok(Strategy::ContentBased),
            other => Err(format!("unknown strategy '{}'", other)),
        }
    }
}

/// Per-request options
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RecommendOptions {
    pub strategy: Strategy,
    /// Restrict results to one item type
    pub item_type: Option<ItemType>,
}

/// Blend weight and liked threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HybridParams {
    /// Weight of the collaborative signal, in [0, 1]
    pub alpha: f64,
    /// Ratings at or above this count as "liked"
    pub liked_threshold: f32,
}

impl Default for HybridParams {
    fn default() -> Self {
        Self {
            alpha: 0.6,
            liked_threshold: 4.0,
        }
    }
}

/// Components of one hybrid score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub collab_score: f64,
    pub content_score: f64,
    pub alpha: f64,
    pub combined: f64,
}

/// Scores and ranks candidates against one fitted snapshot.
///
/// Read-only after construction; safe to share across threads.
#[derive(Debug, Clone)]
pub struct HybridRecommender {
    catalog: Arc<Catalog>,
    collaborative: Arc<CollaborativeModel>,
    content: Arc<ContentModel>,
    popularity: Arc<PopularityRanking>,
    params: HybridParams,
    fallback: FallbackPolicy,
}

impl HybridRecommender {
    pub fn new(
        catalog: Arc<Catalog>,
        collaborative: Arc<CollaborativeModel>,
        content: Arc<ContentModel>,
        popularity: Arc<PopularityRanking>,
        params: HybridParams,
    ) -> Self {
        Self {
            catalog,
            collaborative,
            content,
            popularity,
            params,
            fallback: FallbackPolicy::default(),
        }
    }

    pub fn params(&self) -> HybridParams {
        self.params
    }

    /// Blend weight for a strategy
    pub fn alpha_for(&self, strategy: Strategy) -> f64 {
        match strategy {
            Strategy::Hybrid => self.params.alpha,
            Strategy::Collaborative => 1.0,
            Strategy::ContentBased => 0.0,
        }
    }

    pub fn user_profile(&self, user_id: UserId) -> UserProfile {
        build_user_profile(self.collaborative.matrix(), user_id, self.params.liked_threshold)
    }

    /// Score one item for a user profile
    pub fn score(&self, profile: &UserProfile, item_id: ItemId, alpha: f64) -> ScoreBreakdown {
        let collab_score = self
            .fallback
            .collab_score(self.collaborative.predict_normalized(profile.user_id, item_id));
        let content_score = self
            .fallback
            .content_score(self.content.mean_similarity(item_id, &profile.liked_items));

        ScoreBreakdown {
            collab_score,
            content_score,
            alpha,
            combined: alpha * collab_score + (1.0 - alpha) * content_score,
        }
    }

    /// Score breakdown for a (user, item) pair under a strategy
    pub fn explain(&self, user_id: UserId, item_id: ItemId, strategy: Strategy) -> ScoreBreakdown {
        let profile = self.user_profile(user_id);
        self.score(&profile, item_id, self.alpha_for(strategy))
    }

    /// Top `n` unrated items for the user
    ///
    /// ## Algorithm
    /// 1. Build the user profile
    /// 2. No ratings → popularity fallback
    /// 3. Filter out rated items (and other item types if requested)
    /// 4. Score remaining candidates in parallel
    /// 5. Sort by score, popularity, item id and keep `n`
    #[instrument(skip(self, options), fields(strategy = ?options.strategy))]
    pub fn recommend(&self, user_id: UserId, n: usize, options: RecommendOptions) -> Result<Vec<ScoredItem>> {
        let profile = self.user_profile(user_id);

        if profile.is_cold() {
            debug!("User {} has no ratings, using popularity", user_id);
            return Ok(self.fallback.popular(&self.popularity, n, |item_id| {
                options.item_type.is_none_or(|wanted| {
                    self.catalog.get(item_id).map(|item| item.item_type) == Some(wanted)
                })
            }));
        }

        let filters = FilterPipeline::new()
            .add_filter(AlreadyRatedFilter)
            .add_optional(options.item_type.map(ItemTypeFilter::new));
        let candidates = filters.apply(all_candidates(&self.catalog), &profile)?;

        let alpha = self.alpha_for(options.strategy);
        let scored: Vec<ScoredItem> = candidates
            .par_iter()
            .map(|candidate| {
                let breakdown = self.score(&profile, candidate.item_id, alpha);
                ScoredItem::new(candidate.item_id, breakdown.combined, candidate.popularity)
            })
            .collect();

        debug!(
            "Scored {} candidates for user {} ({} liked items)",
            scored.len(),
            user_id,
            profile.liked_items.len()
        );
        Ok(top_n(scored, n))
    }
}
