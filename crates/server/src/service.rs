//! # Recommendation Service
//!
//! Owns the active model snapshot and the fit lifecycle:
//!
//! ```text
//! Unfit --fit--> Fitting --ok--> Fit --submit--> Stale --refit--> Fitting
//!                   |                                                |
//!                   +--error--> previous state <--------error--------+
//! ```
//!
//! Readers take an `Arc` to the current snapshot and never block on a fit.
//! A fit builds a complete new snapshot off to the side and swaps the
//! reference in one step, so a reader sees either the old snapshot or the
//! new one, never a mix. A failed or cancelled fit leaves the old snapshot
//! serving.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use data_loader::{Item, ItemId, Rating, RawDataset, UserId};
use pipeline::{RecommendOptions, ScoreBreakdown, Strategy};

use crate::config::RecommenderConfig;
use crate::error::{Result, ServiceError};
use crate::snapshot::{ModelSnapshot, Recommendation};

/// Lifecycle of the service's models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelState {
    /// No snapshot has ever been published
    Unfit,
    /// A fit is in progress; queries use the previous snapshot if any
    Fitting,
    Fit,
    /// New records were submitted after the active snapshot was built
    Stale,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub model_state: ModelState,
    pub snapshot_fit_timestamp: Option<DateTime<Utc>>,
    pub item_count: usize,
    pub rating_count: usize,
    pub rejected_records: usize,
    pub unvectorized_items: usize,
    pub generation: Option<u64>,
}

/// Records submitted since the last publish
#[derive(Debug)]
struct Pending {
    /// Bumped on every submission
    version: u64,
    records: RawDataset,
}

#[derive(Debug)]
struct Lifecycle {
    state: ModelState,
    /// State to return to once no fit is in flight
    settled: ModelState,
    fits_in_flight: usize,
    /// Sequence handed to the most recently started fit
    last_started: u64,
    /// Sequence of the fit behind the active snapshot
    active_seq: u64,
    generation: u64,
    submissions: u64,
    pending: Option<Pending>,
}

impl Lifecycle {
    fn mark_stale(&mut self) {
        if self.settled == ModelState::Fit {
            self.settled = ModelState::Stale;
        }
        if self.state == ModelState::Fit {
            self.state = ModelState::Stale;
        }
    }

    fn stage(&mut self, records: RawDataset) {
        self.submissions += 1;
        self.pending = Some(Pending {
            version: self.submissions,
            records,
        });
        self.mark_stale();
    }
}

pub struct RecommendationService {
    config: RecommenderConfig,
    active: RwLock<Option<Arc<ModelSnapshot>>>,
    lifecycle: Mutex<Lifecycle>,
}

/// Marks a fit as in flight; restores the lifecycle if dropped before `finish`
struct FitGuard<'a> {
    service: &'a RecommendationService,
    seq: u64,
    /// Submission this fit consumes, cleared on publish if still current
    submission: Option<u64>,
    finished: bool,
}

impl<'a> FitGuard<'a> {
    fn begin(service: &'a RecommendationService, submission: Option<u64>) -> Self {
        let mut lifecycle = service.lifecycle();
        lifecycle.fits_in_flight += 1;
        lifecycle.last_started += 1;
        lifecycle.state = ModelState::Fitting;
        let seq = lifecycle.last_started;
        drop(lifecycle);
        Self {
            service,
            seq,
            submission,
            finished: false,
        }
    }

    /// Publish unless a fit started later has already been published
    fn finish(mut self, snapshot: ModelSnapshot) -> Result<Arc<ModelSnapshot>> {
        self.finished = true;
        let mut lifecycle = self.service.lifecycle();
        if self.seq < lifecycle.active_seq {
            warn!(
                "Discarding fit #{}: fit #{} was started later and is already active",
                self.seq, lifecycle.active_seq
            );
            return Err(ServiceError::Superseded {
                started: self.seq,
                active: lifecycle.active_seq,
            });
        }
        Ok(self.service.swap_in(&mut lifecycle, self.seq, self.submission, snapshot))
    }
}

impl Drop for FitGuard<'_> {
    fn drop(&mut self) {
        let mut lifecycle = self.service.lifecycle();
        lifecycle.fits_in_flight = lifecycle.fits_in_flight.saturating_sub(1);
        if !self.finished {
            warn!("Fit #{} did not complete, previous snapshot stays active", self.seq);
        }
        lifecycle.state = if lifecycle.fits_in_flight > 0 {
            ModelState::Fitting
        } else {
            lifecycle.settled
        };
    }
}

impl RecommendationService {
    pub fn new(config: RecommenderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            active: RwLock::new(None),
            lifecycle: Mutex::new(Lifecycle {
                state: ModelState::Unfit,
                settled: ModelState::Unfit,
                fits_in_flight: 0,
                last_started: 0,
                active_seq: 0,
                generation: 0,
                submissions: 0,
                pending: None,
            }),
        })
    }

    pub fn config(&self) -> &RecommenderConfig {
        &self.config
    }

    pub fn state(&self) -> ModelState {
        self.lifecycle().state
    }

    /// Currently active snapshot, if any
    pub fn snapshot(&self) -> Option<Arc<ModelSnapshot>> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Build a snapshot without publishing it
    pub fn build_snapshot(&self, items: Vec<Item>, ratings: Vec<Rating>) -> Result<ModelSnapshot> {
        ModelSnapshot::build(&self.config, RawDataset::new(items, ratings))
    }

    /// Make `snapshot` the active one
    ///
    /// Counts as the newest fit: fits already in flight will not replace it.
    /// Readers holding the previous snapshot keep using it until they drop it.
    pub fn publish(&self, snapshot: ModelSnapshot) -> Arc<ModelSnapshot> {
        let mut lifecycle = self.lifecycle();
        lifecycle.last_started += 1;
        let seq = lifecycle.last_started;
        self.swap_in(&mut lifecycle, seq, None, snapshot)
    }

    /// Swap the active snapshot while holding the lifecycle lock
    fn swap_in(
        &self,
        lifecycle: &mut Lifecycle,
        seq: u64,
        submission: Option<u64>,
        mut snapshot: ModelSnapshot,
    ) -> Arc<ModelSnapshot> {
        lifecycle.generation += 1;
        snapshot.set_generation(lifecycle.generation);
        let snapshot = Arc::new(snapshot);

        *self.active.write().unwrap_or_else(PoisonError::into_inner) = Some(snapshot.clone());
        lifecycle.active_seq = seq;

        if submission.is_some() && lifecycle.pending.as_ref().map(|p| p.version) == submission {
            lifecycle.pending = None;
        }
        lifecycle.settled = if lifecycle.pending.is_some() {
            ModelState::Stale
        } else {
            ModelState::Fit
        };
        if lifecycle.fits_in_flight == 0 {
            lifecycle.state = lifecycle.settled;
        }
        info!(
            "Published snapshot generation {} from fit #{} ({} items, {} ratings)",
            lifecycle.generation,
            seq,
            snapshot.item_count(),
            snapshot.rating_count()
        );
        snapshot
    }

    /// Build and publish a new snapshot from a full replacement dataset.
    ///
    /// Runs on the calling thread. On error the previous snapshot stays
    /// active and the state returns to what it was.
    pub fn fit(&self, items: Vec<Item>, ratings: Vec<Rating>) -> Result<Arc<ModelSnapshot>> {
        self.fit_dataset(RawDataset::new(items, ratings))
    }

    /// `fit` on a loaded dataset; its parse rejections count toward health
    pub fn fit_dataset(&self, dataset: RawDataset) -> Result<Arc<ModelSnapshot>> {
        self.fit_submission(dataset, None)
    }

    #[instrument(skip_all, fields(items = dataset.items.len(), ratings = dataset.ratings.len()))]
    fn fit_submission(&self, dataset: RawDataset, submission: Option<u64>) -> Result<Arc<ModelSnapshot>> {
        let start = Instant::now();
        let guard = FitGuard::begin(self, submission);
        let snapshot = ModelSnapshot::build(&self.config, dataset)?;
        let snapshot = guard.finish(snapshot)?;
        info!("Fit completed in {:.2?}", start.elapsed());
        Ok(snapshot)
    }

    /// Fit on the blocking thread pool while queries keep being served.
    ///
    /// Dropping the returned future cancels the fit: the result of the
    /// blocking work is discarded and nothing is published.
    pub async fn fit_in_background(&self, dataset: RawDataset) -> Result<Arc<ModelSnapshot>> {
        let start = Instant::now();
        let guard = FitGuard::begin(self, None);
        let config = self.config.clone();

        let snapshot = tokio::task::spawn_blocking(move || ModelSnapshot::build(&config, dataset))
            .await
            .map_err(|e| ServiceError::FitTask(e.to_string()))??;

        let snapshot = guard.finish(snapshot)?;
        info!("Background fit completed in {:.2?}", start.elapsed());
        Ok(snapshot)
    }

    /// Stage a replacement dataset; the active snapshot becomes stale
    pub fn submit_records(&self, items: Vec<Item>, ratings: Vec<Rating>) {
        info!("Submitted {} items and {} ratings", items.len(), ratings.len());
        self.lifecycle().stage(RawDataset::new(items, ratings));
    }

    /// Stage new ratings on top of the latest known records.
    ///
    /// The base is the pending submission if there is one, otherwise the
    /// records behind the active snapshot. A rating for a (user, item) pair
    /// already present replaces it unless the stored one is newer. Returns
    /// the number of new pairs.
    pub fn submit_ratings(&self, ratings: Vec<Rating>) -> Result<usize> {
        let mut lifecycle = self.lifecycle();
        let mut records = match lifecycle.pending.take() {
            Some(pending) => pending.records,
            None => self
                .snapshot()
                .map(|snapshot| snapshot.records().clone())
                .ok_or_else(|| ServiceError::Validation("no dataset to add ratings to".to_string()))?,
        };

        let submitted = ratings.len();
        let added = records.merge_ratings(ratings);
        info!("Merged {} ratings ({} new pairs)", submitted, added);
        lifecycle.stage(records);
        Ok(added)
    }

    /// Record one rating now, replacing any earlier rating of the same item by the user
    pub fn add_rating(&self, user_id: UserId, item_id: ItemId, value: f32) -> Result<()> {
        if !self.config.rating_scale().contains(value) {
            return Err(ServiceError::Validation(format!(
                "rating {} is outside [{}, {}]",
                value, self.config.rating_min, self.config.rating_max
            )));
        }
        let rating = Rating {
            user_id,
            item_id,
            value,
            timestamp: Utc::now().timestamp(),
        };
        self.submit_ratings(vec![rating]).map(|_| ())
    }

    /// Fit on the most recently submitted records
    ///
    /// The submission stays pending until a fit of it is published, so a
    /// failed refit can be retried and newer submissions are never lost.
    pub fn refit(&self) -> Result<Arc<ModelSnapshot>> {
        let (version, records) = {
            let lifecycle = self.lifecycle();
            let pending = lifecycle
                .pending
                .as_ref()
                .ok_or_else(|| ServiceError::Validation("no records submitted since the last fit".to_string()))?;
            (pending.version, pending.records.clone())
        };
        self.fit_submission(records, Some(version))
    }

    /// Top `n` recommendations using the configured hybrid blend
    pub fn recommend_for_user(&self, user_id: UserId, n: usize) -> Result<Vec<Recommendation>> {
        self.recommend_with(user_id, n, RecommendOptions::default())
    }

    #[instrument(skip(self, options), fields(strategy = ?options.strategy))]
    pub fn recommend_with(&self, user_id: UserId, n: usize, options: RecommendOptions) -> Result<Vec<Recommendation>> {
        match self.snapshot() {
            Some(snapshot) => snapshot.recommend(user_id, n, options),
            None => {
                warn!("No snapshot has been fitted, returning no recommendations");
                Ok(Vec::new())
            }
        }
    }

    /// Top `n` items most similar in content to `item_id`
    pub fn similar_to(&self, item_id: ItemId, n: usize) -> Result<Vec<Recommendation>> {
        self.snapshot()
            .ok_or(ServiceError::NotFound { item_id })?
            .similar(item_id, n)
    }

    pub fn explain(&self, user_id: UserId, item_id: ItemId, strategy: Strategy) -> Result<ScoreBreakdown> {
        self.snapshot()
            .ok_or(ServiceError::NotFound { item_id })?
            .explain(user_id, item_id, strategy)
    }

    /// Titles containing `query` (case-insensitive), in catalog order
    pub fn search(&self, query: &str, limit: usize) -> Vec<(ItemId, String)> {
        let Some(snapshot) = self.snapshot() else {
            return Vec::new();
        };
        let needle = query.to_lowercase();
        snapshot
            .catalog()
            .items()
            .iter()
            .filter(|item| item.title.to_lowercase().contains(&needle))
            .take(limit)
            .map(|item| (item.id, item.title.clone()))
            .collect()
    }

    pub fn health(&self) -> HealthReport {
        let model_state = self.state();
        let snapshot = self.snapshot();
        HealthReport {
            model_state,
            snapshot_fit_timestamp: snapshot.as_ref().map(|s| s.fitted_at()),
            item_count: snapshot.as_ref().map_or(0, |s| s.item_count()),
            rating_count: snapshot.as_ref().map_or(0, |s| s.rating_count()),
            rejected_records: snapshot.as_ref().map_or(0, |s| s.dropped_count()),
            unvectorized_items: snapshot.as_ref().map_or(0, |s| s.unvectorized_count()),
            generation: snapshot.as_ref().map(|s| s.generation()),
        }
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
