//! Collaborative Model - latent factors from the rating matrix
//!
//! Biased matrix factorization:
//!
//! `r̂(u, i) = μ + b_u + b_i + p_u · q_i`, clipped to the rating scale.
//!
//! ## Algorithm
//! 1. μ = mean of all effective ratings
//! 2. Initialise p_u, q_i with small seeded random values, biases at 0
//! 3. For each epoch, visit the ratings in a seeded shuffled order and take
//!    one SGD step on the squared error with L2 regularisation
//!
//! Fitting is a single batch operation. With fewer than 2 distinct users or
//! items there is nothing to factorize: factors and biases stay at zero and
//! every prediction is the global mean.

use data_loader::{ItemId, RatingMatrix, RatingScale, UserId};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Half-width of the uniform range latent factors are initialised from
const INIT_RANGE: f32 = 0.1;

/// Hyper-parameters of the factorization
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactorizationParams {
    pub latent_dim: usize,
    pub epochs: usize,
    pub learning_rate: f32,
    pub regularization: f32,
    pub seed: u64,
}

impl Default for FactorizationParams {
    fn default() -> Self {
        Self {
            latent_dim: 16,
            epochs: 30,
            learning_rate: 0.01,
            regularization: 0.02,
            seed: 42,
        }
    }
}

/// Per-user and per-item latent vectors plus bias terms.
///
/// Vectors are stored row-major: user row `u` occupies
/// `user_factors[u * k..(u + 1) * k]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatentFactors {
    pub latent_dim: usize,
    pub global_mean: f32,
    pub user_bias: Vec<f32>,
    pub item_bias: Vec<f32>,
    user_factors: Vec<f32>,
    item_factors: Vec<f32>,
}

impl LatentFactors {
    fn zeros(n_users: usize, n_items: usize, latent_dim: usize, global_mean: f32) -> Self {
        Self {
            latent_dim,
            global_mean,
            user_bias: vec![0.0; n_users],
            item_bias: vec![0.0; n_items],
            user_factors: vec![0.0; n_users * latent_dim],
            item_factors: vec![0.0; n_items * latent_dim],
        }
    }

    pub fn user_vector(&self, row: usize) -> &[f32] {
        let k = self.latent_dim;
        &self.user_factors[row * k..(row + 1) * k]
    }

    pub fn item_vector(&self, col: usize) -> &[f32] {
        let k = self.latent_dim;
        &self.item_factors[col * k..(col + 1) * k]
    }

    /// Unclipped estimate for a (row, column) pair
    fn estimate(&self, row: usize, col: usize) -> f32 {
        let dot: f32 = self
            .user_vector(row)
            .iter()
            .zip(self.item_vector(col))
            .map(|(p, q)| p * q)
            .sum();
        self.global_mean + self.user_bias[row] + self.item_bias[col] + dot
    }

    fn is_finite(&self) -> bool {
        self.user_bias
            .iter()
            .chain(&self.item_bias)
            .chain(&self.user_factors)
            .chain(&self.item_factors)
            .all(|v| v.is_finite())
    }
}

/// Fitted collaborative filtering model for one snapshot
#[derive(Debug, Clone)]
pub struct CollaborativeModel {
    matrix: Arc<RatingMatrix>,
    factors: LatentFactors,
    scale: RatingScale,
    /// Range used for min-max normalisation of predictions
    observed: (f32, f32),
}

impl CollaborativeModel {
    #[instrument(skip_all, fields(users = matrix.n_users(), items = matrix.n_items(), ratings = matrix.nnz()))]
    pub fn fit(matrix: Arc<RatingMatrix>, params: &FactorizationParams, scale: RatingScale) -> Self {
        let global_mean = matrix.global_mean().unwrap_or_else(|| scale.midpoint());
        let observed = match matrix.value_range() {
            Some((lo, hi)) if hi > lo => (lo, hi),
            _ => (scale.min, scale.max),
        };

        let zeros = LatentFactors::zeros(
            matrix.n_users(),
            matrix.n_items(),
            params.latent_dim,
            global_mean,
        );

        let factors = if matrix.n_users() < 2 || matrix.n_items() < 2 {
            warn!(
                "Only {} users and {} items, predictions reduce to the global mean",
                matrix.n_users(),
                matrix.n_items()
            );
            zeros
        } else {
            let trained = train(&matrix, params, zeros.clone());
            if trained.is_finite() {
                trained
            } else {
                warn!("Factorization diverged, falling back to the global mean");
                zeros
            }
        };

        info!("Fitted latent factors (k = {}, mean = {:.3})", params.latent_dim, global_mean);

        Self {
            matrix,
            factors,
            scale,
            observed,
        }
    }

    /// Predicted rating, or `None` when the user or item is not in the fitted matrix
    pub fn predict(&self, user_id: UserId, item_id: ItemId) -> Option<f32> {
        let row = self.matrix.users().position(user_id)?;
        let col = self.matrix.items().position(item_id)?;
        Some(self.scale.clamp(self.factors.estimate(row, col)))
    }

    /// Min-max scale a prediction against the observed rating range into [0, 1]
    pub fn normalize(&self, prediction: f32) -> f32 {
        let (lo, hi) = self.observed;
        ((prediction - lo) / (hi - lo)).clamp(0.0, 1.0)
    }

    /// `predict` followed by `normalize`
    pub fn predict_normalized(&self, user_id: UserId, item_id: ItemId) -> Option<f32> {
        self.predict(user_id, item_id).map(|p| self.normalize(p))
    }

    pub fn knows_user(&self, user_id: UserId) -> bool {
        self.matrix.users().contains(user_id)
    }

    pub fn knows_item(&self, item_id: ItemId) -> bool {
        self.matrix.items().contains(item_id)
    }

    pub fn factors(&self) -> &LatentFactors {
        &self.factors
    }

    pub fn matrix(&self) -> &Arc<RatingMatrix> {
        &self.matrix
    }
}

/// Run SGD epochs starting from `factors` (zeroed biases)
fn train(matrix: &RatingMatrix, params: &FactorizationParams, mut factors: LatentFactors) -> LatentFactors {
    let k = params.latent_dim;
    let lr = params.learning_rate;
    let reg = params.regularization;
    let mut rng = StdRng::seed_from_u64(params.seed);

    for v in factors.user_factors.iter_mut().chain(factors.item_factors.iter_mut()) {
        *v = rng.random_range(-INIT_RANGE..INIT_RANGE);
    }

    let mut entries: Vec<(usize, usize, f32)> = matrix.entries().collect();
    let mean = factors.global_mean;

    for epoch in 0..params.epochs {
        entries.shuffle(&mut rng);
        let mut squared_error = 0.0_f64;

        for &(u, i, r) in &entries {
            let err = r - factors.estimate(u, i);
            squared_error += (err as f64) * (err as f64);

            let bu = factors.user_bias[u];
            let bi = factors.item_bias[i];
            factors.user_bias[u] = bu + lr * (err - reg * bu);
            factors.item_bias[i] = bi + lr * (err - reg * bi);

            let LatentFactors {
                user_factors,
                item_factors,
                ..
            } = &mut factors;
            let pu = &mut user_factors[u * k..(u + 1) * k];
            let qi = &mut item_factors[i * k..(i + 1) * k];
            for (p, q) in pu.iter_mut().zip(qi.iter_mut()) {
                let (p_old, q_old) = (*p, *q);
                *p += lr * (err * q_old - reg * p_old);
                *q += lr * (err * p_old - reg * q_old);
            }
        }

        let rmse = (squared_error / entries.len().max(1) as f64).sqrt();
        debug!("epoch {} rmse {:.4} (mean {:.3})", epoch + 1, rmse, mean);
        if !rmse.is_finite() {
            break;
        }
    }

    factors
}
