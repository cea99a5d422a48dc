use crate::error::{Result, ServiceError};
use data_loader::RatingScale;
use models::FactorizationParams;
use pipeline::HybridParams;
use serde::{Deserialize, Serialize};

/// Environment variable prefix, e.g. `RECS_ALPHA=0.7`
pub const ENV_PREFIX: &str = "RECS_";

/// Largest accepted factorization dimensionality
pub const MAX_LATENT_DIM: usize = 512;

/// Largest accepted number of training epochs
pub const MAX_EPOCHS: usize = 10_000;

/// Recommender configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommenderConfig {
    /// Latent dimensionality of the factorization
    #[serde(default = "default_latent_dim")]
    pub latent_dim: usize,

    /// Weight of the collaborative signal in the blend
    #[serde(default = "default_alpha")]
    pub alpha: f64,

    /// Ratings at or above this value count as liked
    #[serde(default = "default_liked_threshold")]
    pub liked_threshold: f32,

    /// Result count used when the caller does not give one
    #[serde(default = "default_top_n")]
    pub top_n_default: usize,

    #[serde(default = "default_epochs")]
    pub epochs: usize,

    #[serde(default = "default_learning_rate")]
    pub learning_rate: f32,

    #[serde(default = "default_regularization")]
    pub regularization: f32,

    /// Seed for factor initialisation and SGD ordering
    #[serde(default = "default_seed")]
    pub seed: u64,

    #[serde(default = "default_rating_min")]
    pub rating_min: f32,

    #[serde(default = "default_rating_max")]
    pub rating_max: f32,
}

fn default_latent_dim() -> usize {
    16
}

fn default_alpha() -> f64 {
    0.6
}

fn default_liked_threshold() -> f32 {
    4.0
}

fn default_top_n() -> usize {
    10
}

fn default_epochs() -> usize {
    30
}

fn default_learning_rate() -> f32 {
    0.01
}

fn default_regularization() -> f32 {
    0.02
}

fn default_seed() -> u64 {
    42
}

fn default_rating_min() -> f32 {
    0.5
}

fn default_rating_max() -> f32 {
    5.0
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            latent_dim: default_latent_dim(),
            alpha: default_alpha(),
            liked_threshold: default_liked_threshold(),
            top_n_default: default_top_n(),
            epochs: default_epochs(),
            learning_rate: default_learning_rate(),
            regularization: default_regularization(),
            seed: default_seed(),
            rating_min: default_rating_min(),
            rating_max: default_rating_max(),
        }
    }
}

impl RecommenderConfig {
    /// Load configuration from the environment (and `.env` if present)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(std::env::vars())
    }

    /// Load configuration from `RECS_`-prefixed key/value pairs
    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Result<Self> {
        let config: Self = envy::prefixed(ENV_PREFIX)
            .from_iter(vars)
            .map_err(|e| ServiceError::Config(format!("Failed to load config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field against its constraint
    pub fn validate(&self) -> Result<()> {
        fn invalid(field: &str, reason: &str) -> ServiceError {
            ServiceError::Config(format!("{} {}", field, reason))
        }

        if self.latent_dim == 0 || self.latent_dim > MAX_LATENT_DIM {
            return Err(ServiceError::Config(format!("latent_dim must be within [1, {}]", MAX_LATENT_DIM)));
        }
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(invalid("alpha", "must be within [0, 1]"));
        }
        if self.top_n_default == 0 {
            return Err(invalid("top_n_default", "must be greater than 0"));
        }
        if self.epochs == 0 || self.epochs > MAX_EPOCHS {
            return Err(ServiceError::Config(format!("epochs must be within [1, {}]", MAX_EPOCHS)));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(invalid("learning_rate", "must be a positive number"));
        }
        if !(self.regularization.is_finite() && self.regularization >= 0.0) {
            return Err(invalid("regularization", "must be a non-negative number"));
        }
        if !(self.rating_min.is_finite() && self.rating_max.is_finite() && self.rating_min < self.rating_max) {
            return Err(invalid("rating_min", "must be below rating_max"));
        }
        if !self.rating_scale().contains(self.liked_threshold) {
            return Err(invalid("liked_threshold", "must lie within the rating scale"));
        }
        Ok(())
    }

    pub fn rating_scale(&self) -> RatingScale {
        RatingScale::new(self.rating_min, self.rating_max)
    }

    pub fn factorization(&self) -> FactorizationParams {
        FactorizationParams {
            latent_dim: self.latent_dim,
            epochs: self.epochs,
            learning_rate: self.learning_rate,
            regularization: self.regularization,
            seed: self.seed,
        }
    }

    pub fn hybrid(&self) -> HybridParams {
        HybridParams {
            alpha: self.alpha,
            liked_threshold: self.liked_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = RecommenderConfig::from_vars(Vec::new()).unwrap();
        assert_eq!(config, RecommenderConfig::default());
        assert_eq!(config.alpha, 0.6);
        assert_eq!(config.latent_dim, 16);
    }

    #[test]
    fn test_prefixed_overrides() {
        let config = RecommenderConfig::from_vars(vars(&[
            ("RECS_ALPHA", "0.8"),
            ("RECS_LATENT_DIM", "32"),
            ("ALPHA", "0.1"),
        ]))
        .unwrap();
        assert_eq!(config.alpha, 0.8);
        assert_eq!(config.latent_dim, 32);
    }

    #[test]
    fn test_invalid_values_rejected() {
        for (key, value) in [
            ("RECS_ALPHA", "1.5"),
            ("RECS_LATENT_DIM", "0"),
            ("RECS_TOP_N_DEFAULT", "0"),
            ("RECS_LIKED_THRESHOLD", "9"),
            ("RECS_LATENT_DIM", "many"),
            ("RECS_LATENT_DIM", "100000"),
            ("RECS_EPOCHS", "0"),
            ("RECS_EPOCHS", "1000000"),
        ] {
            let err = RecommenderConfig::from_vars(vars(&[(key, value)])).unwrap_err();
            assert!(matches!(err, ServiceError::Config(_)), "{} = {}", key, value);
        }
    }

    #[test]
    fn test_upper_bounds_inclusive() {
        let config = RecommenderConfig::from_vars(vars(&[
            ("RECS_LATENT_DIM", "512"),
            ("RECS_EPOCHS", "10000"),
        ]))
        .unwrap();
        assert_eq!(config.latent_dim, MAX_LATENT_DIM);
        assert_eq!(config.epochs, MAX_EPOCHS);

        let err = RecommenderConfig::from_vars(vars(&[("RECS_LATENT_DIM", "513")])).unwrap_err();
        assert_eq!(err.to_string(), "Invalid configuration: latent_dim must be within [1, 512]");
    }
}
