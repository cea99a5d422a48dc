//! Server crate for the ReelRecs recommendation engine.
//!
//! Hosts the recommendation service: configuration, the immutable model
//! snapshot and the fit lifecycle that swaps snapshots under live readers.

pub mod config;
pub mod error;
pub mod snapshot;
pub mod service;

pub use config::RecommenderConfig;
pub use error::{Result, ServiceError};
pub use snapshot::{ModelSnapshot, Recommendation};
pub use service::{HealthReport, ModelState, RecommendationService};
