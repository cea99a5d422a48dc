//! Simple test harness for the recommendation service.
//!
//! Loads a data directory, fits the models in the background and prints
//! recommendations for one user.
//!
//! Usage: `server [DATA_DIR] [USER_ID]`

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use data_loader::RawDataset;
use server::{RecommendationService, RecommenderConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server=debug,pipeline=debug".into()),
        )
        .init();

    info!("Starting ReelRecs server test harness");

    let mut args = std::env::args().skip(1);
    let data_dir = PathBuf::from(args.next().unwrap_or_else(|| "data".to_string()));
    let user_id = match args.next() {
        Some(raw) => raw.parse().with_context(|| format!("invalid user id '{}'", raw))?,
        None => 1,
    };

    let config = RecommenderConfig::from_env()?;
    info!("Loaded config: {:?}", config);
    let limit = config.top_n_default;

    let dataset = RawDataset::load_from_dir(&data_dir)
        .with_context(|| format!("Failed to load data from {}", data_dir.display()))?;

    let service = RecommendationService::new(config)?;
    service
        .fit_in_background(dataset)
        .await
        .context("Initial fit failed")?;

    let health = service.health();
    info!("Health: {}", serde_json::to_string(&health)?);

    info!("Getting recommendations for user {} (limit: {})", user_id, limit);
    let recommendations = service.recommend_for_user(user_id, limit)?;

    info!("Received {} recommendations:", recommendations.len());
    for (i, rec) in recommendations.iter().enumerate() {
        info!("{}. {} [{}] - Score: {:.3}", i + 1, rec.title, rec.item_id, rec.score);
    }

    Ok(())
}
