use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use data_loader::{ItemId, ItemType, RawDataset, UserId};
use pipeline::{RecommendOptions, Strategy};
use rand::Rng;
use server::{Recommendation, RecommendationService, RecommenderConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// Rejection causes listed by `health`
const REJECTIONS_SHOWN: usize = 5;

/// ReelRecs - Hybrid Movie & Series Recommendation Engine
#[derive(Parser)]
#[command(name = "reel-recs")]
#[command(about = "Movie and series recommendations from ratings and content", long_about = None)]
struct Cli {
    /// Directory containing items.dat and ratings.dat
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Get recommendations for a user
    Recommend {
        #[arg(long)]
        user_id: UserId,

        /// Number of recommendations (defaults to RECS_TOP_N_DEFAULT)
        #[arg(long)]
        limit: Option<usize>,

        /// hybrid, collaborative or content
        #[arg(long, default_value = "hybrid")]
        strategy: Strategy,

        /// Only return this item type (movie or series)
        #[arg(long)]
        item_type: Option<ItemType>,

        /// Show the score breakdown for each recommendation
        #[arg(long)]
        explain: bool,
    },

    /// Find items with similar content
    Similar {
        #[arg(long)]
        item_id: ItemId,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show model state and dataset counts
    Health {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Search for items by title
    Search {
        /// Case-insensitive substring of the title
        #[arg(long)]
        title: String,

        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Run benchmark to test query performance
    Benchmark {
        /// Number of requests to make
        #[arg(long, default_value = "100")]
        requests: usize,

        /// Number of concurrent requests
        #[arg(long, default_value = "10")]
        concurrent: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = RecommenderConfig::from_env().context("Failed to load configuration")?;

    println!("Loading dataset from {}...", cli.data_dir.display());
    let start = Instant::now();
    let dataset = RawDataset::load_from_dir(&cli.data_dir).context("Failed to load dataset")?;
    let (items, ratings) = dataset.counts();
    println!(
        "{} Loaded {} items and {} ratings in {:?}",
        "✓".green(),
        items,
        ratings,
        start.elapsed()
    );

    let start = Instant::now();
    let service = Arc::new(RecommendationService::new(config)?);
    service
        .fit_in_background(dataset)
        .await
        .context("Failed to fit models")?;
    println!("{} Fitted models in {:?}", "✓".green(), start.elapsed());

    let default_limit = service.config().top_n_default;

    match cli.command {
        Commands::Recommend {
            user_id,
            limit,
            strategy,
            item_type,
            explain,
        } => {
            let options = RecommendOptions { strategy, item_type };
            handle_recommend(&service, user_id, limit.unwrap_or(default_limit), options, explain)?
        }
        Commands::Similar { item_id, limit } => {
            handle_similar(&service, item_id, limit.unwrap_or(default_limit))?
        }
        Commands::Health { json } => handle_health(&service, json)?,
        Commands::Search { title, limit } => handle_search(&service, &title, limit),
        Commands::Benchmark {
            requests,
            concurrent,
        } => handle_benchmark(service, requests, concurrent, default_limit).await?,
    }

    Ok(())
}

fn handle_recommend(
    service: &RecommendationService,
    user_id: UserId,
    limit: usize,
    options: RecommendOptions,
    explain: bool,
) -> Result<()> {
    let recommendations = service.recommend_with(user_id, limit, options)?;

    println!(
        "{}",
        format!("Recommendations for user {} ({:?}):", user_id, options.strategy)
            .bold()
            .blue()
    );
    print_recommendations(&recommendations);

    if explain {
        for rec in &recommendations {
            let breakdown = service.explain(user_id, rec.item_id, options.strategy)?;
            println!(
                "   {} collab {:.3} · content {:.3} · alpha {:.2} → {:.3}",
                rec.title.dimmed(),
                breakdown.collab_score,
                breakdown.content_score,
                breakdown.alpha,
                breakdown.combined
            );
        }
    }
    Ok(())
}

fn handle_similar(service: &RecommendationService, item_id: ItemId, limit: usize) -> Result<()> {
    let similar = service
        .similar_to(item_id, limit)
        .with_context(|| format!("No similar items for {}", item_id))?;

    println!("{}", format!("Items similar to {}:", item_id).bold().blue());
    print_recommendations(&similar);
    Ok(())
}

fn handle_health(service: &RecommendationService, json: bool) -> Result<()> {
    let health = service.health();
    if json {
        println!("{}", serde_json::to_string_pretty(&health)?);
        return Ok(());
    }

    println!("{}", "Service health:".bold().blue());
    println!("{}State: {:?}", "• ".green(), health.model_state);
    if let Some(fitted_at) = health.snapshot_fit_timestamp {
        println!("{}Fitted at: {}", "• ".green(), fitted_at.to_rfc3339());
    }
    if let Some(generation) = health.generation {
        println!("{}Generation: {}", "• ".green(), generation);
    }
    println!("{}Items: {}", "• ".cyan(), health.item_count);
    println!("{}Ratings: {}", "• ".cyan(), health.rating_count);
    println!("{}Rejected records: {}", "• ".yellow(), health.rejected_records);
    println!("{}Items without content: {}", "• ".yellow(), health.unvectorized_items);

    if let Some(snapshot) = service.snapshot() {
        let rejected = snapshot.rejected();
        for cause in rejected.iter().take(REJECTIONS_SHOWN) {
            println!("   {}", cause.to_string().dimmed());
        }
        if rejected.len() > REJECTIONS_SHOWN {
            println!("   {}", format!("... and {} more", rejected.len() - REJECTIONS_SHOWN).dimmed());
        }
    }
    Ok(())
}

fn handle_search(service: &RecommendationService, title: &str, limit: usize) {
    let matches = service.search(title, limit);
    println!("{}", format!("Search results for '{}':", title).bold().blue());
    if matches.is_empty() {
        println!("  (no matches)");
    }
    for (item_id, item_title) in matches {
        println!("{}: {}", item_id.to_string().green(), item_title);
    }
}

/// Fire `requests` recommendation queries for random users, `concurrent` at a time
async fn handle_benchmark(
    service: Arc<RecommendationService>,
    requests: usize,
    concurrent: usize,
    limit: usize,
) -> Result<()> {
    let users: Vec<UserId> = service
        .snapshot()
        .map(|s| s.matrix().users().ids().to_vec())
        .unwrap_or_default();
    if users.is_empty() || requests == 0 {
        println!("Nothing to benchmark: no users or no requests");
        return Ok(());
    }

    let user_ids: Vec<UserId> = {
        let mut rng = rand::rng();
        (0..requests)
            .map(|_| users[rng.random_range(0..users.len())])
            .collect()
    };

    let permits = Arc::new(Semaphore::new(concurrent.max(1)));
    let wall = Instant::now();

    let mut handles = Vec::with_capacity(requests);
    for user in user_ids {
        let service = service.clone();
        let permits = permits.clone();
        handles.push(tokio::spawn(async move {
            let _permit = permits.acquire_owned().await?;
            let start = Instant::now();
            tokio::task::spawn_blocking(move || service.recommend_for_user(user, limit)).await??;
            Ok::<_, anyhow::Error>(start.elapsed())
        }));
    }

    let mut timings: Vec<Duration> = Vec::with_capacity(requests);
    for handle in handles {
        timings.push(handle.await??);
    }
    let total_time = wall.elapsed();

    timings.sort();
    let percentile = |p: f64| timings[((timings.len() - 1) as f64 * p).round() as usize];
    let avg_latency = timings.iter().sum::<Duration>() / timings.len() as u32;
    let throughput = requests as f64 / total_time.as_secs_f64();

    println!("{}", "Benchmark results:".bold().blue());
    println!("Total time: {:?}", total_time);
    println!("Average latency: {:?}", avg_latency);
    println!("P50 latency: {:?}", percentile(0.50));
    println!("P95 latency: {:?}", percentile(0.95));
    println!("P99 latency: {:?}", percentile(0.99));
    println!("Throughput: {:.2} requests/second", throughput);

    Ok(())
}

fn print_recommendations(recommendations: &[Recommendation]) {
    if recommendations.is_empty() {
        println!("  (no results)");
    }
    for (rank, rec) in recommendations.iter().enumerate() {
        println!(
            "{}. {} [{}] - Score: {:.3}",
            (rank + 1).to_string().green(),
            rec.title,
            rec.item_id,
            rec.score
        );
    }
}
