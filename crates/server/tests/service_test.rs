//! End-to-end tests for the recommendation service: fitting, querying,
//! snapshot swaps and the fit lifecycle.

use std::future::Future;
use std::sync::Arc;
use std::task::{Context, Waker};
use std::thread;

use data_loader::{DataLoadError, Item, ItemId, ItemType, Rating, RawDataset, UserId};
use pipeline::{RecommendOptions, Strategy};
use server::{ModelState, RecommendationService, RecommenderConfig, ServiceError};

fn item(id: ItemId, title: &str, genres: &[&str], overview: &str, popularity: f64) -> Item {
    Item {
        id,
        title: title.to_string(),
        item_type: ItemType::Movie,
        genres: genres.iter().map(|g| g.to_string()).collect(),
        overview: overview.to_string(),
        popularity,
    }
}

fn rating(user_id: UserId, item_id: ItemId, value: f32) -> Rating {
    Rating {
        user_id,
        item_id,
        value,
        timestamp: 0,
    }
}

fn service() -> RecommendationService {
    RecommendationService::new(RecommenderConfig::default()).unwrap()
}

fn ids(recs: &[server::Recommendation]) -> Vec<ItemId> {
    recs.iter().map(|r| r.item_id).collect()
}

/// Three items sharing one genre
fn shared_genre_catalog() -> Vec<Item> {
    vec![
        item(1, "Alpha", &["Thriller"], "A detective hunts a killer", 10.0),
        item(2, "Beta", &["Thriller"], "A detective hunts a thief", 20.0),
        item(3, "Gamma", &["Thriller"], "Sailors cross the ocean", 30.0),
    ]
}

/// A larger catalog with two taste clusters
fn clustered() -> (Vec<Item>, Vec<Rating>) {
    let items = vec![
        item(1, "Star Voyage", &["Sci-Fi"], "Starship crew fights alien fleet", 80.0),
        item(2, "Red Planet", &["Sci-Fi"], "Colonists survive on a hostile planet", 60.0),
        item(3, "Alien Dawn", &["Sci-Fi", "Horror"], "Alien creature hunts a starship crew", 70.0),
        item(4, "Paris Hearts", &["Romance"], "Two strangers fall in love in Paris", 50.0),
        item(5, "Summer Vows", &["Romance", "Comedy"], "A chaotic wedding in summer", 40.0),
        item(6, "Love Letters", &["Romance"], "Old letters reunite lost lovers", 30.0),
    ];
    let ratings = vec![
        rating(1, 1, 5.0),
        rating(1, 2, 4.5),
        rating(1, 4, 1.0),
        rating(2, 1, 4.5),
        rating(2, 3, 5.0),
        rating(2, 5, 1.5),
        rating(3, 4, 5.0),
        rating(3, 5, 4.5),
        rating(3, 1, 1.0),
        rating(4, 4, 4.0),
        rating(4, 6, 5.0),
        rating(4, 2, 2.0),
        rating(5, 2, 4.0),
    ];
    (items, ratings)
}

/// Enough records that a fit runs for a while on the blocking pool
fn large_dataset() -> RawDataset {
    const GENRES: [&str; 4] = ["Drama", "Comedy", "Thriller", "Sci-Fi"];
    let items = (1..=2_000)
        .map(|id| {
            let genre = GENRES[id as usize % GENRES.len()];
            let overview = format!("story {} about {} and journey {}", id % 97, genre, id % 31);
            item(id, &format!("Title {}", id), &[genre], &overview, id as f64)
        })
        .collect();
    let ratings = (1..=400)
        .flat_map(|user| (0..50).map(move |k| rating(user, (user * 37 + k * 13) % 2_000 + 1, ((user + k) % 5 + 1) as f32)))
        .collect();
    RawDataset::new(items, ratings)
}

#[test]
fn test_shared_genre_scenario() {
    let service = service();
    service
        .fit(shared_genre_catalog(), vec![rating(1, 1, 5.0), rating(1, 2, 1.0)])
        .unwrap();

    let similar = service.similar_to(1, 2).unwrap();
    assert_eq!(ids(&similar), vec![2, 3]);
    assert!(similar[0].score > similar[1].score);
    assert_eq!(similar[0].title, "Beta");

    let recs = service.recommend_for_user(1, 1).unwrap();
    assert_eq!(ids(&recs), vec![3]);
}

#[test]
fn test_no_ratings_returns_most_popular() {
    let service = service();
    service.fit(shared_genre_catalog(), Vec::new()).unwrap();

    let recs = service.recommend_for_user(1, 1).unwrap();
    assert_eq!(ids(&recs), vec![3]);
    assert_eq!(recs[0].score, 1.0);
}

#[test]
fn test_unknown_user_gets_popularity_ranking() {
    let (items, ratings) = clustered();
    let service = service();
    service.fit(items, ratings).unwrap();

    let recs = service.recommend_for_user(999, 4).unwrap();
    assert_eq!(ids(&recs), vec![1, 3, 2, 4]);
}

#[test]
fn test_never_recommends_rated_items() {
    let (items, ratings) = clustered();
    let service = service();
    service.fit(items, ratings.clone()).unwrap();

    for user in 1..=5 {
        let rated: Vec<ItemId> = ratings.iter().filter(|r| r.user_id == user).map(|r| r.item_id).collect();
        let recs = service.recommend_for_user(user, 10).unwrap();
        assert_eq!(recs.len(), 6 - rated.len());
        assert!(recs.iter().all(|r| !rated.contains(&r.item_id)));
        assert!(recs.windows(2).all(|w| w[0].score >= w[1].score));
    }
}

#[test]
fn test_content_strategy_follows_liked_genre() {
    let (items, ratings) = clustered();
    let service = service();
    service.fit(items, ratings).unwrap();

    // User 5 only liked "Red Planet"
    let options = RecommendOptions {
        strategy: Strategy::ContentBased,
        item_type: None,
    };
    let recs = service.recommend_with(5, 2, options).unwrap();
    assert!(recs.iter().all(|r| [1, 3].contains(&r.item_id)), "{:?}", recs);
}

#[test]
fn test_explain_breakdown() {
    let (items, ratings) = clustered();
    let service = service();
    service.fit(items, ratings).unwrap();

    let breakdown = service.explain(1, 3, Strategy::Hybrid).unwrap();
    assert_eq!(breakdown.alpha, 0.6);
    let expected = 0.6 * breakdown.collab_score + 0.4 * breakdown.content_score;
    assert!((breakdown.combined - expected).abs() < 1e-12);

    assert!(matches!(
        service.explain(1, 77, Strategy::Hybrid),
        Err(ServiceError::NotFound { item_id: 77 })
    ));
}

#[test]
fn test_similar_to_unknown_item() {
    let service = service();
    service.fit(shared_genre_catalog(), Vec::new()).unwrap();
    assert!(matches!(service.similar_to(42, 3), Err(ServiceError::NotFound { item_id: 42 })));
}

#[test]
fn test_zero_vector_item_ranked_by_tie_break() {
    let mut items = shared_genre_catalog();
    // Only stop terms survive cleaning, so the vector is empty
    items.push(item(4, "Void", &[], "the and of", 5.0));
    let service = service();
    service.fit(items, Vec::new()).unwrap();

    let similar = service.similar_to(4, 3).unwrap();
    assert_eq!(ids(&similar), vec![3, 2, 1]);
    assert!(similar.iter().all(|r| r.score == 0.0));
}

#[test]
fn test_fitting_twice_gives_identical_results() {
    let (items, ratings) = clustered();
    let first = service();
    first.fit(items.clone(), ratings.clone()).unwrap();
    let second = service();
    second.fit(items, ratings).unwrap();

    for user in [1, 2, 3, 4, 5, 999] {
        assert_eq!(
            first.recommend_for_user(user, 6).unwrap(),
            second.recommend_for_user(user, 6).unwrap()
        );
    }
    for item_id in 1..=6 {
        assert_eq!(first.similar_to(item_id, 5).unwrap(), second.similar_to(item_id, 5).unwrap());
    }
}

#[test]
fn test_failed_fit_keeps_previous_snapshot() {
    let service = service();
    service.fit(shared_genre_catalog(), Vec::new()).unwrap();
    let before = service.recommend_for_user(1, 3).unwrap();

    let err = service.fit(Vec::new(), Vec::new()).unwrap_err();
    assert!(matches!(err, ServiceError::EmptyCatalog));

    assert_eq!(service.state(), ModelState::Fit);
    assert_eq!(service.recommend_for_user(1, 3).unwrap(), before);
    assert_eq!(service.health().generation, Some(1));
}

#[test]
fn test_health_reports_snapshot() {
    let (items, mut ratings) = clustered();
    ratings.push(rating(9, 404, 3.0));
    let service = service();
    assert_eq!(service.health().model_state, ModelState::Unfit);

    service.fit(items, ratings).unwrap();
    let health = service.health();
    assert_eq!(health.model_state, ModelState::Fit);
    assert_eq!(health.item_count, 6);
    assert_eq!(health.rating_count, 13);
    assert_eq!(health.rejected_records, 1);
    assert!(health.snapshot_fit_timestamp.is_some());

    let json = serde_json::to_value(&health).unwrap();
    assert_eq!(json["model_state"], "fit");
}

#[test]
fn test_readers_keep_old_snapshot_across_swap() {
    let service = service();
    service.fit(shared_genre_catalog(), Vec::new()).unwrap();
    let held = service.snapshot().unwrap();

    let (items, ratings) = clustered();
    service.fit(items, ratings).unwrap();

    assert_eq!(held.generation(), 1);
    assert_eq!(held.item_count(), 3);
    assert_eq!(service.snapshot().unwrap().generation(), 2);
    assert_eq!(service.snapshot().unwrap().item_count(), 6);
}

#[test]
fn test_concurrent_queries_during_refit() {
    let (items, ratings) = clustered();
    let service = Arc::new(service());
    service.fit(items.clone(), ratings.clone()).unwrap();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let service = service.clone();
            thread::spawn(move || {
                for _ in 0..20 {
                    let recs = service.recommend_for_user(1, 3).unwrap();
                    assert!(recs.iter().all(|r| ![1, 2, 4].contains(&r.item_id)));
                }
            })
        })
        .collect();

    service.submit_records(items, ratings);
    service.refit().unwrap();

    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(service.state(), ModelState::Fit);
}

#[tokio::test]
async fn test_background_fit_publishes() {
    let (items, ratings) = clustered();
    let service = service();
    let snapshot = service.fit_in_background(RawDataset::new(items, ratings)).await.unwrap();

    assert_eq!(snapshot.generation(), 1);
    assert_eq!(service.state(), ModelState::Fit);
    assert_eq!(service.recommend_for_user(3, 2).unwrap().len(), 2);
}

#[tokio::test]
async fn test_cancelled_background_fit_restores_state() {
    let service = service();
    service.fit(shared_genre_catalog(), Vec::new()).unwrap();
    service.submit_records(shared_genre_catalog(), Vec::new());
    assert_eq!(service.state(), ModelState::Stale);

    let mut cx = Context::from_waker(Waker::noop());
    let mut fit = Box::pin(service.fit_in_background(large_dataset()));
    assert!(fit.as_mut().poll(&mut cx).is_pending());
    assert_eq!(service.state(), ModelState::Fitting);

    drop(fit);
    assert_eq!(service.state(), ModelState::Stale);
    assert_eq!(service.snapshot().unwrap().generation(), 1);
    assert_eq!(service.snapshot().unwrap().item_count(), 3);
}

#[tokio::test]
async fn test_older_fit_finishing_last_is_discarded() {
    let service = service();

    let mut cx = Context::from_waker(Waker::noop());
    let mut slow = Box::pin(service.fit_in_background(large_dataset()));
    assert!(slow.as_mut().poll(&mut cx).is_pending());

    service.fit(shared_genre_catalog(), Vec::new()).unwrap();
    assert_eq!(service.state(), ModelState::Fitting);

    let err = slow.await.unwrap_err();
    assert!(matches!(err, ServiceError::Superseded { started: 1, active: 2 }), "{:?}", err);

    let active = service.snapshot().unwrap();
    assert_eq!(active.item_count(), 3);
    assert_eq!(active.generation(), 1);
    assert_eq!(service.state(), ModelState::Fit);
}

#[test]
fn test_add_rating_merges_into_fitted_records() {
    let (items, ratings) = clustered();
    let service = service();
    service.fit(items, ratings).unwrap();

    // User 5 has only rated "Red Planet"
    service.add_rating(5, 1, 5.0).unwrap();
    assert_eq!(service.state(), ModelState::Stale);
    assert_eq!(service.snapshot().unwrap().rating_count(), 13);

    let snapshot = service.refit().unwrap();
    assert_eq!(snapshot.item_count(), 6);
    assert_eq!(snapshot.rating_count(), 14);
    assert_eq!(service.state(), ModelState::Fit);

    let recs = service.recommend_for_user(5, 10).unwrap();
    assert_eq!(recs.len(), 4);
    assert!(recs.iter().all(|r| ![1, 2].contains(&r.item_id)));
}

#[test]
fn test_add_rating_replaces_earlier_rating() {
    let (items, ratings) = clustered();
    let service = service();
    service.fit(items, ratings).unwrap();

    service.add_rating(1, 1, 1.0).unwrap();
    let snapshot = service.refit().unwrap();
    assert_eq!(snapshot.rating_count(), 13);

    let stored: Vec<&Rating> = snapshot
        .records()
        .ratings
        .iter()
        .filter(|r| r.user_id == 1 && r.item_id == 1)
        .collect();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].value, 1.0);
    assert!(stored[0].timestamp > 0);
}

#[test]
fn test_submit_ratings_builds_on_pending_records() {
    let service = service();
    service.fit(shared_genre_catalog(), Vec::new()).unwrap();

    service.submit_records(shared_genre_catalog(), vec![rating(1, 1, 4.0)]);
    let added = service
        .submit_ratings(vec![rating(1, 1, 2.0), rating(2, 3, 5.0)])
        .unwrap();
    assert_eq!(added, 1);

    let snapshot = service.refit().unwrap();
    assert_eq!(snapshot.rating_count(), 2);
    assert_eq!(service.recommend_for_user(1, 3).unwrap().len(), 2);
}

#[test]
fn test_health_counts_parse_rejections() {
    let mut dataset = RawDataset::new(shared_genre_catalog(), vec![rating(1, 1, 4.0), rating(1, 404, 4.0)]);
    dataset.rejected.push(DataLoadError::ParseError {
        file: "ratings.dat".to_string(),
        line: 3,
        reason: "invalid rating value".to_string(),
    });

    let service = service();
    service.fit_dataset(dataset).unwrap();

    let health = service.health();
    assert_eq!(health.rejected_records, 2);
    assert_eq!(health.rating_count, 1);
}
