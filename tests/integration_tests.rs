use chrono::Duration;
use lunchvote_rs::models::{DishResponse, Restaurant, VoteResponse};
use serde_json::Value;
use std::sync::Arc;

mod common;
use common::*;

#[tokio::test]
async fn test_health_and_metrics_endpoints() {
    let test_env = TestEnvironment::new().await;

    let response = test_env
        .client
        .get(test_env.url("/health/status"))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["voting_date"], "05.03.2024");

    let response = test_env
        .client
        .get(test_env.url("/metrics"))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status().as_u16(), 200);
    let text = response.text().await.expect("Failed to read metrics");
    assert!(text.contains("http_requests_total"));
}

#[tokio::test]
async fn test_restaurant_endpoints() {
    let test_env = TestEnvironment::new().await;

    // Nothing registered yet
    let response = test_env
        .client
        .get(test_env.url("/api/restaurants"))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status().as_u16(), 404);

    test_env.seed_test_data().await;

    let response = test_env
        .client
        .get(test_env.url("/api/restaurants"))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status().as_u16(), 200);
    let restaurants: Vec<Restaurant> = response.json().await.expect("Failed to parse response");
    assert_eq!(restaurants.len(), 3);
    assert_eq!(restaurants[0].id, 1);

    let response = test_env
        .client
        .get(test_env.url("/api/restaurants/2"))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status().as_u16(), 200);

    let response = test_env
        .client
        .get(test_env.url("/api/restaurants/99"))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn test_todays_menu() {
    let test_env = TestEnvironment::new().await;
    assert_eq!(test_env.menu(1, None).await.status().as_u16(), 404);

    test_env.seed_test_data().await;

    let response = test_env.menu(1, None).await;
    assert_eq!(response.status().as_u16(), 200);
    let dishes: Vec<DishResponse> = response.json().await.expect("Failed to parse response");
    assert!(!dishes.is_empty());
    assert!(dishes.iter().all(|d| d.restaurant_id == 1));
    assert!(dishes.iter().all(|d| d.date == voting_day()));

    let response = test_env.menu(1, Some("05.03.2024")).await;
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body[0]["date"], "05.03.2024");
    assert!(body[0]["price"].is_number());

    // Menus are per day; yesterday's is gone tomorrow
    test_env.clock.advance(Duration::days(1));
    assert_eq!(test_env.menu(1, None).await.status().as_u16(), 404);
    assert_eq!(test_env.menu(1, Some("05.03.2024")).await.status().as_u16(), 200);

    assert_eq!(test_env.menu(99, None).await.status().as_u16(), 404);
    assert_eq!(test_env.menu(1, Some("2024-03-05")).await.status().as_u16(), 400);
}

#[tokio::test]
async fn test_create_vote_then_duplicate() {
    let test_env = TestEnvironment::seeded().await;

    let response = test_env.create_vote("a@x.com", 1).await;
    assert_eq!(response.status().as_u16(), 201);
    let vote: VoteResponse = response.json().await.expect("Failed to parse response");
    assert_eq!(vote.restaurant_id, 1);
    assert_eq!(vote.user, "a@x.com");
    assert_eq!(vote.date, voting_day());

    let response = test_env.create_vote("a@x.com", 2).await;
    assert_eq!(response.status().as_u16(), 422);

    // The stored vote still points at the first restaurant
    let response = test_env.get_vote("a@x.com", None).await;
    assert_eq!(response.status().as_u16(), 200);
    let stored: VoteResponse = response.json().await.expect("Failed to parse response");
    assert_eq!(stored.restaurant_id, 1);
    assert_eq!(stored.id, vote.id);
}

#[tokio::test]
async fn test_vote_json_shape() {
    let test_env = TestEnvironment::seeded().await;

    let response = test_env.create_vote("a@x.com", 3).await;
    let body: Value = response.json().await.expect("Failed to parse response");

    assert_eq!(body["restaurantId"], 3);
    assert_eq!(body["user"], "a@x.com");
    assert_eq!(body["date"], "05.03.2024");
    assert!(body["id"].is_string());
}

#[tokio::test]
async fn test_update_vote_before_cutoff() {
    let test_env = TestEnvironment::seeded().await;

    assert_eq!(test_env.create_vote("a@x.com", 1).await.status().as_u16(), 201);

    test_env.clock.set_reference(at(10, 59, 0));
    let response = test_env.update_vote("a@x.com", 2).await;
    assert_eq!(response.status().as_u16(), 200);
    let vote: VoteResponse = response.json().await.expect("Failed to parse response");
    assert_eq!(vote.restaurant_id, 2);

    let total: u64 = test_env
        .total_votes(2, None)
        .await
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(total, 1);
}

#[tokio::test]
async fn test_update_vote_at_cutoff_rejected() {
    let test_env = TestEnvironment::seeded().await;

    assert_eq!(test_env.create_vote("a@x.com", 1).await.status().as_u16(), 201);

    test_env.clock.set_reference(at(11, 0, 0));
    let response = test_env.update_vote("a@x.com", 2).await;
    assert_eq!(response.status().as_u16(), 422);

    let stored: VoteResponse = test_env
        .get_vote("a@x.com", None)
        .await
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(stored.restaurant_id, 1);
}

#[tokio::test]
async fn test_update_without_vote_rejected() {
    let test_env = TestEnvironment::seeded().await;

    let response = test_env.update_vote("a@x.com", 2).await;
    assert_eq!(response.status().as_u16(), 422);

    assert_eq!(test_env.get_vote("a@x.com", None).await.status().as_u16(), 404);
}

#[tokio::test]
async fn test_unknown_restaurant_is_not_found() {
    let test_env = TestEnvironment::seeded().await;

    assert_eq!(test_env.create_vote("a@x.com", 42).await.status().as_u16(), 404);
    assert_eq!(test_env.update_vote("a@x.com", 42).await.status().as_u16(), 404);
    assert_eq!(test_env.total_votes(42, None).await.status().as_u16(), 404);
}

#[tokio::test]
async fn test_totals_by_date() {
    let test_env = TestEnvironment::seeded().await;

    for user in ["a@x.com", "b@x.com", "c@x.com"] {
        assert_eq!(test_env.create_vote(user, 1).await.status().as_u16(), 201);
    }
    assert_eq!(test_env.create_vote("d@x.com", 2).await.status().as_u16(), 201);

    // Next day: fresh voting, yesterday's totals still queryable
    test_env.clock.advance(Duration::days(1));
    assert_eq!(test_env.create_vote("a@x.com", 2).await.status().as_u16(), 201);

    let total = |response: reqwest::Response| async move {
        assert_eq!(response.status().as_u16(), 200);
        response.json::<u64>().await.expect("Failed to parse response")
    };

    assert_eq!(total(test_env.total_votes(1, Some("05.03.2024")).await).await, 3);
    assert_eq!(total(test_env.total_votes(2, Some("05.03.2024")).await).await, 1);
    assert_eq!(total(test_env.total_votes(1, None).await).await, 0);
    assert_eq!(total(test_env.total_votes(2, None).await).await, 1);
    assert_eq!(total(test_env.total_votes(3, None).await).await, 0);

    let response = test_env.get_vote("a@x.com", Some("05.03.2024")).await;
    let vote: VoteResponse = response.json().await.expect("Failed to parse response");
    assert_eq!(vote.restaurant_id, 1);
}

#[tokio::test]
async fn test_bad_date_and_missing_identity() {
    let test_env = TestEnvironment::seeded().await;

    let response = test_env.get_vote("a@x.com", Some("2024-03-05")).await;
    assert_eq!(response.status().as_u16(), 400);

    let response = test_env
        .client
        .post(test_env.url("/api/vote"))
        .query(&[("restaurantId", 1)])
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status().as_u16(), 401);

    let response = test_env
        .client
        .post(test_env.url("/api/vote"))
        .header(lunchvote_rs::handlers::USER_EMAIL_HEADER, "a@x.com")
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn test_concurrent_creates_single_winner() {
    let test_env = Arc::new(TestEnvironment::seeded().await);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let test_env = test_env.clone();
            tokio::spawn(async move {
                test_env
                    .create_vote("race@x.com", 1 + (i % 3))
                    .await
                    .status()
                    .as_u16()
            })
        })
        .collect();

    let mut statuses = Vec::new();
    for handle in handles {
        statuses.push(handle.await.expect("Task panicked"));
    }

    assert_eq!(statuses.iter().filter(|s| **s == 201).count(), 1);
    assert_eq!(statuses.iter().filter(|s| **s == 422).count(), 7);

    let mut total = 0;
    for restaurant_id in 1..=3 {
        let response = test_env.total_votes(restaurant_id, None).await;
        total += response.json::<u64>().await.expect("Failed to parse response");
    }
    assert_eq!(total, 1);
}

#[tokio::test]
async fn test_unknown_route() {
    let test_env = TestEnvironment::new().await;

    let response = test_env
        .client
        .get(test_env.url("/api/nothing"))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn test_vote_reads_are_repeatable() {
    let test_env = TestEnvironment::seeded().await;
    assert_eq!(test_env.create_vote("a@x.com", 2).await.status().as_u16(), 201);

    for date in [None, Some("05.03.2024")] {
        let first: Value = test_env
            .get_vote("a@x.com", date)
            .await
            .json()
            .await
            .expect("Failed to parse response");
        let second: Value = test_env
            .get_vote("a@x.com", date)
            .await
            .json()
            .await
            .expect("Failed to parse response");
        assert_eq!(first, second);
    }
}

#[tokio::test]
async fn test_unmatched_paths_share_one_metrics_series() {
    let test_env = TestEnvironment::new().await;

    for i in 0..25 {
        let response = test_env
            .client
            .get(test_env.url(&format!("/scan/{}?x={}", i, i)))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status().as_u16(), 404);
    }

    let text = test_env
        .client
        .get(test_env.url("/metrics"))
        .send()
        .await
        .expect("Failed to send request")
        .text()
        .await
        .expect("Failed to read metrics");
    assert!(text.contains("endpoint=\"unmatched\""));
    assert!(!text.contains("/scan/"));
}
