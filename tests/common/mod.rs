#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use lunchvote_rs::{
    create_app, handlers::USER_EMAIL_HEADER, services::FixedClock, AppComponents, HttpLimits,
    Metrics,
};
use reqwest::{Client, RequestBuilder, Response};
use tokio::net::TcpListener;

pub const VOTING_DAY: (i32, u32, u32) = (2024, 3, 5);

pub struct TestEnvironment {
    pub client: Client,
    pub base_url: String,
    pub clock: Arc<FixedClock>,
    pub metrics: Arc<Metrics>,
}

pub fn voting_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(VOTING_DAY.0, VOTING_DAY.1, VOTING_DAY.2).unwrap()
}

/// Reference-timezone wall clock on the voting day
pub fn at(hour: u32, minute: u32, second: u32) -> NaiveDateTime {
    voting_day().and_hms_opt(hour, minute, second).unwrap()
}

impl TestEnvironment {
    /// Real router over in-memory stores, clock frozen at 09:00 on the voting day
    pub async fn new() -> Self {
        let clock = Arc::new(FixedClock::at_reference(at(9, 0, 0)));
        let metrics = Arc::new(Metrics::new().expect("Failed to create metrics"));
        let components = AppComponents::in_memory(clock.clone(), metrics.clone());

        let app = create_app(
            components,
            HttpLimits {
                request_timeout: Duration::from_secs(5),
                max_request_size: 64 * 1024,
            },
        );

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind listener");
        let addr = listener.local_addr().expect("Failed to get local address");
        let base_url = format!("http://{}", addr);

        tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Failed to serve app");
        });

        Self {
            client: Client::new(),
            base_url,
            clock,
            metrics,
        }
    }

    /// Seeded environment: restaurants 1, 2 and 3 exist
    pub async fn seeded() -> Self {
        let env = Self::new().await;
        env.seed_test_data().await;
        env
    }

    pub async fn seed_test_data(&self) {
        let response = self
            .client
            .post(format!("{}/api/admin/seed", self.base_url))
            .send()
            .await
            .expect("Failed to seed test data");

        assert_eq!(response.status().as_u16(), 200);
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn as_user(&self, builder: RequestBuilder, email: &str) -> RequestBuilder {
        builder.header(USER_EMAIL_HEADER, email)
    }

    pub async fn get_vote(&self, email: &str, date: Option<&str>) -> Response {
        let mut request = self.as_user(self.client.get(self.url("/api/vote")), email);
        if let Some(date) = date {
            request = request.query(&[("date", date)]);
        }
        request.send().await.expect("Failed to send request")
    }

    pub async fn create_vote(&self, email: &str, restaurant_id: i64) -> Response {
        self.as_user(self.client.post(self.url("/api/vote")), email)
            .query(&[("restaurantId", restaurant_id)])
            .send()
            .await
            .expect("Failed to send request")
    }

    pub async fn update_vote(&self, email: &str, restaurant_id: i64) -> Response {
        self.as_user(self.client.put(self.url("/api/vote")), email)
            .query(&[("restaurantId", restaurant_id)])
            .send()
            .await
            .expect("Failed to send request")
    }

    pub async fn menu(&self, restaurant_id: i64, date: Option<&str>) -> Response {
        let mut request = self
            .client
            .get(self.url(&format!("/api/restaurants/{}/menu", restaurant_id)));
        if let Some(date) = date {
            request = request.query(&[("date", date)]);
        }
        request.send().await.expect("Failed to send request")
    }

    pub async fn total_votes(&self, restaurant_id: i64, date: Option<&str>) -> Response {
        let mut request = self
            .client
            .get(self.url(&format!("/api/vote/total/{}", restaurant_id)));
        if let Some(date) = date {
            request = request.query(&[("date", date)]);
        }
        request.send().await.expect("Failed to send request")
    }
}
