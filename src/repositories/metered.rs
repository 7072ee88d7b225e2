use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;

use super::{DishRepository, RestaurantRepository, VoteRepository};
use crate::models::{Dish, RepositoryResult, Restaurant, Vote};
use crate::observability::{DatabaseTracingMiddleware, Metrics};

/// Records `database_operations_*` metrics around another restaurant store
pub struct MeteredRestaurantRepository {
    inner: Arc<dyn RestaurantRepository>,
    tracing: DatabaseTracingMiddleware,
    table: String,
}

impl MeteredRestaurantRepository {
    pub fn new(inner: Arc<dyn RestaurantRepository>, table: String, metrics: Arc<Metrics>) -> Self {
        Self {
            inner,
            tracing: DatabaseTracingMiddleware::new(metrics),
            table,
        }
    }
}

#[async_trait]
impl RestaurantRepository for MeteredRestaurantRepository {
    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Restaurant>> {
        self.tracing
            .trace_operation("find_by_id", &self.table, self.inner.find_by_id(id))
            .await
    }

    async fn exists(&self, id: i64) -> RepositoryResult<bool> {
        self.tracing
            .trace_operation("exists", &self.table, self.inner.exists(id))
            .await
    }

    async fn find_all(&self) -> RepositoryResult<Vec<Restaurant>> {
        self.tracing
            .trace_operation("find_all", &self.table, self.inner.find_all())
            .await
    }

    async fn create(&self, restaurant: Restaurant) -> RepositoryResult<Restaurant> {
        self.tracing
            .trace_operation("create", &self.table, self.inner.create(restaurant))
            .await
    }

    async fn count(&self) -> RepositoryResult<usize> {
        self.tracing
            .trace_operation("count", &self.table, self.inner.count())
            .await
    }
}

/// Records `database_operations_*` metrics around another vote store
pub struct MeteredVoteRepository {
    inner: Arc<dyn VoteRepository>,
    tracing: DatabaseTracingMiddleware,
    table: String,
}

impl MeteredVoteRepository {
    pub fn new(inner: Arc<dyn VoteRepository>, table: String, metrics: Arc<Metrics>) -> Self {
        Self {
            inner,
            tracing: DatabaseTracingMiddleware::new(metrics),
            table,
        }
    }
}

#[async_trait]
impl VoteRepository for MeteredVoteRepository {
    async fn find_by_user_and_date(
        &self,
        user_email: &str,
        date: NaiveDate,
    ) -> RepositoryResult<Option<Vote>> {
        self.tracing
            .trace_operation(
                "find_by_user_and_date",
                &self.table,
                self.inner.find_by_user_and_date(user_email, date),
            )
            .await
    }

    async fn create(&self, vote: Vote) -> RepositoryResult<Vote> {
        self.tracing
            .trace_operation("create", &self.table, self.inner.create(vote))
            .await
    }

    async fn update(&self, vote: Vote) -> RepositoryResult<Vote> {
        self.tracing
            .trace_operation("update", &self.table, self.inner.update(vote))
            .await
    }

    async fn count_by_restaurant_and_date(
        &self,
        restaurant_id: i64,
        date: NaiveDate,
    ) -> RepositoryResult<u64> {
        self.tracing
            .trace_operation(
                "count_by_restaurant_and_date",
                &self.table,
                self.inner.count_by_restaurant_and_date(restaurant_id, date),
            )
            .await
    }
}

/// Records `database_operations_*` metrics around another menu store
pub struct MeteredDishRepository {
    inner: Arc<dyn DishRepository>,
    tracing: DatabaseTracingMiddleware,
    table: String,
}

impl MeteredDishRepository {
    pub fn new(inner: Arc<dyn DishRepository>, table: String, metrics: Arc<Metrics>) -> Self {
        Self {
            inner,
            tracing: DatabaseTracingMiddleware::new(metrics),
            table,
        }
    }
}

#[async_trait]
impl DishRepository for MeteredDishRepository {
    async fn find_by_restaurant_and_date(
        &self,
        restaurant_id: i64,
        date: NaiveDate,
    ) -> RepositoryResult<Vec<Dish>> {
        self.tracing
            .trace_operation(
                "find_by_restaurant_and_date",
                &self.table,
                self.inner.find_by_restaurant_and_date(restaurant_id, date),
            )
            .await
    }

    async fn create(&self, dish: Dish) -> RepositoryResult<Dish> {
        self.tracing
            .trace_operation("create", &self.table, self.inner.create(dish))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Voter;
    use crate::repositories::InMemoryVoteRepository;
    use chrono::Utc;

    #[tokio::test]
    async fn test_failed_create_recorded_as_error() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let repo = MeteredVoteRepository::new(
            Arc::new(InMemoryVoteRepository::new()),
            "votes".to_string(),
            metrics.clone(),
        );

        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let voter = Voter::new("a@x.com");
        repo.create(Vote::new(&voter, 1, date, Utc::now()))
            .await
            .unwrap();
        assert!(repo
            .create(Vote::new(&voter, 1, date, Utc::now()))
            .await
            .is_err());

        let count = |status: &str| {
            metrics
                .database_operations_total
                .with_label_values(&["create", "votes", status])
                .get()
        };
        assert_eq!(count("success"), 1.0);
        assert_eq!(count("error"), 1.0);
    }
}
