use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use super::{DishRepository, RestaurantRepository, VoteRepository};
use crate::models::{Dish, RepositoryError, RepositoryResult, Restaurant, Vote};

/// Process-local restaurant store, ordered by id
#[derive(Debug, Default)]
pub struct InMemoryRestaurantRepository {
    restaurants: RwLock<BTreeMap<i64, Restaurant>>,
}

impl InMemoryRestaurantRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_restaurants(restaurants: impl IntoIterator<Item = Restaurant>) -> Self {
        Self {
            restaurants: RwLock::new(restaurants.into_iter().map(|r| (r.id, r)).collect()),
        }
    }
}

#[async_trait]
impl RestaurantRepository for InMemoryRestaurantRepository {
    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Restaurant>> {
        Ok(self.restaurants.read().await.get(&id).cloned())
    }

    async fn exists(&self, id: i64) -> RepositoryResult<bool> {
        Ok(self.restaurants.read().await.contains_key(&id))
    }

    async fn find_all(&self) -> RepositoryResult<Vec<Restaurant>> {
        Ok(self.restaurants.read().await.values().cloned().collect())
    }

    #[instrument(skip(self, restaurant), fields(id = restaurant.id))]
    async fn create(&self, restaurant: Restaurant) -> RepositoryResult<Restaurant> {
        let mut restaurants = self.restaurants.write().await;
        if restaurants.contains_key(&restaurant.id) {
            return Err(RepositoryError::ConstraintViolation {
                message: format!("Restaurant with id={} already exists", restaurant.id),
            });
        }
        restaurants.insert(restaurant.id, restaurant.clone());
        debug!("Restaurant stored in memory");
        Ok(restaurant)
    }

    async fn count(&self) -> RepositoryResult<usize> {
        Ok(self.restaurants.read().await.len())
    }
}

/// Process-local vote store keyed by (user email, date).
///
/// Check-and-write happens under one write lock, so two concurrent
/// creates for the same key cannot both succeed.
#[derive(Debug, Default)]
pub struct InMemoryVoteRepository {
    votes: RwLock<HashMap<(String, NaiveDate), Vote>>,
}

impl InMemoryVoteRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored votes across all days
    pub async fn len(&self) -> usize {
        self.votes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.votes.read().await.is_empty()
    }
}

fn vote_key(vote: &Vote) -> (String, NaiveDate) {
    (vote.user_email.clone(), vote.date)
}

#[async_trait]
impl VoteRepository for InMemoryVoteRepository {
    async fn find_by_user_and_date(
        &self,
        user_email: &str,
        date: NaiveDate,
    ) -> RepositoryResult<Option<Vote>> {
        let votes = self.votes.read().await;
        Ok(votes.get(&(user_email.to_string(), date)).cloned())
    }

    #[instrument(skip(self, vote), fields(user = %vote.user_email, date = %vote.date))]
    async fn create(&self, vote: Vote) -> RepositoryResult<Vote> {
        let mut votes = self.votes.write().await;
        let key = vote_key(&vote);
        if votes.contains_key(&key) {
            return Err(RepositoryError::ConstraintViolation {
                message: format!(
                    "Vote for user {} on {} already exists",
                    vote.user_email, vote.date
                ),
            });
        }
        votes.insert(key, vote.clone());
        debug!("Vote stored in memory");
        Ok(vote)
    }

    #[instrument(skip(self, vote), fields(user = %vote.user_email, date = %vote.date))]
    async fn update(&self, vote: Vote) -> RepositoryResult<Vote> {
        let mut votes = self.votes.write().await;
        match votes.get_mut(&vote_key(&vote)) {
            Some(existing) if existing.id == vote.id => {
                *existing = vote.clone();
                debug!("Vote replaced in memory");
                Ok(vote)
            }
            _ => Err(RepositoryError::NotFound),
        }
    }

    async fn count_by_restaurant_and_date(
        &self,
        restaurant_id: i64,
        date: NaiveDate,
    ) -> RepositoryResult<u64> {
        let votes = self.votes.read().await;
        Ok(votes
            .values()
            .filter(|v| v.restaurant_id == restaurant_id && v.date == date)
            .count() as u64)
    }
}

/// Process-local menu store keyed by (restaurant, day, lowercased name)
#[derive(Debug, Default)]
pub struct InMemoryDishRepository {
    dishes: RwLock<BTreeMap<(i64, NaiveDate, String), Dish>>,
}

impl InMemoryDishRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DishRepository for InMemoryDishRepository {
    async fn find_by_restaurant_and_date(
        &self,
        restaurant_id: i64,
        date: NaiveDate,
    ) -> RepositoryResult<Vec<Dish>> {
        let dishes = self.dishes.read().await;
        Ok(dishes
            .iter()
            .filter(|((id, day, _), _)| *id == restaurant_id && *day == date)
            .map(|(_, dish)| dish.clone())
            .collect())
    }

    #[instrument(skip(self, dish), fields(restaurant_id = dish.restaurant_id, date = %dish.date))]
    async fn create(&self, dish: Dish) -> RepositoryResult<Dish> {
        let mut dishes = self.dishes.write().await;
        let key = (dish.restaurant_id, dish.date, dish.menu_key());
        if dishes.contains_key(&key) {
            return Err(RepositoryError::ConstraintViolation {
                message: format!("Dish {} already listed on {}", dish.name, dish.date),
            });
        }
        dishes.insert(key, dish.clone());
        debug!("Dish stored in memory");
        Ok(dish)
    }
}
