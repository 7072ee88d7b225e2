use chrono::NaiveDate;
use std::sync::Arc;
use tracing::instrument;

use crate::models::{
    CreateDishRequest, Dish, RepositoryError, Restaurant, ServiceError, ServiceResult, Validate,
};
use crate::observability::Metrics;
use crate::repositories::{DishRepository, RestaurantRepository};
use crate::services::clock::{Clock, VotingWindow};

/// Daily menus. Dishes are always added to the current day of the
/// reference timezone; reads may ask for any day.
pub struct MenuService {
    restaurants: Arc<dyn RestaurantRepository>,
    dishes: Arc<dyn DishRepository>,
    clock: Arc<dyn Clock>,
    window: VotingWindow,
    metrics: Option<Arc<Metrics>>,
}

impl MenuService {
    pub fn new(
        restaurants: Arc<dyn RestaurantRepository>,
        dishes: Arc<dyn DishRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            restaurants,
            dishes,
            clock,
            window: VotingWindow::default(),
            metrics: None,
        }
    }

    pub fn new_with_metrics(
        restaurants: Arc<dyn RestaurantRepository>,
        dishes: Arc<dyn DishRepository>,
        clock: Arc<dyn Clock>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            metrics: Some(metrics),
            ..Self::new(restaurants, dishes, clock)
        }
    }

    /// Menu of a restaurant on `date`, defaulting to today. An empty menu is NotFound.
    #[instrument(skip(self), fields(restaurant_id = restaurant_id, date = ?date))]
    pub async fn get_menu(
        &self,
        restaurant_id: i64,
        date: Option<NaiveDate>,
    ) -> ServiceResult<Vec<Dish>> {
        let result = self.find_menu(restaurant_id, date).await;
        self.record("menu", result.is_ok());
        result
    }

    async fn find_menu(
        &self,
        restaurant_id: i64,
        date: Option<NaiveDate>,
    ) -> ServiceResult<Vec<Dish>> {
        self.require_restaurant(restaurant_id).await?;

        let date = date.unwrap_or_else(|| self.window.today(self.clock.now()));
        let dishes = self
            .dishes
            .find_by_restaurant_and_date(restaurant_id, date)
            .await?;

        if dishes.is_empty() {
            crate::warn_with_trace!(date = %date, "No menu published");
            return Err(ServiceError::MenuNotFound {
                restaurant_id,
                date,
            });
        }

        crate::info_with_trace!(date = %date, "Found {} dishes", dishes.len());
        Ok(dishes)
    }

    /// Put a dish on today's menu of a restaurant
    #[instrument(skip(self, request), fields(restaurant_id = restaurant_id, name = %request.name))]
    pub async fn add_dish(
        &self,
        restaurant_id: i64,
        request: CreateDishRequest,
    ) -> ServiceResult<Dish> {
        let result = self.insert_dish(restaurant_id, request).await;
        self.record("add_dish", result.is_ok());
        result
    }

    async fn insert_dish(
        &self,
        restaurant_id: i64,
        request: CreateDishRequest,
    ) -> ServiceResult<Dish> {
        request.validate()?;
        self.require_restaurant(restaurant_id).await?;

        let today = self.window.today(self.clock.now());
        let dish = Dish::new(restaurant_id, today, request);
        let name = dish.name.clone();

        match self.dishes.create(dish).await {
            Ok(dish) => {
                crate::info_with_trace!(dish_id = %dish.id, "Dish added to menu");
                Ok(dish)
            }
            Err(RepositoryError::ConstraintViolation { .. }) => {
                Err(ServiceError::DishExists { name, date: today })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Publish the sample menu for today where a dish is not listed yet
    #[instrument(skip(self, restaurants))]
    pub async fn seed_today(&self, restaurants: &[Restaurant]) -> ServiceResult<Vec<Dish>> {
        let mut created = Vec::new();

        for (position, restaurant) in restaurants.iter().enumerate() {
            for request in default_menu(position) {
                match self.add_dish(restaurant.id, request).await {
                    Ok(dish) => created.push(dish),
                    Err(ServiceError::DishExists { name, .. }) => {
                        crate::info_with_trace!(name = %name, "Skipping listed dish");
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        crate::info_with_trace!("Seeded {} dishes", created.len());
        Ok(created)
    }

    async fn require_restaurant(&self, restaurant_id: i64) -> ServiceResult<()> {
        if self.restaurants.exists(restaurant_id).await? {
            Ok(())
        } else {
            Err(ServiceError::RestaurantNotFound { id: restaurant_id })
        }
    }

    fn record(&self, operation: &str, success: bool) {
        if let Some(metrics) = &self.metrics {
            metrics.record_restaurant_operation(operation, success);
        }
    }
}

/// Sample dishes for the restaurant at `position` in the catalogue
pub fn default_menu(position: usize) -> Vec<CreateDishRequest> {
    const MENUS: [&[(&str, i64)]; 3] = [
        &[("Pelmeni", 390), ("Borscht", 290), ("Kompot", 90)],
        &[("Blini with salmon", 450), ("Syrniki", 260)],
        &[("Solyanka", 320), ("Chicken Kiev", 480), ("Kvass", 120)],
    ];

    MENUS[position % MENUS.len()]
        .iter()
        .map(|(name, price)| CreateDishRequest {
            name: name.to_string(),
            price: *price,
        })
        .collect()
}
