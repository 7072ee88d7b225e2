use std::sync::Arc;
use tracing::instrument;

use crate::models::{
    CreateRestaurantRequest, RepositoryError, Restaurant, ServiceError, ServiceResult, Validate,
};
use crate::observability::Metrics;
use crate::repositories::RestaurantRepository;

/// Read access to restaurants plus registration for seeding
pub struct RestaurantService {
    repository: Arc<dyn RestaurantRepository>,
    metrics: Option<Arc<Metrics>>,
}

impl RestaurantService {
    pub fn new(repository: Arc<dyn RestaurantRepository>) -> Self {
        Self {
            repository,
            metrics: None,
        }
    }

    pub fn new_with_metrics(
        repository: Arc<dyn RestaurantRepository>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            repository,
            metrics: Some(metrics),
        }
    }

    /// All restaurants ordered by id; an empty catalogue is NotFound
    #[instrument(skip(self))]
    pub async fn list_restaurants(&self) -> ServiceResult<Vec<Restaurant>> {
        let result = async {
            let restaurants = self.repository.find_all().await?;
            if restaurants.is_empty() {
                crate::warn_with_trace!("No restaurants registered");
                return Err(ServiceError::NoRestaurants);
            }
            crate::info_with_trace!("Found {} restaurants", restaurants.len());
            Ok(restaurants)
        }
        .await;

        self.record("list", result.is_ok());
        result
    }

    #[instrument(skip(self), fields(id = id))]
    pub async fn get_restaurant(&self, id: i64) -> ServiceResult<Restaurant> {
        let result = match self.repository.find_by_id(id).await {
            Ok(Some(restaurant)) => Ok(restaurant),
            Ok(None) => Err(ServiceError::RestaurantNotFound { id }),
            Err(e) => Err(e.into()),
        };

        self.record("get", result.is_ok());
        result
    }

    /// Register a restaurant under the next free id.
    ///
    /// (name, address) must be unique, compared case-insensitively.
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn register_restaurant(
        &self,
        request: CreateRestaurantRequest,
    ) -> ServiceResult<Restaurant> {
        let result = self.insert_restaurant(request).await;
        self.record("register", result.is_ok());
        result
    }

    async fn insert_restaurant(
        &self,
        request: CreateRestaurantRequest,
    ) -> ServiceResult<Restaurant> {
        request.validate()?;

        let existing = self.repository.find_all().await?;
        let next_id = existing.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        let restaurant = Restaurant::new(next_id, request);

        if existing.iter().any(|r| r.same_place_as(&restaurant)) {
            crate::warn_with_trace!("Restaurant already registered");
            return Err(ServiceError::RestaurantExists {
                name: restaurant.name,
                address: restaurant.address,
            });
        }

        let (name, address) = (restaurant.name.clone(), restaurant.address.clone());
        match self.repository.create(restaurant).await {
            Ok(created) => {
                crate::info_with_trace!(id = created.id, "Restaurant registered");
                Ok(created)
            }
            // A concurrent registration took the id between the scan and the write
            Err(RepositoryError::ConstraintViolation { message }) => {
                crate::warn_with_trace!(error = %message, "Restaurant registration lost a race");
                Err(ServiceError::RestaurantExists { name, address })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Register every request whose (name, address) is not taken yet
    #[instrument(skip(self, requests))]
    pub async fn seed(
        &self,
        requests: Vec<CreateRestaurantRequest>,
    ) -> ServiceResult<Vec<Restaurant>> {
        let mut created = Vec::new();

        for request in requests {
            match self.register_restaurant(request).await {
                Ok(restaurant) => created.push(restaurant),
                Err(ServiceError::RestaurantExists { name, .. }) => {
                    crate::info_with_trace!(name = %name, "Skipping existing restaurant");
                }
                Err(e) => return Err(e),
            }
        }

        crate::info_with_trace!("Seeded {} restaurants", created.len());
        Ok(created)
    }

    fn record(&self, operation: &str, success: bool) {
        if let Some(metrics) = &self.metrics {
            metrics.record_restaurant_operation(operation, success);
        }
    }
}

/// Restaurants loaded by the admin seed endpoint
pub fn default_restaurants() -> Vec<CreateRestaurantRequest> {
    [
        ("Pelmennaya", "Tverskaya street 12, Moscow"),
        ("Teremok", "Arbat street 29, Moscow"),
        ("Stolovaya No. 57", "Red Square 3, Moscow"),
    ]
    .into_iter()
    .map(|(name, address)| CreateRestaurantRequest {
        name: name.to_string(),
        address: address.to_string(),
    })
    .collect()
}
