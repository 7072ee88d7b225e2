use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, Select};
use aws_sdk_dynamodb::Client as DynamoDbClient;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn, Instrument};

use super::{dynamodb_span, map_dynamodb_error};
use crate::models::{Restaurant, RepositoryError, RepositoryResult};

/// Trait defining the interface for restaurant lookups
#[async_trait]
pub trait RestaurantRepository: Send + Sync {
    /// Find a restaurant by ID
    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Restaurant>>;

    /// Check if a restaurant exists
    async fn exists(&self, id: i64) -> RepositoryResult<bool>;

    /// List all restaurants ordered by id
    async fn find_all(&self) -> RepositoryResult<Vec<Restaurant>>;

    /// Insert a new restaurant; fails if the id is taken
    async fn create(&self, restaurant: Restaurant) -> RepositoryResult<Restaurant>;

    /// Count restaurants
    async fn count(&self) -> RepositoryResult<usize>;
}

/// DynamoDB implementation of the RestaurantRepository trait
pub struct DynamoDbRestaurantRepository {
    client: Arc<DynamoDbClient>,
    table_name: String,
    region: String,
}

impl DynamoDbRestaurantRepository {
    /// Create a new DynamoDB restaurant repository
    pub fn new(client: Arc<DynamoDbClient>, table_name: String, region: String) -> Self {
        Self {
            client,
            table_name,
            region,
        }
    }

    /// Get the table name (for testing)
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Convert a Restaurant to DynamoDB attribute values
    pub fn restaurant_to_item(&self, restaurant: &Restaurant) -> HashMap<String, AttributeValue> {
        let mut item = HashMap::new();
        item.insert("id".to_string(), AttributeValue::N(restaurant.id.to_string()));
        item.insert("name".to_string(), AttributeValue::S(restaurant.name.clone()));
        item.insert(
            "address".to_string(),
            AttributeValue::S(restaurant.address.clone()),
        );
        item
    }

    /// Convert DynamoDB item to Restaurant
    pub fn item_to_restaurant(
        &self,
        item: HashMap<String, AttributeValue>,
    ) -> RepositoryResult<Restaurant> {
        let id = item
            .get("id")
            .and_then(|v| v.as_n().ok())
            .and_then(|n| n.parse::<i64>().ok())
            .ok_or_else(|| RepositoryError::InvalidQuery {
                message: "Missing or invalid id".to_string(),
            })?;

        let name = item
            .get("name")
            .and_then(|v| v.as_s().ok())
            .ok_or_else(|| RepositoryError::InvalidQuery {
                message: "Missing name".to_string(),
            })?
            .clone();

        let address = item
            .get("address")
            .and_then(|v| v.as_s().ok())
            .cloned()
            .unwrap_or_default();

        Ok(Restaurant { id, name, address })
    }

    fn key(id: i64) -> AttributeValue {
        AttributeValue::N(id.to_string())
    }
}

#[async_trait]
impl RestaurantRepository for DynamoDbRestaurantRepository {
    #[instrument(skip(self), fields(table = %self.table_name, id = id))]
    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Restaurant>> {
        info!("Finding restaurant by ID");

        let get_span = dynamodb_span("GetItem", &self.table_name, &self.region);

        let response = async {
            let result = self
                .client
                .get_item()
                .table_name(&self.table_name)
                .key("id", Self::key(id))
                .send()
                .await;

            if let Err(e) = &result {
                error!("DynamoDB GetItem failed: {}", e);
            }

            result.map_err(|e| map_dynamodb_error(e.into(), &self.table_name))
        }
        .instrument(get_span)
        .await?;

        match response.item {
            Some(item) => Ok(Some(self.item_to_restaurant(item)?)),
            None => {
                info!("Restaurant not found");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self), fields(table = %self.table_name, id = id))]
    async fn exists(&self, id: i64) -> RepositoryResult<bool> {
        let get_span = dynamodb_span("GetItem", &self.table_name, &self.region);

        let response = async {
            self.client
                .get_item()
                .table_name(&self.table_name)
                .key("id", Self::key(id))
                .projection_expression("id")
                .send()
                .await
                .map_err(|e| map_dynamodb_error(e.into(), &self.table_name))
        }
        .instrument(get_span)
        .await?;

        let exists = response.item.is_some();
        info!("Restaurant exists: {}", exists);
        Ok(exists)
    }

    #[instrument(skip(self), fields(table = %self.table_name))]
    async fn find_all(&self) -> RepositoryResult<Vec<Restaurant>> {
        info!("Finding all restaurants");

        let mut restaurants = Vec::new();
        let mut start_key = None;

        loop {
            let page_start = start_key.take();
            let scan_span = dynamodb_span("Scan", &self.table_name, &self.region);

            let response = async {
                self.client
                    .scan()
                    .table_name(&self.table_name)
                    .set_exclusive_start_key(page_start)
                    .send()
                    .await
                    .map_err(|e| map_dynamodb_error(e.into(), &self.table_name))
            }
            .instrument(scan_span)
            .await?;

            for item in response.items.unwrap_or_default() {
                match self.item_to_restaurant(item) {
                    Ok(restaurant) => restaurants.push(restaurant),
                    Err(e) => warn!("Failed to parse restaurant item: {}", e),
                }
            }

            match response.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        restaurants.sort_by_key(|r| r.id);
        info!("Found {} restaurants", restaurants.len());
        Ok(restaurants)
    }

    #[instrument(skip(self, restaurant), fields(table = %self.table_name, id = restaurant.id))]
    async fn create(&self, restaurant: Restaurant) -> RepositoryResult<Restaurant> {
        info!("Creating restaurant");

        let item = self.restaurant_to_item(&restaurant);
        let put_span = dynamodb_span("PutItem", &self.table_name, &self.region);

        let result = async {
            self.client
                .put_item()
                .table_name(&self.table_name)
                .set_item(Some(item))
                .condition_expression("attribute_not_exists(id)")
                .send()
                .await
        }
        .instrument(put_span)
        .await;

        match result {
            Ok(_) => {
                info!("Restaurant created successfully");
                Ok(restaurant)
            }
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_conditional_check_failed_exception()) =>
            {
                Err(RepositoryError::ConstraintViolation {
                    message: format!("Restaurant with id={} already exists", restaurant.id),
                })
            }
            Err(e) => Err(map_dynamodb_error(e.into(), &self.table_name)),
        }
    }

    #[instrument(skip(self), fields(table = %self.table_name))]
    async fn count(&self) -> RepositoryResult<usize> {
        let mut total = 0usize;
        let mut start_key = None;

        loop {
            let page_start = start_key.take();
            let scan_span = dynamodb_span("Scan", &self.table_name, &self.region);

            let response = async {
                self.client
                    .scan()
                    .table_name(&self.table_name)
                    .select(Select::Count)
                    .set_exclusive_start_key(page_start)
                    .send()
                    .await
                    .map_err(|e| map_dynamodb_error(e.into(), &self.table_name))
            }
            .instrument(scan_span)
            .await?;

            total += response.count().max(0) as usize;

            match response.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        info!("Restaurant count: {}", total);
        Ok(total)
    }
}
