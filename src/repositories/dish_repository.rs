use async_trait::async_trait;
use aws_sdk_dynamodb::operation::query::builders::QueryFluentBuilder;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn, Instrument};

use super::{dynamodb_span, map_dynamodb_error};
use crate::models::{Dish, RepositoryError, RepositoryResult};

const STORED_DATE_FORMAT: &str = "%Y-%m-%d";

/// Daily menus.
///
/// (`restaurant_id`, `date`, lowercased name) is unique: `create` on a taken
/// name fails with `ConstraintViolation`.
#[async_trait]
pub trait DishRepository: Send + Sync {
    /// Dishes a restaurant offers on a day, ordered by name
    async fn find_by_restaurant_and_date(
        &self,
        restaurant_id: i64,
        date: NaiveDate,
    ) -> RepositoryResult<Vec<Dish>>;

    /// Add a dish to a day's menu
    async fn create(&self, dish: Dish) -> RepositoryResult<Dish>;
}

/// DynamoDB implementation of the DishRepository trait.
///
/// Table key: `menu_day` (hash, `<restaurant_id>#<yyyy-mm-dd>`) + `menu_key`
/// (range, lowercased dish name).
pub struct DynamoDbDishRepository {
    client: Arc<DynamoDbClient>,
    table_name: String,
    region: String,
}

impl DynamoDbDishRepository {
    pub fn new(client: Arc<DynamoDbClient>, table_name: String, region: String) -> Self {
        Self {
            client,
            table_name,
            region,
        }
    }

    fn menu_query(
        &self,
        restaurant_id: i64,
        date: NaiveDate,
        exclusive_start_key: Option<HashMap<String, AttributeValue>>,
    ) -> QueryFluentBuilder {
        self.client
            .query()
            .table_name(&self.table_name)
            .key_condition_expression("menu_day = :menu_day")
            .expression_attribute_values(":menu_day", menu_day(restaurant_id, date))
            .consistent_read(true)
            .set_exclusive_start_key(exclusive_start_key)
    }

    pub fn dish_to_item(&self, dish: &Dish) -> HashMap<String, AttributeValue> {
        let mut item = HashMap::new();
        item.insert(
            "menu_day".to_string(),
            menu_day(dish.restaurant_id, dish.date),
        );
        item.insert("menu_key".to_string(), AttributeValue::S(dish.menu_key()));
        item.insert("id".to_string(), AttributeValue::S(dish.id.clone()));
        item.insert(
            "restaurant_id".to_string(),
            AttributeValue::N(dish.restaurant_id.to_string()),
        );
        item.insert(
            "dish_date".to_string(),
            AttributeValue::S(dish.date.format(STORED_DATE_FORMAT).to_string()),
        );
        item.insert("name".to_string(), AttributeValue::S(dish.name.clone()));
        item.insert("price".to_string(), AttributeValue::N(dish.price.to_string()));
        item
    }

    pub fn item_to_dish(&self, item: HashMap<String, AttributeValue>) -> RepositoryResult<Dish> {
        let invalid = |name: &str| RepositoryError::InvalidQuery {
            message: format!("Missing or invalid {}", name),
        };
        let string_attr = |name: &str| {
            item.get(name)
                .and_then(|v| v.as_s().ok())
                .cloned()
                .ok_or_else(|| invalid(name))
        };
        let number_attr = |name: &str| {
            item.get(name)
                .and_then(|v| v.as_n().ok())
                .and_then(|n| n.parse::<i64>().ok())
                .ok_or_else(|| invalid(name))
        };

        let date = NaiveDate::parse_from_str(&string_attr("dish_date")?, STORED_DATE_FORMAT)
            .map_err(|_| invalid("dish_date"))?;

        Ok(Dish {
            id: string_attr("id")?,
            restaurant_id: number_attr("restaurant_id")?,
            date,
            name: string_attr("name")?,
            price: number_attr("price")?,
        })
    }
}

fn menu_day(restaurant_id: i64, date: NaiveDate) -> AttributeValue {
    AttributeValue::S(format!(
        "{}#{}",
        restaurant_id,
        date.format(STORED_DATE_FORMAT)
    ))
}

#[async_trait]
impl DishRepository for DynamoDbDishRepository {
    #[instrument(skip(self), fields(table = %self.table_name, restaurant_id = restaurant_id, date = %date))]
    async fn find_by_restaurant_and_date(
        &self,
        restaurant_id: i64,
        date: NaiveDate,
    ) -> RepositoryResult<Vec<Dish>> {
        let mut dishes = Vec::new();
        let mut start_key = None;

        loop {
            let page_start = start_key.take();
            let query_span = dynamodb_span("Query", &self.table_name, &self.region);

            let response = async {
                self.menu_query(restaurant_id, date, page_start)
                    .send()
                    .await
                    .map_err(|e| map_dynamodb_error(e.into(), &self.table_name))
            }
            .instrument(query_span)
            .await?;

            for item in response.items.unwrap_or_default() {
                match self.item_to_dish(item) {
                    Ok(dish) => dishes.push(dish),
                    Err(e) => warn!("Failed to parse dish item: {}", e),
                }
            }

            match response.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        dishes.sort_by_key(Dish::menu_key);
        info!("Found {} dishes", dishes.len());
        Ok(dishes)
    }

    #[instrument(skip(self, dish), fields(table = %self.table_name, date = %dish.date))]
    async fn create(&self, dish: Dish) -> RepositoryResult<Dish> {
        let item = self.dish_to_item(&dish);
        let put_span = dynamodb_span("PutItem", &self.table_name, &self.region);

        let result = async {
            self.client
                .put_item()
                .table_name(&self.table_name)
                .set_item(Some(item))
                .condition_expression("attribute_not_exists(menu_key)")
                .send()
                .await
        }
        .instrument(put_span)
        .await;

        match result {
            Ok(_) => {
                info!("Dish created");
                Ok(dish)
            }
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_conditional_check_failed_exception()) =>
            {
                Err(RepositoryError::ConstraintViolation {
                    message: format!("Dish {} already listed on {}", dish.name, dish.date),
                })
            }
            Err(e) => Err(map_dynamodb_error(e.into(), &self.table_name)),
        }
    }
}
