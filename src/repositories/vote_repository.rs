use async_trait::async_trait;
use aws_sdk_dynamodb::operation::query::builders::QueryFluentBuilder;
use aws_sdk_dynamodb::operation::RequestId;
use aws_sdk_dynamodb::types::{AttributeValue, Select};
use aws_sdk_dynamodb::Client as DynamoDbClient;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, Instrument};

use super::{dynamodb_span, map_dynamodb_error};
use crate::models::{RepositoryError, RepositoryResult, Vote};

/// Storage format of `vote_date` keys
const STORED_DATE_FORMAT: &str = "%Y-%m-%d";

/// Trait defining the interface for vote data access operations.
///
/// Implementations must treat (`user_email`, `date`) as a unique key:
/// `create` on an occupied key fails with `ConstraintViolation`, and
/// `update` on an empty key fails with `NotFound`. These two checks are
/// what serialise concurrent writers.
#[async_trait]
pub trait VoteRepository: Send + Sync {
    /// Find the vote a user cast on a given day
    async fn find_by_user_and_date(
        &self,
        user_email: &str,
        date: NaiveDate,
    ) -> RepositoryResult<Option<Vote>>;

    /// Insert a new vote
    async fn create(&self, vote: Vote) -> RepositoryResult<Vote>;

    /// Replace the restaurant of an existing vote
    async fn update(&self, vote: Vote) -> RepositoryResult<Vote>;

    /// Count votes for a restaurant on a day
    async fn count_by_restaurant_and_date(
        &self,
        restaurant_id: i64,
        date: NaiveDate,
    ) -> RepositoryResult<u64>;
}

/// DynamoDB implementation of the VoteRepository trait.
///
/// Table key: `vote_date` (hash) + `user_email` (range). One partition holds
/// a whole day, so totals are a strongly consistent query on the base table.
pub struct DynamoDbVoteRepository {
    client: Arc<DynamoDbClient>,
    table_name: String,
    region: String,
}

impl DynamoDbVoteRepository {
    /// Create a new DynamoDB vote repository
    pub fn new(client: Arc<DynamoDbClient>, table_name: String, region: String) -> Self {
        Self {
            client,
            table_name,
            region,
        }
    }

    /// One page of the per-day count query
    fn count_query(
        &self,
        restaurant_id: i64,
        date: NaiveDate,
        exclusive_start_key: Option<HashMap<String, AttributeValue>>,
    ) -> QueryFluentBuilder {
        self.client
            .query()
            .table_name(&self.table_name)
            .key_condition_expression("vote_date = :vote_date")
            .filter_expression("restaurant_id = :restaurant_id")
            .expression_attribute_values(":vote_date", date_key(date))
            .expression_attribute_values(
                ":restaurant_id",
                AttributeValue::N(restaurant_id.to_string()),
            )
            .consistent_read(true)
            .select(Select::Count)
            .set_exclusive_start_key(exclusive_start_key)
    }

    /// Convert a Vote to DynamoDB attribute values
    pub fn vote_to_item(&self, vote: &Vote) -> HashMap<String, AttributeValue> {
        let mut item = HashMap::new();

        item.insert("id".to_string(), AttributeValue::S(vote.id.clone()));
        item.insert(
            "user_email".to_string(),
            AttributeValue::S(vote.user_email.clone()),
        );
        item.insert("vote_date".to_string(), date_key(vote.date));
        item.insert(
            "restaurant_id".to_string(),
            AttributeValue::N(vote.restaurant_id.to_string()),
        );
        item.insert(
            "created_at".to_string(),
            AttributeValue::S(vote.created_at.to_rfc3339()),
        );
        item.insert(
            "updated_at".to_string(),
            AttributeValue::S(vote.updated_at.to_rfc3339()),
        );

        item
    }

    /// Convert DynamoDB item to Vote
    pub fn item_to_vote(&self, item: HashMap<String, AttributeValue>) -> RepositoryResult<Vote> {
        let string_attr = |name: &str| -> RepositoryResult<String> {
            item.get(name)
                .and_then(|v| v.as_s().ok())
                .cloned()
                .ok_or_else(|| RepositoryError::InvalidQuery {
                    message: format!("Missing {}", name),
                })
        };

        let id = string_attr("id")?;
        let user_email = string_attr("user_email")?;

        let date = NaiveDate::parse_from_str(&string_attr("vote_date")?, STORED_DATE_FORMAT)
            .map_err(|_| RepositoryError::InvalidQuery {
                message: "Invalid vote_date".to_string(),
            })?;

        let restaurant_id = item
            .get("restaurant_id")
            .and_then(|v| v.as_n().ok())
            .and_then(|n| n.parse::<i64>().ok())
            .ok_or_else(|| RepositoryError::InvalidQuery {
                message: "Invalid restaurant_id".to_string(),
            })?;

        let created_at = parse_timestamp(item.get("created_at")).ok_or_else(|| {
            RepositoryError::InvalidQuery {
                message: "Invalid created_at".to_string(),
            }
        })?;

        // Fall back to created_at for items that were never updated
        let updated_at = parse_timestamp(item.get("updated_at")).unwrap_or(created_at);

        Ok(Vote {
            id,
            user_email,
            restaurant_id,
            date,
            created_at,
            updated_at,
        })
    }
}

fn date_key(date: NaiveDate) -> AttributeValue {
    AttributeValue::S(date.format(STORED_DATE_FORMAT).to_string())
}

fn parse_timestamp(value: Option<&AttributeValue>) -> Option<DateTime<Utc>> {
    value
        .and_then(|v| v.as_s().ok())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[async_trait]
impl VoteRepository for DynamoDbVoteRepository {
    #[instrument(skip(self), fields(table = %self.table_name, user = %user_email, date = %date))]
    async fn find_by_user_and_date(
        &self,
        user_email: &str,
        date: NaiveDate,
    ) -> RepositoryResult<Option<Vote>> {
        info!("Finding vote by user and date");

        let get_span = dynamodb_span("GetItem", &self.table_name, &self.region);

        let response = async {
            let result = self
                .client
                .get_item()
                .table_name(&self.table_name)
                .key("user_email", AttributeValue::S(user_email.to_string()))
                .key("vote_date", date_key(date))
                .consistent_read(true)
                .send()
                .await;

            match &result {
                Ok(output) => {
                    tracing::Span::current().record("http.status_code", 200);
                    if let Some(request_id) = output.request_id() {
                        tracing::Span::current().record("aws.request_id", request_id);
                    }
                }
                Err(e) => error!("DynamoDB GetItem failed: {}", e),
            }

            result.map_err(|e| map_dynamodb_error(e.into(), &self.table_name))
        }
        .instrument(get_span)
        .await?;

        match response.item {
            Some(item) => {
                let vote = self.item_to_vote(item)?;
                info!("Vote found");
                Ok(Some(vote))
            }
            None => {
                info!("Vote not found");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, vote), fields(table = %self.table_name, user = %vote.user_email, date = %vote.date))]
    async fn create(&self, vote: Vote) -> RepositoryResult<Vote> {
        info!("Creating vote");

        let item = self.vote_to_item(&vote);
        let put_span = dynamodb_span("PutItem", &self.table_name, &self.region);

        let result = async {
            self.client
                .put_item()
                .table_name(&self.table_name)
                .set_item(Some(item))
                .condition_expression("attribute_not_exists(user_email)")
                .send()
                .await
        }
        .instrument(put_span)
        .await;

        match result {
            Ok(_) => {
                info!("Vote created successfully");
                Ok(vote)
            }
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_conditional_check_failed_exception()) =>
            {
                info!("Vote already exists for user and date");
                Err(RepositoryError::ConstraintViolation {
                    message: format!(
                        "Vote for user {} on {} already exists",
                        vote.user_email, vote.date
                    ),
                })
            }
            Err(e) => Err(map_dynamodb_error(e.into(), &self.table_name)),
        }
    }

    #[instrument(skip(self, vote), fields(table = %self.table_name, user = %vote.user_email, date = %vote.date))]
    async fn update(&self, vote: Vote) -> RepositoryResult<Vote> {
        info!("Updating vote");

        let update_span = dynamodb_span("UpdateItem", &self.table_name, &self.region);

        let result = async {
            self.client
                .update_item()
                .table_name(&self.table_name)
                .key("user_email", AttributeValue::S(vote.user_email.clone()))
                .key("vote_date", date_key(vote.date))
                .update_expression("SET restaurant_id = :restaurant_id, updated_at = :updated_at")
                .condition_expression("attribute_exists(user_email) AND id = :id")
                .expression_attribute_values(
                    ":restaurant_id",
                    AttributeValue::N(vote.restaurant_id.to_string()),
                )
                .expression_attribute_values(
                    ":updated_at",
                    AttributeValue::S(vote.updated_at.to_rfc3339()),
                )
                .expression_attribute_values(":id", AttributeValue::S(vote.id.clone()))
                .send()
                .await
        }
        .instrument(update_span)
        .await;

        match result {
            Ok(_) => {
                info!("Vote updated successfully");
                Ok(vote)
            }
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_conditional_check_failed_exception()) =>
            {
                Err(RepositoryError::NotFound)
            }
            Err(e) => Err(map_dynamodb_error(e.into(), &self.table_name)),
        }
    }

    #[instrument(skip(self), fields(table = %self.table_name, restaurant_id = restaurant_id, date = %date))]
    async fn count_by_restaurant_and_date(
        &self,
        restaurant_id: i64,
        date: NaiveDate,
    ) -> RepositoryResult<u64> {
        info!("Counting votes for restaurant");

        let mut total = 0u64;
        let mut start_key = None;

        loop {
            let page_start = start_key.take();
            let query_span = dynamodb_span("Query", &self.table_name, &self.region);

            let response = async {
                self.count_query(restaurant_id, date, page_start)
                    .send()
                    .await
                    .map_err(|e| map_dynamodb_error(e.into(), &self.table_name))
            }
            .instrument(query_span)
            .await?;

            total += response.count().max(0) as u64;

            match response.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        info!("Vote count: {}", total);
        Ok(total)
    }
}
