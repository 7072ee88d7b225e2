use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, KeySchemaElement, KeyType, ScalarAttributeType, TableStatus,
};
use aws_sdk_dynamodb::Client as DynamoDbClient;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use super::map_dynamodb_error;
use crate::models::{RepositoryError, RepositoryResult};

/// Manages DynamoDB table creation and configuration
pub struct TableManager {
    client: Arc<DynamoDbClient>,
    poll_interval: Duration,
    max_attempts: u32,
}

fn attribute(name: &str, kind: ScalarAttributeType) -> RepositoryResult<AttributeDefinition> {
    AttributeDefinition::builder()
        .attribute_name(name)
        .attribute_type(kind)
        .build()
        .map_err(|e| RepositoryError::AwsSdk {
            message: format!("Failed to build attribute definition: {}", e),
        })
}

fn key(name: &str, key_type: KeyType) -> RepositoryResult<KeySchemaElement> {
    KeySchemaElement::builder()
        .attribute_name(name)
        .key_type(key_type)
        .build()
        .map_err(|e| RepositoryError::AwsSdk {
            message: format!("Failed to build key schema: {}", e),
        })
}

/// Restaurants: `id` (N) hash key
pub(crate) fn restaurants_schema(
) -> RepositoryResult<(Vec<AttributeDefinition>, Vec<KeySchemaElement>)> {
    Ok((
        vec![attribute("id", ScalarAttributeType::N)?],
        vec![key("id", KeyType::Hash)?],
    ))
}

/// Votes: `vote_date` + `user_email`, one item per user per day
pub(crate) fn votes_schema(
) -> RepositoryResult<(Vec<AttributeDefinition>, Vec<KeySchemaElement>)> {
    Ok((
        vec![
            attribute("vote_date", ScalarAttributeType::S)?,
            attribute("user_email", ScalarAttributeType::S)?,
        ],
        vec![
            key("vote_date", KeyType::Hash)?,
            key("user_email", KeyType::Range)?,
        ],
    ))
}

/// Dishes: `menu_day` (`<restaurant_id>#<date>`) + `menu_key` (lowercased name)
pub(crate) fn dishes_schema(
) -> RepositoryResult<(Vec<AttributeDefinition>, Vec<KeySchemaElement>)> {
    Ok((
        vec![
            attribute("menu_day", ScalarAttributeType::S)?,
            attribute("menu_key", ScalarAttributeType::S)?,
        ],
        vec![
            key("menu_day", KeyType::Hash)?,
            key("menu_key", KeyType::Range)?,
        ],
    ))
}

/// Table names of the three stores
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub restaurants: String,
    pub votes: String,
    pub dishes: String,
}

impl TableNames {
    pub fn all(&self) -> Vec<String> {
        vec![
            self.restaurants.clone(),
            self.votes.clone(),
            self.dishes.clone(),
        ]
    }
}

impl TableManager {
    /// Create a new table manager
    pub fn new(client: Arc<DynamoDbClient>) -> Self {
        Self {
            client,
            poll_interval: Duration::from_secs(10),
            max_attempts: 30,
        }
    }

    /// Override how long `wait_for_table_active` polls
    pub fn with_polling(mut self, poll_interval: Duration, max_attempts: u32) -> Self {
        self.poll_interval = poll_interval;
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Create the restaurants table
    pub async fn create_restaurants_table(&self, table_name: &str) -> RepositoryResult<()> {
        self.create_table(table_name, restaurants_schema()?).await
    }

    /// Create the votes table
    pub async fn create_votes_table(&self, table_name: &str) -> RepositoryResult<()> {
        self.create_table(table_name, votes_schema()?).await
    }

    /// Create the dishes table
    pub async fn create_dishes_table(&self, table_name: &str) -> RepositoryResult<()> {
        self.create_table(table_name, dishes_schema()?).await
    }

    /// Create an on-demand table unless it exists, then wait until it is active
    #[instrument(skip(self, schema), fields(table_name = %table_name))]
    async fn create_table(
        &self,
        table_name: &str,
        schema: (Vec<AttributeDefinition>, Vec<KeySchemaElement>),
    ) -> RepositoryResult<()> {
        if self.table_exists(table_name).await? {
            info!("Table {} already exists", table_name);
            return Ok(());
        }

        let (attribute_definitions, key_schema) = schema;
        info!("Creating table {}", table_name);

        self.client
            .create_table()
            .table_name(table_name)
            .set_attribute_definitions(Some(attribute_definitions))
            .set_key_schema(Some(key_schema))
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await
            .map_err(|e| map_dynamodb_error(e.into(), table_name))?;

        info!("Table creation initiated, waiting for table to become active");
        self.wait_for_table_active(table_name).await?;
        info!("Table {} created successfully", table_name);

        Ok(())
    }

    /// Check if a table exists
    #[instrument(skip(self), fields(table_name = %table_name))]
    pub async fn table_exists(&self, table_name: &str) -> RepositoryResult<bool> {
        match self.client.describe_table().table_name(table_name).send().await {
            Ok(_) => Ok(true),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_resource_not_found_exception()) =>
            {
                info!("Table {} does not exist", table_name);
                Ok(false)
            }
            Err(e) => {
                error!("Error checking table existence: {}", e);
                Err(RepositoryError::ConnectionFailed)
            }
        }
    }

    #[instrument(skip(self), fields(table_name = %table_name))]
    async fn wait_for_table_active(&self, table_name: &str) -> RepositoryResult<()> {
        let mut attempts = 0;

        loop {
            let response = self
                .client
                .describe_table()
                .table_name(table_name)
                .send()
                .await
                .map_err(|e| map_dynamodb_error(e.into(), table_name))?;

            match response.table.and_then(|t| t.table_status) {
                Some(TableStatus::Active) => {
                    info!("Table {} is now active", table_name);
                    return Ok(());
                }
                Some(status) => info!("Table {} status: {:?}, waiting...", table_name, status),
                None => warn!("Table {} status unknown, waiting...", table_name),
            }

            attempts += 1;
            if attempts >= self.max_attempts {
                error!("Timeout waiting for table {} to become active", table_name);
                return Err(RepositoryError::Timeout);
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Create the restaurants, votes and dishes tables
    #[instrument(skip(self))]
    pub async fn create_all_tables(&self, tables: &TableNames) -> RepositoryResult<()> {
        info!("Creating all tables");

        let (restaurants_result, votes_result, dishes_result) = tokio::join!(
            self.create_restaurants_table(&tables.restaurants),
            self.create_votes_table(&tables.votes),
            self.create_dishes_table(&tables.dishes)
        );

        restaurants_result?;
        votes_result?;
        dishes_result?;

        info!("All tables created successfully");
        Ok(())
    }
}
