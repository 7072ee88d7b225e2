// Repositories module - data access layer

pub mod dish_repository;
pub mod memory;
pub mod metered;
pub mod restaurant_repository;
pub mod table_manager;
pub mod vote_repository;

pub use dish_repository::{DishRepository, DynamoDbDishRepository};
pub use memory::{InMemoryDishRepository, InMemoryRestaurantRepository, InMemoryVoteRepository};
pub use metered::{MeteredDishRepository, MeteredRestaurantRepository, MeteredVoteRepository};
pub use restaurant_repository::{DynamoDbRestaurantRepository, RestaurantRepository};
pub use table_manager::{TableManager, TableNames};
pub use vote_repository::{DynamoDbVoteRepository, VoteRepository};

use aws_sdk_dynamodb::Error as DynamoDbError;
use tracing::error;

use crate::models::RepositoryError;

/// Create a DynamoDB client span carrying the X-Ray remote resource attributes
pub(crate) fn dynamodb_span(operation: &str, table_name: &str, region: &str) -> tracing::Span {
    tracing::info_span!(
        "DynamoDB",
        "aws.service" = "DynamoDB",
        "aws.operation" = operation,
        "aws.region" = %region,
        "aws.dynamodb.table_name" = %table_name,
        "aws.request_id" = tracing::field::Empty,
        "aws.remote.service" = "AWS::DynamoDB",
        "aws.remote.operation" = operation,
        "aws.remote.resource.type" = "AWS::DynamoDB::Table",
        "aws.remote.resource.identifier" = %table_name,
        "otel.kind" = "client",
        "otel.name" = format!("DynamoDB.{}", operation),
        "rpc.system" = "aws-api",
        "rpc.service" = "AmazonDynamoDBv2",
        "rpc.method" = operation,
        "db.system" = "dynamodb",
        "db.name" = %table_name,
        "db.operation" = operation,
    )
}

/// Convert DynamoDB error to RepositoryError
pub(crate) fn map_dynamodb_error(error: DynamoDbError, table_name: &str) -> RepositoryError {
    error!("DynamoDB error: {:?}", error);

    if let DynamoDbError::ResourceNotFoundException(_) = error {
        return RepositoryError::TableNotFound {
            table_name: table_name.to_string(),
        };
    }

    RepositoryError::AwsSdk {
        message: error.to_string(),
    }
}
