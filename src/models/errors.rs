use chrono::NaiveDate;
use thiserror::Error;

/// Service-level errors that can occur in business logic
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Restaurant with id={id} not found")]
    RestaurantNotFound { id: i64 },

    #[error("No restaurants found")]
    NoRestaurants,

    #[error("Restaurant already exists: {name}, {address}")]
    RestaurantExists { name: String, address: String },

    #[error("No dishes for restaurant with id={restaurant_id} on {date}")]
    MenuNotFound { restaurant_id: i64, date: NaiveDate },

    #[error("Dish {name} is already on the menu for {date}")]
    DishExists { name: String, date: NaiveDate },

    #[error("Vote for user {user} on {date} not found")]
    VoteNotFound { user: String, date: NaiveDate },

    #[error("{message}")]
    VoteConflict { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Repository error: {source}")]
    Repository {
        #[from]
        source: RepositoryError,
    },
}

impl ServiceError {
    pub fn already_voted(restaurant_id: i64) -> Self {
        ServiceError::VoteConflict {
            message: format!(
                "Vote for restaurant with id={} has already been submitted today",
                restaurant_id
            ),
        }
    }

    pub fn not_voted_yet() -> Self {
        ServiceError::VoteConflict {
            message: "No vote submitted today, nothing to change".to_string(),
        }
    }

    pub fn cutoff_passed(restaurant_id: i64, cutoff: chrono::NaiveTime) -> Self {
        ServiceError::VoteConflict {
            message: format!(
                "Vote for restaurant with id={} has already been submitted today. \
                 Votes cannot be changed at or after {}",
                restaurant_id,
                cutoff.format("%H:%M")
            ),
        }
    }

    /// True for both kinds of absent records.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ServiceError::RestaurantNotFound { .. }
                | ServiceError::NoRestaurants
                | ServiceError::MenuNotFound { .. }
                | ServiceError::VoteNotFound { .. }
        )
    }
}

/// Repository-level errors for data access operations
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database connection failed")]
    ConnectionFailed,

    #[error("Item not found")]
    NotFound,

    #[error("Constraint violation: {message}")]
    ConstraintViolation { message: String },

    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },

    #[error("AWS SDK error: {message}")]
    AwsSdk { message: String },

    #[error("DynamoDB table not found: {table_name}. Ensure the table exists and IAM permissions are correct.")]
    TableNotFound { table_name: String },

    #[error("Invalid query parameters: {message}")]
    InvalidQuery { message: String },

    #[error("Timeout occurred during operation")]
    Timeout,
}

/// Validation errors for input data
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredField { field: String },

    #[error("Invalid field value: {field}={value}, reason={reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Field too long: {field}, max_length={max_length}, actual_length={actual_length}")]
    TooLong {
        field: String,
        max_length: usize,
        actual_length: usize,
    },

    #[error("Invalid format: {field}, expected={expected}")]
    InvalidFormat { field: String, expected: String },
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::ValidationError {
            message: err.to_string(),
        }
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Result type alias for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Result type alias for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;
